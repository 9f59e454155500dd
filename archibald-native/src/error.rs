//! Error types for Archibald Native

use thiserror::Error;

/// The main error type for native query building and execution
#[derive(Error, Debug)]
pub enum Error {
    /// Database connection or execution error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// SQL generation error
    #[error("SQL generation error: {message}")]
    SqlGeneration { message: String },

    /// Invalid query configuration
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The metadata provider does not know the requested entity
    #[error("Entity '{entity}' not found in metadata")]
    EntityNotFound { entity: String },

    /// An alias was registered twice in the same result set mapping
    #[error("Alias '{alias}' is already registered in the result set mapping")]
    DuplicateAlias { alias: String },

    /// A joined result referenced a parent alias that was never registered
    #[error("Alias '{alias}' is not registered in the result set mapping")]
    UnknownAlias { alias: String },

    /// The query has no field or scalar mapping to hydrate rows with
    #[error("No field or column mapping found, configure the result set mapping with some fields")]
    MissingHydrationMapping,

    /// A single result was requested but the query returned no rows
    #[error("No result was found for a query that expects one")]
    NoResult,

    /// A single result was requested but the query returned several
    #[error("More than one result was found for a query that expects one, got {count}")]
    NonUniqueResult { count: usize },
}

/// Convenience Result type for Archibald Native operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new SQL generation error
    pub fn sql_generation(message: impl Into<String>) -> Self {
        Self::SqlGeneration {
            message: message.into(),
        }
    }

    /// Create a new invalid query error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create a new entity not found error
    pub fn entity_not_found(entity: impl Into<String>) -> Self {
        Self::EntityNotFound {
            entity: entity.into(),
        }
    }

    /// Create a new duplicate alias error
    pub fn duplicate_alias(alias: impl Into<String>) -> Self {
        Self::DuplicateAlias {
            alias: alias.into(),
        }
    }

    /// Create a new unknown alias error
    pub fn unknown_alias(alias: impl Into<String>) -> Self {
        Self::UnknownAlias {
            alias: alias.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::sql_generation("Invalid SELECT");
        assert!(matches!(err, Error::SqlGeneration { .. }));
        assert_eq!(err.to_string(), "SQL generation error: Invalid SELECT");
    }

    #[test]
    fn test_invalid_query_error() {
        let err = Error::invalid_query("Dangling value");
        assert!(matches!(err, Error::InvalidQuery { .. }));
        assert_eq!(err.to_string(), "Invalid query: Dangling value");
    }

    #[test]
    fn test_entity_not_found_error() {
        let err = Error::entity_not_found("App\\Entity\\Ghost");
        assert!(matches!(err, Error::EntityNotFound { .. }));
        assert_eq!(err.to_string(), "Entity 'App\\Entity\\Ghost' not found in metadata");
    }

    #[test]
    fn test_alias_errors() {
        let err = Error::duplicate_alias("u");
        assert_eq!(
            err.to_string(),
            "Alias 'u' is already registered in the result set mapping"
        );

        let err = Error::unknown_alias("x");
        assert_eq!(
            err.to_string(),
            "Alias 'x' is not registered in the result set mapping"
        );
    }

    #[test]
    fn test_non_unique_result_error() {
        let err = Error::NonUniqueResult { count: 3 };
        assert!(err.to_string().ends_with("got 3"));
    }
}
