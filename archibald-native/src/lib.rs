//! Archibald Native - native SQL query building with result set mapping
//!
//! Write SQL against physical tables, or name entities and their
//! associations instead, and get back a query that knows how its result
//! columns hydrate into entity objects. Values written next to the
//! predicates that use them are bound to their placeholders automatically.
//!
//! ```
//! use archibald_native::{bind, native, predicate, EntityMetadata, MetadataRegistry, ParameterType};
//! use std::sync::Arc;
//!
//! let metadata = Arc::new(
//!     MetadataRegistry::new().register(EntityMetadata::new("App\\User", "users").id("id").field("name")),
//! );
//!
//! let mut qb = native(metadata)
//!     .from("users", "u").unwrap()
//!     .where_(predicate!["u.name IN (:names)", vec!["ada", "alan"]]).unwrap()
//!     .set_max_results(10);
//!
//! let query = qb.get_query().unwrap();
//! assert_eq!(
//!     query.sql(),
//!     "SELECT u.id AS u_id, u.name AS u_name FROM users u WHERE u.name IN (:names) LIMIT 10"
//! );
//! assert_eq!(
//!     query.parameters().get("names").unwrap().parameter_type,
//!     Some(ParameterType::StringArray)
//! );
//! ```

pub mod builder;
pub mod error;
pub mod executor;
pub mod hydration;
pub mod mapping;
pub mod metadata;
pub mod parameter;
pub mod query;
pub mod resolver;
pub mod value;

use std::sync::Arc;

// Re-export main types
pub use builder::{Expression, IntoColumns, JoinType, NativeQueryBuilder, QueryBuilder, SelectStatement, SortDirection};
pub use error::{Error, Result};
pub use executor::ConnectionPool;
pub use hydration::{ObjectHydrator, Row};
pub use mapping::{FieldResult, ResultSetMapping, ScalarResult};
pub use metadata::{AssociationKind, AssociationMapping, EntityMetadata, FieldMapping, MetadataProvider, MetadataRegistry};
pub use parameter::{
    bind, placeholder_names, split_parameters, BoundParameter, IntoPredicate, ParameterKey, ParameterSet,
    ParameterType, PredicateArg, TypeInferencePolicy,
};
pub use query::{NativeQuery, PlaceholderStyle};
pub use resolver::MappingResolver;
pub use value::Value;

#[cfg(feature = "postgres")]
pub use executor::postgres::PostgresPool;
#[cfg(feature = "sqlite")]
pub use executor::sqlite::SqlitePoolWrapper;

/// Create a native query builder over the given metadata
pub fn native(metadata: Arc<dyn MetadataProvider>) -> NativeQueryBuilder {
    NativeQueryBuilder::new(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> Arc<MetadataRegistry> {
        Arc::new(
            MetadataRegistry::new()
                .register(
                    EntityMetadata::new("App\\User", "users")
                        .id("id")
                        .field("name")
                        .association("articles", "App\\Article", AssociationKind::OneToMany),
                )
                .register(
                    EntityMetadata::new("App\\Article", "articles")
                        .id("id")
                        .field("title")
                        .association("author", "App\\User", AssociationKind::ManyToOne),
                ),
        )
    }

    #[test]
    fn test_unknown_identifier_leaves_mapping_alone() {
        let mut qb = native(metadata()).from("audit_log", "l").unwrap();
        assert_eq!(*qb.result_set_mapping(), ResultSetMapping::new());
        assert_eq!(qb.select("*").get_sql().unwrap(), "SELECT * FROM audit_log l");
    }

    #[test]
    fn test_qualified_name_registers_root_once() {
        let mut qb = native(metadata()).from("App\\User", "u").unwrap();
        let rsm = qb.result_set_mapping();
        assert_eq!(rsm.aliases().collect::<Vec<_>>(), vec![("u", "App\\User")]);
        assert_eq!(rsm.root_aliases().count(), 1);

        let err = native(metadata())
            .from("App\\User", "u")
            .unwrap()
            .from("users", "u")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { .. }));
    }

    #[test]
    fn test_association_join_registers_joined_result() {
        let mut qb = native(metadata())
            .from("articles", "a")
            .unwrap()
            .inner_join("a", "author", "u", "u.id = a.author_id")
            .unwrap();

        let rsm = qb.result_set_mapping();
        assert_eq!(rsm.entity_for_alias("u"), Some("App\\User"));
        assert_eq!(rsm.parent_alias("u"), Some("a"));
        assert_eq!(rsm.relation("u").unwrap().field_name, "author");
        assert_eq!(
            qb.select("*").get_sql().unwrap(),
            "SELECT * FROM articles a INNER JOIN users u ON u.id = a.author_id"
        );
    }

    #[test]
    fn test_finalization_with_and_without_mapping() {
        let err = native(metadata())
            .from("audit_log", "l")
            .unwrap()
            .get_query()
            .unwrap_err();
        assert!(matches!(err, Error::MissingHydrationMapping));

        let query = native(metadata())
            .from("articles", "a")
            .unwrap()
            .get_query()
            .unwrap();
        assert_eq!(query.sql(), "SELECT a.id AS a_id, a.title AS a_title FROM articles a");
    }
}
