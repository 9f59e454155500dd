//! Common clause types shared by the statement and the native builder

use crate::Result;
use std::fmt::{self, Display};

/// Anything that renders to a SQL statement
pub trait QueryBuilder {
    /// Generate the SQL text
    fn to_sql(&self) -> Result<String>;
}

/// How predicates inside a composite expression are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhereConnector {
    And,
    Or,
}

impl Display for WhereConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereConnector::And => write!(f, "AND"),
            WhereConnector::Or => write!(f, "OR"),
        }
    }
}

/// A predicate: raw SQL, or several predicates joined by one connector
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Raw(String),
    Composite {
        connector: WhereConnector,
        parts: Vec<Expression>,
    },
}

impl Expression {
    /// Build an expression from SQL fragments, joining several with `AND`
    pub fn from_fragments(fragments: Vec<String>) -> Option<Self> {
        let mut parts: Vec<Expression> = fragments
            .into_iter()
            .filter(|fragment| !fragment.trim().is_empty())
            .map(Expression::Raw)
            .collect();

        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Expression::Composite {
                connector: WhereConnector::And,
                parts,
            }),
        }
    }

    /// Combine an existing predicate with new parts under `connector`
    ///
    /// An existing composite with the same connector is extended in place,
    /// anything else becomes the first part of a new composite.
    pub fn combine(existing: Option<Expression>, connector: WhereConnector, part: Expression) -> Expression {
        match existing {
            Some(Expression::Composite {
                connector: existing_connector,
                mut parts,
            }) if existing_connector == connector => {
                parts.push(part);
                Expression::Composite { connector, parts }
            }
            Some(existing) => Expression::Composite {
                connector,
                parts: vec![existing, part],
            },
            None => part,
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Raw(sql) => write!(f, "{}", sql),
            Expression::Composite { parts, .. } if parts.len() == 1 => write!(f, "{}", parts[0]),
            Expression::Composite { connector, parts } => {
                let rendered: Vec<String> = parts.iter().map(|part| part.to_string()).collect();
                write!(f, "({})", rendered.join(&format!(") {} (", connector)))
            }
        }
    }
}

/// JOIN types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

impl Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER"),
            JoinType::Left => write!(f, "LEFT"),
            JoinType::Right => write!(f, "RIGHT"),
        }
    }
}

/// A table in the FROM list
#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub table: String,
    pub alias: String,
}

/// A join attached to an alias already present in the statement
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub from_alias: String,
    pub table: String,
    pub alias: String,
    pub condition: Option<Expression>,
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// An ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByClause {
    pub column: String,
    pub direction: SortDirection,
}

/// Append LIMIT/OFFSET for the given paging to `sql`
pub fn apply_paging(sql: &str, first_result: u64, max_results: Option<u64>) -> String {
    let mut sql = sql.to_string();

    if let Some(limit) = max_results {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    if first_result > 0 {
        sql.push_str(&format!(" OFFSET {}", first_result));
    }

    sql
}

/// Trait to convert various types into columns
pub trait IntoColumns {
    fn into_columns(self) -> Vec<String>;
}

impl IntoColumns for &str {
    fn into_columns(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoColumns for String {
    fn into_columns(self) -> Vec<String> {
        vec![self]
    }
}

impl IntoColumns for Vec<String> {
    fn into_columns(self) -> Vec<String> {
        self
    }
}

impl IntoColumns for Vec<&str> {
    fn into_columns(self) -> Vec<String> {
        self.into_iter().map(|s| s.to_string()).collect()
    }
}

// For tuples
impl IntoColumns for (&str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![self.0.to_string(), self.1.to_string(), self.2.to_string()]
    }
}

impl IntoColumns for (&str, &str, &str, &str) {
    fn into_columns(self) -> Vec<String> {
        vec![
            self.0.to_string(),
            self.1.to_string(),
            self.2.to_string(),
            self.3.to_string(),
        ]
    }
}
