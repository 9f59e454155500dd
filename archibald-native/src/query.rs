//! Finalized native query: SQL text, result set mapping, parameters and paging

use crate::builder::common::apply_paging;
use crate::mapping::ResultSetMapping;
use crate::metadata::MetadataProvider;
use crate::parameter::{ParameterKey, ParameterSet, ParameterType};
use crate::{Error, Result, Value};
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use std::sync::LazyLock;

/// Quoted literals and `::` casts are copied verbatim; everything else that
/// looks like a marker is a parameter
static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^']|'')*'|"(?:[^"]|"")*"|::|[:?]([A-Za-z0-9_]+)|\?"#)
        .expect("marker pattern is valid")
});

/// Positional placeholder syntax expected by a database driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` (SQLite, MySQL)
    QuestionMark,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
}

impl PlaceholderStyle {
    /// Placeholder for the 1-based `position`
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            PlaceholderStyle::QuestionMark => "?".to_string(),
            PlaceholderStyle::Dollar => format!("${}", position),
        }
    }
}

/// A query ready for execution
///
/// The SQL is held without paging; `sql()` appends LIMIT/OFFSET from the
/// query's own first/max results so they can still be changed here.
#[derive(Clone)]
pub struct NativeQuery {
    metadata: Arc<dyn MetadataProvider>,
    sql: String,
    rsm: ResultSetMapping,
    parameters: ParameterSet,
    first_result: u64,
    max_results: Option<u64>,
}

impl NativeQuery {
    pub fn new(metadata: Arc<dyn MetadataProvider>, rsm: ResultSetMapping, parameters: ParameterSet) -> Self {
        Self {
            metadata,
            sql: String::new(),
            rsm,
            parameters,
            first_result: 0,
            max_results: None,
        }
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    /// SQL text with paging applied
    pub fn sql(&self) -> String {
        apply_paging(&self.sql, self.first_result, self.max_results)
    }

    /// SQL text as captured, without paging
    pub fn unpaged_sql(&self) -> &str {
        &self.sql
    }

    pub fn result_set_mapping(&self) -> &ResultSetMapping {
        &self.rsm
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn set_parameter(
        &mut self,
        key: impl Into<ParameterKey>,
        value: impl Into<Value>,
        parameter_type: Option<ParameterType>,
    ) {
        self.parameters.set(key, value, parameter_type);
    }

    pub fn first_result(&self) -> u64 {
        self.first_result
    }

    pub fn set_first_result(&mut self, first_result: u64) {
        self.first_result = first_result;
    }

    pub fn max_results(&self) -> Option<u64> {
        self.max_results
    }

    pub fn set_max_results(&mut self, max_results: Option<u64>) {
        self.max_results = max_results;
    }

    pub(crate) fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    /// Rewrite named and numbered markers into the driver's positional
    /// syntax, returning the values in placeholder order.
    ///
    /// Array parameters with an array type hint expand into one placeholder
    /// per element (an empty list renders `NULL`). A marker with no bound
    /// parameter is an error.
    pub fn to_positional(&self, style: PlaceholderStyle) -> Result<(String, Vec<Value>)> {
        let sql = self.sql();
        let mut rewritten = String::with_capacity(sql.len());
        let mut values: Vec<Value> = Vec::new();
        let mut last = 0;
        let mut next_position = 0;

        for caps in MARKER_PATTERN.captures_iter(&sql) {
            let Some(marker) = caps.get(0) else { continue };
            rewritten.push_str(&sql[last..marker.start()]);
            last = marker.end();

            let text = marker.as_str();
            if text.starts_with('\'') || text.starts_with('"') || text == "::" {
                rewritten.push_str(text);
                continue;
            }

            let key = match caps.get(1) {
                Some(name) => ParameterKey::from(name.as_str()),
                None => {
                    let key = ParameterKey::Positional(next_position);
                    next_position += 1;
                    key
                }
            };

            let bound = self
                .parameters
                .get(key.clone())
                .ok_or_else(|| Error::invalid_query(format!("parameter {} is not bound", key)))?;

            let expand = bound.parameter_type.is_some_and(|ty| ty.is_array());
            match (&bound.value, expand) {
                (Value::Array(items), true) if items.is_empty() => rewritten.push_str("NULL"),
                (Value::Array(items), true) => {
                    let markers: Vec<String> = items
                        .iter()
                        .map(|item| {
                            values.push(item.clone());
                            style.placeholder(values.len())
                        })
                        .collect();
                    rewritten.push_str(&markers.join(", "));
                }
                (value, _) => {
                    values.push(value.clone());
                    rewritten.push_str(&style.placeholder(values.len()));
                }
            }
        }

        rewritten.push_str(&sql[last..]);
        Ok((rewritten, values))
    }
}

impl fmt::Debug for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeQuery")
            .field("sql", &self.sql)
            .field("rsm", &self.rsm)
            .field("parameters", &self.parameters)
            .field("first_result", &self.first_result)
            .field("max_results", &self.max_results)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataRegistry;

    fn query(sql: &str) -> NativeQuery {
        let mut query = NativeQuery::new(
            Arc::new(MetadataRegistry::new()),
            ResultSetMapping::new(),
            ParameterSet::new(),
        );
        query.set_sql(sql);
        query
    }

    #[test]
    fn test_paging_is_applied_on_render() {
        let mut query = query("SELECT * FROM users u");
        assert_eq!(query.sql(), "SELECT * FROM users u");

        query.set_max_results(Some(10));
        query.set_first_result(30);
        assert_eq!(query.sql(), "SELECT * FROM users u LIMIT 10 OFFSET 30");
        assert_eq!(query.unpaged_sql(), "SELECT * FROM users u");
    }

    #[test]
    fn test_named_markers_to_dollar() {
        let mut query = query("SELECT * FROM users u WHERE u.name = :name AND u.age > :age OR u.nick = :name");
        query.set_parameter("name", "ada", None);
        query.set_parameter("age", 30, None);

        let (sql, values) = query.to_positional(PlaceholderStyle::Dollar).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users u WHERE u.name = $1 AND u.age > $2 OR u.nick = $3"
        );
        assert_eq!(
            values,
            vec![Value::from("ada"), Value::I32(30), Value::from("ada")]
        );
    }

    #[test]
    fn test_bare_and_numbered_markers() {
        let mut query = query("SELECT * FROM t WHERE a = ? AND b = ? AND c = ?5");
        query.set_parameter(0usize, 1, None);
        query.set_parameter(1usize, 2, None);
        query.set_parameter("5", 3, None);

        let (sql, values) = query.to_positional(PlaceholderStyle::QuestionMark).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ? AND c = ?");
        assert_eq!(values, vec![Value::I32(1), Value::I32(2), Value::I32(3)]);
    }

    #[test]
    fn test_literals_and_casts_are_left_alone() {
        let mut query = query("SELECT ':skip', 'it''s :x', created::date FROM t WHERE id = :id");
        query.set_parameter("id", 7, None);

        let (sql, values) = query.to_positional(PlaceholderStyle::Dollar).unwrap();
        assert_eq!(sql, "SELECT ':skip', 'it''s :x', created::date FROM t WHERE id = $1");
        assert_eq!(values, vec![Value::I32(7)]);
    }

    #[test]
    fn test_array_parameters_expand() {
        let mut query = query("SELECT * FROM t WHERE tag IN (:tags) AND id IN (:ids)");
        query.set_parameter("tags", vec!["a", "b", "c"], Some(ParameterType::StringArray));
        query.set_parameter("ids", Vec::<i32>::new(), Some(ParameterType::IntegerArray));

        let (sql, values) = query.to_positional(PlaceholderStyle::Dollar).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE tag IN ($1, $2, $3) AND id IN (NULL)");
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_array_without_hint_binds_whole() {
        let mut query = query("SELECT * FROM t WHERE tags = :tags");
        query.set_parameter("tags", vec![1, 2], None);

        let (sql, values) = query.to_positional(PlaceholderStyle::QuestionMark).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE tags = ?");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_unbound_marker_is_an_error() {
        let query = query("SELECT * FROM t WHERE id = :id");
        let err = query.to_positional(PlaceholderStyle::Dollar).unwrap_err();
        assert!(err.to_string().contains(":id"));
    }
}
