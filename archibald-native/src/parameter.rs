//! Bound parameters and the placeholder splitter
//!
//! Predicate methods accept an interleaved list of SQL fragments and values:
//!
//! ```
//! use archibald_native::{predicate, split_parameters, ParameterSet, TypeInferencePolicy};
//!
//! let mut params = ParameterSet::new();
//! let fragments = split_parameters(
//!     predicate!["status = :status", 5, "active = ?flag", true],
//!     &mut params,
//!     &TypeInferencePolicy::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(fragments, vec!["status = :status", "active = ?flag"]);
//! assert_eq!(params.len(), 2);
//! ```
//!
//! Every placeholder found in a fragment takes the next element of the list
//! as its value, text included, and the value is moved into the parameter
//! set, so only the SQL travels on to the statement.

use crate::{Error, Result, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indexmap::IndexMap;
use regex::Regex;
use std::fmt::{self, Display};
use std::sync::LazyLock;
use tracing::trace;

/// `:name` or `?name`; the character after the name is checked separately
static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[:?]([a-z0-9_]+)").expect("placeholder pattern is valid"));

/// Storage type hint attached to a bound parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterType {
    String,
    Integer,
    BigInt,
    Boolean,
    Float,
    Decimal,
    Binary,
    Json,
    Date,
    DateTime,
    /// List of strings expanded into `IN (...)`
    StringArray,
    /// List of integers expanded into `IN (...)`
    IntegerArray,
}

impl ParameterType {
    /// Whether the parameter expands into one placeholder per element
    pub fn is_array(&self) -> bool {
        matches!(self, ParameterType::StringArray | ParameterType::IntegerArray)
    }
}

impl Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterType::String => "string",
            ParameterType::Integer => "integer",
            ParameterType::BigInt => "bigint",
            ParameterType::Boolean => "boolean",
            ParameterType::Float => "float",
            ParameterType::Decimal => "decimal",
            ParameterType::Binary => "binary",
            ParameterType::Json => "json",
            ParameterType::Date => "date",
            ParameterType::DateTime => "datetime",
            ParameterType::StringArray => "string[]",
            ParameterType::IntegerArray => "integer[]",
        };
        write!(f, "{}", name)
    }
}

/// Key of a bound parameter: a name, or a position for numeric placeholders
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterKey {
    Named(String),
    Positional(usize),
}

impl From<&str> for ParameterKey {
    fn from(key: &str) -> Self {
        let key = key.trim_start_matches([':', '?']);
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(position) = key.parse() {
                return ParameterKey::Positional(position);
            }
        }
        ParameterKey::Named(key.to_string())
    }
}

impl From<String> for ParameterKey {
    fn from(key: String) -> Self {
        ParameterKey::from(key.as_str())
    }
}

impl From<usize> for ParameterKey {
    fn from(position: usize) -> Self {
        ParameterKey::Positional(position)
    }
}

impl Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterKey::Named(name) => write!(f, ":{}", name),
            ParameterKey::Positional(position) => write!(f, "?{}", position),
        }
    }
}

/// A value bound to a parameter key, with an optional type hint
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParameter {
    pub value: Value,
    pub parameter_type: Option<ParameterType>,
}

/// Parameters collected across predicate calls; later writes to a key win
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    parameters: IndexMap<ParameterKey, BoundParameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `key`, replacing any earlier binding
    pub fn set(
        &mut self,
        key: impl Into<ParameterKey>,
        value: impl Into<Value>,
        parameter_type: Option<ParameterType>,
    ) {
        self.parameters.insert(
            key.into(),
            BoundParameter {
                value: value.into(),
                parameter_type,
            },
        );
    }

    pub fn get(&self, key: impl Into<ParameterKey>) -> Option<&BoundParameter> {
        self.parameters.get(&key.into())
    }

    pub fn contains(&self, key: impl Into<ParameterKey>) -> bool {
        self.parameters.contains_key(&key.into())
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParameterKey, &BoundParameter)> {
        self.parameters.iter()
    }

    pub fn clear(&mut self) {
        self.parameters.clear();
    }
}

/// Predicate deciding whether a rule applies to a value
pub type InferenceRule = fn(&Value) -> bool;

/// Ordered rules deriving a type hint from a bound value; first match wins
#[derive(Clone)]
pub struct TypeInferencePolicy {
    rules: Vec<(InferenceRule, ParameterType)>,
}

impl TypeInferencePolicy {
    /// A policy without any rule, every value is bound without a hint
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule, evaluated after the existing ones
    ///
    /// # Examples
    /// ```
    /// use archibald_native::{ParameterType, TypeInferencePolicy, Value};
    ///
    /// let policy = TypeInferencePolicy::empty()
    ///     .rule(|v| matches!(v, Value::Json(_)), ParameterType::Json);
    ///
    /// assert_eq!(policy.infer(&Value::Json(serde_json::json!({}))), Some(ParameterType::Json));
    /// assert_eq!(policy.infer(&Value::I32(1)), None);
    /// ```
    pub fn rule(mut self, applies: InferenceRule, parameter_type: ParameterType) -> Self {
        self.rules.push((applies, parameter_type));
        self
    }

    pub fn infer(&self, value: &Value) -> Option<ParameterType> {
        self.rules
            .iter()
            .find(|(applies, _)| applies(value))
            .map(|(_, parameter_type)| *parameter_type)
    }
}

impl Default for TypeInferencePolicy {
    /// Dates and times bind as datetime, lists bind as string arrays
    fn default() -> Self {
        Self::empty()
            .rule(Value::is_temporal, ParameterType::DateTime)
            .rule(|value| matches!(value, Value::Array(_)), ParameterType::StringArray)
    }
}

impl fmt::Debug for TypeInferencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInferencePolicy")
            .field("rules", &self.rules.iter().map(|(_, t)| t).collect::<Vec<_>>())
            .finish()
    }
}

/// One element of a predicate argument list
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateArg {
    /// SQL text, possibly containing placeholders
    Fragment(String),
    /// A value for the placeholder waiting in the preceding fragment
    Bind(Value),
}

/// Bind an arbitrary value, including strings, in a predicate list
pub fn bind(value: impl Into<Value>) -> PredicateArg {
    PredicateArg::Bind(value.into())
}

impl From<&str> for PredicateArg {
    fn from(sql: &str) -> Self {
        PredicateArg::Fragment(sql.to_string())
    }
}

impl From<String> for PredicateArg {
    fn from(sql: String) -> Self {
        PredicateArg::Fragment(sql)
    }
}

impl From<Value> for PredicateArg {
    fn from(value: Value) -> Self {
        PredicateArg::Bind(value)
    }
}

macro_rules! impl_bind_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PredicateArg {
                fn from(value: $ty) -> Self {
                    PredicateArg::Bind(value.into())
                }
            }
        )*
    };
}

impl_bind_from!(
    bool,
    i32,
    i64,
    f32,
    f64,
    NaiveDate,
    NaiveDateTime,
    DateTime<Utc>,
    serde_json::Value,
);

impl<T> From<Vec<T>> for PredicateArg
where
    T: Into<Value>,
{
    fn from(values: Vec<T>) -> Self {
        PredicateArg::Bind(values.into())
    }
}

impl<T> From<Option<T>> for PredicateArg
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        PredicateArg::Bind(value.into())
    }
}

/// Build a predicate argument list from fragments and values
///
/// Strings become SQL fragments unless a placeholder is waiting for a value,
/// in which case they are bound as text. [`bind`](crate::parameter::bind)
/// makes the intent explicit.
#[macro_export]
macro_rules! predicate {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::PredicateArg::from($arg)),*]
    };
}

/// Types accepted by predicate methods
pub trait IntoPredicate {
    fn into_predicate(self) -> Vec<PredicateArg>;
}

impl IntoPredicate for &str {
    fn into_predicate(self) -> Vec<PredicateArg> {
        vec![PredicateArg::from(self)]
    }
}

impl IntoPredicate for String {
    fn into_predicate(self) -> Vec<PredicateArg> {
        vec![PredicateArg::from(self)]
    }
}

impl IntoPredicate for Vec<PredicateArg> {
    fn into_predicate(self) -> Vec<PredicateArg> {
        self
    }
}

// Shorthand for a single fragment with one value: where_(("id = :id", 5))
impl<T> IntoPredicate for (&str, T)
where
    T: Into<PredicateArg>,
{
    fn into_predicate(self) -> Vec<PredicateArg> {
        vec![PredicateArg::from(self.0), self.1.into()]
    }
}

// Two fragments, one value each: where_(("a = :a", 1, "b = :b", 2))
impl<T, U> IntoPredicate for (&str, T, &str, U)
where
    T: Into<PredicateArg>,
    U: Into<PredicateArg>,
{
    fn into_predicate(self) -> Vec<PredicateArg> {
        vec![
            PredicateArg::from(self.0),
            self.1.into(),
            PredicateArg::from(self.2),
            self.3.into(),
        ]
    }
}

/// Names of the placeholders in `sql`, left to right
///
/// A placeholder is `:name` or `?name` followed by the end of the text,
/// whitespace or a closing parenthesis.
pub fn placeholder_names(sql: &str) -> Vec<&str> {
    PLACEHOLDER_PATTERN
        .captures_iter(sql)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let terminated = match sql[whole.end()..].chars().next() {
                None => true,
                Some(c) => c.is_whitespace() || c == ')',
            };
            if terminated {
                caps.get(1).map(|name| name.as_str())
            } else {
                None
            }
        })
        .collect()
}

/// Move the values of a predicate argument list into `params`
///
/// Returns the remaining SQL fragments in their original order. Each
/// placeholder takes the next element of the list as its value, whether it
/// is a value or text. Placeholders left over once the list runs out stay
/// unbound so they can be set later. A value no placeholder asks for is an
/// error.
pub fn split_parameters(
    args: Vec<PredicateArg>,
    params: &mut ParameterSet,
    policy: &TypeInferencePolicy,
) -> Result<Vec<String>> {
    let mut fragments = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let sql = match arg {
            PredicateArg::Fragment(sql) => sql,
            PredicateArg::Bind(value) => {
                return Err(Error::invalid_query(format!(
                    "{} value has no placeholder to bind to",
                    value.type_name()
                )));
            }
        };

        for name in placeholder_names(&sql) {
            // The element after a placeholder is its value, text included
            let value = match args.next() {
                Some(PredicateArg::Bind(value)) => value,
                Some(PredicateArg::Fragment(text)) => Value::String(text),
                None => {
                    trace!(placeholder = name, "placeholder left unbound");
                    break;
                }
            };

            let parameter_type = policy.infer(&value);
            trace!(placeholder = name, ?parameter_type, "binding placeholder");
            params.set(name, value, parameter_type);
        }

        fragments.push(sql);
    }

    Ok(fragments)
}
