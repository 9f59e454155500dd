//! Native SQL query builder with result set mapping

use super::common::{Expression, IntoColumns, JoinType, QueryBuilder, SortDirection, WhereConnector};
use super::select::SelectStatement;
use crate::mapping::ResultSetMapping;
use crate::metadata::MetadataProvider;
use crate::parameter::{split_parameters, IntoPredicate, ParameterKey, ParameterSet, ParameterType, TypeInferencePolicy};
use crate::query::NativeQuery;
use crate::resolver::MappingResolver;
use crate::{Error, Result, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Builds native SQL while recording how its columns map onto entities
///
/// Table references given to [`from`](Self::from) and the join methods may
/// be entity names or association fields; they are resolved to physical
/// tables and registered in the result set mapping. Predicates take SQL
/// fragments interleaved with values, and the values are bound to the
/// placeholders they follow.
///
/// # Examples
/// ```
/// use archibald_native::{bind, predicate, AssociationKind, EntityMetadata, MetadataRegistry, NativeQueryBuilder};
/// use std::sync::Arc;
///
/// let metadata = Arc::new(
///     MetadataRegistry::new()
///         .register(
///             EntityMetadata::new("App\\User", "users")
///                 .id("id")
///                 .field("name")
///                 .association("articles", "App\\Article", AssociationKind::OneToMany),
///         )
///         .register(EntityMetadata::new("App\\Article", "articles").id("id").field("title")),
/// );
///
/// let mut qb = NativeQueryBuilder::new(metadata)
///     .from("App\\User", "u").unwrap()
///     .left_join("u", "articles", "a", "a.user_id = u.id").unwrap()
///     .where_(predicate!["u.name = :name", bind("Ada")]).unwrap();
///
/// let query = qb.get_query().unwrap();
/// assert_eq!(
///     query.sql(),
///     "SELECT u.id AS u_id, u.name AS u_name, a.id AS a_id, a.title AS a_title \
///      FROM users u LEFT JOIN articles a ON a.user_id = u.id WHERE u.name = :name"
/// );
/// ```
#[derive(Clone)]
pub struct NativeQueryBuilder {
    metadata: Arc<dyn MetadataProvider>,
    statement: SelectStatement,
    rsm: Option<ResultSetMapping>,
    parameters: ParameterSet,
    type_inference: TypeInferencePolicy,
}

impl NativeQueryBuilder {
    pub fn new(metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            metadata,
            statement: SelectStatement::new(),
            rsm: None,
            parameters: ParameterSet::new(),
            type_inference: TypeInferencePolicy::default(),
        }
    }

    /// Replace the rules used to pick type hints for bound values
    pub fn with_type_inference(mut self, policy: TypeInferencePolicy) -> Self {
        self.type_inference = policy;
        self
    }

    /// The result set mapping, created on first access
    pub fn result_set_mapping(&mut self) -> &mut ResultSetMapping {
        self.rsm.get_or_insert_with(ResultSetMapping::new)
    }

    /// Add a table, entity name or association field to FROM
    pub fn from(mut self, table: &str, alias: &str) -> Result<Self> {
        let table = self.resolve(table, alias, None)?;
        self.statement.add_from(&table, alias);
        Ok(self)
    }

    /// Alias for [`inner_join`](Self::inner_join)
    pub fn join(self, from_alias: &str, join: &str, alias: &str, condition: impl IntoPredicate) -> Result<Self> {
        self.inner_join(from_alias, join, alias, condition)
    }

    pub fn inner_join(self, from_alias: &str, join: &str, alias: &str, condition: impl IntoPredicate) -> Result<Self> {
        self.add_join(JoinType::Inner, from_alias, join, alias, condition)
    }

    pub fn left_join(self, from_alias: &str, join: &str, alias: &str, condition: impl IntoPredicate) -> Result<Self> {
        self.add_join(JoinType::Left, from_alias, join, alias, condition)
    }

    pub fn right_join(self, from_alias: &str, join: &str, alias: &str, condition: impl IntoPredicate) -> Result<Self> {
        self.add_join(JoinType::Right, from_alias, join, alias, condition)
    }

    fn add_join(
        mut self,
        join_type: JoinType,
        from_alias: &str,
        join: &str,
        alias: &str,
        condition: impl IntoPredicate,
    ) -> Result<Self> {
        let table = self.resolve(join, alias, Some(from_alias))?;
        let condition = self.split(condition)?;
        self.statement.add_join(join_type, from_alias, &table, alias, condition);
        Ok(self)
    }

    /// Replace the WHERE predicate
    pub fn where_(mut self, predicate: impl IntoPredicate) -> Result<Self> {
        let predicate = self.split(predicate)?;
        self.statement.set_where(predicate);
        Ok(self)
    }

    pub fn and_where(mut self, predicate: impl IntoPredicate) -> Result<Self> {
        if let Some(predicate) = self.split(predicate)? {
            self.statement.combine_where(WhereConnector::And, predicate);
        }
        Ok(self)
    }

    pub fn or_where(mut self, predicate: impl IntoPredicate) -> Result<Self> {
        if let Some(predicate) = self.split(predicate)? {
            self.statement.combine_where(WhereConnector::Or, predicate);
        }
        Ok(self)
    }

    /// Replace the select list
    pub fn select<C: IntoColumns>(mut self, columns: C) -> Self {
        self.statement.select(columns);
        self
    }

    pub fn add_select<C: IntoColumns>(mut self, columns: C) -> Self {
        self.statement.add_select(columns);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.statement.distinct = true;
        self
    }

    pub fn group_by<C: IntoColumns>(mut self, columns: C) -> Self {
        self.statement.group_by(columns);
        self
    }

    pub fn add_group_by<C: IntoColumns>(mut self, columns: C) -> Self {
        self.statement.add_group_by(columns);
        self
    }

    /// Replace the HAVING predicate
    pub fn having(mut self, predicate: &str) -> Self {
        self.statement
            .set_having(Expression::from_fragments(vec![predicate.to_string()]));
        self
    }

    pub fn and_having(mut self, predicate: &str) -> Self {
        self.statement
            .combine_having(WhereConnector::And, Expression::Raw(predicate.to_string()));
        self
    }

    pub fn or_having(mut self, predicate: &str) -> Self {
        self.statement
            .combine_having(WhereConnector::Or, Expression::Raw(predicate.to_string()));
        self
    }

    /// Replace the ORDER BY list
    pub fn order_by(mut self, sort: &str, direction: SortDirection) -> Self {
        self.statement.order_by(sort, direction);
        self
    }

    pub fn add_order_by(mut self, sort: &str, direction: SortDirection) -> Self {
        self.statement.add_order_by(sort, direction);
        self
    }

    pub fn set_first_result(mut self, first_result: u64) -> Self {
        self.statement.first_result = first_result;
        self
    }

    pub fn set_max_results(mut self, max_results: u64) -> Self {
        self.statement.max_results = Some(max_results);
        self
    }

    /// Remove the row limit
    pub fn clear_max_results(mut self) -> Self {
        self.statement.max_results = None;
        self
    }

    pub fn first_result(&self) -> u64 {
        self.statement.first_result
    }

    pub fn max_results(&self) -> Option<u64> {
        self.statement.max_results
    }

    /// Bind a value explicitly, replacing any earlier binding of `key`
    pub fn set_parameter(
        mut self,
        key: impl Into<ParameterKey>,
        value: impl Into<Value>,
        parameter_type: Option<ParameterType>,
    ) -> Self {
        self.parameters.set(key, value, parameter_type);
        self
    }

    pub fn set_parameters<K, V, I>(mut self, parameters: I) -> Self
    where
        K: Into<ParameterKey>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in parameters {
            self.parameters.set(key, value, None);
        }
        self
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn statement(&self) -> &SelectStatement {
        &self.statement
    }

    /// Current SQL, paging included
    pub fn get_sql(&self) -> Result<String> {
        self.statement.to_sql()
    }

    /// Finalize into a [`NativeQuery`]
    ///
    /// Without an explicit select list, one is generated from the mapped
    /// columns (or `*` when nothing is mapped) for this SQL only. The paging
    /// of the query is carried back onto the builder. Fails with
    /// [`Error::MissingHydrationMapping`] when no column is mapped, after the
    /// SQL has been rendered.
    pub fn get_query(&mut self) -> Result<NativeQuery> {
        let rsm = self.result_set_mapping().clone();

        let mut query = NativeQuery::new(Arc::clone(&self.metadata), rsm, self.parameters.clone());
        query.set_first_result(self.statement.first_result);
        query.set_max_results(self.statement.max_results);

        let sql = if self.statement.selected_columns.is_empty() {
            let generated = query.result_set_mapping().generate_select_clause();
            let columns = if generated.is_empty() { "*".to_string() } else { generated };
            self.statement.to_sql_with_columns(&[columns])?
        } else {
            self.statement.to_sql_unpaged()?
        };
        query.set_sql(sql);

        self.statement.first_result = query.first_result();
        self.statement.max_results = query.max_results();

        if !query.result_set_mapping().has_column_mappings() {
            return Err(Error::MissingHydrationMapping);
        }

        debug!(
            sql = %query.sql(),
            parameters = query.parameters().len(),
            "native query finalized"
        );

        Ok(query)
    }

    fn resolve(&mut self, identifier: &str, alias: &str, joined_from: Option<&str>) -> Result<String> {
        let rsm = self.rsm.get_or_insert_with(ResultSetMapping::new);
        MappingResolver::new(self.metadata.as_ref()).resolve(identifier, alias, joined_from, rsm)
    }

    fn split(&mut self, predicate: impl IntoPredicate) -> Result<Option<Expression>> {
        let fragments = split_parameters(
            predicate.into_predicate(),
            &mut self.parameters,
            &self.type_inference,
        )?;
        Ok(Expression::from_fragments(fragments))
    }
}

impl QueryBuilder for NativeQueryBuilder {
    fn to_sql(&self) -> Result<String> {
        self.get_sql()
    }
}

impl fmt::Debug for NativeQueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeQueryBuilder")
            .field("statement", &self.statement)
            .field("rsm", &self.rsm)
            .field("parameters", &self.parameters)
            .field("type_inference", &self.type_inference)
            .finish_non_exhaustive()
    }
}
