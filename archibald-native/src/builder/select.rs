//! SELECT statement state and rendering

use super::common::{
    apply_paging, Expression, FromClause, IntoColumns, JoinClause, JoinType, OrderByClause,
    QueryBuilder, SortDirection, WhereConnector,
};
use crate::{Error, Result};

/// Clause state of a SELECT statement
///
/// Joins hang off the alias they were declared from and render right after
/// that alias, so a join may start from a table in FROM or from another join.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectStatement {
    pub selected_columns: Vec<String>,
    pub distinct: bool,
    pub from: Vec<FromClause>,
    pub joins: Vec<JoinClause>,
    pub where_clause: Option<Expression>,
    pub group_by: Vec<String>,
    pub having: Option<Expression>,
    pub order_by: Vec<OrderByClause>,
    pub first_result: u64,
    pub max_results: Option<u64>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selected columns
    pub fn select<C: IntoColumns>(&mut self, columns: C) {
        self.selected_columns = columns.into_columns();
    }

    pub fn add_select<C: IntoColumns>(&mut self, columns: C) {
        self.selected_columns.extend(columns.into_columns());
    }

    pub fn add_from(&mut self, table: &str, alias: &str) {
        self.from.push(FromClause {
            table: table.to_string(),
            alias: alias.to_string(),
        });
    }

    pub fn add_join(
        &mut self,
        join_type: JoinType,
        from_alias: &str,
        table: &str,
        alias: &str,
        condition: Option<Expression>,
    ) {
        self.joins.push(JoinClause {
            join_type,
            from_alias: from_alias.to_string(),
            table: table.to_string(),
            alias: alias.to_string(),
            condition,
        });
    }

    /// Replace the WHERE predicate
    pub fn set_where(&mut self, predicate: Option<Expression>) {
        self.where_clause = predicate;
    }

    pub fn combine_where(&mut self, connector: WhereConnector, predicate: Expression) {
        self.where_clause = Some(Expression::combine(self.where_clause.take(), connector, predicate));
    }

    /// Replace the HAVING predicate
    pub fn set_having(&mut self, predicate: Option<Expression>) {
        self.having = predicate;
    }

    pub fn combine_having(&mut self, connector: WhereConnector, predicate: Expression) {
        self.having = Some(Expression::combine(self.having.take(), connector, predicate));
    }

    pub fn group_by<C: IntoColumns>(&mut self, columns: C) {
        self.group_by = columns.into_columns();
    }

    pub fn add_group_by<C: IntoColumns>(&mut self, columns: C) {
        self.group_by.extend(columns.into_columns());
    }

    /// Replace the ORDER BY list with a single column
    pub fn order_by(&mut self, column: &str, direction: SortDirection) {
        self.order_by.clear();
        self.add_order_by(column, direction);
    }

    pub fn add_order_by(&mut self, column: &str, direction: SortDirection) {
        self.order_by.push(OrderByClause {
            column: column.to_string(),
            direction,
        });
    }

    /// Render the statement without LIMIT/OFFSET
    pub fn to_sql_unpaged(&self) -> Result<String> {
        self.render(&self.selected_columns)
    }

    /// Render the statement without LIMIT/OFFSET using `columns` as the
    /// select list; the statement itself is left untouched
    pub fn to_sql_with_columns(&self, columns: &[String]) -> Result<String> {
        self.render(columns)
    }

    fn render(&self, columns: &[String]) -> Result<String> {
        if columns.is_empty() {
            return Err(Error::invalid_query("SELECT requires columns to be specified with .select()"));
        }

        if self.from.is_empty() {
            return Err(Error::invalid_query("SELECT requires at least one table in FROM"));
        }

        self.check_join_aliases()?;

        let mut sql = String::new();

        // SELECT clause
        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&columns.join(", "));

        // FROM clause, each table followed by the joins hanging off it
        let tables: Vec<String> = self
            .from
            .iter()
            .map(|from| {
                let mut table = format!("{} {}", from.table, from.alias);
                self.push_joins(&from.alias, &mut table);
                table
            })
            .collect();
        sql.push_str(" FROM ");
        sql.push_str(&tables.join(", "));

        if let Some(predicate) = &self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.to_string());
        }

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if let Some(predicate) = &self.having {
            sql.push_str(" HAVING ");
            sql.push_str(&predicate.to_string());
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            let order_parts: Vec<String> = self
                .order_by
                .iter()
                .map(|clause| format!("{} {}", clause.column, clause.direction))
                .collect();
            sql.push_str(&order_parts.join(", "));
        }

        Ok(sql)
    }

    fn push_joins(&self, from_alias: &str, sql: &mut String) {
        for join in self.joins.iter().filter(|join| join.from_alias == from_alias) {
            sql.push_str(&format!(" {} JOIN {} {}", join.join_type, join.table, join.alias));
            if let Some(condition) = &join.condition {
                sql.push_str(" ON ");
                sql.push_str(&condition.to_string());
            }
            self.push_joins(&join.alias, sql);
        }
    }

    /// Every join must start from an alias declared in FROM or by another join,
    /// and no alias may be declared twice
    fn check_join_aliases(&self) -> Result<()> {
        let mut known: Vec<&str> = Vec::new();
        for from in &self.from {
            declare(&mut known, &from.alias)?;
        }

        let mut pending: Vec<&JoinClause> = self.joins.iter().collect();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<&JoinClause>, Vec<&JoinClause>) = pending
                .into_iter()
                .partition(|join| known.contains(&join.from_alias.as_str()));

            if ready.is_empty() {
                let aliases: Vec<&str> = waiting.iter().map(|join| join.from_alias.as_str()).collect();
                return Err(Error::invalid_query(format!(
                    "join declared from unknown alias '{}'",
                    aliases.join("', '")
                )));
            }

            for join in ready {
                declare(&mut known, &join.alias)?;
            }
            pending = waiting;
        }

        Ok(())
    }
}

fn declare<'a>(known: &mut Vec<&'a str>, alias: &'a str) -> Result<()> {
    if known.contains(&alias) {
        return Err(Error::invalid_query(format!("alias '{}' is declared more than once", alias)));
    }
    known.push(alias);
    Ok(())
}

impl QueryBuilder for SelectStatement {
    fn to_sql(&self) -> Result<String> {
        let sql = self.to_sql_unpaged()?;
        Ok(apply_paging(&sql, self.first_result, self.max_results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(sql: &str) -> Option<Expression> {
        Some(Expression::Raw(sql.to_string()))
    }

    #[test]
    fn test_simple_select() {
        let mut statement = SelectStatement::new();
        statement.select(("id", "name"));
        statement.add_from("users", "u");

        assert_eq!(statement.to_sql().unwrap(), "SELECT id, name FROM users u");
    }

    #[test]
    fn test_select_requires_columns_and_from() {
        let mut statement = SelectStatement::new();
        statement.add_from("users", "u");
        assert!(statement.to_sql().is_err());

        let mut statement = SelectStatement::new();
        statement.select("*");
        let err = statement.to_sql().unwrap_err();
        assert!(matches!(err, Error::InvalidQuery { .. }));
    }

    #[test]
    fn test_joins_render_after_their_alias() {
        let mut statement = SelectStatement::new();
        statement.select("*");
        statement.add_from("users", "u");
        statement.add_from("tags", "t");
        statement.add_join(JoinType::Inner, "a", "comments", "c", raw("c.article_id = a.id"));
        statement.add_join(JoinType::Left, "u", "articles", "a", raw("a.author_id = u.id"));
        statement.add_join(JoinType::Right, "t", "tag_links", "l", None);

        assert_eq!(
            statement.to_sql().unwrap(),
            "SELECT * FROM users u \
             LEFT JOIN articles a ON a.author_id = u.id \
             INNER JOIN comments c ON c.article_id = a.id, \
             tags t RIGHT JOIN tag_links l"
        );
    }

    #[test]
    fn test_join_from_unknown_alias() {
        let mut statement = SelectStatement::new();
        statement.select("*");
        statement.add_from("users", "u");
        statement.add_join(JoinType::Inner, "x", "articles", "a", None);

        let err = statement.to_sql().unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_cyclic_or_repeated_aliases_are_rejected() {
        let mut statement = SelectStatement::new();
        statement.select("*");
        statement.add_from("audit_log", "l");
        statement.add_join(JoinType::Left, "l", "t1", "x", None);
        statement.add_join(JoinType::Left, "x", "t2", "l", None);
        let err = statement.to_sql().unwrap_err();
        assert!(err.to_string().contains("'l' is declared more than once"));

        let mut statement = SelectStatement::new();
        statement.select("*");
        statement.add_from("audit_log", "l");
        statement.add_join(JoinType::Inner, "l", "t1", "l", None);
        assert!(matches!(statement.to_sql(), Err(Error::InvalidQuery { .. })));

        let mut statement = SelectStatement::new();
        statement.select("*");
        statement.add_from("users", "u");
        statement.add_from("accounts", "u");
        assert!(matches!(statement.to_sql(), Err(Error::InvalidQuery { .. })));
    }

    #[test]
    fn test_where_group_having_order() {
        let mut statement = SelectStatement::new();
        statement.select(vec!["u.id", "COUNT(a.id)"]);
        statement.add_from("users", "u");
        statement.set_where(raw("u.active = :active"));
        statement.combine_where(WhereConnector::And, Expression::Raw("u.age > :age".to_string()));
        statement.group_by("u.id");
        statement.set_having(raw("COUNT(a.id) > 1"));
        statement.order_by("u.id", SortDirection::Desc);
        statement.add_order_by("u.name", SortDirection::Asc);

        assert_eq!(
            statement.to_sql().unwrap(),
            "SELECT u.id, COUNT(a.id) FROM users u \
             WHERE (u.active = :active) AND (u.age > :age) \
             GROUP BY u.id HAVING COUNT(a.id) > 1 \
             ORDER BY u.id DESC, u.name ASC"
        );
    }

    #[test]
    fn test_paging_and_distinct() {
        let mut statement = SelectStatement::new();
        statement.select("u.name");
        statement.distinct = true;
        statement.add_from("users", "u");
        statement.first_result = 40;
        statement.max_results = Some(20);

        assert_eq!(statement.to_sql_unpaged().unwrap(), "SELECT DISTINCT u.name FROM users u");
        assert_eq!(
            statement.to_sql().unwrap(),
            "SELECT DISTINCT u.name FROM users u LIMIT 20 OFFSET 40"
        );
    }

    #[test]
    fn test_override_columns_leave_statement_alone() {
        let mut statement = SelectStatement::new();
        statement.add_from("users", "u");

        let sql = statement.to_sql_with_columns(&["u.id AS u_id".to_string()]).unwrap();
        assert_eq!(sql, "SELECT u.id AS u_id FROM users u");
        assert!(statement.selected_columns.is_empty());
    }
}
