//! Query execution and connection pool interface

use crate::hydration::{ObjectHydrator, Row};
use crate::query::{NativeQuery, PlaceholderStyle};
use crate::{Error, Result, Value};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::Future;
use tracing::debug;

/// Trait for database connection pools
pub trait ConnectionPool: Send + Sync + Clone {
    /// Positional placeholder syntax the driver understands
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Execute a query and return every row keyed by column name
    fn fetch_rows(&self, sql: &str, params: &[Value]) -> impl Future<Output = Result<Vec<Row>>> + Send;
}

impl NativeQuery {
    /// Execute and hydrate into nested JSON objects
    pub async fn get_array_result<P>(&self, pool: &P) -> Result<Vec<JsonValue>>
    where
        P: ConnectionPool,
    {
        let (sql, params) = self.to_positional(pool.placeholder_style())?;
        debug!(sql = %sql, parameters = params.len(), "executing native query");

        let rows = pool.fetch_rows(&sql, &params).await?;
        ObjectHydrator::new(self.result_set_mapping(), self.metadata()).hydrate_all(&rows)
    }

    /// Execute and deserialize every hydrated result
    pub async fn get_result<T, P>(&self, pool: &P) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        P: ConnectionPool,
    {
        self.get_array_result(pool)
            .await?
            .into_iter()
            .map(|result| serde_json::from_value(result).map_err(Error::from))
            .collect()
    }

    /// Execute expecting exactly one result
    pub async fn get_single_result<T, P>(&self, pool: &P) -> Result<T>
    where
        T: DeserializeOwned,
        P: ConnectionPool,
    {
        match self.get_one_or_null_result(pool).await? {
            Some(result) => Ok(result),
            None => Err(Error::NoResult),
        }
    }

    /// Execute expecting at most one result
    pub async fn get_one_or_null_result<T, P>(&self, pool: &P) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: ConnectionPool,
    {
        let mut results = self.get_result(pool).await?;
        match results.len() {
            0 => Ok(None),
            1 => Ok(results.pop()),
            count => Err(Error::NonUniqueResult { count }),
        }
    }
}

#[cfg(any(feature = "postgres", feature = "sqlite"))]
fn json<T: Into<JsonValue>>(value: Option<T>) -> JsonValue {
    value.map(Into::into).unwrap_or(JsonValue::Null)
}

#[cfg(feature = "postgres")]
pub mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use sqlx::postgres::{PgArguments, PgRow};
    use sqlx::{Column, PgPool, Row as _, TypeInfo};

    /// PostgreSQL connection pool wrapper
    #[derive(Clone)]
    pub struct PostgresPool {
        inner: PgPool,
    }

    impl PostgresPool {
        /// Create a new PostgreSQL pool from a connection string
        pub async fn new(database_url: &str) -> Result<Self> {
            let pool = PgPool::connect(database_url).await?;
            Ok(Self { inner: pool })
        }

        /// Create from an existing PgPool
        pub fn from_pool(pool: PgPool) -> Self {
            Self { inner: pool }
        }
    }

    impl ConnectionPool for PostgresPool {
        fn placeholder_style(&self) -> PlaceholderStyle {
            PlaceholderStyle::Dollar
        }

        async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            let query = bind_values_to_query(sqlx::query(sql), params);
            let rows = query.fetch_all(&self.inner).await?;
            rows.iter().map(row_to_json).collect()
        }
    }

    /// Bind values to a SQLx query
    fn bind_values_to_query<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        params: &'q [Value],
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.as_str()),
                Value::Bytes(b) => query.bind(b.as_slice()),
                Value::Json(j) => query.bind(j),
                // Arrays without an array type hint travel as JSON
                Value::Array(_) => query.bind(param.to_json()),
                Value::Date(d) => query.bind(*d),
                Value::DateTime(dt) => query.bind(*dt),
                Value::DateTimeUtc(dt) => query.bind(*dt),
                #[cfg(feature = "uuid-support")]
                Value::Uuid(u) => query.bind(*u),
                #[cfg(feature = "decimal-support")]
                Value::Decimal(d) => query.bind(*d),
            };
        }
        query
    }

    fn row_to_json(row: &PgRow) -> Result<Row> {
        let mut object = Row::new();

        for column in row.columns() {
            let index = column.ordinal();
            let value = match column.type_info().name() {
                "BOOL" => json(row.try_get::<Option<bool>, _>(index)?),
                "INT2" => json(row.try_get::<Option<i16>, _>(index)?),
                "INT4" => json(row.try_get::<Option<i32>, _>(index)?),
                "INT8" => json(row.try_get::<Option<i64>, _>(index)?),
                "FLOAT4" => json(row.try_get::<Option<f32>, _>(index)?),
                "FLOAT8" => json(row.try_get::<Option<f64>, _>(index)?),
                "JSON" | "JSONB" => json(row.try_get::<Option<JsonValue>, _>(index)?),
                "BYTEA" => json(row.try_get::<Option<Vec<u8>>, _>(index)?),
                "DATE" => json(row.try_get::<Option<NaiveDate>, _>(index)?.map(|d| d.to_string())),
                "TIMESTAMP" => json(row.try_get::<Option<NaiveDateTime>, _>(index)?.map(|dt| dt.to_string())),
                "TIMESTAMPTZ" => json(row.try_get::<Option<DateTime<Utc>>, _>(index)?.map(|dt| dt.to_rfc3339())),
                #[cfg(feature = "uuid-support")]
                "UUID" => json(row.try_get::<Option<uuid::Uuid>, _>(index)?.map(|u| u.to_string())),
                #[cfg(feature = "decimal-support")]
                "NUMERIC" => json(row.try_get::<Option<rust_decimal::Decimal>, _>(index)?.map(|d| d.to_string())),
                _ => json(row.try_get::<Option<String>, _>(index)?),
            };
            object.insert(column.name().to_string(), value);
        }

        Ok(object)
    }
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    use super::*;
    use sqlx::sqlite::{SqliteArguments, SqliteRow};
    use sqlx::{Column, Row as _, SqlitePool, TypeInfo, ValueRef};

    /// SQLite connection pool wrapper
    #[derive(Clone)]
    pub struct SqlitePoolWrapper {
        inner: SqlitePool,
    }

    impl SqlitePoolWrapper {
        /// Create a new SQLite pool from a connection string
        pub async fn new(database_url: &str) -> Result<Self> {
            let pool = SqlitePool::connect(database_url).await?;
            Ok(Self { inner: pool })
        }

        /// Create from an existing SqlitePool
        pub fn from_pool(pool: SqlitePool) -> Self {
            Self { inner: pool }
        }
    }

    impl ConnectionPool for SqlitePoolWrapper {
        fn placeholder_style(&self) -> PlaceholderStyle {
            PlaceholderStyle::QuestionMark
        }

        async fn fetch_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
            let query = bind_values_to_query(sqlx::query(sql), params);
            let rows = query.fetch_all(&self.inner).await?;
            rows.iter().map(row_to_json).collect()
        }
    }

    fn bind_values_to_query<'q>(
        mut query: sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>,
        params: &'q [Value],
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.as_str()),
                Value::Bytes(b) => query.bind(b.as_slice()),
                Value::Json(j) => query.bind(j.to_string()),
                Value::Array(_) => query.bind(param.to_json().to_string()),
                Value::Date(d) => query.bind(*d),
                Value::DateTime(dt) => query.bind(*dt),
                Value::DateTimeUtc(dt) => query.bind(*dt),
                // SQLite has no native uuid or decimal storage
                #[cfg(feature = "uuid-support")]
                Value::Uuid(u) => query.bind(u.to_string()),
                #[cfg(feature = "decimal-support")]
                Value::Decimal(d) => query.bind(d.to_string()),
            };
        }
        query
    }

    fn row_to_json(row: &SqliteRow) -> Result<Row> {
        let mut object = Row::new();

        for column in row.columns() {
            let index = column.ordinal();
            let storage = {
                let raw = row.try_get_raw(index)?;
                if raw.is_null() {
                    None
                } else {
                    Some(raw.type_info().name().to_string())
                }
            };

            let value = match storage.as_deref() {
                None => JsonValue::Null,
                Some("INTEGER") => json(row.try_get::<Option<i64>, _>(index)?),
                Some("REAL") => json(row.try_get::<Option<f64>, _>(index)?),
                Some("BLOB") => json(row.try_get::<Option<Vec<u8>>, _>(index)?),
                Some(_) => json(row.try_get::<Option<String>, _>(index)?),
            };
            object.insert(column.name().to_string(), value);
        }

        Ok(object)
    }
}
