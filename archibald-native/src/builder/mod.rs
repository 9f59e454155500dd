//! Query builder module

pub mod common;
pub mod native;
pub mod select;

// Re-export types from submodules
pub use common::{Expression, IntoColumns, JoinType, QueryBuilder, SortDirection, WhereConnector};
pub use native::NativeQueryBuilder;
pub use select::SelectStatement;
