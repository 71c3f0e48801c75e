//! Relational search-index row.

use serde::{Deserialize, Serialize};

/// Flattened subset of a film detail sufficient for list queries.
/// Primary key is `mid`; re-collection upserts, never duplicates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchInfo {
    pub mid: i64,
    pub name: String,
    pub sub_title: String,
    pub initial: String,
    pub cid: i64,
    pub pid: i64,
    pub c_name: String,
    pub update_stamp: i64,
    pub remarks: String,
    pub hits: i64,
}
