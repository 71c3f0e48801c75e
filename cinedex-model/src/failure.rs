//! Durable per-page collection failure records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CollectType;

/// Retry state of a failure record. Stored as a tinyint column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i32)]
pub enum RetryStatus {
    Retried = 0,
    Pending = 1,
}

impl RetryStatus {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(v: i32) -> Self {
        if v == 1 { Self::Pending } else { Self::Retried }
    }
}

/// One page that failed to collect, with enough context to replay it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FailureRecord {
    #[serde(default)]
    pub id: i64,
    pub origin_id: String,
    pub origin_name: String,
    pub uri: String,
    pub collect_type: CollectType,
    pub page_number: i64,
    /// The collection window (hours) the failed crawl ran with; negative
    /// means a full dump.
    pub hour: i64,
    pub cause: String,
    /// 1 = pending, 0 = retried.
    pub status: i32,
    pub created_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn is_pending(&self) -> bool {
        RetryStatus::from_i32(self.status) == RetryStatus::Pending
    }
}
