//! Storage ports and their Redis/MySQL implementations.
//!
//! The engine talks to storage exclusively through these traits: the hot
//! store ([`FilmCache`]), the durable source registry ([`SourceRegistry`]),
//! the relational search index ([`SearchStore`]) and the failure log
//! ([`FailureStore`]). Tests substitute in-memory implementations.

pub mod mysql;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinedex_model::{
    CategoryTree, CollectType, FailureRecord, FilmDetail, FilmSource, MovieBasicInfo, PlayLink,
    PlaySource, SearchInfo, SourceGrade,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One stash entry queued for the post-collection search resync. Carries
/// the class tag alongside the flattened row so the filter sets can be
/// rebuilt without another detail read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchStash {
    pub info: SearchInfo,
    #[serde(default)]
    pub class_tag: String,
}

/// Durable list of configured upstream sites.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    async fn list(&self) -> Result<Vec<FilmSource>>;

    async fn find(&self, id: &str) -> Result<Option<FilmSource>> {
        Ok(self.list().await?.into_iter().find(|s| s.id == id))
    }

    async fn list_enabled(&self) -> Result<Vec<FilmSource>> {
        Ok(self.list().await?.into_iter().filter(|s| s.state).collect())
    }

    /// First enabled master, the site single-film collection runs against.
    async fn first_enabled_master(&self) -> Result<Option<FilmSource>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|s| s.state && s.grade == SourceGrade::Master))
    }

    /// Insert or replace by id.
    async fn save(&self, source: &FilmSource) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Hot key/value tier: category tree, per-film records, category lists,
/// search scratch, pending pictures, and the rendered-index cache.
#[async_trait]
pub trait FilmCache: Send + Sync {
    async fn category_tree(&self) -> Result<Option<CategoryTree>>;
    async fn put_category_tree(&self, tree: &CategoryTree) -> Result<()>;

    async fn put_detail(&self, detail: &FilmDetail) -> Result<()>;
    async fn detail(&self, cid: i64, mid: i64) -> Result<Option<FilmDetail>>;
    async fn put_basic_info(&self, info: &MovieBasicInfo) -> Result<()>;

    /// Record a film in its category's recency-ordered browse list.
    async fn push_movie_list(&self, cid: i64, mid: i64, update_stamp: i64) -> Result<()>;

    /// Merge one slave playback track into a film's multi-source hash.
    async fn merge_play_sources(
        &self,
        mid: i64,
        source_name: &str,
        links: &[PlayLink],
    ) -> Result<()>;
    /// All slave tracks recorded for a film.
    async fn play_sources(&self, mid: i64) -> Result<Vec<PlaySource>>;

    /// Queue a poster URL for the external downloader.
    async fn enqueue_picture(&self, mid: i64, url: &str) -> Result<()>;

    async fn stash_search(&self, entry: &SearchStash) -> Result<()>;
    /// Pop up to `max` stash entries; empty means drained.
    async fn drain_search_stash(&self, max: usize) -> Result<Vec<SearchStash>>;
    /// Add one entry to the per-parent-category title and tag filter sets.
    async fn index_search_filters(&self, entry: &SearchStash) -> Result<()>;
    async fn delete_search_stash(&self) -> Result<()>;

    async fn invalidate_index_cache(&self) -> Result<()>;
}

/// List query over the search index, MacCMS-shaped.
#[derive(Debug, Clone, Default)]
pub struct VodQuery {
    /// Category filter; matches leaf or parent id. Zero disables.
    pub type_id: i64,
    /// 1-based page.
    pub page: i64,
    pub page_size: i64,
    /// Substring filter over name and subtitle. Empty disables.
    pub keyword: String,
    /// Recency window in hours. Zero or negative disables.
    pub hours: i64,
}

/// Relational tier powering list queries.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Insert-or-update by `mid`.
    async fn upsert(&self, rows: &[SearchInfo]) -> Result<()>;
    async fn truncate(&self) -> Result<()>;
    /// Total matching count plus the requested page, newest first.
    async fn query(&self, q: &VodQuery) -> Result<(i64, Vec<SearchInfo>)>;
    async fn by_mid(&self, mid: i64) -> Result<Option<SearchInfo>>;
    async fn count(&self) -> Result<i64>;
}

/// Durable per-page failure log consumed by the recovery driver.
#[async_trait]
pub trait FailureStore: Send + Sync {
    async fn append(&self, record: &FailureRecord) -> Result<()>;
    /// Pending records, oldest first.
    async fn pending(&self) -> Result<Vec<FailureRecord>>;
    async fn mark_retried(&self, id: i64) -> Result<()>;
    /// Mark a record and every later pending record of the same collect
    /// type retried; a fleet-wide catch-up subsumes them all.
    async fn mark_class_retried(&self, collect_type: CollectType, since: DateTime<Utc>)
    -> Result<()>;
}
