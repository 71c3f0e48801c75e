//! Upstream catalog site descriptors.

use serde::{Deserialize, Serialize};

/// Authority of an upstream site over collected film records.
///
/// A master site owns every detail field of a film; slave sites only
/// contribute extra playback tracks keyed by the same upstream id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceGrade {
    Master,
    Slave,
}

/// What kind of content a site is collected for. Only `Video` has a
/// collection pipeline; the remaining kinds exist so stored registries
/// from other deployments round-trip without loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CollectType {
    Video,
    Article,
    Actor,
    Role,
    Website,
}

/// Wire format the upstream endpoint speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultModel {
    Json,
    Xml,
}

/// A configured upstream MacCMS-style catalog endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilmSource {
    /// Stable opaque identifier, also the single-flight task key.
    pub id: String,
    pub name: String,
    /// Base URL of the endpoint; collection params are merged into its query.
    pub uri: String,
    /// Disabled sources never collect.
    pub state: bool,
    pub grade: SourceGrade,
    pub collect_type: CollectType,
    pub result_model: ResultModel,
    /// Inter-request delay in milliseconds. Above 500 ms the site is
    /// crawled strictly serially with this pause between pages.
    #[serde(default)]
    pub interval_ms: u64,
    /// Master-only: queue poster URLs for the external image downloader.
    #[serde(default)]
    pub sync_pictures: bool,
}

impl FilmSource {
    pub fn is_master(&self) -> bool {
        self.grade == SourceGrade::Master
    }
}
