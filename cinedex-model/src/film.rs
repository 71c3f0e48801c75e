//! Film detail records as normalized from upstream payloads.

use serde::{Deserialize, Serialize};

/// One playback episode: label plus its stream URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayLink {
    pub episode: String,
    pub link: String,
}

/// A named playback track (one upstream line) with its ordered episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySource {
    pub name: String,
    pub link_list: Vec<PlayLink>,
}

/// Full film record decoded from an upstream page.
///
/// Transient unless materialized into the hot store; the authoritative
/// copy lives under `MovieDetail:Cid<cid>:Id<mid>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilmDetail {
    /// Upstream numeric id. Records with `mid <= 0` are rejected at decode.
    pub mid: i64,
    pub name: String,
    #[serde(default)]
    pub sub_title: String,
    #[serde(default)]
    pub initial: String,
    /// Leaf category id.
    pub cid: i64,
    /// Parent category id.
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub c_name: String,
    #[serde(default)]
    pub class_tag: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub actor: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub writer: String,
    #[serde(default)]
    pub blurb: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub year: i64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub db_score: f64,
    #[serde(default)]
    pub hits: i64,
    #[serde(default)]
    pub play_sources: Vec<PlaySource>,
    /// Upstream update time, unix seconds.
    #[serde(default)]
    pub update_stamp: i64,
}

impl FilmDetail {
    /// Decode-time acceptance gate: an id and a name or the record is junk.
    pub fn is_valid(&self) -> bool {
        self.mid > 0 && !self.name.is_empty()
    }

    /// Slim projection stored under `MovieBasicInfo:Cid<cid>:Id<mid>`.
    pub fn basic_info(&self) -> MovieBasicInfo {
        MovieBasicInfo {
            mid: self.mid,
            cid: self.cid,
            pid: self.pid,
            name: self.name.clone(),
            sub_title: self.sub_title.clone(),
            picture: self.picture.clone(),
            remarks: self.remarks.clone(),
            year: self.year,
            c_name: self.c_name.clone(),
        }
    }

    /// Flattened row for the relational search index.
    pub fn search_info(&self) -> crate::SearchInfo {
        crate::SearchInfo {
            mid: self.mid,
            name: self.name.clone(),
            sub_title: self.sub_title.clone(),
            initial: self.initial.clone(),
            cid: self.cid,
            pid: self.pid,
            c_name: self.c_name.clone(),
            update_stamp: self.update_stamp,
            remarks: self.remarks.clone(),
            hits: self.hits,
        }
    }
}

/// Category-browse projection of a film, cheap enough to list in bulk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovieBasicInfo {
    pub mid: i64,
    pub cid: i64,
    pub pid: i64,
    pub name: String,
    #[serde(default)]
    pub sub_title: String,
    #[serde(default)]
    pub picture: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default)]
    pub year: i64,
    #[serde(default)]
    pub c_name: String,
}
