//! Redis-backed hot store and source registry.

use std::collections::HashMap;

use async_trait::async_trait;
use cinedex_model::{
    CategoryTree, FilmDetail, FilmSource, MovieBasicInfo, PlayLink, PlaySource,
};
use redis::{AsyncCommands, aio::ConnectionManager};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use super::{FilmCache, SearchStash, SourceRegistry};
use crate::error::{EngineError, Result};
use crate::keys::{
    CATEGORY_TREE_KEY, FILM_EXPIRED_SECS, FILM_SOURCE_LIST_KEY, HotKeys, INDEX_CACHE_KEY,
    MANAGE_CONFIG_EXPIRED_SECS, SEARCH_INFO_TEMP_KEY, VIRTUAL_PICTURE_KEY,
};

/// Shared connection handle; cheap to clone, reconnects internally.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    info!("connecting to redis at {}", redis_url);
    let client = redis::Client::open(redis_url)
        .map_err(|e| EngineError::Storage(format!("failed to create redis client: {e}")))?;
    let conn = ConnectionManager::new(client)
        .await
        .map_err(|e| EngineError::Storage(format!("failed to connect to redis: {e}")))?;
    Ok(conn)
}

/// Serialize a struct into per-field hash pairs; each value is its own
/// JSON encoding so nested playlists survive the round trip.
fn to_field_pairs<T: Serialize>(value: &T) -> Result<Vec<(String, String)>> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => {
            Ok(map.into_iter().map(|(k, v)| (k, v.to_string())).collect())
        }
        other => Err(EngineError::Storage(format!(
            "expected a map-shaped value, got {other}"
        ))),
    }
}

fn from_field_map<T: DeserializeOwned>(fields: HashMap<String, String>) -> Result<T> {
    let mut object = serde_json::Map::with_capacity(fields.len());
    for (key, raw) in fields {
        object.insert(key, serde_json::from_str(&raw)?);
    }
    Ok(serde_json::from_value(serde_json::Value::Object(object))?)
}

#[derive(Clone)]
pub struct RedisFilmCache {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisFilmCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisFilmCache").finish_non_exhaustive()
    }
}

impl RedisFilmCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn put_hash<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let pairs = to_field_pairs(value)?;
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, &pairs).await?;
        let _: () = conn.expire(key, FILM_EXPIRED_SECS).await?;
        Ok(())
    }

    async fn get_hash<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(from_field_map(fields)?))
    }
}

#[async_trait]
impl FilmCache for RedisFilmCache {
    async fn category_tree(&self) -> Result<Option<CategoryTree>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(CATEGORY_TREE_KEY).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put_category_tree(&self, tree: &CategoryTree) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(tree)?;
        let _: () = conn
            .set_ex(CATEGORY_TREE_KEY, json, FILM_EXPIRED_SECS as u64)
            .await?;
        Ok(())
    }

    async fn put_detail(&self, detail: &FilmDetail) -> Result<()> {
        self.put_hash(&HotKeys::movie_detail(detail.cid, detail.mid), detail)
            .await
    }

    async fn detail(&self, cid: i64, mid: i64) -> Result<Option<FilmDetail>> {
        self.get_hash(&HotKeys::movie_detail(cid, mid)).await
    }

    async fn put_basic_info(&self, info: &MovieBasicInfo) -> Result<()> {
        self.put_hash(&HotKeys::movie_basic_info(info.cid, info.mid), info)
            .await
    }

    async fn push_movie_list(&self, cid: i64, mid: i64, update_stamp: i64) -> Result<()> {
        let key = HotKeys::movie_list(cid);
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&key, mid, update_stamp).await?;
        let _: () = conn.expire(&key, FILM_EXPIRED_SECS).await?;
        Ok(())
    }

    async fn merge_play_sources(
        &self,
        mid: i64,
        source_name: &str,
        links: &[PlayLink],
    ) -> Result<()> {
        let key = HotKeys::multiple_source(mid);
        let serialized = serde_json::to_string(links)?;
        let mut conn = self.conn.clone();
        let _: () = conn.hset(&key, source_name, serialized).await?;
        let _: () = conn.expire(&key, FILM_EXPIRED_SECS).await?;
        Ok(())
    }

    async fn play_sources(&self, mid: i64) -> Result<Vec<PlaySource>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> =
            conn.hgetall(HotKeys::multiple_source(mid)).await?;
        let mut sources = Vec::with_capacity(fields.len());
        for (name, raw) in fields {
            sources.push(PlaySource {
                name,
                link_list: serde_json::from_str(&raw)?,
            });
        }
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn enqueue_picture(&self, mid: i64, url: &str) -> Result<()> {
        let member = serde_json::json!({ "mid": mid, "link": url }).to_string();
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(VIRTUAL_PICTURE_KEY, member, mid).await?;
        Ok(())
    }

    async fn stash_search(&self, entry: &SearchStash) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(entry)?;
        let _: () = conn.sadd(SEARCH_INFO_TEMP_KEY, json).await?;
        Ok(())
    }

    async fn drain_search_stash(&self, max: usize) -> Result<Vec<SearchStash>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = redis::cmd("SPOP")
            .arg(SEARCH_INFO_TEMP_KEY)
            .arg(max)
            .query_async(&mut conn)
            .await?;
        let mut entries = Vec::with_capacity(raw.len());
        for json in raw {
            entries.push(serde_json::from_str(&json)?);
        }
        Ok(entries)
    }

    async fn index_search_filters(&self, entry: &SearchStash) -> Result<()> {
        let mut conn = self.conn.clone();
        let title_key = HotKeys::search_title(entry.info.pid);
        let _: () = conn.sadd(&title_key, &entry.info.name).await?;
        let _: () = conn.expire(&title_key, FILM_EXPIRED_SECS).await?;
        for tag in entry.class_tag.split(',') {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            let tag_key = HotKeys::search_tag(entry.info.pid, tag);
            let _: () = conn.sadd(&tag_key, entry.info.mid).await?;
            let _: () = conn.expire(&tag_key, FILM_EXPIRED_SECS).await?;
        }
        Ok(())
    }

    async fn delete_search_stash(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(SEARCH_INFO_TEMP_KEY).await?;
        Ok(())
    }

    async fn invalidate_index_cache(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(INDEX_CACHE_KEY).await?;
        Ok(())
    }
}

/// Source registry persisted as one JSON list under a fixed key, the
/// layout the admin front-end expects.
#[derive(Clone)]
pub struct RedisSourceRegistry {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisSourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSourceRegistry").finish_non_exhaustive()
    }
}

impl RedisSourceRegistry {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn write(&self, sources: &[FilmSource]) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(sources)?;
        let _: () = conn
            .set_ex(
                FILM_SOURCE_LIST_KEY,
                json,
                MANAGE_CONFIG_EXPIRED_SECS as u64,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SourceRegistry for RedisSourceRegistry {
    async fn list(&self) -> Result<Vec<FilmSource>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(FILM_SOURCE_LIST_KEY).await?;
        match raw {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, source: &FilmSource) -> Result<()> {
        let mut sources = self.list().await?;
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => sources.push(source.clone()),
        }
        self.write(&sources).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut sources = self.list().await?;
        let before = sources.len();
        sources.retain(|s| s.id != id);
        if sources.len() == before {
            return Ok(false);
        }
        self.write(&sources).await?;
        Ok(true)
    }
}
