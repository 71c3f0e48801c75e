//! In-memory ports and a scripted fetcher for engine tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cinedex_core::error::Result;
use cinedex_core::fetch::Fetch;
use cinedex_core::store::{
    FailureStore, FilmCache, SearchStash, SearchStore, SourceRegistry, VodQuery,
};
use cinedex_core::supervisor::TaskSupervisor;
use cinedex_model::{
    CategoryTree, CollectType, FailureRecord, FilmDetail, FilmSource, MovieBasicInfo, PlayLink,
    PlaySource, ResultModel, SearchInfo, SourceGrade,
};
use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Source registry

#[derive(Default)]
pub struct MemorySourceRegistry {
    sources: Mutex<Vec<FilmSource>>,
}

impl MemorySourceRegistry {
    pub fn with(sources: Vec<FilmSource>) -> Self {
        Self {
            sources: Mutex::new(sources),
        }
    }
}

#[async_trait]
impl SourceRegistry for MemorySourceRegistry {
    async fn list(&self) -> Result<Vec<FilmSource>> {
        Ok(self.sources.lock().clone())
    }

    async fn save(&self, source: &FilmSource) -> Result<()> {
        let mut sources = self.sources.lock();
        match sources.iter_mut().find(|s| s.id == source.id) {
            Some(existing) => *existing = source.clone(),
            None => sources.push(source.clone()),
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut sources = self.sources.lock();
        let before = sources.len();
        sources.retain(|s| s.id != id);
        Ok(sources.len() != before)
    }
}

// ---------------------------------------------------------------------------
// Hot store

#[derive(Default)]
pub struct CacheState {
    pub category: Option<CategoryTree>,
    pub details: HashMap<(i64, i64), FilmDetail>,
    pub basics: HashMap<(i64, i64), MovieBasicInfo>,
    /// cid -> (mid, update_stamp); one entry per mid, zadd semantics.
    pub movie_lists: HashMap<i64, Vec<(i64, i64)>>,
    pub multi: HashMap<i64, HashMap<String, Vec<PlayLink>>>,
    pub stash: Vec<SearchStash>,
    pub pictures: Vec<(i64, String)>,
    pub titles: HashMap<i64, HashSet<String>>,
    pub tags: HashMap<(i64, String), HashSet<i64>>,
    pub index_invalidations: usize,
}

#[derive(Default)]
pub struct MemoryFilmCache {
    pub state: Mutex<CacheState>,
}

#[async_trait]
impl FilmCache for MemoryFilmCache {
    async fn category_tree(&self) -> Result<Option<CategoryTree>> {
        Ok(self.state.lock().category.clone())
    }

    async fn put_category_tree(&self, tree: &CategoryTree) -> Result<()> {
        self.state.lock().category = Some(tree.clone());
        Ok(())
    }

    async fn put_detail(&self, detail: &FilmDetail) -> Result<()> {
        self.state
            .lock()
            .details
            .insert((detail.cid, detail.mid), detail.clone());
        Ok(())
    }

    async fn detail(&self, cid: i64, mid: i64) -> Result<Option<FilmDetail>> {
        Ok(self.state.lock().details.get(&(cid, mid)).cloned())
    }

    async fn put_basic_info(&self, info: &MovieBasicInfo) -> Result<()> {
        self.state
            .lock()
            .basics
            .insert((info.cid, info.mid), info.clone());
        Ok(())
    }

    async fn push_movie_list(&self, cid: i64, mid: i64, update_stamp: i64) -> Result<()> {
        let mut state = self.state.lock();
        let list = state.movie_lists.entry(cid).or_default();
        list.retain(|(m, _)| *m != mid);
        list.push((mid, update_stamp));
        Ok(())
    }

    async fn merge_play_sources(
        &self,
        mid: i64,
        source_name: &str,
        links: &[PlayLink],
    ) -> Result<()> {
        self.state
            .lock()
            .multi
            .entry(mid)
            .or_default()
            .insert(source_name.to_string(), links.to_vec());
        Ok(())
    }

    async fn play_sources(&self, mid: i64) -> Result<Vec<PlaySource>> {
        let state = self.state.lock();
        let mut sources: Vec<PlaySource> = state
            .multi
            .get(&mid)
            .map(|tracks| {
                tracks
                    .iter()
                    .map(|(name, links)| PlaySource {
                        name: name.clone(),
                        link_list: links.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }

    async fn enqueue_picture(&self, mid: i64, url: &str) -> Result<()> {
        self.state.lock().pictures.push((mid, url.to_string()));
        Ok(())
    }

    async fn stash_search(&self, entry: &SearchStash) -> Result<()> {
        let mut state = self.state.lock();
        state.stash.retain(|e| e.info.mid != entry.info.mid);
        state.stash.push(entry.clone());
        Ok(())
    }

    async fn drain_search_stash(&self, max: usize) -> Result<Vec<SearchStash>> {
        let mut state = self.state.lock();
        let take = max.min(state.stash.len());
        Ok(state.stash.drain(..take).collect())
    }

    async fn index_search_filters(&self, entry: &SearchStash) -> Result<()> {
        let mut state = self.state.lock();
        state
            .titles
            .entry(entry.info.pid)
            .or_default()
            .insert(entry.info.name.clone());
        for tag in entry.class_tag.split(',') {
            let tag = tag.trim();
            if tag.is_empty() {
                continue;
            }
            state
                .tags
                .entry((entry.info.pid, tag.to_string()))
                .or_default()
                .insert(entry.info.mid);
        }
        Ok(())
    }

    async fn delete_search_stash(&self) -> Result<()> {
        self.state.lock().stash.clear();
        Ok(())
    }

    async fn invalidate_index_cache(&self) -> Result<()> {
        self.state.lock().index_invalidations += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Search index

#[derive(Default)]
pub struct MemorySearchStore {
    pub rows: Mutex<HashMap<i64, SearchInfo>>,
    pub truncations: AtomicUsize,
}

#[async_trait]
impl SearchStore for MemorySearchStore {
    async fn upsert(&self, rows: &[SearchInfo]) -> Result<()> {
        let mut stored = self.rows.lock();
        for row in rows {
            stored.insert(row.mid, row.clone());
        }
        Ok(())
    }

    async fn truncate(&self) -> Result<()> {
        self.truncations.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().clear();
        Ok(())
    }

    async fn query(&self, q: &VodQuery) -> Result<(i64, Vec<SearchInfo>)> {
        let stamp_floor = Utc::now().timestamp() - q.hours * 3600;
        let mut matches: Vec<SearchInfo> = self
            .rows
            .lock()
            .values()
            .filter(|r| q.type_id <= 0 || r.cid == q.type_id || r.pid == q.type_id)
            .filter(|r| {
                q.keyword.is_empty()
                    || r.name.contains(&q.keyword)
                    || r.sub_title.contains(&q.keyword)
            })
            .filter(|r| q.hours <= 0 || r.update_stamp >= stamp_floor)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.update_stamp.cmp(&a.update_stamp));
        let total = matches.len() as i64;
        let page = q.page.max(1) as usize;
        let size = q.page_size.max(1) as usize;
        let rows = matches
            .into_iter()
            .skip((page - 1) * size)
            .take(size)
            .collect();
        Ok((total, rows))
    }

    async fn by_mid(&self, mid: i64) -> Result<Option<SearchInfo>> {
        Ok(self.rows.lock().get(&mid).cloned())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().len() as i64)
    }
}

// ---------------------------------------------------------------------------
// Failure log

#[derive(Default)]
pub struct MemoryFailureStore {
    pub records: Mutex<Vec<FailureRecord>>,
    next_id: AtomicI64,
}

impl MemoryFailureStore {
    pub fn preload(&self, mut record: FailureRecord) {
        record.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().push(record);
    }

    pub fn statuses(&self) -> Vec<(i64, i32)> {
        self.records.lock().iter().map(|r| (r.id, r.status)).collect()
    }
}

#[async_trait]
impl FailureStore for MemoryFailureStore {
    async fn append(&self, record: &FailureRecord) -> Result<()> {
        let mut stored = record.clone();
        stored.id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.records.lock().push(stored);
        Ok(())
    }

    async fn pending(&self) -> Result<Vec<FailureRecord>> {
        let mut pending: Vec<FailureRecord> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(pending)
    }

    async fn mark_retried(&self, id: i64) -> Result<()> {
        for record in self.records.lock().iter_mut() {
            if record.id == id {
                record.status = 0;
            }
        }
        Ok(())
    }

    async fn mark_class_retried(
        &self,
        collect_type: CollectType,
        since: DateTime<Utc>,
    ) -> Result<()> {
        for record in self.records.lock().iter_mut() {
            if record.collect_type == collect_type
                && record.created_at >= since
                && record.status == 1
            {
                record.status = 0;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted fetcher

pub type Responder = dyn Fn(&str, &HashMap<String, String>) -> Vec<u8> + Send + Sync;

pub struct ScriptedFetcher {
    respond: Box<Responder>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<HashMap<String, String>>>,
    inflight: AtomicUsize,
    pub max_inflight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(
        respond: impl Fn(&str, &HashMap<String, String>) -> Vec<u8> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: None,
            calls: Mutex::new(Vec::new()),
            inflight: AtomicUsize::new(0),
            max_inflight: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_with(&self, key: &str, value: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|params| params.get(key).is_some_and(|v| v == value))
            .count()
    }
}

#[async_trait]
impl Fetch for ScriptedFetcher {
    async fn get(
        &self,
        uri: &str,
        params: &[(&str, String)],
        _timeout: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let map: HashMap<String, String> = params
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.calls.lock().push(map.clone());

        let current = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_inflight.fetch_max(current, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.inflight.fetch_sub(1, Ordering::SeqCst);

        Ok((self.respond)(uri, &map))
    }
}

// ---------------------------------------------------------------------------
// Fixtures

pub const BASE_STAMP: i64 = 1_700_000_000;

pub fn master_source(id: &str) -> FilmSource {
    FilmSource {
        id: id.to_string(),
        name: format!("{id} upstream"),
        uri: format!("https://{id}.upstream.test/api.php/provide/vod/"),
        state: true,
        grade: SourceGrade::Master,
        collect_type: CollectType::Video,
        result_model: ResultModel::Json,
        interval_ms: 0,
        sync_pictures: false,
    }
}

pub fn slave_source(id: &str) -> FilmSource {
    FilmSource {
        grade: SourceGrade::Slave,
        ..master_source(id)
    }
}

pub fn json_probe(pagecount: i64) -> Vec<u8> {
    format!(
        r#"{{"code":1,"msg":"ok","page":1,"pagecount":{pagecount},"limit":"20","total":0,
            "list":[],
            "class":[
                {{"type_id":1,"type_pid":0,"type_name":"Movies"}},
                {{"type_id":6,"type_pid":1,"type_name":"Action"}}
            ]}}"#
    )
    .into_bytes()
}

pub fn json_film_item(mid: i64, play_from: &str, play_url: &str) -> String {
    format!(
        r#"{{"vod_id":{mid},"type_id":6,"type_id_1":1,"type_name":"Action",
            "vod_name":"Film {mid}","vod_sub":"F{mid}","vod_letter":"F",
            "vod_class":"Action","vod_pic":"https://img.test/{mid}.jpg",
            "vod_remarks":"HD","vod_time_add":{stamp},
            "vod_play_from":"{play_from}","vod_play_url":"{play_url}"}}"#,
        stamp = BASE_STAMP + mid,
    )
}

/// A `videolist` page holding `films_per_page` films with mids derived
/// from the page number.
pub fn json_page(page: i64, films_per_page: usize) -> Vec<u8> {
    let items: Vec<String> = (0..films_per_page)
        .map(|i| {
            let mid = page * 100 + i as i64;
            json_film_item(
                mid,
                "hdm3u8",
                &format!("EP1$https://cdn.test/{mid}/1.m3u8"),
            )
        })
        .collect();
    format!(
        r#"{{"code":1,"msg":"ok","page":{page},"pagecount":0,"list":[{}]}}"#,
        items.join(",")
    )
    .into_bytes()
}

pub fn json_empty_page() -> Vec<u8> {
    br#"{"code":1,"msg":"ok","list":[]}"#.to_vec()
}

/// Standard site: `pagecount` pages of `films_per_page` films each.
pub fn standard_responder(
    pagecount: i64,
    films_per_page: usize,
) -> impl Fn(&str, &HashMap<String, String>) -> Vec<u8> + Send + Sync + 'static {
    move |_uri, params| match params.get("ac").map(String::as_str) {
        Some("list") => json_probe(pagecount),
        _ => {
            let page: i64 = params
                .get("pg")
                .and_then(|p| p.parse().ok())
                .unwrap_or(1);
            json_page(page, films_per_page)
        }
    }
}

// ---------------------------------------------------------------------------
// Engine harness

pub struct Harness {
    pub supervisor: TaskSupervisor,
    pub sources: Arc<MemorySourceRegistry>,
    pub cache: Arc<MemoryFilmCache>,
    pub search: Arc<MemorySearchStore>,
    pub failures: Arc<MemoryFailureStore>,
    pub fetcher: Arc<ScriptedFetcher>,
}

pub fn harness(sources: Vec<FilmSource>, fetcher: ScriptedFetcher) -> Harness {
    let sources = Arc::new(MemorySourceRegistry::with(sources));
    let cache = Arc::new(MemoryFilmCache::default());
    let search = Arc::new(MemorySearchStore::default());
    let failures = Arc::new(MemoryFailureStore::default());
    let fetcher = Arc::new(fetcher);
    let supervisor = TaskSupervisor::new(
        sources.clone(),
        cache.clone(),
        search.clone(),
        failures.clone(),
        fetcher.clone(),
    );
    Harness {
        supervisor,
        sources,
        cache,
        search,
        failures,
        fetcher,
    }
}

/// Poll `cond` until it holds or the timeout elapses.
pub async fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
