//! Per-site collection task supervision.
//!
//! One task per site at a time: a new request for a site cancels and
//! replaces whatever is running there without waiting for it to unwind.
//! Registry cleanup is guarded by the request id so a preempted task
//! drifting through its epilogue can never erase its successor's slot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use cinedex_model::{CategoryTree, CollectType, FailureRecord, FilmSource, RetryStatus};
use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::decode::Decoder;
use crate::error::{EngineError, Result};
use crate::fetch::Fetch;
use crate::keys::{MAX_WORKERS, SINGLE_THREAD_INTERVAL_MS};
use crate::materialize::Materializer;
use crate::store::{FailureStore, FilmCache, SearchStore, SourceRegistry};

struct TaskSlot {
    req_id: Uuid,
    cancel: CancellationToken,
}

/// How the pages of one crawl are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchMode {
    /// One page at a time with the site's delay between pages.
    PacedSerial,
    /// One page at a time, no delay; cheaper than a pool for small crawls.
    Serial,
    /// Fixed worker pool over a closed page queue.
    Concurrent,
}

fn dispatch_mode(interval_ms: u64, page_count: i64) -> DispatchMode {
    if interval_ms > SINGLE_THREAD_INTERVAL_MS {
        DispatchMode::PacedSerial
    } else if page_count <= (2 * MAX_WORKERS) as i64 {
        DispatchMode::Serial
    } else {
        DispatchMode::Concurrent
    }
}

/// Owns the active-task registry and runs the whole ingestion pipeline
/// for each crawl. Cheap to clone; every clone shares the registry.
#[derive(Clone)]
pub struct TaskSupervisor {
    sources: Arc<dyn SourceRegistry>,
    cache: Arc<dyn FilmCache>,
    failures: Arc<dyn FailureStore>,
    decoder: Arc<Decoder>,
    materializer: Arc<Materializer>,
    tasks: Arc<DashMap<String, TaskSlot>>,
}

impl std::fmt::Debug for TaskSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSupervisor")
            .field("active_tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl TaskSupervisor {
    pub fn new(
        sources: Arc<dyn SourceRegistry>,
        cache: Arc<dyn FilmCache>,
        search: Arc<dyn SearchStore>,
        failures: Arc<dyn FailureStore>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            sources,
            cache: cache.clone(),
            failures,
            decoder: Arc::new(Decoder::new(fetcher)),
            materializer: Arc::new(Materializer::new(cache, search)),
            tasks: Arc::new(DashMap::new()),
        }
    }

    /// Validate synchronously, then run the crawl in the background.
    /// `SourceNotFound`/`SourceDisabled`/`InvalidWindow` surface here;
    /// everything later is observable only through the failure log.
    pub async fn start_collect(&self, site_id: &str, h: i64) -> Result<()> {
        if h == 0 {
            return Err(EngineError::InvalidWindow(0));
        }
        self.resolve_source(site_id).await?;
        let this = self.clone();
        let site = site_id.to_string();
        tokio::spawn(async move {
            if let Err(e) = this.handle_collect(&site, h).await {
                error!(site = %site, error = %e, "collection task failed");
            }
        });
        Ok(())
    }

    /// Crawl `site_id` for content updated within the last `h` hours, or
    /// everything when `h` is negative. Runs to completion in the caller.
    pub async fn handle_collect(&self, site_id: &str, h: i64) -> Result<()> {
        if h == 0 {
            return Err(EngineError::InvalidWindow(0));
        }
        let source = self.resolve_source(site_id).await?;
        if source.collect_type != CollectType::Video {
            warn!(site = %site_id, kind = ?source.collect_type, "only video collection is implemented");
            return Ok(());
        }

        let req_id = Uuid::new_v4();
        let token = CancellationToken::new();
        if let Some(previous) = self.tasks.insert(
            site_id.to_string(),
            TaskSlot {
                req_id,
                cancel: token.clone(),
            },
        ) {
            debug!(site = %site_id, "preempting in-flight collection");
            previous.cancel.cancel();
        }

        let result = self.run_collect(&source, h, &token).await;

        // Only the slot's current owner may clear it; a preempted task
        // finishing late must leave its successor's registration alone.
        self.tasks
            .remove_if(site_id, |_, slot| slot.req_id == req_id);

        result
    }

    /// Fire-and-forget `handle_collect` for each site.
    pub fn batch_collect(&self, h: i64, site_ids: Vec<String>) {
        for site in site_ids {
            let this = self.clone();
            tokio::spawn(async move {
                if let Err(e) = this.handle_collect(&site, h).await {
                    error!(site = %site, error = %e, "collection task failed");
                }
            });
        }
    }

    /// `batch_collect` over every enabled source.
    pub async fn auto_collect(&self, h: i64) -> Result<()> {
        let enabled = self.sources.list_enabled().await?;
        if enabled.is_empty() {
            info!("auto collect skipped: no enabled sources");
            return Ok(());
        }
        info!(sites = enabled.len(), hours = h, "auto collect launched");
        self.batch_collect(h, enabled.into_iter().map(|s| s.id).collect());
        Ok(())
    }

    /// Collect specific upstream ids (comma-separated) from the first
    /// enabled master and resync the index for just those rows.
    pub async fn collect_single_film(&self, ids: &str) -> Result<()> {
        let source = self
            .sources
            .first_enabled_master()
            .await?
            .ok_or_else(|| EngineError::SourceNotFound("no enabled master source".into()))?;
        let details = self.decoder.film_details_by_ids(&source, ids).await?;
        if details.is_empty() {
            warn!(site = %source.id, ids, "single-film collection matched nothing");
            return Ok(());
        }
        info!(site = %source.id, films = details.len(), "single-film collection");
        self.materializer.save_page(&source, &details).await;
        self.materializer.sync_search_info(true).await?;
        self.cache.invalidate_index_cache().await?;
        Ok(())
    }

    /// Refresh the category tree from the first enabled master.
    pub async fn collect_category(&self) -> Result<()> {
        let source = self
            .sources
            .first_enabled_master()
            .await?
            .ok_or_else(|| EngineError::SourceNotFound("no enabled master source".into()))?;
        self.collect_category_for(&source).await
    }

    pub async fn stop_task(&self, site_id: &str) -> bool {
        match self.tasks.remove(site_id) {
            Some((_, slot)) => {
                slot.cancel.cancel();
                info!(site = %site_id, "collection task stopped");
                true
            }
            None => false,
        }
    }

    pub async fn stop_all_tasks(&self) -> usize {
        let mut stopped = 0;
        for entry in self.tasks.iter() {
            entry.value().cancel.cancel();
            stopped += 1;
        }
        self.tasks.clear();
        if stopped > 0 {
            info!(count = stopped, "stopped all collection tasks");
        }
        stopped
    }

    pub fn is_task_running(&self, site_id: &str) -> bool {
        self.tasks.contains_key(site_id)
    }

    pub fn active_tasks(&self) -> Vec<String> {
        self.tasks.iter().map(|e| e.key().clone()).collect()
    }

    async fn resolve_source(&self, site_id: &str) -> Result<FilmSource> {
        let source = self
            .sources
            .find(site_id)
            .await?
            .ok_or_else(|| EngineError::SourceNotFound(site_id.to_string()))?;
        if !source.state {
            return Err(EngineError::SourceDisabled(site_id.to_string()));
        }
        Ok(source)
    }

    async fn run_collect(
        &self,
        source: &FilmSource,
        h: i64,
        token: &CancellationToken,
    ) -> Result<()> {
        if source.is_master() {
            self.bootstrap_category(source).await;
        }

        let page_count = match self.decoder.page_count(source, h).await {
            Ok(count) => count,
            Err(first) => {
                warn!(site = %source.id, error = %first, "page probe failed, retrying once");
                self.decoder.page_count(source, h).await.map_err(|retry| {
                    EngineError::ProbeFailed(format!("{first}; retry: {retry}"))
                })?
            }
        };
        if page_count <= 0 {
            info!(site = %source.id, hours = h, "no new content in window");
            return Ok(());
        }

        let mode = dispatch_mode(source.interval_ms, page_count);
        info!(site = %source.id, pages = page_count, hours = h, ?mode, "collection started");
        match mode {
            DispatchMode::PacedSerial => {
                self.run_paced_serial(source, h, page_count, token).await;
            }
            DispatchMode::Serial => self.run_serial(source, h, page_count, token).await,
            DispatchMode::Concurrent => {
                self.run_concurrent(source, h, page_count, token).await;
            }
        }

        if token.is_cancelled() {
            info!(site = %source.id, "collection cancelled, skipping post-collection");
            return Ok(());
        }

        if source.is_master() {
            self.post_collect(source, h).await?;
        }
        info!(site = %source.id, "collection finished");
        Ok(())
    }

    /// Category bootstrap is best-effort: a crawl without a fresh tree is
    /// still worth having, so failures are logged and swallowed.
    async fn bootstrap_category(&self, source: &FilmSource) {
        match self.cache.category_tree().await {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = self.collect_category_for(source).await {
                    warn!(site = %source.id, error = %e, "category bootstrap failed");
                }
            }
            Err(e) => warn!(site = %source.id, error = %e, "category lookup failed"),
        }
    }

    async fn collect_category_for(&self, source: &FilmSource) -> Result<()> {
        let entries = self.decoder.category_entries(source).await?;
        if entries.is_empty() {
            return Err(EngineError::Decode(format!(
                "source {} returned no class entries",
                source.id
            )));
        }
        let tree = CategoryTree::from_entries(&entries);
        self.cache.put_category_tree(&tree).await?;
        info!(site = %source.id, categories = entries.len(), "category tree refreshed");
        Ok(())
    }

    async fn run_serial(
        &self,
        source: &FilmSource,
        h: i64,
        page_count: i64,
        token: &CancellationToken,
    ) {
        for page in 1..=page_count {
            if token.is_cancelled() {
                break;
            }
            self.collect_page(source, h, page).await;
        }
    }

    async fn run_paced_serial(
        &self,
        source: &FilmSource,
        h: i64,
        page_count: i64,
        token: &CancellationToken,
    ) {
        let pause = Duration::from_millis(source.interval_ms);
        for page in 1..=page_count {
            if token.is_cancelled() {
                break;
            }
            self.collect_page(source, h, page).await;
            if page < page_count {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }
    }

    /// Closed-queue fan-out: every page number is queued up front, the
    /// sender dropped, and a fixed worker set drains until the queue or
    /// the cancellation token ends the crawl. The join below is the
    /// completion barrier the post-collection phase relies on.
    async fn run_concurrent(
        &self,
        source: &FilmSource,
        h: i64,
        page_count: i64,
        token: &CancellationToken,
    ) {
        let workers = MAX_WORKERS.min(page_count as usize);
        let (queue_tx, queue_rx) = mpsc::channel::<i64>(page_count as usize);
        for page in 1..=page_count {
            // Capacity equals the page count, so this never blocks.
            let _ = queue_tx.send(page).await;
        }
        drop(queue_tx);
        let queue_rx = Arc::new(Mutex::new(queue_rx));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let this = self.clone();
            let source = source.clone();
            let token = token.clone();
            let queue = Arc::clone(&queue_rx);
            handles.push(tokio::spawn(async move {
                loop {
                    if token.is_cancelled() {
                        break;
                    }
                    let page = { queue.lock().await.recv().await };
                    match page {
                        Some(page) => this.collect_page(&source, h, page).await,
                        None => break,
                    }
                }
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Decode and materialize one page. Failures never abort the crawl;
    /// they land in the failure log for the recovery driver.
    pub async fn collect_page(&self, source: &FilmSource, h: i64, page: i64) {
        match self.decoder.film_details(source, h, page).await {
            Ok(details) if !details.is_empty() => {
                debug!(site = %source.id, page, films = details.len(), "page decoded");
                self.materializer.save_page(source, &details).await;
            }
            Ok(_) => {
                self.record_failure(source, h, page, "page decoded to an empty film list")
                    .await;
            }
            Err(e) => self.record_failure(source, h, page, &e.to_string()).await,
        }
    }

    async fn record_failure(&self, source: &FilmSource, h: i64, page: i64, cause: &str) {
        warn!(site = %source.id, page, cause, "page collection failed");
        let record = FailureRecord {
            id: 0,
            origin_id: source.id.clone(),
            origin_name: source.name.clone(),
            uri: source.uri.clone(),
            collect_type: source.collect_type,
            page_number: page,
            hour: h,
            cause: cause.to_string(),
            status: RetryStatus::Pending.as_i32(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.failures.append(&record).await {
            error!(site = %source.id, page, error = %e, "failed to append failure record");
        }
    }

    async fn post_collect(&self, source: &FilmSource, h: i64) -> Result<()> {
        self.materializer.sync_search_info(h > 0).await?;
        self.cache.invalidate_index_cache().await?;
        debug!(site = %source.id, "post-collection finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_above_threshold_forces_paced_serial() {
        assert_eq!(dispatch_mode(501, 100), DispatchMode::PacedSerial);
        assert_eq!(dispatch_mode(5000, 1), DispatchMode::PacedSerial);
    }

    #[test]
    fn threshold_interval_uses_page_count() {
        assert_eq!(dispatch_mode(500, 20), DispatchMode::Serial);
        assert_eq!(dispatch_mode(500, 21), DispatchMode::Concurrent);
        assert_eq!(dispatch_mode(0, 3), DispatchMode::Serial);
    }

    #[test]
    fn twice_the_pool_size_is_the_serial_ceiling() {
        let ceiling = (2 * MAX_WORKERS) as i64;
        assert_eq!(dispatch_mode(0, ceiling), DispatchMode::Serial);
        assert_eq!(dispatch_mode(0, ceiling + 1), DispatchMode::Concurrent);
    }
}
