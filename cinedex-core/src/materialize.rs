//! Page materialization onto the two storage tiers.
//!
//! Per-page work only touches the hot store; the relational index is
//! resynced once after the whole crawl so a failed page never leaves the
//! index half-written. Writes are per-record: one bad record is logged
//! and skipped, the rest of the page continues.

use std::sync::Arc;

use cinedex_model::{FilmDetail, FilmSource, SourceGrade};
use tracing::{debug, warn};

use crate::error::Result;
use crate::keys::MAX_SCAN_COUNT;
use crate::store::{FilmCache, SearchStash, SearchStore};

pub struct Materializer {
    cache: Arc<dyn FilmCache>,
    search: Arc<dyn SearchStore>,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer").finish_non_exhaustive()
    }
}

impl Materializer {
    pub fn new(cache: Arc<dyn FilmCache>, search: Arc<dyn SearchStore>) -> Self {
        Self { cache, search }
    }

    /// Write one decoded page. Master sites own every detail key; slave
    /// sites only merge playback tracks into the multi-source hash.
    pub async fn save_page(&self, source: &FilmSource, details: &[FilmDetail]) {
        for detail in details {
            let outcome = match source.grade {
                SourceGrade::Master => self.save_master_record(source, detail).await,
                SourceGrade::Slave => self.save_slave_record(detail).await,
            };
            if let Err(e) = outcome {
                warn!(
                    site = %source.id,
                    mid = detail.mid,
                    error = %e,
                    "failed to materialize record"
                );
            }
        }
    }

    async fn save_master_record(&self, source: &FilmSource, detail: &FilmDetail) -> Result<()> {
        self.cache.put_detail(detail).await?;
        self.cache.put_basic_info(&detail.basic_info()).await?;
        self.cache
            .push_movie_list(detail.cid, detail.mid, detail.update_stamp)
            .await?;
        self.cache
            .stash_search(&SearchStash {
                info: detail.search_info(),
                class_tag: detail.class_tag.clone(),
            })
            .await?;
        if source.sync_pictures && !detail.picture.is_empty() {
            self.cache.enqueue_picture(detail.mid, &detail.picture).await?;
        }
        Ok(())
    }

    async fn save_slave_record(&self, detail: &FilmDetail) -> Result<()> {
        for track in &detail.play_sources {
            self.cache
                .merge_play_sources(detail.mid, &track.name, &track.link_list)
                .await?;
        }
        Ok(())
    }

    /// Drain the crawl's search stash into the relational index. `merge`
    /// upserts into the existing rows; a full dump truncates first. The
    /// per-parent filter sets are rebuilt from the same entries and the
    /// stash key removed at the end.
    pub async fn sync_search_info(&self, merge: bool) -> Result<()> {
        if !merge {
            self.search.truncate().await?;
        }

        let mut synced = 0usize;
        loop {
            let batch = self.cache.drain_search_stash(MAX_SCAN_COUNT).await?;
            if batch.is_empty() {
                break;
            }
            let rows: Vec<_> = batch.iter().map(|e| e.info.clone()).collect();
            self.search.upsert(&rows).await?;
            for entry in &batch {
                if let Err(e) = self.cache.index_search_filters(entry).await {
                    warn!(mid = entry.info.mid, error = %e, "failed to index search filters");
                }
            }
            synced += batch.len();
        }

        self.cache.delete_search_stash().await?;
        debug!(rows = synced, merge, "search index resynced");
        Ok(())
    }
}
