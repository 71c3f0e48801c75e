//! Hot-store key schema and engine-wide constants.
//!
//! Third parties (the picture downloader, the read API, admin tooling)
//! depend on these exact key shapes; change them and the external
//! contract breaks.

/// Serialized category tree, refreshed on master collection.
pub const CATEGORY_TREE_KEY: &str = "CategoryTree";

/// Film entries are effectively permanent; ten years in seconds.
pub const FILM_EXPIRED_SECS: i64 = 60 * 60 * 24 * 365 * 10;

/// Registry of configured upstream sites.
pub const FILM_SOURCE_LIST_KEY: &str = "Config:Collect:FilmSource";

/// Admin configuration shares the film TTL.
pub const MANAGE_CONFIG_EXPIRED_SECS: i64 = FILM_EXPIRED_SECS;

/// Site parameters maintained by the admin front-end.
pub const SITE_CONFIG_BASIC_KEY: &str = "SystemConfig:SiteConfig:Basic";

/// Carousel entries maintained by the admin front-end.
pub const BANNERS_KEY: &str = "SystemConfig:Banners";

/// Persisted cron task descriptors.
pub const FILM_CRONTAB_KEY: &str = "Cron:Task:Film";

/// Scratch set of search rows accumulated during a crawl, drained by the
/// post-collection resync.
pub const SEARCH_INFO_TEMP_KEY: &str = "Search:SearchInfoTemp";

/// Pending poster queue for the external image downloader; score = mid.
pub const VIRTUAL_PICTURE_KEY: &str = "VirtualPicture";

/// Rendered front-page payload; cheap to rebuild, short-lived.
pub const INDEX_CACHE_KEY: &str = "IndexCache";
pub const INDEX_CACHE_EXPIRED_SECS: i64 = 60 * 30;

/// Batch ceiling for cursor-style scans and stash drains.
pub const MAX_SCAN_COUNT: usize = 300;

/// Worker-pool ceiling for concurrent page fan-out.
pub const MAX_WORKERS: usize = 10;

/// Paced-serial threshold: above this inter-request delay a site is
/// crawled one page at a time with the delay between pages.
pub const SINGLE_THREAD_INTERVAL_MS: u64 = 500;

/// Every 20 minutes: collect the recent window, then retry failures.
pub const DEFAULT_UPDATE_SPEC: &str = "0 */20 * * * *";
/// Sunday 04:00: week-sized catch-up crawl.
pub const EVERY_WEEK_SPEC: &str = "0 0 4 * * Sun";

pub const DEFAULT_UPDATE_WINDOW_HOURS: i64 = 3;
pub const WEEKLY_UPDATE_WINDOW_HOURS: i64 = 168;

/// Typed builders for the per-film key families.
#[derive(Debug, Clone, Copy)]
pub struct HotKeys;

impl HotKeys {
    /// Sorted set of mids per leaf category, scored by update stamp.
    pub fn movie_list(cid: i64) -> String {
        format!("MovieList:Cid{cid}")
    }

    /// Full detail hash.
    pub fn movie_detail(cid: i64, mid: i64) -> String {
        format!("MovieDetail:Cid{cid}:Id{mid}")
    }

    /// Slim projection hash.
    pub fn movie_basic_info(cid: i64, mid: i64) -> String {
        format!("MovieBasicInfo:Cid{cid}:Id{mid}")
    }

    /// Slave playback tracks, hash of source name to serialized links.
    pub fn multiple_source(mid: i64) -> String {
        format!("MultipleSource:{mid}")
    }

    /// Film titles per parent category, rebuilt on each resync.
    pub fn search_title(pid: i64) -> String {
        format!("Search:Pid{pid}:Title")
    }

    /// Mids per class tag under a parent category.
    pub fn search_tag(pid: i64, tag: &str) -> String {
        format!("Search:Pid{pid}:{tag}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes_are_stable() {
        assert_eq!(HotKeys::movie_list(6), "MovieList:Cid6");
        assert_eq!(HotKeys::movie_detail(6, 42), "MovieDetail:Cid6:Id42");
        assert_eq!(HotKeys::movie_basic_info(6, 42), "MovieBasicInfo:Cid6:Id42");
        assert_eq!(HotKeys::multiple_source(42), "MultipleSource:42");
        assert_eq!(HotKeys::search_title(1), "Search:Pid1:Title");
        assert_eq!(HotKeys::search_tag(1, "Action"), "Search:Pid1:Action");
    }
}
