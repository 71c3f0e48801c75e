//! Startup wiring: wait for storage, verify the schema, seed the source
//! registry, and assemble the engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cinedex_config::Settings;
use cinedex_core::store::mysql::{self, MySqlFailureStore, MySqlSearchStore};
use cinedex_core::store::redis::{self, RedisFilmCache, RedisSourceRegistry};
use cinedex_core::{
    HttpFetcher, RecoveryDriver, SourceRegistry, TaskSupervisor,
};
use cinedex_model::{CollectType, FilmSource, ResultModel, SourceGrade};
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::state::AppState;

const CONNECT_ATTEMPTS: u32 = 30;
const CONNECT_PAUSE: Duration = Duration::from_secs(2);

/// Retry until the dependency answers; containers regularly win the boot
/// race against their databases.
async fn connect_with_retry<T, E, F, Fut>(what: &str, mut connect: F) -> anyhow::Result<T>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for attempt in 1..=CONNECT_ATTEMPTS {
        match connect().await {
            Ok(value) => {
                info!(attempt, "{what} connection established");
                return Ok(value);
            }
            Err(e) => {
                warn!(attempt, max = CONNECT_ATTEMPTS, error = %e, "{what} connection failed");
                tokio::time::sleep(CONNECT_PAUSE).await;
            }
        }
    }
    anyhow::bail!("{what} unreachable after {CONNECT_ATTEMPTS} attempts")
}

/// When the registry key is empty (fresh deployment or a flushed Redis),
/// install one disabled template entry for operators to copy.
async fn seed_sources(registry: &RedisSourceRegistry) -> anyhow::Result<()> {
    if !registry.list().await?.is_empty() {
        return Ok(());
    }
    let template = FilmSource {
        id: "sample-master".into(),
        name: "Sample master source (edit before enabling)".into(),
        uri: "https://example.com/api.php/provide/vod/".into(),
        state: false,
        grade: SourceGrade::Master,
        collect_type: CollectType::Video,
        result_model: ResultModel::Json,
        interval_ms: 0,
        sync_pictures: false,
    };
    registry.save(&template).await?;
    info!("seeded source registry with a disabled template entry");
    Ok(())
}

pub async fn init(settings: &Settings) -> anyhow::Result<AppState> {
    let redis_url = settings.redis.url();
    let conn = connect_with_retry("redis", || redis::connect(&redis_url)).await?;

    let dsn = settings.mysql.dsn();
    let pool = connect_with_retry("mysql", || MySqlPool::connect(&dsn)).await?;
    mysql::init_schema(&pool).await?;

    let cache = Arc::new(RedisFilmCache::new(conn.clone()));
    let registry = Arc::new(RedisSourceRegistry::new(conn));
    seed_sources(&registry).await?;

    let search = Arc::new(MySqlSearchStore::new(pool.clone()));
    let failures = Arc::new(MySqlFailureStore::new(pool));
    let fetcher = Arc::new(HttpFetcher::new());

    let supervisor = TaskSupervisor::new(
        registry.clone(),
        cache.clone(),
        search.clone(),
        failures.clone(),
        fetcher,
    );
    let recovery = Arc::new(RecoveryDriver::new(
        supervisor.clone(),
        failures,
        registry.clone() as Arc<dyn SourceRegistry>,
    ));

    Ok(AppState {
        supervisor,
        recovery,
        sources: registry,
        cache,
        search,
    })
}
