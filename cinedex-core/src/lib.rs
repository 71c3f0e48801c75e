//! # cinedex-core
//!
//! Collection engine for the cinedex film-metadata aggregator: crawls
//! MacCMS-style upstream catalogs on a schedule, materializes their
//! payloads into a Redis hot store plus a MySQL search index, and keeps
//! per-page failures replayable through a durable failure log.
//!
//! The moving parts, bottom up:
//!
//! * [`fetch`] — outbound HTTP with the quirks upstreams expect.
//! * [`decode`] — JSON / RSS envelope decoding into [`cinedex_model::FilmDetail`].
//! * [`store`] — storage ports and their Redis/MySQL implementations.
//! * [`materialize`] — the per-page write set and the post-crawl index resync.
//! * [`supervisor`] — per-site single-flight task lifecycle and page fan-out.
//! * [`recover`] — failure-log replay policy.
//! * [`schedule`] — the standing cron triggers.

pub mod decode;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod materialize;
pub mod recover;
pub mod schedule;
pub mod store;
pub mod supervisor;

pub use decode::Decoder;
pub use error::{EngineError, Result};
pub use fetch::{Fetch, HttpFetcher};
pub use materialize::Materializer;
pub use recover::RecoveryDriver;
pub use store::{
    FailureStore, FilmCache, SearchStash, SearchStore, SourceRegistry, VodQuery,
};
pub use supervisor::TaskSupervisor;
