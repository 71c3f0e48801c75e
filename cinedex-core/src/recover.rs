//! Failure-record recovery.
//!
//! Two bands of the recorded window act; everything between them is
//! deliberately inert:
//!
//! * window in (168, 360) hours: the failure is old enough that single
//!   pages are stale. One fleet-wide catch-up over a widened window
//!   subsumes this record and every later record of the same class, so
//!   they are all marked retried at once.
//! * full dumps and windows beyond 4320 hours: replay exactly the failed
//!   page against its originating source.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cinedex_model::{CollectType, FailureRecord};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::store::{FailureStore, SourceRegistry};
use crate::supervisor::TaskSupervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecoveryAction {
    WidenWindow,
    ReplayPage,
    Leave,
}

fn classify(hour: i64) -> RecoveryAction {
    if hour > 168 && hour < 360 {
        RecoveryAction::WidenWindow
    } else if hour < 0 || hour > 4320 {
        RecoveryAction::ReplayPage
    } else {
        RecoveryAction::Leave
    }
}

/// Original window plus the hours (rounded up) the record has been
/// sitting in the log, so the catch-up covers the gap too.
fn widened_window(hour: i64, created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed_secs = (now - created_at).num_seconds().max(0);
    hour + (elapsed_secs + 3599) / 3600
}

pub struct RecoveryDriver {
    supervisor: TaskSupervisor,
    failures: Arc<dyn FailureStore>,
    sources: Arc<dyn SourceRegistry>,
}

impl std::fmt::Debug for RecoveryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryDriver").finish_non_exhaustive()
    }
}

impl RecoveryDriver {
    pub fn new(
        supervisor: TaskSupervisor,
        failures: Arc<dyn FailureStore>,
        sources: Arc<dyn SourceRegistry>,
    ) -> Self {
        Self {
            supervisor,
            failures,
            sources,
        }
    }

    /// Apply the retry policy to every pending record. Replaying on an
    /// empty log is a no-op.
    pub async fn full_recover(&self) -> Result<()> {
        let pending = self.failures.pending().await?;
        if pending.is_empty() {
            debug!("no pending failure records");
            return Ok(());
        }
        info!(records = pending.len(), "failure recovery started");

        // Records are ordered oldest first, so once a class has widened,
        // every later record of that class has already been marked
        // retried by the same update.
        let mut widened: HashSet<CollectType> = HashSet::new();
        for record in &pending {
            if widened.contains(&record.collect_type) {
                continue;
            }
            self.apply(record, &mut widened).await?;
        }
        Ok(())
    }

    /// The same policy applied to a single record.
    pub async fn single_recover(&self, record: &FailureRecord) -> Result<()> {
        self.apply(record, &mut HashSet::new()).await
    }

    async fn apply(
        &self,
        record: &FailureRecord,
        widened: &mut HashSet<CollectType>,
    ) -> Result<()> {
        match classify(record.hour) {
            RecoveryAction::WidenWindow => {
                self.failures
                    .mark_class_retried(record.collect_type, record.created_at)
                    .await?;
                widened.insert(record.collect_type);
                let window = widened_window(record.hour, record.created_at, Utc::now());
                info!(
                    origin = %record.origin_id,
                    original = record.hour,
                    widened = window,
                    "launching fleet catch-up for aged failure"
                );
                self.supervisor.auto_collect(window).await?;
            }
            RecoveryAction::ReplayPage => {
                self.failures.mark_retried(record.id).await?;
                match self.sources.find(&record.origin_id).await? {
                    Some(source) => {
                        info!(
                            origin = %record.origin_id,
                            page = record.page_number,
                            "replaying failed page"
                        );
                        self.supervisor
                            .collect_page(&source, record.hour, record.page_number)
                            .await;
                    }
                    None => {
                        warn!(
                            origin = %record.origin_id,
                            "origin source no longer configured, failure dropped"
                        );
                    }
                }
            }
            RecoveryAction::Leave => {
                debug!(
                    origin = %record.origin_id,
                    hour = record.hour,
                    "failure window outside retry bands, left pending"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn classification_bands_are_exclusive() {
        assert_eq!(classify(168), RecoveryAction::Leave);
        assert_eq!(classify(169), RecoveryAction::WidenWindow);
        assert_eq!(classify(359), RecoveryAction::WidenWindow);
        assert_eq!(classify(360), RecoveryAction::Leave);
        assert_eq!(classify(4320), RecoveryAction::Leave);
        assert_eq!(classify(4321), RecoveryAction::ReplayPage);
        assert_eq!(classify(-1), RecoveryAction::ReplayPage);
        assert_eq!(classify(3), RecoveryAction::Leave);
    }

    #[test]
    fn widening_rounds_elapsed_hours_up() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let exactly_50h = created + chrono::Duration::hours(50);
        assert_eq!(widened_window(200, created, exactly_50h), 250);

        let a_bit_more = exactly_50h + chrono::Duration::seconds(1);
        assert_eq!(widened_window(200, created, a_bit_more), 251);

        // Clock skew never shrinks the window.
        assert_eq!(widened_window(200, exactly_50h, created), 200);
    }
}
