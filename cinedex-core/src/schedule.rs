//! Cron-driven collection triggers.
//!
//! Two standing schedules: a short-cycle crawl over the recent window
//! followed by a failure-recovery sweep, and a weekly catch-up sized to
//! the gap between fires. An unparseable spec disables that schedule
//! rather than taking the process down.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::keys::{
    DEFAULT_UPDATE_SPEC, DEFAULT_UPDATE_WINDOW_HOURS, EVERY_WEEK_SPEC,
    WEEKLY_UPDATE_WINDOW_HOURS,
};
use crate::recover::RecoveryDriver;
use crate::supervisor::TaskSupervisor;

/// Time until the next fire of `spec`, or `None` when the spec cannot
/// fire (bad grammar or an exhausted one-shot).
fn next_fire(spec: &str) -> Option<Duration> {
    let schedule = cron::Schedule::from_str(spec).ok()?;
    let next = schedule.upcoming(Utc).next()?;
    (next - Utc::now()).to_std().ok()
}

/// Spawn both standing schedules. The returned handles run until process
/// exit; the caller just keeps the runtime alive.
pub fn spawn(supervisor: &TaskSupervisor, recovery: &Arc<RecoveryDriver>) {
    spawn_update_loop(supervisor.clone(), Arc::clone(recovery));
    spawn_weekly_loop(supervisor.clone());
}

fn spawn_update_loop(supervisor: TaskSupervisor, recovery: Arc<RecoveryDriver>) {
    tokio::spawn(async move {
        loop {
            let Some(wait) = next_fire(DEFAULT_UPDATE_SPEC) else {
                warn!(spec = DEFAULT_UPDATE_SPEC, "update schedule disabled");
                return;
            };
            tokio::time::sleep(wait).await;
            info!(hours = DEFAULT_UPDATE_WINDOW_HOURS, "scheduled update fired");
            if let Err(e) = supervisor.auto_collect(DEFAULT_UPDATE_WINDOW_HOURS).await {
                error!(error = %e, "scheduled auto collect failed");
            }
            if let Err(e) = recovery.full_recover().await {
                error!(error = %e, "scheduled failure recovery failed");
            }
        }
    });
}

fn spawn_weekly_loop(supervisor: TaskSupervisor) {
    tokio::spawn(async move {
        loop {
            let Some(wait) = next_fire(EVERY_WEEK_SPEC) else {
                warn!(spec = EVERY_WEEK_SPEC, "weekly schedule disabled");
                return;
            };
            tokio::time::sleep(wait).await;
            info!(hours = WEEKLY_UPDATE_WINDOW_HOURS, "weekly catch-up fired");
            if let Err(e) = supervisor.auto_collect(WEEKLY_UPDATE_WINDOW_HOURS).await {
                error!(error = %e, "weekly auto collect failed");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standing_specs_parse_and_fire() {
        let update = next_fire(DEFAULT_UPDATE_SPEC).expect("update spec fires");
        assert!(update <= Duration::from_secs(20 * 60));

        let weekly = next_fire(EVERY_WEEK_SPEC).expect("weekly spec fires");
        assert!(weekly <= Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn bad_spec_disables_the_schedule() {
        assert!(next_fire("definitely not cron").is_none());
    }
}
