//! Scheduled retention workers.
//!
//! One background task per resource class. Each task sleeps until the next
//! fire time of its cron schedule, runs a sweep cycle, logs the report and
//! goes back to sleep. The cycle runs in its own task so a panic inside it is
//! logged and the schedule keeps going.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::schedule::CronSchedule;
use super::sweeper::{RetentionSweeper, SweepReport};
use crate::config::RetentionSettings;
use crate::domain::value_objects::ResourceClass;
use crate::shared::clock::Clock;

/// Spawn one worker per enabled resource class.
pub fn spawn_retention_workers(
    sweeper: Arc<RetentionSweeper>,
    settings: &RetentionSettings,
    clock: Arc<dyn Clock>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    if !settings.enabled {
        tracing::info!("Retention workers disabled by configuration");
        return Vec::new();
    }

    let mut handles = Vec::new();
    for class in ResourceClass::ALL {
        let block = settings.schedule_for(class);
        if !block.enabled {
            tracing::info!(class = %class, "Retention worker disabled for class");
            continue;
        }
        let schedule = match CronSchedule::parse(&block.schedule, &settings.timezone) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(class = %class, error = %e, "Invalid retention schedule");
                continue;
            }
        };
        handles.push(tokio::spawn(start_retention_worker(
            sweeper.clone(),
            class,
            schedule,
            clock.clone(),
            shutdown.clone(),
        )));
    }
    handles
}

/// Run the schedule loop for one class until shutdown.
pub async fn start_retention_worker(
    sweeper: Arc<RetentionSweeper>,
    class: ResourceClass,
    schedule: CronSchedule,
    clock: Arc<dyn Clock>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(
        class = %class,
        schedule = schedule.expression(),
        timezone = %schedule.timezone(),
        room_batch = sweeper.config().room_batch,
        resource_batch = sweeper.config().resource_batch,
        "Starting retention worker"
    );

    loop {
        let now = clock.now();
        let Some(next) = schedule.next_after(now) else {
            tracing::warn!(class = %class, "Retention schedule has no upcoming run, stopping worker");
            return;
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(class = %class, next_run = %next, "Retention worker sleeping");

        let due = tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = shutdown.changed() => false,
        };
        if *shutdown.borrow() || shutdown.has_changed().is_err() {
            tracing::info!(class = %class, "Retention worker stopped");
            return;
        }
        if !due {
            // Woken without a shutdown request; wait for the next fire time.
            continue;
        }

        run_once(&sweeper, class, shutdown.clone()).await;
    }
}

/// Run a single cycle in its own task and log the outcome.
pub async fn run_once(
    sweeper: &Arc<RetentionSweeper>,
    class: ResourceClass,
    shutdown: watch::Receiver<bool>,
) -> Option<SweepReport> {
    let sweeper = sweeper.clone();
    let handle = tokio::spawn(async move { sweeper.run_cycle(class, shutdown).await });

    match handle.await {
        Ok(Ok(report)) => {
            log_report(&report);
            Some(report)
        }
        Ok(Err(e)) => {
            tracing::error!(class = %class, error = %e, "Retention cycle failed");
            None
        }
        Err(e) => {
            tracing::error!(class = %class, error = %e, "Retention cycle panicked");
            None
        }
    }
}

fn log_report(report: &SweepReport) {
    if report.has_deletions() || report.rooms_failed > 0 || !report.orphaned_blobs.is_empty() {
        tracing::info!(
            class = %report.class,
            rooms_scanned = report.rooms_scanned,
            rooms_skipped = report.rooms_skipped,
            rooms_failed = report.rooms_failed,
            deleted = report.resources_deleted,
            blob_deletes = report.blob_deletes_attempted,
            orphaned_blobs = report.orphaned_blobs.len(),
            cancelled = report.cancelled,
            "Retention cycle complete"
        );
    } else {
        tracing::debug!(
            class = %report.class,
            rooms_scanned = report.rooms_scanned,
            "Retention cycle complete, nothing expired"
        );
    }
}
