//! Time-based retention of room files and messages.
//!
//! - [`schedule`]: cron schedules evaluated in a configured timezone
//! - [`sweeper`]: the batched, paced sweep cycle
//! - [`worker`]: background tasks that fire cycles on schedule

pub mod schedule;
pub mod sweeper;
pub mod worker;

pub use schedule::{CronSchedule, ScheduleError};
pub use sweeper::{RetentionSweeper, SweepConfig, SweepReport};
pub use worker::{run_once, spawn_retention_workers, start_retention_worker};
