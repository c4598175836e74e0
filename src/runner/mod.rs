//! Scheduled execution: cron parsing, timer dispatch, and the prompt runner.

pub mod cron;
pub mod runner;
pub mod timer;

pub use cron::CronSpec;
pub use runner::PromptRunner;
pub use timer::{JobHandler, JobPayload, JobTrigger, TimerService};
