//! Timer service: dispatches scheduled prompt invocations as independent
//! tasks. Registrations are idempotent by job id — re-registering replaces
//! the live timer — and all persisted schedules are re-registered on startup
//! so at most one timer exists per schedule across restarts.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{Schedule, ScheduleKind};
use crate::error::Result;
use crate::store::SchedulerStore;

use super::cron::CronSpec;

/// When a registered job fires
#[derive(Debug, Clone)]
pub enum JobTrigger {
    OnceAt(chrono::DateTime<Utc>),
    Cron(CronSpec),
}

/// What to run when a job fires
#[derive(Debug, Clone, Copy)]
pub struct JobPayload {
    pub prompt_id: i64,
    pub schedule_id: Option<i64>,
}

/// Receiver of timer firings
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    async fn run_job(&self, payload: JobPayload);
}

pub struct TimerService {
    handler: Arc<dyn JobHandler>,
    jobs: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TimerService {
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self {
            handler,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Register a job, replacing any live registration with the same id
    pub fn register(&self, job_id: &str, trigger: JobTrigger, payload: JobPayload) {
        let handler = self.handler.clone();
        let id = job_id.to_string();

        let handle = match trigger {
            JobTrigger::OnceAt(run_at) => tokio::spawn(async move {
                sleep_until(run_at).await;
                debug!(job_id = %id, "One-time job firing");
                handler.run_job(payload).await;
            }),
            JobTrigger::Cron(spec) => tokio::spawn(async move {
                loop {
                    let Some(next) = spec.next_after(Utc::now()) else {
                        warn!(job_id = %id, "Cron spec has no future firing, stopping");
                        return;
                    };
                    sleep_until(next).await;
                    debug!(job_id = %id, "Recurring job firing");
                    handler.run_job(payload).await;
                }
            }),
        };

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(old) = jobs.insert(job_id.to_string(), handle) {
            debug!(job_id, "Replaced existing timer registration");
            old.abort();
        }
    }

    /// Remove a job's registration; no-op when absent
    pub fn remove(&self, job_id: &str) {
        let mut jobs = self.jobs.lock().unwrap();
        if let Some(handle) = jobs.remove(job_id) {
            handle.abort();
            debug!(job_id, "Timer registration removed");
        }
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }

    pub fn has_job(&self, job_id: &str) -> bool {
        self.jobs.lock().unwrap().contains_key(job_id)
    }

    /// Register one persisted schedule. Schedules missing their trigger data
    /// are skipped with a warning rather than failing the reload.
    pub fn register_schedule(&self, schedule: &Schedule) {
        let payload = JobPayload {
            prompt_id: schedule.prompt_id,
            schedule_id: Some(schedule.id),
        };

        let trigger = match schedule.kind {
            ScheduleKind::OneTime => match schedule.run_at {
                Some(run_at) => JobTrigger::OnceAt(run_at),
                None => {
                    warn!(schedule_id = schedule.id, "One-time schedule without run_at, skipping");
                    return;
                }
            },
            ScheduleKind::Recurring => {
                let Some(expression) = schedule.cron_expression.as_deref() else {
                    warn!(
                        schedule_id = schedule.id,
                        "Recurring schedule without cron expression, skipping"
                    );
                    return;
                };
                match CronSpec::parse(expression) {
                    Ok(spec) => JobTrigger::Cron(spec),
                    Err(e) => {
                        warn!(schedule_id = schedule.id, "Invalid cron expression: {}", e);
                        return;
                    }
                }
            }
        };

        self.register(&schedule.job_id(), trigger, payload);
    }

    /// Reload every persisted schedule, replacing all stale registrations.
    /// Called on startup before anything else registers timers.
    pub async fn reload_schedules(&self, store: &dyn SchedulerStore) -> Result<usize> {
        self.clear();

        let schedules = store.list_schedules().await?;
        let total = schedules.len();
        for schedule in &schedules {
            self.register_schedule(schedule);
        }

        info!(count = self.job_count(), total, "Schedules reloaded");
        Ok(self.job_count())
    }

    /// Abort all registrations
    pub fn clear(&self) {
        let mut jobs = self.jobs.lock().unwrap();
        for (_, handle) in jobs.drain() {
            handle.abort();
        }
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Sleep until a wall-clock instant; past instants return immediately
async fn sleep_until(at: chrono::DateTime<Utc>) {
    let now = Utc::now();
    if at <= now {
        return;
    }
    let wait = (at - now).to_std().unwrap_or(Duration::ZERO);
    tokio::time::sleep(wait).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Prompt;
    use crate::error::Result;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        fired: AtomicUsize,
    }

    impl CountingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fired: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl JobHandler for CountingHandler {
        async fn run_job(&self, _payload: JobPayload) {
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FixedScheduleStore {
        schedules: Vec<Schedule>,
    }

    #[async_trait::async_trait]
    impl SchedulerStore for FixedScheduleStore {
        async fn get_prompt(&self, _id: i64) -> Result<Option<Prompt>> {
            Ok(None)
        }

        async fn list_schedules(&self) -> Result<Vec<Schedule>> {
            Ok(self.schedules.clone())
        }

        async fn insert_execution(
            &self,
            _schedule_id: Option<i64>,
            _prompt_id: Option<i64>,
        ) -> Result<i64> {
            Ok(0)
        }

        async fn mark_execution_success(&self, _id: i64, _result: &str) -> Result<bool> {
            Ok(true)
        }

        async fn mark_execution_error(&self, _id: i64, _error: &str) -> Result<bool> {
            Ok(true)
        }
    }

    fn schedule(id: i64, kind: ScheduleKind) -> Schedule {
        Schedule {
            id,
            prompt_id: 1,
            kind,
            run_at: matches!(kind, ScheduleKind::OneTime)
                .then(|| Utc::now() + ChronoDuration::hours(1)),
            cron_expression: matches!(kind, ScheduleKind::Recurring)
                .then(|| "0 9 * * 1-5".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn past_one_time_job_fires_immediately() {
        let handler = CountingHandler::new();
        let timers = TimerService::new(handler.clone());

        timers.register(
            "one_time_1",
            JobTrigger::OnceAt(Utc::now() - ChronoDuration::minutes(5)),
            JobPayload {
                prompt_id: 1,
                schedule_id: Some(1),
            },
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handler.fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn re_registering_replaces_instead_of_duplicating() {
        let handler = CountingHandler::new();
        let timers = TimerService::new(handler.clone());
        let payload = JobPayload {
            prompt_id: 1,
            schedule_id: Some(1),
        };

        let far = Utc::now() + ChronoDuration::hours(1);
        timers.register("recurring_1", JobTrigger::OnceAt(far), payload);
        timers.register("recurring_1", JobTrigger::OnceAt(far), payload);

        assert_eq!(timers.job_count(), 1);
    }

    #[tokio::test]
    async fn removing_an_absent_job_is_a_no_op() {
        let timers = TimerService::new(CountingHandler::new());
        timers.remove("nope");
        assert_eq!(timers.job_count(), 0);
    }

    #[tokio::test]
    async fn reload_registers_one_timer_per_schedule() {
        let handler = CountingHandler::new();
        let timers = TimerService::new(handler.clone());

        // A stale registration that must be replaced by the reload
        timers.register(
            "one_time_1",
            JobTrigger::OnceAt(Utc::now() + ChronoDuration::hours(2)),
            JobPayload {
                prompt_id: 9,
                schedule_id: Some(1),
            },
        );

        let store = FixedScheduleStore {
            schedules: vec![
                schedule(1, ScheduleKind::OneTime),
                schedule(2, ScheduleKind::Recurring),
                schedule(3, ScheduleKind::Recurring),
            ],
        };

        let registered = timers.reload_schedules(&store).await.unwrap();
        assert_eq!(registered, 3);
        assert!(timers.has_job("one_time_1"));
        assert!(timers.has_job("recurring_2"));
        assert!(timers.has_job("recurring_3"));
    }

    #[tokio::test]
    async fn reload_drops_registrations_for_deleted_schedules() {
        let timers = TimerService::new(CountingHandler::new());

        let store = FixedScheduleStore {
            schedules: vec![
                schedule(1, ScheduleKind::OneTime),
                schedule(2, ScheduleKind::Recurring),
            ],
        };
        timers.reload_schedules(&store).await.unwrap();
        assert!(timers.has_job("recurring_2"));

        // Schedule 2 was deleted; the next reload must drop its timer
        let store = FixedScheduleStore {
            schedules: vec![schedule(1, ScheduleKind::OneTime)],
        };
        timers.reload_schedules(&store).await.unwrap();

        assert_eq!(timers.job_count(), 1);
        assert!(timers.has_job("one_time_1"));
        assert!(!timers.has_job("recurring_2"));
    }

    #[tokio::test]
    async fn schedule_with_bad_cron_is_skipped_not_fatal() {
        let timers = TimerService::new(CountingHandler::new());
        let mut bad = schedule(5, ScheduleKind::Recurring);
        bad.cron_expression = Some("not a cron".to_string());

        let store = FixedScheduleStore {
            schedules: vec![bad, schedule(6, ScheduleKind::Recurring)],
        };

        let registered = timers.reload_schedules(&store).await.unwrap();
        assert_eq!(registered, 1);
        assert!(timers.has_job("recurring_6"));
    }
}
