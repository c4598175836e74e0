//! PostgreSQL storage for prompts, schedules, and execution history.
//!
//! Execution rows keep nullable references to their schedule and prompt so
//! deleting either never erases history, and their status can only move
//! forward out of `pending`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::info;

use crate::domain::{ExecutionRecord, ExecutionStatus, Prompt, Schedule, ScheduleKind};
use crate::error::{OrdergateError, Result};

/// The slice of storage the scheduled-execution runner depends on.
///
/// A seam so the runner and timer service can be exercised without a live
/// database.
#[async_trait]
pub trait SchedulerStore: Send + Sync {
    async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>>;
    async fn list_schedules(&self) -> Result<Vec<Schedule>>;
    async fn insert_execution(
        &self,
        schedule_id: Option<i64>,
        prompt_id: Option<i64>,
    ) -> Result<i64>;
    async fn mark_execution_success(&self, id: i64, result: &str) -> Result<bool>;
    async fn mark_execution_error(&self, id: i64, error: &str) -> Result<bool>;
}

/// Optional filters for execution-history queries
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub schedule_id: Option<i64>,
    pub prompt_id: Option<i64>,
    pub status: Option<ExecutionStatus>,
    pub since: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Create a new store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables if they do not exist
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prompts (
                id BIGSERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedules (
                id BIGSERIAL PRIMARY KEY,
                prompt_id BIGINT NOT NULL REFERENCES prompts(id) ON DELETE CASCADE,
                kind TEXT NOT NULL CHECK (kind IN ('one_time', 'recurring')),
                run_at TIMESTAMPTZ,
                cron_expression TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // History must survive schedule/prompt deletion: references are
        // nulled, never cascaded.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS executions (
                id BIGSERIAL PRIMARY KEY,
                schedule_id BIGINT REFERENCES schedules(id) ON DELETE SET NULL,
                prompt_id BIGINT REFERENCES prompts(id) ON DELETE SET NULL,
                executed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                status TEXT NOT NULL CHECK (status IN ('pending', 'success', 'error')),
                result TEXT,
                error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database schema initialized");
        Ok(())
    }

    // ==================== Prompts ====================

    pub async fn insert_prompt(&self, content: &str) -> Result<Prompt> {
        let row = sqlx::query(
            r#"
            INSERT INTO prompts (content) VALUES ($1)
            RETURNING id, content, created_at
            "#,
        )
        .bind(content)
        .fetch_one(&self.pool)
        .await?;

        Ok(Prompt {
            id: row.get("id"),
            content: row.get("content"),
            created_at: row.get("created_at"),
        })
    }

    pub async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>> {
        let row = sqlx::query(
            r#"SELECT id, content, created_at FROM prompts WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Prompt {
            id: r.get("id"),
            content: r.get("content"),
            created_at: r.get("created_at"),
        }))
    }

    pub async fn delete_prompt(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM prompts WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ==================== Schedules ====================

    pub async fn insert_schedule(
        &self,
        prompt_id: i64,
        kind: ScheduleKind,
        run_at: Option<DateTime<Utc>>,
        cron_expression: Option<&str>,
    ) -> Result<Schedule> {
        match kind {
            ScheduleKind::OneTime if run_at.is_none() => {
                return Err(OrdergateError::Validation(
                    "one_time schedules require run_at".to_string(),
                ));
            }
            ScheduleKind::Recurring if cron_expression.is_none() => {
                return Err(OrdergateError::Validation(
                    "recurring schedules require a cron expression".to_string(),
                ));
            }
            _ => {}
        }

        let row = sqlx::query(
            r#"
            INSERT INTO schedules (prompt_id, kind, run_at, cron_expression)
            VALUES ($1, $2, $3, $4)
            RETURNING id, prompt_id, kind, run_at, cron_expression, created_at
            "#,
        )
        .bind(prompt_id)
        .bind(kind.as_str())
        .bind(run_at)
        .bind(cron_expression)
        .fetch_one(&self.pool)
        .await?;

        Self::map_schedule(&row)
    }

    pub async fn get_schedule(&self, id: i64) -> Result<Option<Schedule>> {
        let row = sqlx::query(
            r#"
            SELECT id, prompt_id, kind, run_at, cron_expression, created_at
            FROM schedules WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::map_schedule(&r)).transpose()
    }

    pub async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, prompt_id, kind, run_at, cron_expression, created_at
            FROM schedules ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_schedule).collect()
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM schedules WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    fn map_schedule(row: &sqlx::postgres::PgRow) -> Result<Schedule> {
        let kind: String = row.get("kind");
        let kind = kind
            .parse::<ScheduleKind>()
            .map_err(|e| OrdergateError::Internal(e.to_string()))?;
        Ok(Schedule {
            id: row.get("id"),
            prompt_id: row.get("prompt_id"),
            kind,
            run_at: row.get("run_at"),
            cron_expression: row.get("cron_expression"),
            created_at: row.get("created_at"),
        })
    }

    // ==================== Executions ====================

    /// Open a PENDING audit row for one invocation attempt
    pub async fn insert_execution(
        &self,
        schedule_id: Option<i64>,
        prompt_id: Option<i64>,
    ) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO executions (schedule_id, prompt_id, status)
            VALUES ($1, $2, 'pending')
            RETURNING id
            "#,
        )
        .bind(schedule_id)
        .bind(prompt_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// Move a pending attempt to SUCCESS. Returns false when the row was
    /// already terminal; status never moves backwards.
    pub async fn mark_execution_success(&self, id: i64, result: &str) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE executions SET status = 'success', result = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(result)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    /// Move a pending attempt to ERROR. Same forward-only guard.
    pub async fn mark_execution_error(&self, id: i64, error: &str) -> Result<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE executions SET status = 'error', error = $2
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(updated.rows_affected() > 0)
    }

    pub async fn get_execution(&self, id: i64) -> Result<Option<ExecutionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, schedule_id, prompt_id, executed_at, status, result, error
            FROM executions WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| Self::map_execution(&r)).transpose()
    }

    /// Execution history, newest first, with optional filters
    pub async fn list_executions(&self, filter: &ExecutionFilter) -> Result<Vec<ExecutionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, schedule_id, prompt_id, executed_at, status, result, error
            FROM executions
            WHERE ($1::bigint IS NULL OR schedule_id = $1)
              AND ($2::bigint IS NULL OR prompt_id = $2)
              AND ($3::text IS NULL OR status = $3)
              AND ($4::timestamptz IS NULL OR executed_at >= $4)
            ORDER BY executed_at DESC
            "#,
        )
        .bind(filter.schedule_id)
        .bind(filter.prompt_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_execution).collect()
    }

    fn map_execution(row: &sqlx::postgres::PgRow) -> Result<ExecutionRecord> {
        let status: String = row.get("status");
        let status = status
            .parse::<ExecutionStatus>()
            .map_err(|e| OrdergateError::Internal(e.to_string()))?;
        Ok(ExecutionRecord {
            id: row.get("id"),
            schedule_id: row.get("schedule_id"),
            prompt_id: row.get("prompt_id"),
            executed_at: row.get("executed_at"),
            status,
            result: row.get("result"),
            error: row.get("error"),
        })
    }
}

#[async_trait]
impl SchedulerStore for Store {
    async fn get_prompt(&self, id: i64) -> Result<Option<Prompt>> {
        Store::get_prompt(self, id).await
    }

    async fn list_schedules(&self) -> Result<Vec<Schedule>> {
        Store::list_schedules(self).await
    }

    async fn insert_execution(
        &self,
        schedule_id: Option<i64>,
        prompt_id: Option<i64>,
    ) -> Result<i64> {
        Store::insert_execution(self, schedule_id, prompt_id).await
    }

    async fn mark_execution_success(&self, id: i64, result: &str) -> Result<bool> {
        Store::mark_execution_success(self, id, result).await
    }

    async fn mark_execution_error(&self, id: i64, error: &str) -> Result<bool> {
        Store::mark_execution_error(self, id, error).await
    }
}
