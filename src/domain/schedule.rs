use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Agent prompt text, the unit the runner submits to the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Schedule kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    OneTime,
    Recurring,
}

impl ScheduleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::OneTime => "one_time",
            ScheduleKind::Recurring => "recurring",
        }
    }
}

impl FromStr for ScheduleKind {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw {
            "one_time" => Ok(Self::OneTime),
            "recurring" => Ok(Self::Recurring),
            _ => Err("invalid schedule kind; expected one_time|recurring"),
        }
    }
}

/// A persisted trigger for running a prompt through the agent pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub prompt_id: i64,
    pub kind: ScheduleKind,
    /// Fire time for one-time schedules
    pub run_at: Option<DateTime<Utc>>,
    /// 5-field cron expression for recurring schedules
    pub cron_expression: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    /// Timer registration id, stable across restarts
    pub fn job_id(&self) -> String {
        match self.kind {
            ScheduleKind::OneTime => format!("one_time_{}", self.id),
            ScheduleKind::Recurring => format!("recurring_{}", self.id),
        }
    }
}

/// Durable audit status for one invocation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Success,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Error)
    }
}

impl FromStr for ExecutionStatus {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err("invalid execution status"),
        }
    }
}

/// One audit row per pipeline invocation attempt.
///
/// Schedule and prompt references are nullable: deleting either never
/// cascades into history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub schedule_id: Option<i64>,
    pub prompt_id: Option<i64>,
    pub executed_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub result: Option<String>,
    pub error: Option<String>,
}
