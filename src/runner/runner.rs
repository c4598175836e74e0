//! Scheduled prompt runner.
//!
//! Every invocation attempt opens a fresh agent session and writes its own
//! execution record, so a retried run leaves one audit row per attempt. The
//! session is released on success and failure alike.

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::agent::AgentPipeline;
use crate::config::RunnerConfig;
use crate::error::{OrdergateError, Result};
use crate::store::SchedulerStore;

use super::timer::{JobHandler, JobPayload};

pub struct PromptRunner {
    store: Arc<dyn SchedulerStore>,
    pipeline: Arc<dyn AgentPipeline>,
    config: RunnerConfig,
}

impl PromptRunner {
    pub fn new(
        store: Arc<dyn SchedulerStore>,
        pipeline: Arc<dyn AgentPipeline>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            config,
        }
    }

    /// Run a stored prompt through the agent pipeline with retries.
    ///
    /// Returns the agent's answer from the first successful attempt, or the
    /// last attempt's error once every attempt has failed.
    pub async fn run(&self, prompt_id: i64, schedule_id: Option<i64>) -> Result<String> {
        let prompt = self
            .store
            .get_prompt(prompt_id)
            .await?
            .ok_or(OrdergateError::PromptNotFound(prompt_id))?;

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let execution_id = self.store.insert_execution(schedule_id, Some(prompt_id)).await?;

            match self.invoke_once(&prompt.content).await {
                Ok(answer) => {
                    self.store
                        .mark_execution_success(execution_id, &answer)
                        .await?;
                    info!(prompt_id, execution_id, attempt, "Prompt run succeeded");
                    return Ok(answer);
                }
                Err(e) => {
                    self.store
                        .mark_execution_error(execution_id, &e.to_string())
                        .await?;
                    warn!(
                        prompt_id,
                        execution_id,
                        attempt,
                        max_attempts,
                        "Prompt run attempt failed: {}",
                        e
                    );
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                    }
                }
            }
        }

        error!(prompt_id, max_attempts, "Prompt run exhausted all attempts");
        Err(last_error.unwrap_or_else(|| {
            OrdergateError::Internal("prompt run failed without an error".to_string())
        }))
    }

    /// One attempt: fresh session, one query, session released on every path
    async fn invoke_once(&self, content: &str) -> Result<String> {
        let mut session = self.pipeline.open_session().await?;
        let outcome = session.query(content).await;
        if let Err(e) = session.close().await {
            warn!("Failed to close agent session: {}", e);
        }
        outcome
    }
}

#[async_trait::async_trait]
impl JobHandler for PromptRunner {
    async fn run_job(&self, payload: JobPayload) {
        if let Err(e) = self.run(payload.prompt_id, payload.schedule_id).await {
            error!(
                prompt_id = payload.prompt_id,
                schedule_id = payload.schedule_id,
                "Scheduled prompt run failed: {}",
                e
            );
        }
    }
}
