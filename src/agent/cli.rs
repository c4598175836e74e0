//! Agent pipeline over the `claude` CLI.
//!
//! Each session shells out to the CLI in print mode; the subprocess gives us
//! isolation from the tool loop and its protocol.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AgentConfig;
use crate::error::{OrdergateError, Result};

use super::{AgentPipeline, AgentSession};

pub struct CliAgentPipeline {
    config: AgentConfig,
}

impl CliAgentPipeline {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Check that the CLI is reachable
    pub async fn check_availability(&self) -> Result<bool> {
        let output = Command::new(&self.config.cli_path)
            .arg("--version")
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                debug!(
                    "Agent CLI available: {}",
                    String::from_utf8_lossy(&out.stdout).trim()
                );
                Ok(true)
            }
            Ok(_) => {
                warn!("Agent CLI returned error status");
                Ok(false)
            }
            Err(e) => {
                warn!("Agent CLI not found: {}", e);
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl AgentPipeline for CliAgentPipeline {
    async fn open_session(&self) -> Result<Box<dyn AgentSession>> {
        Ok(Box::new(CliAgentSession {
            cli_path: self.config.cli_path.clone(),
            timeout: Duration::from_secs(self.config.timeout_secs),
        }))
    }
}

pub struct CliAgentSession {
    cli_path: String,
    timeout: Duration,
}

#[async_trait]
impl AgentSession for CliAgentSession {
    async fn query(&mut self, prompt: &str) -> Result<String> {
        let mut child = Command::new(&self.cli_path)
            .arg("-p")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OrdergateError::Pipeline(format!("failed to spawn agent CLI: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| OrdergateError::Pipeline(format!("failed to write prompt: {e}")))?;
            drop(stdin);
        }

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OrdergateError::Pipeline(format!(
                    "agent query timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| OrdergateError::Pipeline(format!("agent CLI failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OrdergateError::Pipeline(format!(
                "agent CLI exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn close(&mut self) -> Result<()> {
        // One subprocess per query; nothing held between queries
        Ok(())
    }
}
