//! Agent pipeline seam.
//!
//! The LLM tool-invocation loop itself is an external collaborator; the
//! runner only needs to open a fresh session, submit a prompt, and release
//! the session on every exit path.

pub mod cli;

use async_trait::async_trait;

use crate::error::Result;

pub use cli::{CliAgentPipeline, CliAgentSession};

/// A live conversation with the tool pipeline
#[async_trait]
pub trait AgentSession: Send {
    /// Submit a query and wait for the textual result
    async fn query(&mut self, prompt: &str) -> Result<String>;

    /// Release the session's resources
    async fn close(&mut self) -> Result<()>;
}

/// Factory for pipeline sessions; one fresh session per invocation attempt
#[async_trait]
pub trait AgentPipeline: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn AgentSession>>;
}
