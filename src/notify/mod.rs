//! Notification channel seam.
//!
//! Outbound: human-readable messages, optionally with approve/reject
//! controls. Inbound: decision events correlated back to pending approvals by
//! a short id prefix (outbound control payloads are size-limited, so only a
//! prefix of the correlation id travels over the wire).

pub mod telegram;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub use telegram::TelegramChannel;

/// Approve/reject controls attached to an approval prompt
#[derive(Debug, Clone)]
pub struct DecisionControls {
    /// Truncated correlation id carried in the control payload
    pub correlation_prefix: String,
}

/// An inbound approve/reject decision
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    pub correlation_prefix: String,
    pub approved: bool,
    /// Resolved identity of whoever pressed the control
    pub sender_id: String,
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Send a plain message
    async fn send_message(&self, text: &str) -> Result<()>;

    /// Send a message with approve/reject controls
    async fn send_approval_prompt(&self, text: &str, controls: &DecisionControls) -> Result<()>;

    /// Start forwarding inbound decisions into `tx`.
    ///
    /// Idempotent: callers may invoke this before every approval request; the
    /// stream is only started once.
    async fn start_decision_stream(&self, tx: mpsc::Sender<DecisionEvent>) -> Result<()>;
}
