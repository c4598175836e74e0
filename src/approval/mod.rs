//! Approval gateway: every order is gated behind a human yes/no decision
//! delivered over the notification channel, with a hard timeout and
//! default-deny semantics.

pub mod gateway;
pub mod registry;

pub use gateway::{ApprovalConfig, ApprovalGateway};
pub use registry::PendingApprovals;
