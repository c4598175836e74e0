pub mod agent;
pub mod approval;
pub mod broker;
pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod notify;
pub mod runner;
pub mod store;

pub use agent::{AgentPipeline, AgentSession, CliAgentPipeline};
pub use approval::{ApprovalConfig, ApprovalGateway, PendingApprovals};
pub use broker::{BrokerClient, OrderSnapshot, OrderTicket, PaperBroker, VenueStatus};
pub use config::AppConfig;
pub use domain::{
    ComboLeg, ContractDescriptor, ExecutionRecord, ExecutionStatus, OrderAction, OrderIntent,
    OrderKind, Prompt, Schedule, ScheduleKind, TradeOutcome,
};
pub use error::{OrdergateError, Result};
pub use execution::OrderExecutor;
pub use notify::{DecisionEvent, NotificationChannel, TelegramChannel};
pub use runner::{CronSpec, PromptRunner, TimerService};
pub use store::{SchedulerStore, Store};
