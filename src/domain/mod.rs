pub mod contract;
pub mod order;
pub mod schedule;
pub mod trade;

pub use contract::{ComboLeg, ContractDescriptor};
pub use order::{OrderAction, OrderIntent, OrderKind};
pub use schedule::{ExecutionRecord, ExecutionStatus, Prompt, Schedule, ScheduleKind};
pub use trade::{OrderStatusReport, TradeDetail, TradeOutcome};
