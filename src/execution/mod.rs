//! Order execution state machine: approved intent in, terminal trade result
//! out. Never raises across its boundary.

pub mod engine;

pub use engine::OrderExecutor;
