use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::approval::ApprovalGateway;
use crate::broker::{BrokerClient, VenueStatus};
use crate::config::ExecutionConfig;
use crate::domain::{
    ComboLeg, ContractDescriptor, OrderAction, OrderIntent, OrderStatusReport, TradeOutcome,
};
use crate::error::{OrdergateError, Result};

/// Drives an order from intent to a terminal state.
///
/// Every call makes at most one submission, polls the venue once per interval
/// up to the configured budget, and issues exactly one cancel when the budget
/// runs out without a terminal status.
pub struct OrderExecutor {
    broker: Arc<dyn BrokerClient>,
    gateway: Arc<ApprovalGateway>,
    config: ExecutionConfig,
}

impl OrderExecutor {
    pub fn new(
        broker: Arc<dyn BrokerClient>,
        gateway: Arc<ApprovalGateway>,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            broker,
            gateway,
            config,
        }
    }

    /// Execute a single-contract order. Never returns an error; internal
    /// failures map to an errored [`TradeOutcome`].
    pub async fn execute_order(
        &self,
        contract: &ContractDescriptor,
        intent: &OrderIntent,
    ) -> TradeOutcome {
        match self.try_execute(contract, intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Error placing order: {}", e);
                TradeOutcome::errored(e.to_string())
            }
        }
    }

    /// Execute a multi-leg order: qualify each leg, assemble one combo
    /// contract (ratio 1 per leg, each leg keeping its own action), then run
    /// the normal gated path.
    pub async fn execute_combo(
        &self,
        legs: &[(i64, OrderAction)],
        intent: &OrderIntent,
    ) -> TradeOutcome {
        let contract = match self.build_combo(legs).await {
            Ok(contract) => contract,
            Err(e) => {
                error!("Error creating combo contract: {}", e);
                return TradeOutcome::errored(e.to_string());
            }
        };
        self.execute_order(&contract, intent).await
    }

    async fn build_combo(&self, legs: &[(i64, OrderAction)]) -> Result<ContractDescriptor> {
        if legs.is_empty() {
            return Err(OrdergateError::Validation(
                "combo orders need at least one leg".to_string(),
            ));
        }

        let mut combo_legs = Vec::with_capacity(legs.len());
        let mut combo_symbol = None;
        for (con_id, action) in legs {
            let qualified = self.broker.qualify(*con_id).await?;
            if combo_symbol.is_none() {
                combo_symbol = Some(qualified.symbol().to_string());
            }
            combo_legs.push(ComboLeg {
                con_id: *con_id,
                action: *action,
                ratio: 1,
                symbol: Some(qualified.symbol().to_string()),
            });
        }

        let symbol = combo_symbol.unwrap_or_default();
        debug!(symbol = %symbol, legs = combo_legs.len(), "Combo contract assembled");
        Ok(ContractDescriptor::combo(&symbol, "SMART", combo_legs))
    }

    async fn try_execute(
        &self,
        contract: &ContractDescriptor,
        intent: &OrderIntent,
    ) -> Result<TradeOutcome> {
        intent.validate()?;

        debug!(symbol = contract.symbol(), "Requesting approval for order");
        if !self.gateway.request_approval(contract, intent).await {
            debug!("Order not approved, skipping");
            return Ok(TradeOutcome::not_approved());
        }

        debug!(
            action = %intent.action,
            quantity = intent.quantity,
            kind = ?intent.kind,
            "Placing order"
        );
        let ticket = self.broker.submit(contract, intent).await?;

        let interval = Duration::from_millis(self.config.poll_interval_ms);
        for _ in 0..self.config.poll_budget {
            let snapshot = self.broker.status(&ticket).await?;

            match snapshot.status {
                VenueStatus::Filled => {
                    info!(
                        order_id = ticket.order_id,
                        avg_fill_price = ?snapshot.avg_fill_price,
                        "Order filled"
                    );
                    let outcome = TradeOutcome::filled(
                        contract,
                        intent,
                        OrderStatusReport {
                            status: snapshot.status.to_string(),
                            filled: snapshot.filled,
                            remaining: snapshot.remaining,
                            avg_fill_price: snapshot.avg_fill_price,
                        },
                    );
                    self.gateway.send_trade_confirmation(&outcome).await;
                    return Ok(outcome);
                }
                VenueStatus::Cancelled | VenueStatus::Error | VenueStatus::Inactive => {
                    debug!(
                        order_id = ticket.order_id,
                        status = %snapshot.status,
                        "Order reached terminal non-fill state"
                    );
                    return Ok(TradeOutcome::errored(format!(
                        "Order {}",
                        snapshot.status.as_str().to_lowercase()
                    )));
                }
                VenueStatus::Submitted => {}
            }

            tokio::time::sleep(interval).await;
        }

        debug!(order_id = ticket.order_id, "Order not filled, cancelling");
        self.broker.cancel(&ticket).await?;
        Ok(TradeOutcome::not_filled())
    }
}
