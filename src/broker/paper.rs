//! In-process paper broker for dry runs and demos.
//!
//! Fills every order immediately at the limit price (or a reference price for
//! market orders). No live venue session involved.

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::info;

use crate::domain::{ContractDescriptor, OrderIntent, OrderKind};
use crate::error::{OrdergateError, Result};

use super::{BrokerClient, OrderSnapshot, OrderTicket, VenueStatus};

pub struct PaperBroker {
    next_order_id: AtomicI64,
    /// Reference price used for market fills
    reference_price: Decimal,
    open_orders: DashMap<i64, OrderSnapshot>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicI64::new(1),
            reference_price: dec!(100),
            open_orders: DashMap::new(),
        }
    }

    pub fn with_reference_price(mut self, price: Decimal) -> Self {
        self.reference_price = price;
        self
    }
}

impl Default for PaperBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerClient for PaperBroker {
    async fn qualify(&self, con_id: i64) -> Result<ContractDescriptor> {
        // Paper instruments are synthesized from the con id
        Ok(ContractDescriptor::stock(con_id, &format!("PAPER{con_id}")))
    }

    async fn submit(
        &self,
        contract: &ContractDescriptor,
        intent: &OrderIntent,
    ) -> Result<OrderTicket> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        let fill_price = intent
            .effective_limit_price()
            .unwrap_or(self.reference_price);

        info!(
            order_id,
            symbol = contract.symbol(),
            action = %intent.action,
            quantity = intent.quantity,
            kind = ?intent.kind,
            "paper fill"
        );

        self.open_orders.insert(
            order_id,
            OrderSnapshot {
                status: VenueStatus::Filled,
                filled: Decimal::from(intent.quantity),
                remaining: Decimal::ZERO,
                avg_fill_price: Some(match intent.kind {
                    OrderKind::Limit => fill_price,
                    OrderKind::Market => self.reference_price,
                }),
            },
        );

        Ok(OrderTicket { order_id })
    }

    async fn status(&self, ticket: &OrderTicket) -> Result<OrderSnapshot> {
        self.open_orders
            .get(&ticket.order_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| OrdergateError::Broker(format!("unknown order {}", ticket.order_id)))
    }

    async fn cancel(&self, ticket: &OrderTicket) -> Result<()> {
        if let Some(mut entry) = self.open_orders.get_mut(&ticket.order_id) {
            if !entry.status.is_terminal() {
                entry.status = VenueStatus::Cancelled;
            }
        }
        Ok(())
    }
}
