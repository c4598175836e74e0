use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::{ContractDescriptor, OrderIntent, OrderKind, TradeOutcome};
use crate::error::Result;
use crate::notify::{DecisionControls, DecisionEvent, NotificationChannel};

use super::registry::PendingApprovals;

/// Callback payloads truncate the correlation id to this many characters
const CORRELATION_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// The single sender identity allowed to resolve approvals
    pub allowed_sender_id: String,
    /// How long to wait for a decision before denying
    pub timeout: Duration,
}

impl ApprovalConfig {
    pub fn new(allowed_sender_id: impl Into<String>, timeout: Duration) -> Self {
        Self {
            allowed_sender_id: allowed_sender_id.into(),
            timeout,
        }
    }
}

/// Gates orders behind a human decision delivered over the notification
/// channel. Denies by default: timeout, rejection, and channel failure all
/// come back as `false`.
pub struct ApprovalGateway {
    channel: Arc<dyn NotificationChannel>,
    registry: Arc<PendingApprovals>,
    config: ApprovalConfig,
    listener_started: AtomicBool,
}

impl ApprovalGateway {
    pub fn new(channel: Arc<dyn NotificationChannel>, config: ApprovalConfig) -> Self {
        Self {
            channel,
            registry: Arc::new(PendingApprovals::new()),
            config,
            listener_started: AtomicBool::new(false),
        }
    }

    /// The outstanding-approvals registry, shared with anything that must
    /// resolve decisions directly (tests, alternate channels)
    pub fn registry(&self) -> Arc<PendingApprovals> {
        self.registry.clone()
    }

    /// Start consuming the channel's decision stream; idempotent
    pub async fn ensure_listening(&self) -> Result<()> {
        if self.listener_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (tx, mut rx) = mpsc::channel::<DecisionEvent>(32);
        if let Err(e) = self.channel.start_decision_stream(tx).await {
            self.listener_started.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let registry = self.registry.clone();
        let allowed_sender = self.config.allowed_sender_id.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                Self::handle_decision(&registry, &allowed_sender, event);
            }
            debug!("Decision stream closed");
        });

        Ok(())
    }

    /// Apply one inbound decision to the pending registry.
    ///
    /// Unauthorized senders are logged and ignored; a prefix matching no
    /// pending request is a benign no-op (stale or duplicate decision).
    fn handle_decision(registry: &PendingApprovals, allowed_sender: &str, event: DecisionEvent) {
        if event.sender_id != allowed_sender {
            warn!(
                sender = %event.sender_id,
                "Unauthorized sender attempted to resolve an approval"
            );
            return;
        }

        match registry.resolve_prefix(&event.correlation_prefix, event.approved) {
            Some(id) => {
                info!(
                    correlation_id = %id,
                    approved = event.approved,
                    "Approval request resolved"
                );
            }
            None => {
                debug!(
                    prefix = %event.correlation_prefix,
                    "Decision matched no pending request"
                );
            }
        }
    }

    /// Request a human decision for an order proposal.
    ///
    /// Returns `true` only on an explicit approval received before the
    /// timeout. The registered signal is removed on every exit path.
    pub async fn request_approval(
        &self,
        contract: &ContractDescriptor,
        intent: &OrderIntent,
    ) -> bool {
        if let Err(e) = self.ensure_listening().await {
            error!("Could not start decision stream, denying order: {}", e);
            return false;
        }

        let (id, rx) = self.registry.register();
        let prefix = id.to_string()[..CORRELATION_PREFIX_LEN].to_string();
        let text = render_proposal(contract, intent);

        debug!(correlation_id = %id, symbol = contract.symbol(), "Requesting approval");

        let controls = DecisionControls {
            correlation_prefix: prefix,
        };
        if let Err(e) = self.channel.send_approval_prompt(&text, &controls).await {
            error!("Error requesting approval: {}", e);
            self.registry.remove(&id);
            return false;
        }

        let approved = match tokio::time::timeout(self.config.timeout, rx).await {
            Ok(Ok(approved)) => approved,
            Ok(Err(_)) => {
                // Sender dropped without a verdict; treat as denial
                warn!(correlation_id = %id, "Approval signal dropped unresolved");
                false
            }
            Err(_) => {
                warn!(correlation_id = %id, "Approval request timed out");
                false
            }
        };

        self.registry.remove(&id);
        approved
    }

    /// Send a fill confirmation; best-effort.
    ///
    /// Falls back to the raw payload when structured formatting fails, and
    /// never propagates a send failure to the order-execution caller.
    pub async fn send_trade_confirmation(&self, outcome: &TradeOutcome) {
        let raw = serde_json::to_string(outcome).unwrap_or_default();
        let text = match format_confirmation(outcome) {
            Some(text) => text,
            None => {
                error!("Error formatting trade confirmation, sending raw payload");
                raw
            }
        };

        if let Err(e) = self.channel.send_message(&text).await {
            error!("Failed to send trade confirmation: {}", e);
        }
    }
}

fn render_proposal(contract: &ContractDescriptor, intent: &OrderIntent) -> String {
    let contract_json = serde_json::to_string_pretty(&contract.render()).unwrap_or_default();
    let price_str = match (intent.kind, intent.effective_limit_price()) {
        (OrderKind::Limit, Some(price)) => format!(" at ${price:.2}"),
        _ => String::new(),
    };

    format!(
        "\u{1f514} *Trade Approval Request*\n\n\
         Contract:\n```\n{contract_json}\n```\n\n\
         Order:\n```\n\
         Action: {}\n\
         Quantity: {}\n\
         Type: {}{price_str}\n\
         ```",
        intent.action,
        intent.quantity,
        intent.kind.wire_code(),
    )
}

fn format_confirmation(outcome: &TradeOutcome) -> Option<String> {
    let trade = outcome.trade.as_ref()?;
    let contract = &trade.contract;
    let status = &trade.order_status;

    let legs_str = match contract.get("legs").and_then(|l| l.as_array()) {
        Some(legs) if !legs.is_empty() => legs
            .iter()
            .map(|leg| {
                format!(
                    "  \u{2022} {} {}x {}",
                    leg.get("action").and_then(|v| v.as_str()).unwrap_or("?"),
                    leg.get("ratio").and_then(|v| v.as_u64()).unwrap_or(1),
                    leg.get("symbol").and_then(|v| v.as_str()).unwrap_or("?"),
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => "  \u{2022} Single contract".to_string(),
    };

    Some(format!(
        "\u{2705} *Trade Executed*\n\n\
         *Contract:* {}\n\
         *Legs:*\n{legs_str}\n\
         *Order Type:* {}\n\
         *Status:* {}\n\
         *Filled:* {}\n\
         *Avg Price:* ${:.2}",
        contract.get("symbol").and_then(|v| v.as_str()).unwrap_or("?"),
        trade.order.get("orderType").and_then(|v| v.as_str()).unwrap_or("?"),
        status.status,
        status.filled,
        status.avg_fill_price.unwrap_or_default(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderAction, OrderStatusReport};
    use crate::error::OrdergateError;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Channel fake that records outbound traffic and can inject decisions
    struct FakeChannel {
        sent: Mutex<Vec<String>>,
        prompts: Mutex<Vec<DecisionControls>>,
        fail_sends: bool,
        decision_tx: Mutex<Option<mpsc::Sender<DecisionEvent>>>,
    }

    impl FakeChannel {
        fn new(fail_sends: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
                fail_sends,
                decision_tx: Mutex::new(None),
            })
        }

        async fn inject(&self, event: DecisionEvent) {
            let tx = self
                .decision_tx
                .lock()
                .unwrap()
                .clone()
                .expect("stream not started");
            tx.send(event).await.unwrap();
        }

        fn last_prefix(&self) -> String {
            self.prompts
                .lock()
                .unwrap()
                .last()
                .expect("no prompt sent")
                .correlation_prefix
                .clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        async fn send_message(&self, text: &str) -> Result<()> {
            if self.fail_sends {
                return Err(OrdergateError::ChannelSend("down".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_approval_prompt(
            &self,
            text: &str,
            controls: &DecisionControls,
        ) -> Result<()> {
            if self.fail_sends {
                return Err(OrdergateError::ChannelSend("down".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            self.prompts.lock().unwrap().push(controls.clone());
            Ok(())
        }

        async fn start_decision_stream(&self, tx: mpsc::Sender<DecisionEvent>) -> Result<()> {
            *self.decision_tx.lock().unwrap() = Some(tx);
            Ok(())
        }
    }

    fn gateway_with(channel: Arc<FakeChannel>, timeout: Duration) -> ApprovalGateway {
        ApprovalGateway::new(channel, ApprovalConfig::new("42", timeout))
    }

    fn aapl_limit() -> (ContractDescriptor, OrderIntent) {
        (
            ContractDescriptor::stock(265598, "AAPL"),
            OrderIntent::limit(OrderAction::Buy, 100, dec!(150.75)),
        )
    }

    #[tokio::test]
    async fn approval_resolves_true() {
        let channel = FakeChannel::new(false);
        let gateway = gateway_with(channel.clone(), Duration::from_secs(5));
        let (contract, intent) = aapl_limit();

        let gateway = Arc::new(gateway);
        let task = {
            let gateway = gateway.clone();
            let (contract, intent) = (contract.clone(), intent.clone());
            tokio::spawn(async move { gateway.request_approval(&contract, &intent).await })
        };

        // Wait until the prompt went out, then approve from the allowed user
        tokio::time::sleep(Duration::from_millis(50)).await;
        let prefix = channel.last_prefix();
        channel
            .inject(DecisionEvent {
                correlation_prefix: prefix,
                approved: true,
                sender_id: "42".to_string(),
            })
            .await;

        assert!(task.await.unwrap());
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn rejection_resolves_false() {
        let channel = FakeChannel::new(false);
        let gateway = Arc::new(gateway_with(channel.clone(), Duration::from_secs(5)));
        let (contract, intent) = aapl_limit();

        let task = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.request_approval(&contract, &intent).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let prefix = channel.last_prefix();
        channel
            .inject(DecisionEvent {
                correlation_prefix: prefix,
                approved: false,
                sender_id: "42".to_string(),
            })
            .await;

        assert!(!task.await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_denies_and_clears_registry() {
        let channel = FakeChannel::new(false);
        let gateway = Arc::new(gateway_with(channel, Duration::from_secs(300)));
        let (contract, intent) = aapl_limit();

        let approved = gateway.request_approval(&contract, &intent).await;

        assert!(!approved);
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn unauthorized_sender_never_resolves() {
        let channel = FakeChannel::new(false);
        let gateway = Arc::new(gateway_with(channel.clone(), Duration::from_millis(200)));
        let (contract, intent) = aapl_limit();

        let task = {
            let gateway = gateway.clone();
            tokio::spawn(async move { gateway.request_approval(&contract, &intent).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        let prefix = channel.last_prefix();
        channel
            .inject(DecisionEvent {
                correlation_prefix: prefix,
                approved: true,
                sender_id: "999".to_string(),
            })
            .await;

        // The impostor's approval must not short-circuit the timeout
        assert!(!task.await.unwrap());
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn send_failure_is_treated_as_denial() {
        let channel = FakeChannel::new(true);
        let gateway = gateway_with(channel, Duration::from_secs(5));
        let (contract, intent) = aapl_limit();

        assert!(!gateway.request_approval(&contract, &intent).await);
        assert!(gateway.registry().is_empty());
    }

    #[tokio::test]
    async fn confirmation_failure_does_not_propagate() {
        let channel = FakeChannel::new(true);
        let gateway = gateway_with(channel, Duration::from_secs(5));
        let (contract, intent) = aapl_limit();
        let outcome = TradeOutcome::filled(
            &contract,
            &intent,
            OrderStatusReport {
                status: "Filled".to_string(),
                filled: dec!(100),
                remaining: dec!(0),
                avg_fill_price: Some(dec!(150.70)),
            },
        );

        // Must not panic or error out
        gateway.send_trade_confirmation(&outcome).await;
    }

    #[test]
    fn proposal_renders_limit_price_only_for_limit_orders() {
        let (contract, intent) = aapl_limit();
        let text = render_proposal(&contract, &intent);
        assert!(text.contains("LMT at $150.75"));

        let market = OrderIntent::market(OrderAction::Sell, 10);
        let text = render_proposal(&contract, &market);
        assert!(text.contains("Type: MKT\n"));
        assert!(!text.contains('$'));
    }

    #[test]
    fn confirmation_formats_combo_legs() {
        use crate::domain::ComboLeg;
        let contract = ContractDescriptor::combo(
            "AAPL",
            "SMART",
            vec![
                ComboLeg {
                    con_id: 111,
                    action: OrderAction::Buy,
                    ratio: 1,
                    symbol: Some("AAPL".to_string()),
                },
                ComboLeg {
                    con_id: 222,
                    action: OrderAction::Sell,
                    ratio: 1,
                    symbol: Some("MSFT".to_string()),
                },
            ],
        );
        let intent = OrderIntent::market(OrderAction::Buy, 1);
        let outcome = TradeOutcome::filled(
            &contract,
            &intent,
            OrderStatusReport {
                status: "Filled".to_string(),
                filled: dec!(1),
                remaining: dec!(0),
                avg_fill_price: Some(dec!(2.50)),
            },
        );

        let text = format_confirmation(&outcome).unwrap();
        assert!(text.contains("BUY 1x AAPL"));
        assert!(text.contains("SELL 1x MSFT"));
    }

    #[test]
    fn confirmation_without_trade_detail_falls_back() {
        assert!(format_confirmation(&TradeOutcome::not_approved()).is_none());
    }
}
