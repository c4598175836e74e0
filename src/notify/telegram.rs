//! Telegram Bot API channel.
//!
//! Approval prompts go out as Markdown messages with an inline keyboard; the
//! decision stream long-polls `getUpdates` and translates callback queries
//! into [`DecisionEvent`]s. Callback payloads carry the correlation id prefix
//! and the verdict as compact JSON to stay under the 64-byte callback limit.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::config::TelegramConfig;
use crate::error::{OrdergateError, Result};

use super::{DecisionControls, DecisionEvent, NotificationChannel};

/// Long-poll timeout for getUpdates, in seconds
const POLL_TIMEOUT_SECS: u64 = 30;

pub struct TelegramChannel {
    client: Client,
    base_url: String,
    chat_id: String,
    send_timeout: Duration,
    listening: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: TelegramUser,
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
}

/// Compact callback payload: {"id": "<prefix>", "a": true|false}
#[derive(Debug, Deserialize)]
struct CallbackPayload {
    id: String,
    a: bool,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", config.api_url, config.bot_token),
            chat_id: config.allowed_user_id.clone(),
            send_timeout: Duration::from_secs(config.send_timeout_secs),
            listening: AtomicBool::new(false),
        }
    }

    /// Outbound sends are bounded so a hung Bot API connection cannot stall
    /// an approval request before its decision timeout starts.
    async fn call(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(self.send_timeout)
            .send()
            .await
            .map_err(|e| OrdergateError::ChannelSend(e.to_string()))?;

        let parsed: ApiResponse<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| OrdergateError::ChannelSend(e.to_string()))?;

        if !parsed.ok {
            return Err(OrdergateError::ChannelSend(
                parsed
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            ));
        }
        Ok(parsed.result.unwrap_or(serde_json::Value::Null))
    }

    async fn poll_updates(client: &Client, base_url: &str, offset: i64) -> Result<Vec<Update>> {
        let url = format!("{base_url}/getUpdates");
        let response = client
            .post(&url)
            .json(&serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["callback_query"],
            }))
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .send()
            .await
            .map_err(|e| OrdergateError::ChannelSend(e.to_string()))?;

        let parsed: ApiResponse<Vec<Update>> = response
            .json()
            .await
            .map_err(|e| OrdergateError::ChannelSend(e.to_string()))?;

        if !parsed.ok {
            return Err(OrdergateError::ChannelSend(
                parsed
                    .description
                    .unwrap_or_else(|| "getUpdates failed".to_string()),
            ));
        }
        Ok(parsed.result.unwrap_or_default())
    }

    /// Acknowledge a callback so the client stops its spinner; best-effort
    async fn answer_callback(client: &Client, base_url: &str, callback_id: &str, text: &str) {
        let url = format!("{base_url}/answerCallbackQuery");
        let body = serde_json::json!({
            "callback_query_id": callback_id,
            "text": text,
        });
        if let Err(e) = client.post(&url).json(&body).send().await {
            debug!("answerCallbackQuery failed: {}", e);
        }
    }

    fn translate(query: CallbackQuery) -> Option<(String, DecisionEvent)> {
        let data = query.data?;
        let payload: CallbackPayload = match serde_json::from_str(&data) {
            Ok(p) => p,
            Err(e) => {
                warn!("Malformed callback payload {:?}: {}", data, e);
                return None;
            }
        };
        Some((
            query.id,
            DecisionEvent {
                correlation_prefix: payload.id,
                approved: payload.a,
                sender_id: query.from.id.to_string(),
            },
        ))
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send_message(&self, text: &str) -> Result<()> {
        self.call(
            "sendMessage",
            serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }),
        )
        .await?;
        Ok(())
    }

    async fn send_approval_prompt(&self, text: &str, controls: &DecisionControls) -> Result<()> {
        let approve = serde_json::json!({"id": controls.correlation_prefix, "a": true});
        let reject = serde_json::json!({"id": controls.correlation_prefix, "a": false});

        self.call(
            "sendMessage",
            serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "reply_markup": {
                    "inline_keyboard": [[
                        {"text": "\u{2705} Approve", "callback_data": approve.to_string()},
                        {"text": "\u{274c} Reject", "callback_data": reject.to_string()},
                    ]],
                },
            }),
        )
        .await?;
        Ok(())
    }

    async fn start_decision_stream(&self, tx: mpsc::Sender<DecisionEvent>) -> Result<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            debug!("Decision stream already running");
            return Ok(());
        }

        let client = self.client.clone();
        let base_url = self.base_url.clone();

        tokio::spawn(async move {
            let mut offset = 0i64;
            loop {
                let updates = match Self::poll_updates(&client, &base_url, offset).await {
                    Ok(updates) => updates,
                    Err(e) => {
                        error!("Decision poll failed: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = offset.max(update.update_id + 1);
                    let Some(query) = update.callback_query else {
                        continue;
                    };
                    let Some((callback_id, event)) = Self::translate(query) else {
                        continue;
                    };

                    let verdict = if event.approved { "approved" } else { "rejected" };
                    Self::answer_callback(&client, &base_url, &callback_id, &format!("Trade {verdict}"))
                        .await;

                    if tx.send(event).await.is_err() {
                        debug!("Decision consumer dropped, stopping stream");
                        return;
                    }
                }
            }
        });

        Ok(())
    }
}
