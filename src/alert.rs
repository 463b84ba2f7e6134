//! Alert construction and delivery to a DingTalk robot webhook.
//!
//! Delivery is a single attempt. Failures are logged and swallowed so a
//! broken webhook never affects the poll loop.

use crate::error::NetworkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const DINGTALK_ROBOT_URL: &str = "https://oapi.dingtalk.com/robot/send";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub content: String,
    pub at_all: bool,
    pub at_mobiles: Vec<String>,
}

impl AlertEvent {
    pub fn threshold_crossed(
        alias: &str,
        symbol: &str,
        amount: &str,
        threshold: f64,
        at_all: bool,
        at_mobiles: &[String],
    ) -> Self {
        Self {
            content: format!("{alias} {symbol} balance {amount} >= {threshold}"),
            at_all,
            at_mobiles: at_mobiles.to_vec(),
        }
    }

    /// Request body for the robot API; named mentions are appended to the text
    /// unless everyone is already notified.
    pub fn to_message(&self) -> DingTalkMessage {
        let mut content = self.content.clone();
        if !self.at_all && !self.at_mobiles.is_empty() {
            content.push_str(" \n @");
            content.push_str(&self.at_mobiles.join(" @"));
        }

        DingTalkMessage {
            msgtype: "text",
            text: TextContent { content },
            at: AtTargets {
                is_at_all: self.at_all,
                at_mobiles: self.at_mobiles.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DingTalkMessage {
    pub msgtype: &'static str,
    pub text: TextContent,
    pub at: AtTargets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AtTargets {
    pub is_at_all: bool,
    pub at_mobiles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DingTalkResponse {
    #[serde(default)]
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

/// Posts a message to a fixed, pre-configured endpoint and returns the HTTP status.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn post(&self, message: &DingTalkMessage) -> Result<u16, NetworkError>;
}

#[async_trait]
impl<T: WebhookSender + ?Sized> WebhookSender for Arc<T> {
    async fn post(&self, message: &DingTalkMessage) -> Result<u16, NetworkError> {
        (**self).post(message).await
    }
}

pub struct DingTalkWebhook {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl DingTalkWebhook {
    pub fn new(
        base_url: &str,
        access_token: &str,
        timeout: Duration,
    ) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: format!("{base_url}?access_token={access_token}"),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_error(&self, e: reqwest::Error) -> NetworkError {
        if e.is_timeout() {
            NetworkError::Timeout(self.timeout)
        } else {
            NetworkError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl WebhookSender for DingTalkWebhook {
    async fn post(&self, message: &DingTalkMessage) -> Result<u16, NetworkError> {
        let response = self
            .client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status.as_u16()));
        }

        let body: DingTalkResponse = response.json().await.map_err(|e| self.map_error(e))?;
        if body.errcode != 0 {
            return Err(NetworkError::Rejected(format!(
                "errcode {}: {}",
                body.errcode, body.errmsg
            )));
        }

        Ok(status.as_u16())
    }
}

pub struct AlertDispatcher<W> {
    sender: W,
}

impl<W: WebhookSender> AlertDispatcher<W> {
    pub fn new(sender: W) -> Self {
        Self { sender }
    }

    /// Sends `event` once. Returns whether delivery succeeded; never errors.
    pub async fn send(&self, event: &AlertEvent) -> bool {
        let message = event.to_message();
        match self.sender.post(&message).await {
            Ok(status) => {
                info!("Alert delivered (HTTP {}): {}", status, event.content);
                true
            }
            Err(e) => {
                error!("Failed to deliver alert {:?}: {}", event.content, e);
                false
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingWebhook;
    use super::*;
    use crate::rpc::test_support::{fixed_endpoint, silent_endpoint};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn builds_threshold_message() {
        let event = AlertEvent::threshold_crossed("Meson", "M-USDT", "2500.00", 2000.0, true, &[]);
        assert_eq!(event.content, "Meson M-USDT balance 2500.00 >= 2000");

        let event = AlertEvent::threshold_crossed("Meson", "M-USDT", "2500.00", 1999.5, true, &[]);
        assert_eq!(event.content, "Meson M-USDT balance 2500.00 >= 1999.5");
    }

    #[test]
    fn serializes_robot_payload() {
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "1.00", 1.0, true, &[]);
        let body = serde_json::to_value(event.to_message()).unwrap();
        assert_eq!(
            body,
            json!({
                "msgtype": "text",
                "text": { "content": "Meson WBTC balance 1.00 >= 1" },
                "at": { "isAtAll": true, "atMobiles": [] }
            })
        );
    }

    #[test]
    fn appends_mentions_when_not_at_all() {
        let mobiles = vec!["13800000000".to_string(), "13900000000".to_string()];
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, false, &mobiles);
        let message = event.to_message();

        assert_eq!(
            message.text.content,
            "Meson WBTC balance 3.00 >= 2 \n @13800000000 @13900000000"
        );
        assert_eq!(message.at.at_mobiles, mobiles);
        assert!(!message.at.is_at_all);
    }

    #[test]
    fn at_all_skips_inline_mentions() {
        let mobiles = vec!["13800000000".to_string()];
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, true, &mobiles);
        assert_eq!(
            event.to_message().text.content,
            "Meson WBTC balance 3.00 >= 2"
        );
    }

    #[test]
    fn webhook_url_carries_token() {
        let webhook =
            DingTalkWebhook::new(DINGTALK_ROBOT_URL, "abc123", Duration::from_secs(5)).unwrap();
        assert_eq!(
            webhook.url(),
            "https://oapi.dingtalk.com/robot/send?access_token=abc123"
        );
    }

    #[tokio::test]
    async fn dispatch_sends_once() {
        let webhook = Arc::new(RecordingWebhook::default());
        let dispatcher = AlertDispatcher::new(webhook.clone());
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, true, &[]);

        assert!(dispatcher.send(&event).await);
        assert_eq!(webhook.sent(), vec![event.to_message()]);
    }

    #[tokio::test]
    async fn dispatch_failure_is_swallowed_without_retry() {
        let webhook = Arc::new(RecordingWebhook::failing());
        let dispatcher = AlertDispatcher::new(webhook.clone());
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, true, &[]);

        assert!(!dispatcher.send(&event).await);
        assert_eq!(webhook.sent().len(), 1);
    }

    fn threshold_message() -> DingTalkMessage {
        AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, true, &[]).to_message()
    }

    #[tokio::test]
    async fn webhook_times_out_on_silent_endpoint() {
        let base_url = format!("{}/robot/send", silent_endpoint().await);
        let timeout = Duration::from_millis(200);
        let webhook = DingTalkWebhook::new(&base_url, "abc123", timeout).unwrap();

        let result = webhook.post(&threshold_message()).await;

        assert_eq!(result, Err(NetworkError::Timeout(timeout)));
    }

    #[tokio::test]
    async fn webhook_reports_http_status() {
        let endpoint = fixed_endpoint(500, r#"{"errcode":0,"errmsg":"ok"}"#).await;
        let base_url = format!("{}/robot/send", endpoint.url);
        let webhook = DingTalkWebhook::new(&base_url, "abc123", Duration::from_secs(5)).unwrap();

        let result = webhook.post(&threshold_message()).await;

        assert_eq!(result, Err(NetworkError::Status(500)));
    }

    #[tokio::test]
    async fn webhook_reports_robot_rejection() {
        let body = r#"{"errcode":310000,"errmsg":"keywords not in content"}"#;
        let endpoint = fixed_endpoint(200, body).await;
        let base_url = format!("{}/robot/send", endpoint.url);
        let webhook = DingTalkWebhook::new(&base_url, "abc123", Duration::from_secs(5)).unwrap();

        let result = webhook.post(&threshold_message()).await;

        let rejected = NetworkError::Rejected("errcode 310000: keywords not in content".into());
        assert_eq!(result, Err(rejected));
    }

    #[tokio::test]
    async fn webhook_posts_json_with_token() {
        let endpoint = fixed_endpoint(200, r#"{"errcode":0,"errmsg":"ok"}"#).await;
        let base_url = format!("{}/robot/send", endpoint.url);
        let webhook = DingTalkWebhook::new(&base_url, "abc123", Duration::from_secs(5)).unwrap();
        let dispatcher = AlertDispatcher::new(webhook);
        let event = AlertEvent::threshold_crossed("Meson", "WBTC", "3.00", 2.0, true, &[]);

        assert!(dispatcher.send(&event).await);

        let requests = endpoint.requests();
        assert_eq!(requests.len(), 1);
        let request_line = requests[0].lines().next().unwrap_or_default();
        assert_eq!(
            request_line,
            "POST /robot/send?access_token=abc123 HTTP/1.1"
        );
        let (_, body) = requests[0].split_once("\r\n\r\n").unwrap();
        let body: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(body, serde_json::to_value(event.to_message()).unwrap());
    }
}
