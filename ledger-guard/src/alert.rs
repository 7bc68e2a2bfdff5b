//! Best-effort security alerts
//!
//! One attempt per alert, failures logged and swallowed. Alerting must never
//! fail the security workflow that triggered it. No channel configured means
//! every `send` is a silent no-op.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use crate::config::AlertConfig;

/// Alert kind dispatched after a successful block upsert
pub const IP_BLOCKED: &str = "IP_BLOCKED";

/// 告警投递失败（始终在 dispatcher 内部吞掉）
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("alert transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("alert channel rejected message: HTTP {0}")]
    Rejected(u16),
}

/// One notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub kind: String,
    pub details: String,
}

impl Alert {
    pub fn new(kind: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            details: details.into(),
        }
    }

    /// Plain-text body sent to the channel
    pub fn message(&self) -> String {
        format!("🚨 *Security Alert: {}*\n{}", self.kind, self.details)
    }
}

/// External notification channel
#[async_trait]
pub trait AlertChannel: Send + Sync {
    async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError>;
}

/// Incoming-webhook channel (Slack compatible: `{"text": "..."}`)
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: std::time::Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": alert.message() }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// Collects alerts in memory (tests, dry runs)
#[derive(Default)]
pub struct MemoryChannel {
    sent: Mutex<Vec<Alert>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Alert> {
        self.sent.lock().clone()
    }

    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent.lock().iter().map(|a| a.kind.clone()).collect()
    }
}

#[async_trait]
impl AlertChannel for MemoryChannel {
    async fn deliver(&self, alert: &Alert) -> Result<(), DeliveryError> {
        self.sent.lock().push(alert.clone());
        Ok(())
    }
}

/// Single-attempt alert dispatcher
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    channel: Option<Arc<dyn AlertChannel>>,
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl AlertDispatcher {
    pub fn new(channel: Arc<dyn AlertChannel>) -> Self {
        Self {
            channel: Some(channel),
        }
    }

    /// Alerting disabled; `send` does nothing
    pub fn disabled() -> Self {
        Self { channel: None }
    }

    /// Webhook channel if a URL is configured.
    ///
    /// A channel that cannot be built is logged and treated as absent.
    pub fn from_config(config: &AlertConfig) -> Self {
        let Some(url) = &config.webhook_url else {
            tracing::info!("Security alert webhook not configured, alerts disabled");
            return Self::disabled();
        };

        match WebhookChannel::new(url.clone(), config.timeout) {
            Ok(channel) => Self::new(Arc::new(channel)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build alert webhook client, alerts disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.channel.is_some()
    }

    /// Deliver once; never fails.
    pub async fn send(&self, kind: &str, details: &str) {
        let Some(channel) = &self.channel else {
            return;
        };

        let alert = Alert::new(kind, details);
        match channel.deliver(&alert).await {
            Ok(()) => tracing::debug!(kind = kind, "Security alert delivered"),
            Err(e) => tracing::warn!(kind = kind, error = %e, "Failed to send security alert"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct BrokenChannel {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AlertChannel for BrokenChannel {
        async fn deliver(&self, _alert: &Alert) -> Result<(), DeliveryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(DeliveryError::Rejected(503))
        }
    }

    #[test]
    fn message_format() {
        let alert = Alert::new("SQLI_ATTEMPT", "IP: 1.2.3.4\nDetails: ' OR 1=1");
        assert_eq!(
            alert.message(),
            "🚨 *Security Alert: SQLI_ATTEMPT*\nIP: 1.2.3.4\nDetails: ' OR 1=1"
        );
    }

    #[tokio::test]
    async fn disabled_dispatcher_is_a_no_op() {
        let dispatcher = AlertDispatcher::from_config(&AlertConfig::default());
        assert!(!dispatcher.is_enabled());
        dispatcher.send(IP_BLOCKED, "nothing happens").await;
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed_after_one_attempt() {
        let channel = Arc::new(BrokenChannel {
            attempts: AtomicUsize::new(0),
        });
        let dispatcher = AlertDispatcher::new(channel.clone());

        dispatcher.send(IP_BLOCKED, "details").await;
        assert_eq!(channel.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_swallowed() {
        // Port 9 (discard) on localhost: connection refused or timeout
        let dispatcher = AlertDispatcher::from_config(&AlertConfig {
            webhook_url: Some("http://127.0.0.1:9/hook".into()),
            timeout: std::time::Duration::from_millis(200),
        });
        assert!(dispatcher.is_enabled());
        dispatcher.send("SQLI_ATTEMPT", "details").await;
    }

    /// One-shot HTTP endpoint: answers the first request with `status` and
    /// hands back the request body.
    async fn serve_once(
        status: &'static str,
    ) -> (String, tokio::task::JoinHandle<serde_json::Value>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            let body = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before full request");
                buf.extend_from_slice(&chunk[..n]);

                let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                    continue;
                };
                let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
                let len: usize = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse().unwrap())
                    .unwrap_or(0);
                let start = head_end + 4;
                if buf.len() >= start + len {
                    break buf[start..start + len].to_vec();
                }
            };

            let response =
                format!("HTTP/1.1 {status}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            serde_json::from_slice(&body).unwrap()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn webhook_posts_slack_text_body() {
        let (url, server) = serve_once("200 OK").await;
        let channel = WebhookChannel::new(url, std::time::Duration::from_secs(5)).unwrap();

        channel
            .deliver(&Alert::new(IP_BLOCKED, "IP: 1.2.3.4\nReason: test"))
            .await
            .unwrap();

        let body = server.await.unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "text": "🚨 *Security Alert: IP_BLOCKED*\nIP: 1.2.3.4\nReason: test" })
        );
    }

    #[tokio::test]
    async fn webhook_non_success_status_is_rejected() {
        let (url, server) = serve_once("500 Internal Server Error").await;
        let channel = WebhookChannel::new(url, std::time::Duration::from_secs(5)).unwrap();

        let err = channel
            .deliver(&Alert::new("SQLI_ATTEMPT", "IP: 1.2.3.4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeliveryError::Rejected(500)), "{err:?}");

        let body = server.await.unwrap();
        assert_eq!(body["text"], "🚨 *Security Alert: SQLI_ATTEMPT*\nIP: 1.2.3.4");
    }

    #[tokio::test]
    async fn memory_channel_records_alerts() {
        let channel = Arc::new(MemoryChannel::new());
        let dispatcher = AlertDispatcher::new(channel.clone());
        dispatcher.send(IP_BLOCKED, "IP: 1.2.3.4").await;
        assert_eq!(channel.sent(), vec![Alert::new(IP_BLOCKED, "IP: 1.2.3.4")]);
    }
}
