//! Outbound mail delivery for invitation and provisioning notices.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail provider request failed: {0}")]
    Transport(String),
    #[error("mail provider rejected the message: {0}")]
    Rejected(String),
    #[error("mail provider is not configured")]
    NotConfigured,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends one HTML message and returns the provider's delivery id.
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<String, MailError>;
}

/// Posts messages as JSON to an HTTP mail provider.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    provider_url: String,
    api_key: Option<String>,
    from_address: String,
}

#[derive(Deserialize)]
struct ProviderResponse {
    id: String,
}

impl HttpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        let provider_url = config
            .provider_url
            .clone()
            .ok_or(MailError::NotConfigured)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            provider_url,
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<String, MailError> {
        let mut request = self.client.post(&self.provider_url).json(&json!({
            "from": self.from_address,
            "to": to,
            "subject": subject,
            "html": html_body,
        }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected(format!("{status}: {body}")));
        }

        let parsed: ProviderResponse = response
            .json()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(parsed.id)
    }
}

/// Development mailer: logs the message instead of delivering it.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _html_body: &str) -> Result<String, MailError> {
        let delivery_id = format!("log-{}", uuid::Uuid::new_v4());
        info!(to = %to, subject = %subject, delivery_id = %delivery_id, "Mail logged (no provider configured)");
        Ok(delivery_id)
    }
}

/// Capturing mailer for test suites: records every message and can be told
/// to fail deliveries, so callers' failure paths can be exercised.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    inner: std::sync::Arc<RecordingInner>,
}

#[derive(Default)]
struct RecordingInner {
    sent: std::sync::Mutex<Vec<SentMail>>,
    fail: std::sync::atomic::AtomicBool,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_deliveries(&self, fail: bool) {
        self.inner
            .fail
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.inner.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<String, MailError> {
        if self.inner.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(MailError::Transport("simulated delivery failure".into()));
        }
        self.inner.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(format!("rec-{}", uuid::Uuid::new_v4()))
    }
}
