use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

use crate::error::NotificationError;
use crate::types::{AttendanceNotice, DispatchResult};

type HmacSha256 = Hmac<Sha256>;

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notice: &AttendanceNotice) -> Result<DispatchResult, NotificationError>;

    fn name(&self) -> &'static str;
}

/// Dispatcher that only records notices in the log.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notice: &AttendanceNotice) -> Result<DispatchResult, NotificationError> {
        tracing::info!(
            section = %notice.section_id,
            date = %notice.date,
            marked_by = %notice.marked_by,
            written = notice.written,
            absent = notice.absent_student_ids.len(),
            "attendance notice"
        );
        Ok(DispatchResult::delivered())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <api_key>`.
    pub api_key: Option<String>,
    /// Signs the body into `X-Signature-256`.
    pub secret: Option<String>,
    pub timeout: Duration,
}

/// Posts notices as JSON to the hosted push function.
pub struct WebhookDispatcher {
    http_client: Client,
    config: WebhookConfig,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Result<Self, NotificationError> {
        if config.url.trim().is_empty() {
            return Err(NotificationError::InvalidConfig("Missing webhook_url".into()));
        }
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn sign_payload(payload: &str, secret: &str) -> Result<String, NotificationError> {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::InvalidConfig(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, notice: &AttendanceNotice) -> Result<DispatchResult, NotificationError> {
        let payload = serde_json::to_string(notice)
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let mut request = self
            .http_client
            .post(&self.config.url)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        // Add HMAC signature if secret is configured
        if let Some(secret) = &self.config.secret {
            let signature = Self::sign_payload(&payload, secret)?;
            request = request.header("X-Signature-256", format!("sha256={signature}"));
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(DispatchResult::delivered())
        } else {
            let body = response.text().await.unwrap_or_default();
            Ok(DispatchResult::failed(format!("Webhook failed ({status}): {body}")))
        }
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
