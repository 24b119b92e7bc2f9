//! Delivery of newly archived documents
//!
//! Runs once after a successful run. Delivery is best effort: failures are
//! reported in the receipts and never retried.

use crate::config::{NotifyConfig, UserAgentConfig};
use crate::fetch::build_http_client;
use crate::storage::ArchiveRecord;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Outcome of delivering one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub channel: String,
    pub doc_id: String,
    pub status: DeliveryStatus,
    /// Response body or error text, when there is one
    pub response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, records: &[ArchiveRecord]) -> Vec<NotificationReceipt>;
}

/// Writes one log line per document
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, records: &[ArchiveRecord]) -> Vec<NotificationReceipt> {
        records
            .iter()
            .map(|record| {
                tracing::info!(
                    "New document [{}] {} {} ({})",
                    record.module_id,
                    record.publish_date.as_deref().unwrap_or("unknown"),
                    record.title,
                    record.source_url
                );
                NotificationReceipt {
                    channel: "log".to_string(),
                    doc_id: record.doc_id.clone(),
                    status: DeliveryStatus::Delivered,
                    response: None,
                }
            })
            .collect()
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    #[serde(flatten)]
    record: &'a ArchiveRecord,
}

/// POSTs each document as JSON to a webhook
pub struct WebhookNotifier {
    client: Client,
    url: String,
    channel: String,
}

impl WebhookNotifier {
    pub fn new(client: Client, url: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, records: &[ArchiveRecord]) -> Vec<NotificationReceipt> {
        let mut receipts = Vec::with_capacity(records.len());

        for record in records {
            let payload = WebhookPayload {
                channel: &self.channel,
                record,
            };
            let result = self
                .client
                .post(&self.url)
                .timeout(Duration::from_secs(30))
                .json(&payload)
                .send()
                .await;

            let (status, response) = match result {
                Ok(resp) if resp.status().is_success() => {
                    (DeliveryStatus::Delivered, resp.text().await.ok())
                }
                Ok(resp) => {
                    let code = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    (DeliveryStatus::Failed, Some(format!("HTTP {}: {}", code, body)))
                }
                Err(e) => (DeliveryStatus::Failed, Some(e.to_string())),
            };

            if status == DeliveryStatus::Failed {
                tracing::warn!(
                    "Notification for {} via {} failed: {}",
                    record.doc_id,
                    self.channel,
                    response.as_deref().unwrap_or("")
                );
            }

            receipts.push(NotificationReceipt {
                channel: self.channel.clone(),
                doc_id: record.doc_id.clone(),
                status,
                response,
            });
        }

        receipts
    }
}

/// Picks the notifier for a configuration: a webhook when one is configured,
/// the log otherwise
pub fn build_notifier(
    notify: Option<&NotifyConfig>,
    user_agent: &UserAgentConfig,
) -> Result<Box<dyn Notifier>, reqwest::Error> {
    match notify.and_then(|n| n.webhook_url.as_deref().map(|url| (n, url))) {
        Some((config, url)) => {
            let client = build_http_client(user_agent)?;
            Ok(Box::new(WebhookNotifier::new(client, url, config.channel.clone())))
        }
        None => Ok(Box::new(LogNotifier)),
    }
}
