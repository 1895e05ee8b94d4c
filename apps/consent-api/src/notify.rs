//! Submission alerts over HTTP

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use consent_core::notification::notification_message;
use consent_core::{NotificationError, Notifier, SubmissionRecord};

/// Posts the plain-text alert to a topic URL
#[derive(Debug, Clone)]
pub struct HttpNotifier {
    client: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.url)
            .header("content-type", "text/plain; charset=utf-8")
            .body(notification_message(record))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::Timeout
                } else {
                    NotificationError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
