//! Webhook analysis adapter - Implements MailAnalysisPort over HTTP
//!
//! Notifies a downstream classifier that an account has freshly synced mail.
//! The classifier reads the messages from the shared store itself.

use std::time::Duration;

use application::{error::ApplicationError, ports::MailAnalysisPort};
use async_trait::async_trait;
use domain::AccountId;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct AnalysisRequest<'a> {
    account_id: &'a AccountId,
    count: usize,
}

/// POSTs `{account_id, count}` to a configured URL
#[derive(Debug, Clone)]
pub struct WebhookMailAnalysisAdapter {
    client: Client,
    url: String,
}

impl WebhookMailAnalysisAdapter {
    /// Create an adapter posting to `url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to initialize.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApplicationError::Internal(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MailAnalysisPort for WebhookMailAnalysisAdapter {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn analyze_new(
        &self,
        account_id: &AccountId,
        count: usize,
    ) -> Result<(), ApplicationError> {
        let response = self
            .client
            .post(&self.url)
            .json(&AnalysisRequest { account_id, count })
            .send()
            .await
            .map_err(|e| ApplicationError::ExternalService(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApplicationError::ExternalService(format!(
                "Analysis webhook returned {status}: {body}"
            )));
        }

        debug!(%account_id, count, "Analysis webhook accepted");
        Ok(())
    }
}
