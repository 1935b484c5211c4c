//! Text message delivery.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::SmsConfig;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), SmsError>;
}

/// Twilio Messages API.
pub struct TwilioSms {
    client: reqwest::Client,
    config: SmsConfig,
}

impl TwilioSms {
    pub fn new(client: reqwest::Client, config: SmsConfig) -> Self {
        Self { client, config }
    }

    fn endpoint(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.config.api_base.trim_end_matches('/'), self.config.account_sid)
    }
}

#[async_trait]
impl SmsTransport for TwilioSms {
    async fn send(&self, to: &str, from: &str, body: &str) -> Result<(), SmsError> {
        let response = self.client
            .post(self.endpoint())
            .basic_auth(&self.config.account_sid, Some(self.config.auth_token.expose_secret()))
            .form(&[("To", to), ("From", from), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SmsError::Rejected { status: status.as_u16(), body });
        }
        tracing::debug!(to = %to, "SMS accepted by provider");
        Ok(())
    }
}
