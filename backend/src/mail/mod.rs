//! Outbound email.
//!
//! Delivery goes through the provider's HTTP API. The transport sits behind
//! the `Mailer` trait so tests can substitute a recording implementation and
//! unconfigured environments fall back to logging.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MailConfig;

#[derive(Debug, Clone, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()>;
}

/// Sends through the provider mail HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    config: MailConfig,
}

#[derive(Serialize)]
struct ProviderPayload<'a> {
    from: String,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(config: MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        let payload = ProviderPayload {
            from: format!("{} <{}>", self.config.from_name, self.config.from_address),
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_token)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Mail API returned {}: {}", status, body);
        }

        Ok(())
    }
}

/// Logs instead of sending. Used when no mail credentials are configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, message: &MailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, "Mail not configured; dropping email");
        Ok(())
    }
}

/// The invitation email for one recipient. Acceptance links embed the stored
/// single-use token, so a resend reuses the same link.
pub fn invite_email(
    base_url: &str,
    organisation_name: &str,
    sender_name: &str,
    email: &str,
    token: &str,
) -> MailMessage {
    let link = format!("{}/organisation/invite/{}", base_url.trim_end_matches('/'), token);

    MailMessage {
        to: email.to_string(),
        subject: format!("You have been invited to join {} on Quillsign", organisation_name),
        text: format!(
            "{sender_name} has invited you to join the organisation {organisation_name} on Quillsign.\n\n\
             Accept the invitation: {link}\n\n\
             If you were not expecting this invitation, you can ignore this email.",
        ),
    }
}
