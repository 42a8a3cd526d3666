pub mod email;
pub mod mock;
pub mod twilio;

use std::path::Path;

use async_trait::async_trait;

pub use email::MailRelayClient;
pub use mock::{RecordingNotifier, SentNotification};
pub use twilio::TwilioSmsClient;

/// Outbound patient notifications. Errors are reported to the caller, who
/// logs them and records the delivery flag as `false`.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()>;

    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

/// Real delivery: SMS through Twilio, email through an HTTP mail relay.
/// A channel without credentials fails every send.
pub struct DeliveryNotifier {
    sms: Option<TwilioSmsClient>,
    email: Option<MailRelayClient>,
}

impl DeliveryNotifier {
    pub fn new(sms: Option<TwilioSmsClient>, email: Option<MailRelayClient>) -> Self {
        if sms.is_none() {
            tracing::warn!("twilio credentials missing, SMS delivery disabled");
        }
        if email.is_none() {
            tracing::warn!("EMAIL_API_URL not set, email delivery disabled");
        }
        Self { sms, email }
    }
}

#[async_trait]
impl NotificationSender for DeliveryNotifier {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        let Some(client) = &self.email else {
            anyhow::bail!("email delivery is not configured");
        };
        client.send(to, subject, body, attachment).await
    }

    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let Some(client) = &self.sms else {
            anyhow::bail!("SMS delivery is not configured");
        };
        client.send(to, body).await
    }
}
