use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::NotificationSender;

#[derive(Debug, Clone, PartialEq)]
pub enum SentNotification {
    Email {
        to: String,
        subject: String,
        body: String,
        attachment: Option<PathBuf>,
    },
    Sms {
        to: String,
        body: String,
    },
}

/// Records every send instead of delivering it. Used in mock mode and tests.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    fail_email: bool,
    fail_sms: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every email send fails (SMS still succeeds).
    pub fn failing_email() -> Self {
        Self {
            fail_email: true,
            ..Self::default()
        }
    }

    pub fn failing_sms() -> Self {
        Self {
            fail_sms: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn emails_to(&self, to: &str) -> Vec<SentNotification> {
        self.sent()
            .into_iter()
            .filter(|n| matches!(n, SentNotification::Email { to: t, .. } if t == to))
            .collect()
    }

    fn record(&self, notification: SentNotification) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("notification log lock poisoned"))?
            .push(notification);
        Ok(())
    }
}

#[async_trait]
impl NotificationSender for RecordingNotifier {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        if self.fail_email {
            anyhow::bail!("mock email failure");
        }
        tracing::info!(to = %to, subject = %subject, "[mock] email");
        self.record(SentNotification::Email {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            attachment: attachment.map(Path::to_path_buf),
        })
    }

    async fn send_sms(&self, to: &str, body: &str) -> anyhow::Result<()> {
        if self.fail_sms {
            anyhow::bail!("mock sms failure");
        }
        tracing::info!(to = %to, "[mock] sms");
        self.record(SentNotification::Sms {
            to: to.to_string(),
            body: body.to_string(),
        })
    }
}
