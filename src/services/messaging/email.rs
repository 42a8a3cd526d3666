use std::path::Path;

use anyhow::Context;
use base64::Engine;
use serde_json::json;

/// Posts messages to an HTTP mail relay (`{from, to, subject, text,
/// attachments}` with bearer auth). Attachments travel base64-encoded.
pub struct MailRelayClient {
    url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl MailRelayClient {
    pub fn new(url: String, api_key: String, from: String) -> Self {
        Self {
            url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_parts(url: &str, api_key: &str, from: &str) -> Option<Self> {
        if url.is_empty() {
            return None;
        }
        Some(Self::new(url.to_string(), api_key.to_string(), from.to_string()))
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        attachment: Option<&Path>,
    ) -> anyhow::Result<()> {
        let mut attachments = Vec::new();
        if let Some(path) = attachment {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read attachment {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "attachment".to_string());
            attachments.push(json!({
                "filename": filename,
                "content_type": content_type(path),
                "content": base64::engine::general_purpose::STANDARD.encode(bytes),
            }));
        }

        let payload = json!({
            "from": self.from,
            "to": to,
            "subject": subject,
            "text": body,
            "attachments": attachments,
        });

        let mut request = self.client.post(&self.url).json(&payload);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        request
            .send()
            .await
            .context("failed to reach mail relay")?
            .error_for_status()
            .context("mail relay returned error")?;

        tracing::info!(to = %to, subject = %subject, "email sent");
        Ok(())
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type(Path::new("forms/intake.pdf")), "application/pdf");
        assert_eq!(content_type(Path::new("intake")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_missing_attachment_fails_before_sending() {
        let client = MailRelayClient::new(
            "http://127.0.0.1:9/send".to_string(),
            String::new(),
            "clinic@example.com".to_string(),
        );
        let err = client
            .send(
                "a@b.co",
                "subject",
                "body",
                Some(Path::new("/definitely/not/here.pdf")),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read attachment"));
    }
}
