use anyhow::Context;

pub struct TwilioSmsClient {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioSmsClient {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }

    /// `None` unless all three credentials are set.
    pub fn from_parts(account_sid: &str, auth_token: &str, from_number: &str) -> Option<Self> {
        if account_sid.is_empty() || auth_token.is_empty() || from_number.is_empty() {
            return None;
        }
        Some(Self::new(
            account_sid.to_string(),
            auth_token.to_string(),
            from_number.to_string(),
        ))
    }

    pub async fn send(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let to = to_e164(to);

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .context("failed to send Twilio SMS")?
            .error_for_status()
            .context("Twilio API returned error")?;

        tracing::info!(to = %to, "sms sent");
        Ok(())
    }
}

/// Patient phones are stored display-formatted; Twilio wants E.164.
pub fn to_e164(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        10 => format!("+1{digits}"),
        11 if digits.starts_with('1') => format!("+{digits}"),
        _ if phone.trim_start().starts_with('+') => format!("+{digits}"),
        _ => phone.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_e164() {
        assert_eq!(to_e164("(555) 123-4567"), "+15551234567");
        assert_eq!(to_e164("+1 (555) 123-4567"), "+15551234567");
        assert_eq!(to_e164("+44 20 7946 0958"), "+442079460958");
    }

    #[test]
    fn test_from_parts_requires_all_credentials() {
        assert!(TwilioSmsClient::from_parts("AC1", "", "+15550000000").is_none());
        assert!(TwilioSmsClient::from_parts("AC1", "tok", "+15550000000").is_some());
    }
}
