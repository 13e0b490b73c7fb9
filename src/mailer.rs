use crate::google_auth::GoogleAuth;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::json;
use std::sync::Mutex;

pub const DEFAULT_GMAIL_API: &str = "https://gmail.googleapis.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingMail {
    pub fn new(to: &str, subject: &str, body: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    /// Minimal RFC 822 rendering, enough for the Gmail `raw` field.
    pub fn to_rfc822(&self) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
            self.to.replace(['\r', '\n'], " "),
            encode_header(&self.subject.replace(['\r', '\n'], " ")),
            self.body
        )
    }
}

/// RFC 2047 encoded-word for header values that are not plain ASCII.
fn encode_header(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(value))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail authorization failed: {0}")]
    Auth(String),
    #[error("Mail request failed: {0}")]
    Request(String),
    #[error("Mail API error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// The host's mail-draft and mail-send facility.
#[async_trait]
pub trait MailFacility: Send + Sync {
    async fn create_draft(&self, mail: &OutgoingMail) -> Result<(), MailError>;
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Logs every draft and send and keeps them in memory.
#[derive(Debug, Default)]
pub struct LogMailer {
    drafts: Mutex<Vec<OutgoingMail>>,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl LogMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drafts(&self) -> Vec<OutgoingMail> {
        self.drafts.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MailFacility for LogMailer {
    async fn create_draft(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        log::info!("Draft for {} ({}):\n{}", mail.to, mail.subject, mail.body);
        if let Ok(mut drafts) = self.drafts.lock() {
            drafts.push(mail.clone());
        }
        Ok(())
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        log::info!("Sending to {} ({})", mail.to, mail.subject);
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail.clone());
        }
        Ok(())
    }
}

/// Gmail REST mailer acting as the authorized user (`users/me`).
pub struct GmailMailer {
    client: reqwest::Client,
    auth: GoogleAuth,
    api_base: String,
}

impl GmailMailer {
    pub fn new(auth: GoogleAuth, api_base: Option<&str>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            api_base: api_base
                .unwrap_or(DEFAULT_GMAIL_API)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<(), MailError> {
        let token = self
            .auth
            .access_token()
            .await
            .map_err(|e| MailError::Auth(e.to_string()))?;

        let response = self
            .client
            .post(format!("{}/gmail/v1/users/me/{}", self.api_base, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    fn raw(mail: &OutgoingMail) -> String {
        URL_SAFE_NO_PAD.encode(mail.to_rfc822())
    }
}

#[async_trait]
impl MailFacility for GmailMailer {
    async fn create_draft(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.post("drafts", json!({ "message": { "raw": Self::raw(mail) } }))
            .await?;
        log::info!("Draft created in Gmail for {}", mail.to);
        Ok(())
    }

    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.post("messages/send", json!({ "raw": Self::raw(mail) }))
            .await?;
        log::info!("Mail sent to {}", mail.to);
        Ok(())
    }
}
