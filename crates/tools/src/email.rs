use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use boardroom_common::{BoardroomError, Result, Tool, ToolContext, ToolDefinition, parse_args};
use reqwest::StatusCode;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::EmailConfig;

/// Sends mail through the Gmail REST API as the configured sender.
pub struct GmailMailer {
    http: reqwest::Client,
    config: EmailConfig,
    access_token: Mutex<Option<String>>,
}

impl GmailMailer {
    pub fn new(http: reqwest::Client, config: EmailConfig) -> Self {
        let access_token = Mutex::new(config.access_token.clone());
        Self {
            http,
            config,
            access_token,
        }
    }

    pub async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let sender = self.config.sender_email.as_deref().ok_or_else(|| {
            BoardroomError::Tool("sender email is not configured (BOARDROOM_SENDER_EMAIL)".to_string())
        })?;
        let receiver = self.config.receiver_email.as_deref().ok_or_else(|| {
            BoardroomError::Tool(
                "receiver email is not configured (BOARDROOM_RECEIVER_EMAIL)".to_string(),
            )
        })?;

        let message = build_message(&self.config.sender_name, sender, receiver, subject, body);
        let raw = URL_SAFE_NO_PAD.encode(message.as_bytes());

        let cached = self.access_token.lock().await.clone();
        let token = match cached {
            Some(token) => token,
            None => self.refresh().await?,
        };

        match self.post_message(&token, &raw).await {
            Err(SendError::Unauthorized) if self.can_refresh() => {
                warn!("Gmail access token rejected, refreshing");
                let token = self.refresh().await?;
                self.post_message(&token, &raw)
                    .await
                    .map_err(SendError::into_error)
            }
            other => other.map_err(SendError::into_error),
        }?;

        info!(to = receiver, subject, "Email sent");
        Ok(())
    }

    fn can_refresh(&self) -> bool {
        self.config.refresh_token.is_some()
            && self.config.client_id.is_some()
            && self.config.client_secret.is_some()
    }

    async fn post_message(&self, token: &str, raw: &str) -> std::result::Result<(), SendError> {
        let url = format!(
            "{}/users/me/messages/send",
            self.config.api_url.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "raw": raw }))
            .send()
            .await
            .map_err(|e| SendError::Other(format!("Failed to send email: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(SendError::Unauthorized);
        }
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(SendError::Other(format!("Gmail API error ({status}): {error}")));
        }
        Ok(())
    }

    /// Exchange the refresh token for a new access token and cache it.
    async fn refresh(&self) -> Result<String> {
        let (Some(refresh_token), Some(client_id), Some(client_secret)) = (
            self.config.refresh_token.as_deref(),
            self.config.client_id.as_deref(),
            self.config.client_secret.as_deref(),
        ) else {
            return Err(BoardroomError::Tool(
                "Gmail credentials are not configured (GMAIL_ACCESS_TOKEN or GMAIL_REFRESH_TOKEN with client id and secret)"
                    .to_string(),
            ));
        };

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Failed to refresh token: {e}")))?;

        if !response.status().is_success() {
            let error = response.text().await.unwrap_or_default();
            return Err(BoardroomError::Tool(format!("Token refresh failed: {error}")));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| BoardroomError::Tool(format!("Failed to parse token response: {e}")))?;

        *self.access_token.lock().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

enum SendError {
    Unauthorized,
    Other(String),
}

impl SendError {
    fn into_error(self) -> BoardroomError {
        match self {
            SendError::Unauthorized => {
                BoardroomError::Tool("Gmail rejected the access token".to_string())
            }
            SendError::Other(msg) => BoardroomError::Tool(msg),
        }
    }
}

/// RFC 2822 plain-text message. Non-ASCII subjects use RFC 2047 encoding.
fn build_message(
    sender_name: &str,
    sender: &str,
    receiver: &str,
    subject: &str,
    body: &str,
) -> String {
    let subject = if subject.is_ascii() {
        subject.replace(['\r', '\n'], " ")
    } else {
        format!("=?UTF-8?B?{}?=", STANDARD.encode(subject.as_bytes()))
    };
    let from = if sender_name.is_empty() {
        sender.to_string()
    } else {
        format!("{sender_name} <{sender}>")
    };
    format!(
        "From: {from}\r\nTo: {receiver}\r\nSubject: {subject}\r\nDate: {date}\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{body}",
        date = chrono::Utc::now().to_rfc2822(),
    )
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EmailArgs {
    /// The subject of the email
    subject: String,
    /// The body of the email
    body: String,
}

/// `email_user`
pub struct EmailUserTool {
    mailer: Arc<GmailMailer>,
}

impl EmailUserTool {
    pub fn new(mailer: Arc<GmailMailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Tool for EmailUserTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new::<EmailArgs>(
            "email_user",
            "Emails the user with the given subject and body.",
        )
    }

    async fn call(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let args: EmailArgs = parse_args("email_user", args)?;
        self.mailer.send(&args.subject, &args.body).await?;
        Ok("email sent successfully".to_string())
    }
}
