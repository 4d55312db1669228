use serde::Serialize;

use crate::configuration::EmailClientSettings;
use crate::error::EmailError;
use crate::models::User;
use crate::templates::{email_layout, escape};

/// Client for the transactional email delivery API
#[derive(Clone)]
pub struct EmailClient {
    http_client: reqwest::Client,
    base_url: String,
    sender: String,
    authorization_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: String,
        authorization_token: String,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        }
    }

    pub fn from_settings(settings: &EmailClientSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .build()?;
        let sender = format!("{} <{}>", settings.sender_name, settings.sender_email);

        Ok(Self::new(
            settings.base_url.clone(),
            sender,
            settings.authorization_token.clone(),
            http_client,
        ))
    }

    pub async fn send_email(
        &self,
        recipient: &str,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), EmailError> {
        let url = format!("{}/email", self.base_url.trim_end_matches('/'));
        let request = SendEmailRequest {
            from: &self.sender,
            to: recipient,
            subject,
            html_body: html_content,
            text_body: text_content,
        };

        self.http_client
            .post(&url)
            .header("X-Postmark-Server-Token", &self.authorization_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email: {}", e);
                EmailError::ServiceUnavailable(e.to_string())
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("Email service returned error: {}", e);
                EmailError::SendFailed(e.to_string())
            })?;

        tracing::info!(subject = %subject, "Email sent");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Welcome,
    PasswordReset,
}

/// A templated email addressed to one user
#[derive(Debug, Clone)]
pub struct Email {
    kind: EmailKind,
    to: String,
    first_name: String,
    url: String,
}

impl Email {
    pub fn welcome(user: &User, url: &str) -> Self {
        Self::new(EmailKind::Welcome, user, url)
    }

    pub fn password_reset(user: &User, url: &str) -> Self {
        Self::new(EmailKind::PasswordReset, user, url)
    }

    fn new(kind: EmailKind, user: &User, url: &str) -> Self {
        Self {
            kind,
            to: user.email.clone(),
            first_name: user.first_name().to_string(),
            url: url.to_string(),
        }
    }

    pub fn subject(&self) -> &'static str {
        match self.kind {
            EmailKind::Welcome => "Welcome to the Natours Family!",
            EmailKind::PasswordReset => "Your password reset token (valid for only 10 minutes)",
        }
    }

    pub fn text(&self) -> String {
        match self.kind {
            EmailKind::Welcome => format!(
                "Hi {},\n\nWelcome to Natours, we're glad to have you!\n\
                 Upload your user photo to get started: {}\n",
                self.first_name, self.url
            ),
            EmailKind::PasswordReset => format!(
                "Hi {},\n\nForgot your password? Submit a PATCH request with your new password \
                 and passwordConfirm to: {}\nIf you didn't forget your password, please ignore this email!\n",
                self.first_name, self.url
            ),
        }
    }

    pub fn html(&self) -> String {
        let name = escape(&self.first_name);
        let url = escape(&self.url);
        let body = match self.kind {
            EmailKind::Welcome => format!(
                r#"<p>Hi {name},</p>
          <p>Welcome to Natours, we're glad to have you 🎉🙏</p>
          <p>We're all a big family here, so make sure to upload your user photo so we get to know you a bit better!</p>
          <a href="{url}" target="_blank">Upload user photo</a>
          <p>If you need any help with booking your next tour, please don't hesitate to contact me!</p>"#
            ),
            EmailKind::PasswordReset => format!(
                r#"<p>Hi {name},</p>
          <p>Forgot your password? Submit a PATCH request with your new password and passwordConfirm to the link below.</p>
          <a href="{url}" target="_blank">Reset your password</a>
          <p>If you didn't forget your password, please ignore this email!</p>"#
            ),
        };
        email_layout(self.subject(), &body)
    }

    pub async fn send(&self, client: &EmailClient) -> Result<(), EmailError> {
        client
            .send_email(&self.to, self.subject(), &self.html(), &self.text())
            .await
    }
}
