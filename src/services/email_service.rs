use crate::config::settings::{SmtpEncryption, SmtpSettings};
use crate::models::{site::Site, user::User};
use askama::Template;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Failed to build email message: {0}")]
    MessageBuild(String),
    #[error("Failed to render email template: {0}")]
    Render(#[from] askama::Error),
    #[error("Failed to send email: {0}")]
    SendFailed(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

#[derive(Template)]
#[template(path = "email/confirmation.txt")]
struct ConfirmationEmailTemplate<'a> {
    site: &'a Site,
    user: &'a User,
    activate_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetEmailTemplate<'a> {
    site: &'a Site,
    user: &'a User,
    reset_url: &'a str,
}

/// A fully rendered plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn render_confirmation_email(
    site: &Site,
    user: &User,
    activate_url: &str,
) -> Result<RenderedEmail, EmailError> {
    let body = ConfirmationEmailTemplate {
        site,
        user,
        activate_url,
    }
    .render()?;

    Ok(RenderedEmail {
        to: user.email.clone(),
        subject: format!("Confirm your registration on {}", site.name),
        body,
    })
}

pub fn render_password_reset_email(
    site: &Site,
    user: &User,
    reset_url: &str,
) -> Result<RenderedEmail, EmailError> {
    let body = PasswordResetEmailTemplate {
        site,
        user,
        reset_url,
    }
    .render()?;

    Ok(RenderedEmail {
        to: user.email.clone(),
        subject: format!("Password reset on {}", site.name),
        body,
    })
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_confirmation_email(
        &self,
        site: &Site,
        user: &User,
        activate_url: &str,
    ) -> Result<(), EmailError>;

    async fn send_password_reset_email(
        &self,
        site: &Site,
        user: &User,
        reset_url: &str,
    ) -> Result<(), EmailError>;
}

/// Logs outgoing mail instead of delivering it.
#[derive(Default)]
pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }

    fn log(email: &RenderedEmail) {
        tracing::info!("📧 [MOCK EMAIL] To: {}", email.to);
        tracing::info!("   Subject: {}", email.subject);
        for line in email.body.lines() {
            tracing::info!("   {}", line);
        }
        tracing::info!("   ---");
    }
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send_confirmation_email(
        &self,
        site: &Site,
        user: &User,
        activate_url: &str,
    ) -> Result<(), EmailError> {
        Self::log(&render_confirmation_email(site, user, activate_url)?);
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        site: &Site,
        user: &User,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        Self::log(&render_password_reset_email(site, user, reset_url)?);
        Ok(())
    }
}

pub struct SmtpEmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_email: String,
    from_name: String,
}

impl SmtpEmailService {
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let credentials = Credentials::new(settings.username.clone(), settings.password.clone());

        let mailer = match settings.encryption {
            SmtpEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map_err(|e| EmailError::ConfigError(format!("SMTP relay error: {}", e)))?
                .port(settings.port)
                .credentials(credentials)
                .build(),
            SmtpEncryption::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                    .map_err(|e| EmailError::ConfigError(format!("SMTP starttls error: {}", e)))?
                    .port(settings.port)
                    .credentials(credentials)
                    .build()
            }
            SmtpEncryption::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                    .port(settings.port)
                    .credentials(credentials)
                    .build()
            }
        };

        Ok(Self {
            mailer,
            from_email: settings.from_email.clone(),
            from_name: settings.from_name.clone(),
        })
    }

    async fn deliver(&self, email: RenderedEmail) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(
                format!("{} <{}>", self.from_name, self.from_email)
                    .parse()
                    .map_err(|e| {
                        EmailError::MessageBuild(format!("Invalid from address: {}", e))
                    })?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| EmailError::MessageBuild(format!("Invalid to address: {}", e)))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| EmailError::MessageBuild(e.to_string()))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| EmailError::SendFailed(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl EmailService for SmtpEmailService {
    async fn send_confirmation_email(
        &self,
        site: &Site,
        user: &User,
        activate_url: &str,
    ) -> Result<(), EmailError> {
        self.deliver(render_confirmation_email(site, user, activate_url)?)
            .await
    }

    async fn send_password_reset_email(
        &self,
        site: &Site,
        user: &User,
        reset_url: &str,
    ) -> Result<(), EmailError> {
        self.deliver(render_password_reset_email(site, user, reset_url)?)
            .await
    }
}

pub fn create_email_service(smtp: Option<&SmtpSettings>) -> Box<dyn EmailService> {
    match smtp {
        Some(settings) => match SmtpEmailService::new(settings) {
            Ok(service) => {
                tracing::info!("Using SMTP email service ({})", settings.host);
                Box::new(service)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize SMTP email service: {}. Falling back to mock service",
                    e
                );
                Box::new(MockEmailService::new())
            }
        },
        None => {
            tracing::info!(
                "SMTP not configured. Using mock email service (emails will be logged to console)"
            );
            Box::new(MockEmailService::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "ivan@example.com".to_string(),
            username: "ivan".to_string(),
            password_hash: "hash".to_string(),
            first_name: None,
            last_name: None,
            gender: "NS".to_string(),
            birthday: None,
            avatar: None,
            is_confirm: false,
            is_active: false,
            is_staff: false,
            is_superuser: false,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    #[test]
    fn test_confirmation_email_contains_link_and_site() {
        let site = Site::new("accounts.example.com", "Example Accounts");
        let user = sample_user();
        let url = "http://accounts.example.com/confirmation/abc123/";

        let email = render_confirmation_email(&site, &user, url).unwrap();

        assert_eq!(email.to, "ivan@example.com");
        assert_eq!(email.subject, "Confirm your registration on Example Accounts");
        assert!(email.body.contains(url));
        assert!(email.body.contains("ivan"));
        assert!(email.body.contains("Example Accounts"));
    }

    #[test]
    fn test_password_reset_email_contains_link() {
        let site = Site::new("example.com", "Example");
        let user = sample_user();
        let url = "http://example.com/reset/deadbeef/";

        let email = render_password_reset_email(&site, &user, url).unwrap();

        assert_eq!(email.subject, "Password reset on Example");
        assert!(email.body.contains(url));
    }

    #[tokio::test]
    async fn test_mock_service_accepts_mail() {
        let service = create_email_service(None);
        let site = Site::new("example.com", "Example");
        let result = service
            .send_confirmation_email(&site, &sample_user(), "http://example.com/confirmation/x/")
            .await;
        assert!(result.is_ok());
    }
}
