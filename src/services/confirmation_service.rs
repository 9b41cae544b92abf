use crate::models::{email_confirmation::EmailConfirmation, site::Site, user::User};
use crate::repositories::confirmation_repository::ConfirmationRepository;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::EmailService;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Length of an activation key in hex characters.
pub const ACTIVATION_KEY_LENGTH: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    /// Nothing was stored or sent. Registration treats this as a silent
    /// no-op; callers that care can match on it.
    #[error("No site configured; confirmation was not issued")]
    SiteNotConfigured,
    #[error("User is already confirmed")]
    AlreadyConfirmed,
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Derives a key from a random salt and the user's email. The digest is
/// one-way, so the key reveals nothing about the address.
pub fn generate_activation_key(email: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hasher = Sha256::new();
    hasher.update(hex::encode(salt).as_bytes());
    hasher.update(email.as_bytes());
    let mut key = hex::encode(hasher.finalize());
    key.truncate(ACTIVATION_KEY_LENGTH);
    key
}

pub fn activation_url(site: &Site, activation_key: &str) -> String {
    site.url(&format!("confirmation/{}/", activation_key))
}

/// Issues, checks and re-issues email confirmation keys.
///
/// A user moves from unconfirmed to confirmed exactly once, when a key is
/// presented before the confirmation window has elapsed.
pub struct ConfirmationService {
    confirmations: Arc<dyn ConfirmationRepository>,
    users: Arc<dyn UserRepository>,
    email_service: Arc<dyn EmailService>,
    site: Option<Site>,
    window: Duration,
}

impl ConfirmationService {
    pub fn new(
        confirmations: Arc<dyn ConfirmationRepository>,
        users: Arc<dyn UserRepository>,
        email_service: Arc<dyn EmailService>,
        site: Option<Site>,
        window: Duration,
    ) -> Self {
        Self {
            confirmations,
            users,
            email_service,
            site,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn site(&self) -> Option<&Site> {
        self.site.as_ref()
    }

    /// Stores a fresh key for `user`, replacing any earlier one, and mails the
    /// activation link. Delivery failures are logged and otherwise ignored.
    pub async fn issue(&self, user: &User) -> Result<EmailConfirmation, ConfirmationError> {
        let site = self.site.as_ref().ok_or_else(|| {
            tracing::warn!(
                "No site configured; skipping confirmation email for user {}",
                user.id
            );
            ConfirmationError::SiteNotConfigured
        })?;

        let activation_key = generate_activation_key(&user.email);
        let confirmation = self
            .confirmations
            .replace_for_user(user.id, &activation_key, Utc::now())
            .await?;

        let url = activation_url(site, &confirmation.activation_key);
        match self
            .email_service
            .send_confirmation_email(site, user, &url)
            .await
        {
            Ok(()) => tracing::info!("Confirmation email sent to {}", user.email),
            Err(e) => tracing::error!(
                "Failed to send confirmation email to {}: {:?}",
                user.email,
                e
            ),
        }

        Ok(confirmation)
    }

    /// Looks up `activation_key` (already lowercased by the caller).
    ///
    /// Returns `None` for an unknown key. For a known key the owning user is
    /// returned; it is activated only if the key is still inside the window,
    /// so callers must check `is_confirm` on the result.
    pub async fn validate(&self, activation_key: &str) -> Result<Option<User>, ConfirmationError> {
        self.validate_at(activation_key, Utc::now()).await
    }

    pub async fn validate_at(
        &self,
        activation_key: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, ConfirmationError> {
        let Some(confirmation) = self.confirmations.find_by_key(activation_key).await? else {
            tracing::debug!("Unknown activation key");
            return Ok(None);
        };

        let Some(mut user) = self.users.find_by_id(confirmation.user_id).await? else {
            return Ok(None);
        };

        if confirmation.is_expired_at(now, self.window) {
            tracing::info!(
                "Activation key for user {} expired (sent {})",
                user.id,
                confirmation.sent
            );
            return Ok(Some(user));
        }

        self.users.activate(user.id).await?;
        user.is_confirm = true;
        user.is_active = true;
        tracing::info!("User {} confirmed their email", user.id);

        Ok(Some(user))
    }

    /// Replaces the user's key with a new one and mails it again. Confirmed
    /// users are left untouched.
    ///
    /// The previous key stops working even when no site is configured and
    /// nothing new can be issued.
    pub async fn resend(&self, user: &User) -> Result<EmailConfirmation, ConfirmationError> {
        if user.is_confirm {
            return Err(ConfirmationError::AlreadyConfirmed);
        }

        if self.site.is_none() && self.confirmations.delete_for_user(user.id).await? {
            tracing::info!("Revoked activation key for user {}", user.id);
        }

        self.issue(user).await
    }
}
