use crate::models::site::Site;
use crate::repositories::password_reset_repository::PasswordResetRepository;
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use crate::services::email_service::{EmailError, EmailService};
use crate::services::user_service::{UpdatePasswordRequest, UserService, UserServiceError};
use chrono::{Duration, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("Reset link is invalid or has expired")]
    InvalidToken,
    #[error("No site configured; reset link was not issued")]
    SiteNotConfigured,
    #[error("Email error: {0}")]
    Email(#[from] EmailError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    User(#[from] UserServiceError),
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub fn reset_url(site: &Site, token: &str) -> String {
    site.url(&format!("reset/{}/", token))
}

pub struct PasswordResetService {
    tokens: Arc<dyn PasswordResetRepository>,
    users: Arc<dyn UserRepository>,
    user_service: Arc<UserService>,
    email_service: Arc<dyn EmailService>,
    site: Option<Site>,
    window: Duration,
}

impl PasswordResetService {
    pub fn new(
        tokens: Arc<dyn PasswordResetRepository>,
        users: Arc<dyn UserRepository>,
        user_service: Arc<UserService>,
        email_service: Arc<dyn EmailService>,
        site: Option<Site>,
        window: Duration,
    ) -> Self {
        Self {
            tokens,
            users,
            user_service,
            email_service,
            site,
            window,
        }
    }

    /// Mails a reset link when `email` belongs to an active account.
    ///
    /// Returns the plaintext token when one was issued. Unknown or inactive
    /// addresses yield `Ok(None)` so the caller can answer identically in
    /// every case.
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, PasswordResetError> {
        let site = self
            .site
            .as_ref()
            .ok_or(PasswordResetError::SiteNotConfigured)?;

        let user = match self.users.find_by_email(email.trim()).await? {
            Some(user) if user.is_active => user,
            _ => {
                tracing::debug!("Password reset requested for unknown or inactive address");
                return Ok(None);
            }
        };

        let token = generate_token();
        let expires_at = Utc::now() + self.window;
        self.tokens
            .create_token(user.id, &hash_token(&token), expires_at)
            .await?;

        self.email_service
            .send_password_reset_email(site, &user, &reset_url(site, &token))
            .await?;
        tracing::info!("Password reset email sent to {}", user.email);

        Ok(Some(token))
    }

    /// Checks that `token` is known, unused and unexpired.
    pub async fn check_token(&self, token: &str) -> Result<(), PasswordResetError> {
        let record = self
            .tokens
            .find_by_hash(&hash_token(token))
            .await?
            .ok_or(PasswordResetError::InvalidToken)?;

        if !record.is_usable_at(Utc::now()) {
            return Err(PasswordResetError::InvalidToken);
        }

        Ok(())
    }

    pub async fn confirm_reset(
        &self,
        token: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<(), PasswordResetError> {
        let record = self
            .tokens
            .find_by_hash(&hash_token(token))
            .await?
            .ok_or(PasswordResetError::InvalidToken)?;

        let now = Utc::now();
        if !record.is_usable_at(now) {
            return Err(PasswordResetError::InvalidToken);
        }

        self.user_service
            .update_password(UpdatePasswordRequest {
                user_id: record.user_id,
                new_password: new_password.to_string(),
                new_password_confirm: Some(new_password_confirm.to_string()),
            })
            .await?;

        self.tokens.mark_used(record.id, now).await?;
        tracing::info!("Password reset completed for user {}", record.user_id);

        Ok(())
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64, PasswordResetError> {
        Ok(self.tokens.delete_expired(Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_is_stable_and_hides_token() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_reset_url() {
        let site = Site::new("example.com/", "Example");
        assert_eq!(reset_url(&site, "abc"), "http://example.com/reset/abc/");
    }
}
