use crate::models::user::{Gender, User};
use crate::repositories::user_repository::{NewUser, RepositoryError, UserRepository};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

pub const USERNAME_MAX_LENGTH: usize = 100;
pub const FIRST_NAME_MAX_LENGTH: usize = 30;
pub const LAST_NAME_MAX_LENGTH: usize = 50;

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.@+-]+$").unwrap_or_else(|e| panic!("invalid username pattern: {}", e))
});

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters (100 at most)")]
    InvalidUsername,
    #[error("Name is too long")]
    NameTooLong,
    #[error("Password too weak (minimum 8 characters)")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailTaken,
    #[error("A user with that username already exists")]
    UsernameTaken,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

#[derive(Debug, Clone, Default)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Gender,
    pub birthday: Option<NaiveDate>,
    /// Registrations leave this `false`; the account starts unconfirmed and
    /// inactive.
    pub confirmed: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

pub struct UpdatePasswordRequest {
    pub user_id: i64,
    pub new_password: String,
    pub new_password_confirm: Option<String>,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = request.email.trim().to_string();
        let username = request.username.trim().to_string();

        self.validate_email(&email)?;
        self.validate_username(&username)?;

        let first_name = non_blank(request.first_name);
        let last_name = non_blank(request.last_name);
        if first_name.as_ref().is_some_and(|n| n.chars().count() > FIRST_NAME_MAX_LENGTH)
            || last_name.as_ref().is_some_and(|n| n.chars().count() > LAST_NAME_MAX_LENGTH)
        {
            return Err(UserServiceError::NameTooLong);
        }

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.password)?;

        let password_hash = self.hash_password(&request.password)?;

        let new_user = NewUser {
            email,
            username,
            password_hash,
            first_name,
            last_name,
            gender: request.gender,
            birthday: request.birthday,
            is_confirm: request.confirmed,
            is_active: request.confirmed,
            is_staff: request.is_staff,
            is_superuser: request.is_superuser,
        };

        match self.repository.create_user(&new_user).await {
            Ok(user) => {
                tracing::info!("Created user {} (id {})", user, user.id);
                Ok(user)
            }
            Err(RepositoryError::AlreadyExists(column)) if column == "username" => {
                Err(UserServiceError::UsernameTaken)
            }
            Err(RepositoryError::AlreadyExists(_)) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email.trim()).await?)
    }

    pub async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_id(id).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    /// Marks the account confirmed and active without a key.
    pub async fn activate_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.activate(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn update_password(
        &self,
        request: UpdatePasswordRequest,
    ) -> Result<(), UserServiceError> {
        if let Some(ref confirm) = request.new_password_confirm {
            if request.new_password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }

        self.validate_password(&request.new_password)?;

        let password_hash = self.hash_password(&request.new_password)?;

        match self
            .repository
            .update_password(request.user_id, &password_hash)
            .await
        {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if !email.contains('@') || email.len() > 255 || email.is_empty() {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_username(&self, username: &str) -> Result<(), UserServiceError> {
        if username.chars().count() > USERNAME_MAX_LENGTH || !USERNAME_PATTERN.is_match(username) {
            return Err(UserServiceError::InvalidUsername);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        } else {
            false
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::user_repository::MockUserRepository;
    use chrono::Utc;
    use mockall::predicate::*;

    fn stored_user(new_user: &NewUser) -> User {
        User {
            id: 1,
            email: new_user.email.clone(),
            username: new_user.username.clone(),
            password_hash: new_user.password_hash.clone(),
            first_name: new_user.first_name.clone(),
            last_name: new_user.last_name.clone(),
            gender: new_user.gender.code().to_string(),
            birthday: new_user.birthday,
            avatar: None,
            is_confirm: new_user.is_confirm,
            is_active: new_user.is_active,
            is_staff: new_user.is_staff,
            is_superuser: new_user.is_superuser,
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    fn registration(email: &str, username: &str, password: &str) -> CreateUserRequest {
        CreateUserRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_user_starts_unconfirmed_and_inactive() {
        let mut mock_repo = MockUserRepository::new();

        mock_repo
            .expect_create_user()
            .withf(|new_user| {
                new_user.email == "test@example.com"
                    && new_user.username == "tester"
                    && !new_user.is_confirm
                    && !new_user.is_active
                    && new_user.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(|new_user| {
                let user = stored_user(new_user);
                Box::pin(async move { Ok(user) })
            });

        let service = UserService::new(Arc::new(mock_repo));

        let user = service
            .create_user(registration("test@example.com", "tester", "password123"))
            .await
            .expect("Expected Ok result");
        assert_eq!(user.email, "test@example.com");
        assert!(!user.is_confirm);
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn test_create_user_weak_password() {
        let mock_repo = MockUserRepository::new();
        let service = UserService::new(Arc::new(mock_repo));

        let result = service
            .create_user(registration("test@example.com", "tester", "short"))
            .await;
        assert!(matches!(result, Err(UserServiceError::WeakPassword)));
    }

    #[tokio::test]
    async fn test_create_user_invalid_email() {
        let mock_repo = MockUserRepository::new();
        let service = UserService::new(Arc::new(mock_repo));

        let result = service
            .create_user(registration("invalid-email", "tester", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::InvalidEmail)));
    }

    #[tokio::test]
    async fn test_create_user_invalid_username() {
        let mock_repo = MockUserRepository::new();
        let service = UserService::new(Arc::new(mock_repo));

        let too_long = "a".repeat(101);
        for username in ["", "with space", "semi;colon", too_long.as_str()] {
            let result = service
                .create_user(registration("test@example.com", username, "password123"))
                .await;
            assert!(
                matches!(result, Err(UserServiceError::InvalidUsername)),
                "{:?} should be rejected",
                username
            );
        }
    }

    #[tokio::test]
    async fn test_username_allows_unicode_and_symbols() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_create_user().times(2).returning(|new_user| {
            let user = stored_user(new_user);
            Box::pin(async move { Ok(user) })
        });
        let service = UserService::new(Arc::new(mock_repo));

        for username in ["іван.петренко", "a+b@c-d_e"] {
            let result = service
                .create_user(registration("test@example.com", username, "password123"))
                .await;
            assert!(result.is_ok(), "{:?} should be accepted", username);
        }
    }

    #[tokio::test]
    async fn test_create_user_password_mismatch() {
        let mock_repo = MockUserRepository::new();
        let service = UserService::new(Arc::new(mock_repo));

        let mut request = registration("test@example.com", "tester", "password123");
        request.password_confirm = Some("password124".to_string());

        let result = service.create_user(request).await;
        assert!(matches!(result, Err(UserServiceError::PasswordMismatch)));
    }

    #[tokio::test]
    async fn test_duplicate_username_is_reported() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo.expect_create_user().times(1).returning(|_| {
            Box::pin(async move { Err(RepositoryError::AlreadyExists("username".to_string())) })
        });
        let service = UserService::new(Arc::new(mock_repo));

        let result = service
            .create_user(registration("test@example.com", "tester", "password123"))
            .await;
        assert!(matches!(result, Err(UserServiceError::UsernameTaken)));
    }

    #[tokio::test]
    async fn test_activate_missing_user() {
        let mut mock_repo = MockUserRepository::new();
        mock_repo
            .expect_activate()
            .with(eq(42))
            .times(1)
            .returning(|_| Box::pin(async move { Err(RepositoryError::NotFound) }));
        let service = UserService::new(Arc::new(mock_repo));

        let result = service.activate_user(42).await;
        assert!(matches!(result, Err(UserServiceError::UserNotFound)));
    }
}
