pub mod confirmation_repository;
pub mod password_reset_repository;
pub mod user_repository;

pub use confirmation_repository::{ConfirmationRepository, SqliteConfirmationRepository};
pub use password_reset_repository::{PasswordResetRepository, SqlitePasswordResetRepository};
pub use user_repository::{
    NewUser, RepositoryError, RepositoryResult, SqliteUserRepository, UserRepository,
};
