pub mod auth_service;
pub mod confirmation_service;
pub mod email_service;
pub mod password_reset_service;
pub mod user_service;

pub use auth_service::{AuthService, AuthServiceError, LoginRequest};
pub use confirmation_service::{ConfirmationError, ConfirmationService};
pub use email_service::{create_email_service, EmailError, EmailService, MockEmailService};
pub use password_reset_service::{PasswordResetError, PasswordResetService};
pub use user_service::{CreateUserRequest, UpdatePasswordRequest, UserService, UserServiceError};
