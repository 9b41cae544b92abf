pub mod email_confirmation;
pub mod password_reset;
pub mod site;
pub mod user;

pub use email_confirmation::EmailConfirmation;
pub use password_reset::PasswordResetToken;
pub use site::Site;
pub use user::{Gender, User};
