pub mod confirmation_handlers;
pub mod main_handlers;
pub mod password_reset_handlers;

pub use confirmation_handlers::{
    confirmation_handler, confirmation_resend_handler, confirmation_resend_page,
};
pub use main_handlers::index_handler;
pub use password_reset_handlers::{
    password_reset_complete_page, password_reset_confirm_handler, password_reset_confirm_page,
    password_reset_done_page, password_reset_handler, password_reset_page,
};
