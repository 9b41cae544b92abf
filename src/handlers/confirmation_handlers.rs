use crate::messages;
use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::confirmation_service::ConfirmationError;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tower_sessions::Session;

pub const ACTIVATION_SUCCESS: &str = "Activation was successful.";
/// Known key presented after its window closed.
pub const ACTIVATION_EXPIRED: &str = "The activation period has expired";
/// Key not found. The text differs from the expired case only by the period.
pub const ACTIVATION_UNKNOWN: &str = "The activation period has expired.";
pub const USER_DOES_NOT_EXIST: &str = "The user does not exist.";
pub const USER_ALREADY_CONFIRMED: &str = "User is already confirmed";
pub const CONFIRMATION_RESENT: &str = "The confirmation email has send";

static ACTIVATION_KEY_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[-\w]+$").unwrap_or_else(|e| panic!("invalid activation key pattern: {}", e))
});

#[derive(Template, WebTemplate)]
#[template(path = "confirmation_resend.html")]
struct ConfirmationResendTemplate {
    error: Option<String>,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct ConfirmationResendForm {
    email: String,
    csrf_token: String,
}

/// Activation link target. Always lands on the main page with a notice.
pub async fn confirmation_handler(
    State(app_state): State<AppState>,
    session: Session,
    Path(key): Path<String>,
) -> Response {
    let key = key.to_lowercase();

    if !ACTIVATION_KEY_SEGMENT.is_match(&key) {
        messages::error(&session, ACTIVATION_UNKNOWN).await;
        return Redirect::to("/").into_response();
    }

    match app_state.confirmation_service.validate(&key).await {
        Ok(Some(user)) if user.is_confirm => {
            messages::success(&session, ACTIVATION_SUCCESS).await;
        }
        Ok(Some(_)) => {
            messages::success(&session, ACTIVATION_EXPIRED).await;
        }
        Ok(None) => {
            messages::error(&session, ACTIVATION_UNKNOWN).await;
        }
        Err(e) => {
            tracing::error!("Activation failed: {}", e);
            messages::error(&session, "Activation failed. Please try again later.").await;
        }
    }

    Redirect::to("/").into_response()
}

pub async fn confirmation_resend_page(session: Session) -> Html<String> {
    let csrf_token = get_or_create_csrf_token(&session)
        .await
        .unwrap_or_else(|_| String::from("error"));

    let template = ConfirmationResendTemplate {
        error: None,
        csrf_token,
    };
    Html(template.render().unwrap_or_else(|_| {
        "<html><body><h1>Error rendering confirmation page</h1></body></html>".to_string()
    }))
}

/// Mails a fresh activation link to the account owning `email`.
pub async fn confirmation_resend_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<ConfirmationResendForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        let csrf_token = get_or_create_csrf_token(&session)
            .await
            .unwrap_or_else(|_| String::from("error"));
        let template = ConfirmationResendTemplate {
            error: Some(
                "Invalid security token. Please refresh the page and try again.".to_string(),
            ),
            csrf_token,
        };
        return Html(
            template
                .render()
                .unwrap_or_else(|_| "Template error".to_string()),
        )
        .into_response();
    }

    let user = match app_state.user_service.find_user_by_email(&form.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            messages::error(&session, USER_DOES_NOT_EXIST).await;
            return Redirect::to("/").into_response();
        }
        Err(e) => {
            tracing::error!("User lookup failed during resend: {}", e);
            messages::error(&session, "Something went wrong. Please try again later.").await;
            return Redirect::to("/").into_response();
        }
    };

    match app_state.confirmation_service.resend(&user).await {
        Ok(_) | Err(ConfirmationError::SiteNotConfigured) => {
            messages::success(&session, CONFIRMATION_RESENT).await;
        }
        Err(ConfirmationError::AlreadyConfirmed) => {
            messages::success(&session, USER_ALREADY_CONFIRMED).await;
        }
        Err(e) => {
            tracing::error!("Failed to resend confirmation for user {}: {}", user.id, e);
            messages::error(&session, "Something went wrong. Please try again later.").await;
        }
    }

    Redirect::to("/").into_response()
}
