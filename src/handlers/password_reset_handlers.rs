use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::{password_reset_service::PasswordResetError, user_service::UserServiceError};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "password_reset.html")]
struct PasswordResetTemplate {
    error: Option<String>,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "password_reset_done.html")]
struct PasswordResetDoneTemplate;

#[derive(Template, WebTemplate)]
#[template(path = "password_reset_confirm.html")]
struct PasswordResetConfirmTemplate {
    valid_link: bool,
    error: Option<String>,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "password_reset_complete.html")]
struct PasswordResetCompleteTemplate;

#[derive(Deserialize)]
pub struct PasswordResetForm {
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct SetPasswordForm {
    new_password1: String,
    new_password2: String,
    csrf_token: String,
}

async fn csrf_token_for(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|_| String::from("error"))
}

async fn reset_form(session: &Session, error: Option<&str>) -> Response {
    let template = PasswordResetTemplate {
        error: error.map(str::to_string),
        csrf_token: csrf_token_for(session).await,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
    .into_response()
}

async fn set_password_form(session: &Session, valid_link: bool, error: Option<&str>) -> Response {
    let template = PasswordResetConfirmTemplate {
        valid_link,
        error: error.map(str::to_string),
        csrf_token: csrf_token_for(session).await,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
    .into_response()
}

pub async fn password_reset_page(session: Session) -> Response {
    reset_form(&session, None).await
}

/// Known and unknown addresses both end on the "done" page.
pub async fn password_reset_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<PasswordResetForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return reset_form(
            &session,
            Some("Invalid security token. Please refresh the page and try again."),
        )
        .await;
    }

    match app_state
        .password_reset_service
        .request_reset(&form.email)
        .await
    {
        Ok(_) => Redirect::to("/password_reset/done/").into_response(),
        Err(e) => {
            tracing::error!("Password reset request failed: {}", e);
            reset_form(
                &session,
                Some("We could not send the reset email. Please try again later."),
            )
            .await
        }
    }
}

pub async fn password_reset_done_page() -> Html<String> {
    Html(
        PasswordResetDoneTemplate
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
}

pub async fn password_reset_confirm_page(
    State(app_state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
) -> Response {
    let valid_link = match app_state.password_reset_service.check_token(&token).await {
        Ok(()) => true,
        Err(PasswordResetError::InvalidToken) => false,
        Err(e) => {
            tracing::error!("Reset token lookup failed: {}", e);
            false
        }
    };

    set_password_form(&session, valid_link, None).await
}

pub async fn password_reset_confirm_handler(
    State(app_state): State<AppState>,
    session: Session,
    Path(token): Path<String>,
    Form(form): Form<SetPasswordForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return set_password_form(
            &session,
            true,
            Some("Invalid security token. Please refresh the page and try again."),
        )
        .await;
    }

    match app_state
        .password_reset_service
        .confirm_reset(&token, &form.new_password1, &form.new_password2)
        .await
    {
        Ok(()) => Redirect::to("/reset/done/").into_response(),
        Err(PasswordResetError::InvalidToken) => set_password_form(&session, false, None).await,
        Err(PasswordResetError::User(UserServiceError::PasswordMismatch)) => {
            set_password_form(&session, true, Some("The two password fields didn't match.")).await
        }
        Err(PasswordResetError::User(UserServiceError::WeakPassword)) => {
            set_password_form(&session, true, Some("Password must be at least 8 characters")).await
        }
        Err(e) => {
            tracing::error!("Password reset failed: {}", e);
            set_password_form(&session, true, Some("An error occurred. Please try again.")).await
        }
    }
}

pub async fn password_reset_complete_page() -> Html<String> {
    Html(
        PasswordResetCompleteTemplate
            .render()
            .unwrap_or_else(|_| "Template error".to_string()),
    )
}
