use crate::auth::session;
use crate::middleware::csrf::{get_or_create_csrf_token, validate_csrf_form_field};
use crate::services::{
    auth_service::{AuthServiceError, LoginRequest},
    confirmation_service::ConfirmationError,
    user_service::{CreateUserRequest, UserServiceError},
};
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;

const INVALID_CSRF_MESSAGE: &str = "Invalid security token. Please refresh the page and try again.";

#[derive(Template, WebTemplate)]
#[template(path = "registration.html")]
struct RegistrationTemplate {
    error: Option<String>,
    email: String,
    username: String,
    csrf_token: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: Option<String>,
    email: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct RegistrationForm {
    email: String,
    username: String,
    password1: String,
    password2: String,
    csrf_token: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    email: String,
    password: String,
    csrf_token: String,
}

async fn csrf_token_for(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|_| String::from("error"))
}

pub async fn registration_page(session: Session) -> Html<String> {
    let template = RegistrationTemplate {
        error: None,
        email: String::new(),
        username: String::new(),
        csrf_token: csrf_token_for(&session).await,
    };
    Html(template.render().unwrap_or_else(|_| {
        "<html><body><h1>Error rendering registration page</h1></body></html>".to_string()
    }))
}

async fn registration_error(msg: &str, session: &Session, form: &RegistrationForm) -> Response {
    let template = RegistrationTemplate {
        error: Some(msg.to_string()),
        email: form.email.clone(),
        username: form.username.clone(),
        csrf_token: csrf_token_for(session).await,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| format!("<html><body><h1>Error: {}</h1></body></html>", msg)),
    )
    .into_response()
}

/// Creates an unconfirmed, inactive account and mails its activation link.
pub async fn registration_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<RegistrationForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return registration_error(INVALID_CSRF_MESSAGE, &session, &form).await;
    }

    let request = CreateUserRequest {
        email: form.email.clone(),
        username: form.username.clone(),
        password: form.password1.clone(),
        password_confirm: Some(form.password2.clone()),
        ..Default::default()
    };

    let user = match app_state.user_service.create_user(request).await {
        Ok(user) => user,
        Err(err) => {
            let error_msg = match err {
                UserServiceError::InvalidEmail => "Please enter a valid email address",
                UserServiceError::InvalidUsername => {
                    "Enter a valid username. It may contain only letters, numbers, and @/./+/-/_ characters."
                }
                UserServiceError::WeakPassword => "Password must be at least 8 characters",
                UserServiceError::PasswordMismatch => "The two password fields didn't match.",
                UserServiceError::EmailTaken => "A user with that email already exists.",
                UserServiceError::UsernameTaken => "A user with that username already exists.",
                other => {
                    tracing::error!("Registration failed: {}", other);
                    "Registration failed. Please try again."
                }
            };
            return registration_error(error_msg, &session, &form).await;
        }
    };

    match app_state.confirmation_service.issue(&user).await {
        Ok(_) | Err(ConfirmationError::SiteNotConfigured) => {}
        Err(e) => tracing::error!("Failed to issue confirmation for user {}: {}", user.id, e),
    }

    Redirect::to("/").into_response()
}

pub async fn login_page(session: Session) -> Html<String> {
    let template = LoginTemplate {
        error: None,
        email: String::new(),
        csrf_token: csrf_token_for(&session).await,
    };
    Html(template.render().unwrap_or_else(|_| {
        "<html><body><h1>Error rendering login page</h1></body></html>".to_string()
    }))
}

async fn login_error(msg: &str, session: &Session, email: &str) -> Response {
    let template = LoginTemplate {
        error: Some(msg.to_string()),
        email: email.to_string(),
        csrf_token: csrf_token_for(session).await,
    };
    Html(
        template
            .render()
            .unwrap_or_else(|_| format!("<html><body><h1>Error: {}</h1></body></html>", msg)),
    )
    .into_response()
}

pub async fn login_handler(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    if validate_csrf_form_field(&session, &form.csrf_token)
        .await
        .is_err()
    {
        return login_error(INVALID_CSRF_MESSAGE, &session, &form.email).await;
    }

    let request = LoginRequest {
        email: form.email.clone(),
        password: form.password.clone(),
    };

    match app_state.auth_service.authenticate(request).await {
        Ok(user) => {
            if let Err(e) = session::log_in(&session, &user).await {
                tracing::error!("Failed to create session: {}", e);
                return login_error("Failed to create session", &session, &form.email).await;
            }
            Redirect::to("/").into_response()
        }
        Err(err) => {
            let error_msg = match err {
                AuthServiceError::InvalidCredentials => {
                    "Please enter a correct email and password."
                }
                AuthServiceError::InactiveAccount => {
                    "This account is inactive. Please confirm your email address first."
                }
                other => {
                    tracing::error!("Login failed: {}", other);
                    "An error occurred. Please try again."
                }
            };
            login_error(error_msg, &session, &form.email).await
        }
    }
}

pub async fn logout_handler(session: Session) -> impl IntoResponse {
    if let Err(e) = session::log_out(&session).await {
        tracing::warn!("Failed to clear session on logout: {}", e);
    }
    Redirect::to("/")
}
