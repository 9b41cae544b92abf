use axum::{
    middleware,
    routing::get,
    Router,
};

use crate::{auth, error::AppError, handlers, AppState};

/// All application routes. The caller supplies the session layer.
pub fn app_router(state: AppState) -> Router {
    // Forms only anonymous visitors should see
    let anonymous_routes = Router::new()
        .route(
            "/login/",
            get(auth::handlers::login_page).post(auth::handlers::login_handler),
        )
        .route(
            "/registration/",
            get(auth::handlers::registration_page).post(auth::handlers::registration_handler),
        )
        .route_layer(middleware::from_fn(
            auth::middleware::redirect_if_authenticated,
        ));

    Router::new()
        .merge(anonymous_routes)
        .route("/", get(handlers::index_handler))
        .route("/logout/", get(auth::handlers::logout_handler))
        .route(
            "/confirmation/{key}/",
            get(handlers::confirmation_handler),
        )
        .route(
            "/confirmation_resend/",
            get(handlers::confirmation_resend_page).post(handlers::confirmation_resend_handler),
        )
        .route(
            "/password_reset/",
            get(handlers::password_reset_page).post(handlers::password_reset_handler),
        )
        .route(
            "/password_reset/done/",
            get(handlers::password_reset_done_page),
        )
        .route(
            "/reset/done/",
            get(handlers::password_reset_complete_page),
        )
        .route(
            "/reset/{token}/",
            get(handlers::password_reset_confirm_page)
                .post(handlers::password_reset_confirm_handler),
        )
        .fallback(|| async { AppError::NotFound })
        .with_state(state)
}
