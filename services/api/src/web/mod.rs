pub mod auth;
pub mod cookies;
pub mod events;
pub mod middleware;
pub mod pages;
pub mod rest;
pub mod state;


use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::{require_session, AuthenticatedPrincipal};
pub use state::AppState;

/// Builds the `/api` router. Routes behind `require_session` see an
/// `AuthenticatedPrincipal` extension; the rest are public.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/signup", post(auth::signup_handler))
        .route("/login", post(auth::login_handler))
        .route("/logout", get(auth::logout_handler))
        .route("/events", post(events::browse_events_handler))
        .route("/ticket/{id}", get(events::ticket_handler))
        .route("/ticket/{id}/image", get(events::ticket_image_handler))
        .route("/page/{title}", get(pages::page_handler))
        .route("/information/{slug}", get(pages::information_page_handler));

    // Protected routes (session required, renewed transparently)
    let protected_routes = Router::new()
        .route("/auth", get(auth::current_user_handler))
        .route("/host", post(auth::become_host_handler))
        .route("/create-event", post(events::create_event_handler))
        .route("/delete-event", post(events::delete_event_handler))
        .route("/dashboard/ticket/{id}", get(events::dashboard_ticket_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .with_state(state)
}
