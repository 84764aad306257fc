//! services/api/src/web/middleware.rs
//!
//! Session middleware for protecting routes, and the role gate used by host-only handlers.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use ticketing_core::{PresentedTokens, ResolvedSession, User};
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::cookies::{append_session_cookies, read_cookie, ACCESS_COOKIE, REFRESH_COOKIE};
use crate::web::state::AppState;

/// The principal resolved by `require_session`, available to handlers as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedPrincipal(pub Uuid);

/// Middleware that resolves the session cookies to a principal.
///
/// If the access token is valid the request simply proceeds. If only the refresh
/// token is valid, the request proceeds and the response carries a fresh pair of
/// cookies. Otherwise the request is rejected with 401 and never reaches the handler.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Resolve the presented cookies
    let resolved = {
        let headers = req.headers();
        let presented = PresentedTokens::new(
            read_cookie(headers, ACCESS_COOKIE),
            read_cookie(headers, REFRESH_COOKIE),
        );
        state.tokens.resolve_session(presented)?
    };

    // 2. Insert the principal into request extensions
    let principal = resolved.principal();
    req.extensions_mut().insert(AuthenticatedPrincipal(principal));

    // 3. Continue to the handler
    let mut response = next.run(req).await;

    // 4. Hand a renewed pair back to the client
    if let ResolvedSession::Renewed { tokens, .. } = &resolved {
        debug!(%principal, "session renewed");
        append_session_cookies(response.headers_mut(), tokens, state.config.secure_cookies);
    }
    Ok(response)
}

/// Loads the full record of an authenticated principal.
///
/// A token for a user that no longer exists is treated like no token at all.
pub async fn load_principal(
    state: &AppState,
    principal: AuthenticatedPrincipal,
) -> Result<User, ApiError> {
    state
        .users
        .find_user_by_id(principal.0)
        .await?
        .ok_or(ApiError::Unauthenticated)
}

/// The single role check: only hosts may manage events.
pub fn ensure_host(user: &User) -> Result<(), ApiError> {
    if user.is_host() {
        Ok(())
    } else {
        Err(ApiError::NotAuthorized("You must be a host".to_string()))
    }
}
