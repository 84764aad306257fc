//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: signup, login, logout, session check and host elevation.
//!
//! Sessions are stateless. Login and signup hand out a token pair as cookies;
//! logout only tells the client to drop them, nothing is revoked server-side.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use std::sync::{Arc, OnceLock};
use ticketing_core::{
    AccountType, Event, EventFilter, EventQuery, EventSort, NewUser, User, UserPatch,
};
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::cookies::{cleared_cookies, session_cookies};
use crate::web::middleware::{load_principal, AuthenticatedPrincipal};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct HostRequest {
    pub account_number: String,
    pub bank: String,
}

/// One of a host's events as listed on their dashboard.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HostedEventSummary {
    pub id: Uuid,
    pub event_name: String,
    pub date_stamp: DateTime<Utc>,
    pub time_label: String,
    pub organizer_name: String,
    pub total_available_tickets: i64,
    pub total_sold_tickets: i64,
    pub income_expected: i64,
    pub income_realized: i64,
}

impl From<Event> for HostedEventSummary {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_name: event.event_name,
            date_stamp: event.date_stamp,
            time_label: event.time_label,
            organizer_name: event.organizer.name,
            total_available_tickets: event.total_available_tickets,
            total_sold_tickets: event.total_sold_tickets,
            income_expected: event.income.expected,
            income_realized: event.income.realized,
        }
    }
}

/// The public view of a user. Never includes the password hash.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub social_id: String,
    pub name: String,
    pub email: Option<String>,
    pub account_type: String,
    pub account_number: Option<String>,
    pub bank: Option<String>,
    pub income_expected: i64,
    pub income_realized: i64,
    /// Newest first.
    pub events_hosted: Vec<HostedEventSummary>,
}

impl UserResponse {
    pub fn new(user: User, hosted: Vec<Event>) -> Self {
        Self {
            user_id: user.user_id,
            social_id: user.social_id,
            name: user.name,
            email: user.email,
            account_type: user.account_type.to_string(),
            account_number: user.account_number,
            bank: user.bank,
            income_expected: user.income.expected,
            income_realized: user.income.realized,
            events_hosted: hosted.into_iter().map(HostedEventSummary::from).collect(),
        }
    }
}

/// Builds the response for `user`, loading the events they host.
pub(crate) async fn user_response(state: &AppState, user: User) -> Result<UserResponse, ApiError> {
    if user.events_hosted.is_empty() {
        return Ok(UserResponse::new(user, Vec::new()));
    }
    let query = EventQuery {
        filter: EventFilter {
            host_id: Some(user.user_id),
            ..EventFilter::default()
        },
        sort: EventSort::DateStampDescending,
        ..EventQuery::default()
    };
    let hosted = state.events.find_events(&query).await?;
    Ok(UserResponse::new(user, hosted))
}

#[derive(Serialize, ToSchema)]
pub struct LogoutResponse {
    pub logout: bool,
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| {
            Regex::new(r"^[^<>()\[\]\\.,;:\s@]+(\.[^<>()\[\]\\.,;:\s@]+)*@([A-Za-z0-9-]+\.)+[A-Za-z]{2,}$")
                .expect("email pattern is a valid regex")
        })
        .is_match(email)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/signup - Create a new guest account and start a session
#[utoipa::path(
    post,
    path = "/api/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already exists"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Validate the form
    let email = req.email.trim().to_lowercase();
    if req.name.trim().is_empty() || !is_valid_email(&email) || req.password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Make sure all fields are filled correctly!".to_string(),
        ));
    }

    // 2. Reject taken handles before paying for the hash
    if state.users.find_user_by_social_id(&email).await?.is_some() {
        return Err(ApiError::Conflict(format!("User {} already exists", email)));
    }

    // 3. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    // 4. Create the user; the email doubles as the login handle
    let user = state
        .users
        .create_user(NewUser {
            social_id: email.clone(),
            name: req.name.trim().to_string(),
            email: Some(email),
            password_hash,
        })
        .await?;
    info!(user_id = %user.user_id, "user signed up");

    // 5. Issue the session and return it as cookies
    let tokens = state.tokens.issue_pair(user.user_id)?;
    let [access, refresh] = session_cookies(&tokens, state.config.secure_cookies);

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, access), (header::SET_COOKIE, refresh)]),
        Json(UserResponse::new(user, Vec::new())),
    ))
}

/// POST /api/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // 1. Get credentials by email
    let email = req.email.trim().to_lowercase();
    let creds = state
        .users
        .get_credentials(&email)
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;
    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::Unauthenticated);
    }

    // 3. Load the user and issue the session
    let user = state
        .users
        .find_user_by_id(creds.user_id)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    let tokens = state.tokens.issue_pair(user.user_id)?;
    let [access, refresh] = session_cookies(&tokens, state.config.secure_cookies);
    info!(user_id = %user.user_id, "user logged in");
    let body = user_response(&state, user).await?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, access), (header::SET_COOKIE, refresh)]),
        Json(body),
    ))
}

/// GET /api/logout - Clear the session cookies
///
/// Tokens stay valid until they expire; the server keeps no session to revoke.
#[utoipa::path(
    get,
    path = "/api/logout",
    responses(
        (status = 200, description = "Logout successful", body = LogoutResponse)
    )
)]
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let [access, refresh] = cleared_cookies(state.config.secure_cookies);
    (
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, access), (header::SET_COOKIE, refresh)]),
        Json(LogoutResponse { logout: true }),
    )
}

/// GET /api/auth - The current user, renewing the session if needed
#[utoipa::path(
    get,
    path = "/api/auth",
    responses(
        (status = 200, description = "Authenticated", body = UserResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn current_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = load_principal(&state, principal).await?;
    Ok(Json(user_response(&state, user).await?))
}

/// POST /api/host - Elevate the current user to a host account
#[utoipa::path(
    post,
    path = "/api/host",
    request_body = HostRequest,
    responses(
        (status = 200, description = "Account elevated", body = UserResponse),
        (status = 400, description = "Invalid payout details"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn become_host_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(req): Json<HostRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let account_number = req.account_number.trim();
    if account_number.len() != 10 || !account_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::BadRequest(
            "Account number must be 10 digits".to_string(),
        ));
    }
    if req.bank.trim().len() < 3 {
        return Err(ApiError::BadRequest("Bank name is required".to_string()));
    }

    let user = state
        .users
        .update_user_fields(
            principal.0,
            UserPatch {
                account_type: Some(AccountType::Host),
                account_number: Some(account_number.to_string()),
                bank: Some(req.bank.trim().to_string()),
                ..UserPatch::default()
            },
        )
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    info!(user_id = %user.user_id, "user elevated to host");
    Ok(Json(user_response(&state, user).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("ada@example.com"));
        assert!(is_valid_email("first.last@mail.example.ng"));
        assert!(!is_valid_email("ada@"));
        assert!(!is_valid_email("ada example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
