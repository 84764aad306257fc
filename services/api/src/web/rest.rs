//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::web::auth::{
    self, HostRequest, HostedEventSummary, LoginRequest, LogoutResponse, SignupRequest,
    UserResponse,
};
use crate::web::events::{
    self, BrowseRequest, CreateEventResponse, DeleteEventRequest, EventDetail, EventSummary,
};
use crate::web::pages::{self, PageResponse, PageSectionResponse};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::current_user_handler,
        auth::become_host_handler,
        events::create_event_handler,
        events::delete_event_handler,
        events::dashboard_ticket_handler,
        events::browse_events_handler,
        events::ticket_handler,
        events::ticket_image_handler,
        pages::page_handler,
        pages::information_page_handler,
    ),
    components(
        schemas(
            SignupRequest,
            LoginRequest,
            HostRequest,
            UserResponse,
            HostedEventSummary,
            LogoutResponse,
            BrowseRequest,
            DeleteEventRequest,
            CreateEventResponse,
            EventSummary,
            EventDetail,
            PageResponse,
            PageSectionResponse,
        )
    ),
    tags(
        (name = "Ticketing API", description = "Accounts, sessions and ticketed events.")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_session_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/login"));
        assert!(doc.paths.paths.contains_key("/api/create-event"));
        assert!(doc.paths.paths.contains_key("/api/ticket/{id}"));
        assert!(doc.paths.paths.contains_key("/api/information/{slug}"));
    }
}
