//! services/api/src/web/events.rs
//!
//! Event endpoints: host-only management and the public browse/detail views.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use ticketing_core::{
    Event, EventFilter, EventImage, EventQuery, EventSort, HostInfo, NewEvent, Organizer, Payout,
    Recurrence, User, UserPatch,
};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::{is_valid_email, user_response, UserResponse};
use crate::web::middleware::{ensure_host, load_principal, AuthenticatedPrincipal};
use crate::web::state::AppState;

/// Events returned per browse request.
pub const BROWSE_PAGE_SIZE: usize = 9;

/// The multipart field carrying the event image.
pub const IMAGE_FIELD: &str = "event-image";

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The card-sized view of an event shown while browsing.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct EventSummary {
    pub id: Uuid,
    pub event_name: String,
    pub date_stamp: DateTime<Utc>,
    pub time_label: String,
    pub state: String,
    pub location: String,
    pub event_type: String,
    pub has_image: bool,
}

impl From<Event> for EventSummary {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_name: event.event_name,
            date_stamp: event.date_stamp,
            time_label: event.time_label,
            state: event.state,
            location: event.location,
            event_type: event.event_type,
            has_image: event.image.is_some(),
        }
    }
}

/// The full view of an event. The image is served separately, and the payout
/// details are only filled in for the event's own host.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct EventDetail {
    pub id: Uuid,
    pub event_name: String,
    pub location: String,
    pub date_stamp: DateTime<Utc>,
    pub recurrence: String,
    pub date_passed: bool,
    pub time_label: String,
    pub state: String,
    pub event_type: String,
    pub has_image: bool,
    pub organizer_name: String,
    pub organizer_email: String,
    pub hype: String,
    pub host_id: Uuid,
    pub host_name: String,
    pub host_social: String,
    #[schema(value_type = Object)]
    pub tickets: serde_json::Value,
    pub total_available_tickets: i64,
    pub total_sold_tickets: i64,
    pub income_expected: i64,
    pub income_realized: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
}

impl EventDetail {
    fn for_host(event: Event) -> Self {
        let payout = event.payout.clone();
        Self {
            account_number: Some(payout.account_number),
            bank: Some(payout.bank),
            ..Self::from(event)
        }
    }
}

impl From<Event> for EventDetail {
    fn from(event: Event) -> Self {
        Self {
            id: event.id,
            event_name: event.event_name,
            location: event.location,
            date_stamp: event.date_stamp,
            recurrence: event.recurrence.to_string(),
            date_passed: event.date_passed,
            time_label: event.time_label,
            state: event.state,
            event_type: event.event_type,
            has_image: event.image.is_some(),
            organizer_name: event.organizer.name,
            organizer_email: event.organizer.email,
            hype: event.hype,
            host_id: event.host.host_id,
            host_name: event.host.host_name,
            host_social: event.host.host_social,
            tickets: event.tickets,
            total_available_tickets: event.total_available_tickets,
            total_sold_tickets: event.total_sold_tickets,
            income_expected: event.income.expected,
            income_realized: event.income.realized,
            account_number: None,
            bank: None,
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateEventResponse {
    pub success: bool,
    pub ticket_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct DeleteEventRequest {
    pub delete_id: Uuid,
}

#[derive(Deserialize, ToSchema, Default)]
pub struct BrowseRequest {
    pub state: Option<String>,
    pub event_type: Option<String>,
    /// Number of events the client already displays.
    #[serde(default)]
    pub n: usize,
}

//=========================================================================================
// Event Form
//=========================================================================================

/// The raw fields of a create-event submission.
#[derive(Debug, Default)]
pub struct EventForm {
    pub fields: HashMap<String, String>,
    pub image: Option<EventImage>,
}

/// A validated submission: the event to insert and the host's new expected income.
#[derive(Debug)]
pub struct ValidatedEvent {
    pub new_event: NewEvent,
    pub host_expected_income: i64,
}

impl EventForm {
    pub async fn read(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = EventForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read multipart data: {}", e)))?
        {
            let name = field.name().unwrap_or_default().to_string();
            if name == IMAGE_FIELD {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read image bytes: {}", e))
                })?;
                form.image = Some(EventImage {
                    content_type,
                    data: data.to_vec(),
                });
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read field {}: {}", name, e)))?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }

    fn text(&self, key: &str) -> &str {
        self.fields.get(key).map(|s| s.trim()).unwrap_or_default()
    }

    fn number(&self, key: &str) -> Option<i64> {
        self.text(key).parse().ok()
    }

    /// Checks every field and builds the event for `host`. Events must be at
    /// least a day in the future at submission time.
    pub fn validate(self, host: &User, now: DateTime<Utc>) -> Result<ValidatedEvent, ApiError> {
        let invalid = || ApiError::BadRequest("Make sure all fields are filled correctly!".to_string());

        let date_stamp = DateTime::parse_from_rfc3339(self.text("date"))
            .map_err(|_| invalid())?
            .with_timezone(&Utc);
        let recurrence: Recurrence = self.text("repeat").parse().map_err(|_| invalid())?;
        let tickets: serde_json::Value =
            serde_json::from_str(self.text("created_tickets")).map_err(|_| invalid())?;
        let total_available_tickets = self.number("total_available_tickets").ok_or_else(invalid)?;
        let host_expected_income = self.number("income").ok_or_else(invalid)?;
        let expected_income = self.number("pre_income").ok_or_else(invalid)?;
        let account_number = self.text("account_number");

        let well_formed = !self.text("event_name").is_empty()
            && date_stamp >= now + Duration::days(1)
            && !self.text("time").is_empty()
            && self.text("venue").len() >= 3
            && !self.text("event_brand").is_empty()
            && is_valid_email(self.text("email"))
            && account_number.len() == 10
            && account_number.chars().all(|c| c.is_ascii_digit())
            && self.text("bank").len() >= 3
            && self.text("state").len() >= 3
            && self.text("event_type").len() >= 3
            && self.text("description").len() >= 3
            && total_available_tickets >= 1
            && host_expected_income >= 100
            && expected_income >= 100;
        if !well_formed {
            return Err(invalid());
        }
        let image = self
            .image
            .clone()
            .ok_or_else(|| ApiError::BadRequest("An event image is required".to_string()))?;

        let new_event = NewEvent {
            event_name: self.text("event_name").to_string(),
            location: self.text("venue").to_string(),
            date_stamp,
            recurrence,
            time_label: self.text("time").to_string(),
            state: self.text("state").to_string(),
            event_type: self.text("event_type").to_string(),
            image: Some(image),
            organizer: Organizer {
                name: self.text("event_brand").to_string(),
                email: self.text("email").to_string(),
            },
            hype: self.text("description").to_string(),
            host: HostInfo {
                host_id: host.user_id,
                host_name: host.name.clone(),
                host_social: host.social_id.clone(),
            },
            payout: Payout {
                account_number: account_number.to_string(),
                bank: self.text("bank").to_string(),
            },
            tickets,
            total_available_tickets,
            expected_income,
        };
        Ok(ValidatedEvent {
            new_event,
            host_expected_income,
        })
    }
}

//=========================================================================================
// Host Handlers
//=========================================================================================

/// Create a new event. Hosts only.
///
/// Accepts a multipart/form-data request with the event fields as text parts
/// and the image as the `event-image` file part.
#[utoipa::path(
    post,
    path = "/api/create-event",
    request_body(content_type = "multipart/form-data", description = "Event fields and image."),
    responses(
        (status = 201, description = "Event created", body = CreateEventResponse),
        (status = 400, description = "Invalid form"),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not a host"),
        (status = 409, description = "An event with the same name already exists")
    )
)]
pub async fn create_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let host = load_principal(&state, principal).await?;
    ensure_host(&host)?;

    let form = EventForm::read(&mut multipart).await?;
    let ValidatedEvent {
        new_event,
        host_expected_income,
    } = form.validate(&host, state.clock.now())?;

    let name_taken = state
        .events
        .find_event(&EventFilter {
            event_name: Some(new_event.event_name.clone()),
            ..EventFilter::default()
        })
        .await?
        .is_some();
    if name_taken {
        return Err(ApiError::Conflict(format!(
            "Event {} already exists",
            new_event.event_name
        )));
    }

    let event = state.events.create_event(new_event).await?;
    state
        .users
        .update_user_fields(
            host.user_id,
            UserPatch {
                push_event_hosted: Some(event.id),
                expected_income: Some(host_expected_income),
                ..UserPatch::default()
            },
        )
        .await?;
    info!(event_id = %event.id, host_id = %host.user_id, recurrence = %event.recurrence, "event created");

    Ok((
        StatusCode::CREATED,
        Json(CreateEventResponse {
            success: true,
            ticket_id: event.id,
        }),
    ))
}

/// Delete one of the caller's events. Hosts only.
#[utoipa::path(
    post,
    path = "/api/delete-event",
    request_body = DeleteEventRequest,
    responses(
        (status = 200, description = "Event deleted; the updated host", body = UserResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not a host, or not this event's host"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn delete_event_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Json(req): Json<DeleteEventRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let host = load_principal(&state, principal).await?;
    ensure_host(&host)?;

    let event = find_event_by_id(&state, req.delete_id).await?;
    ensure_owner(&host, &event)?;

    let deleted = state
        .events
        .delete_event(event.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Event {} not found", event.id)))?;
    let user = state
        .users
        .update_user_fields(
            host.user_id,
            UserPatch {
                pull_event_hosted: Some(deleted.id),
                expected_income: Some(host.income.expected - deleted.income.expected),
                ..UserPatch::default()
            },
        )
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    info!(event_id = %deleted.id, host_id = %host.user_id, "event deleted");
    Ok(Json(user_response(&state, user).await?))
}

/// The host dashboard view of one event. Only its own host may see it.
#[utoipa::path(
    get,
    path = "/api/dashboard/ticket/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event detail", body = EventDetail),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Not this event's host"),
        (status = 404, description = "Event not found")
    )
)]
pub async fn dashboard_ticket_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetail>, ApiError> {
    let host = load_principal(&state, principal).await?;
    ensure_host(&host)?;

    let event = find_event_by_id(&state, id).await?;
    ensure_owner(&host, &event)?;
    Ok(Json(EventDetail::for_host(event)))
}

fn ensure_owner(host: &User, event: &Event) -> Result<(), ApiError> {
    if event.host.host_id == host.user_id {
        Ok(())
    } else {
        warn!(event_id = %event.id, user_id = %host.user_id, "host tried to manage another host's event");
        Err(ApiError::NotAuthorized("Not this event's host".to_string()))
    }
}

async fn find_event_by_id(state: &AppState, id: Uuid) -> Result<Event, ApiError> {
    state
        .events
        .find_event(&EventFilter {
            id: Some(id),
            ..EventFilter::default()
        })
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Event {} not found", id)))
}

//=========================================================================================
// Public Handlers
//=========================================================================================

/// Browse upcoming events, optionally by state and event type.
#[utoipa::path(
    post,
    path = "/api/events",
    request_body = BrowseRequest,
    responses(
        (status = 200, description = "A page of events", body = [EventSummary])
    )
)]
pub async fn browse_events_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BrowseRequest>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    let query = EventQuery {
        filter: EventFilter {
            state: req.state.filter(|s| !s.is_empty()),
            event_type: req.event_type.filter(|t| !t.is_empty()),
            date_passed: Some(false),
            ..EventFilter::default()
        },
        skip: req.n,
        limit: Some(BROWSE_PAGE_SIZE),
        sort: EventSort::DateStampAscending,
    };
    let events = state.events.find_events(&query).await?;
    Ok(Json(events.into_iter().map(EventSummary::from).collect()))
}

/// Public detail of a single event.
#[utoipa::path(
    get,
    path = "/api/ticket/{id}",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event detail", body = EventDetail),
        (status = 404, description = "Event not found")
    )
)]
pub async fn ticket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<EventDetail>, ApiError> {
    let event = find_event_by_id(&state, id).await?;
    Ok(Json(event.into()))
}

/// The stored image of an event, served with its original content type.
#[utoipa::path(
    get,
    path = "/api/ticket/{id}/image",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "Event or image not found")
    )
)]
pub async fn ticket_image_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let event = find_event_by_id(&state, id).await?;
    let image = event
        .image
        .ok_or_else(|| ApiError::NotFound(format!("Event {} has no image", id)))?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ticketing_core::{AccountType, Income};

    fn host() -> User {
        User {
            user_id: Uuid::new_v4(),
            social_id: "host@example.com".to_string(),
            name: "Host".to_string(),
            email: Some("host@example.com".to_string()),
            account_type: AccountType::Host,
            account_number: Some("0123456789".to_string()),
            bank: Some("First Bank".to_string()),
            income: Income::default(),
            events_hosted: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn valid_fields() -> HashMap<String, String> {
        [
            ("event_name", "Rooftop Jazz"),
            ("date", "2024-06-20T19:00:00Z"),
            ("repeat", "Weekly"),
            ("time", "7pm"),
            ("venue", "Skyline Roof"),
            ("event_brand", "Jazz Co"),
            ("email", "jazz@example.com"),
            ("account_number", "0123456789"),
            ("bank", "First Bank"),
            ("state", "Lagos"),
            ("event_type", "Concert"),
            ("description", "Smooth evening"),
            ("created_tickets", r#"[{"name":"Regular","price":5000}]"#),
            ("total_available_tickets", "120"),
            ("income", "600000"),
            ("pre_income", "600000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn form(fields: HashMap<String, String>) -> EventForm {
        EventForm {
            fields,
            image: Some(EventImage {
                content_type: "image/png".to_string(),
                data: vec![0x89, 0x50, 0x4e, 0x47],
            }),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn valid_form_builds_event_for_host() {
        let host = host();
        let validated = form(valid_fields()).validate(&host, now()).unwrap();
        let event = validated.new_event;
        assert_eq!(event.recurrence, Recurrence::Weekly);
        assert_eq!(event.host.host_id, host.user_id);
        assert_eq!(event.location, "Skyline Roof");
        assert_eq!(event.expected_income, 600000);
        assert_eq!(validated.host_expected_income, 600000);
        assert_eq!(event.payout.account_number, "0123456789");
        assert_eq!(event.payout.bank, "First Bank");
        assert!(event.tickets.is_array());
    }

    #[test]
    fn event_less_than_a_day_ahead_is_rejected() {
        let mut fields = valid_fields();
        fields.insert("date".to_string(), "2024-06-02T06:00:00Z".to_string());
        let err = form(fields).validate(&host(), now()).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn unknown_recurrence_is_rejected() {
        let mut fields = valid_fields();
        fields.insert("repeat".to_string(), "Daily".to_string());
        assert!(form(fields).validate(&host(), now()).is_err());
    }

    #[test]
    fn short_account_number_is_rejected() {
        let mut fields = valid_fields();
        fields.insert("account_number".to_string(), "12345".to_string());
        assert!(form(fields).validate(&host(), now()).is_err());
    }

    #[test]
    fn missing_image_is_rejected() {
        let mut form = form(valid_fields());
        form.image = None;
        assert!(form.validate(&host(), now()).is_err());
    }
}
