//! crates/ticketing_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Principals
//=========================================================================================

/// The account class of a user. Every account starts out as a `Guest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountType {
    #[default]
    Guest,
    Host,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Guest => "Guest",
            AccountType::Host => "Host",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Guest" => Ok(AccountType::Guest),
            "Host" => Ok(AccountType::Host),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Expected and realized income, tracked for hosts and for events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Income {
    pub expected: i64,
    pub realized: i64,
}

/// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    /// Unique login handle. Signup stores the email here.
    pub social_id: String,
    pub name: String,
    pub email: Option<String>,
    pub account_type: AccountType,
    pub account_number: Option<String>,
    pub bank: Option<String>,
    pub income: Income,
    pub events_hosted: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_host(&self) -> bool {
        self.account_type == AccountType::Host
    }
}

// Only used internally for login - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub social_id: String,
    pub password_hash: String,
}

/// Everything needed to insert a user at signup.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub social_id: String,
    pub name: String,
    pub email: Option<String>,
    pub password_hash: String,
}

/// A partial update of a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub account_type: Option<AccountType>,
    pub account_number: Option<String>,
    pub bank: Option<String>,
    pub expected_income: Option<i64>,
    pub push_event_hosted: Option<Uuid>,
    pub pull_event_hosted: Option<Uuid>,
}

//=========================================================================================
// Events
//=========================================================================================

/// How an event's date is rolled forward once it has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Recurrence {
    Single,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Single => "Single",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
        }
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Single" => Ok(Recurrence::Single),
            "Weekly" => Ok(Recurrence::Weekly),
            "Monthly" => Ok(Recurrence::Monthly),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Returned when a stored or submitted label names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant '{0}'")]
pub struct UnknownVariant(pub String);

/// An uploaded event image. The bytes are opaque to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct EventImage {
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organizer {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostInfo {
    pub host_id: Uuid,
    pub host_name: String,
    pub host_social: String,
}

/// Where an event's ticket income is paid out. Set per event, independently
/// of the host's own account details.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub account_number: String,
    pub bank: String,
}

/// Represents a ticketed event.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Uuid,
    pub event_name: String,
    pub location: String,
    /// The scheduled instant of the (next) occurrence.
    pub date_stamp: DateTime<Utc>,
    pub recurrence: Recurrence,
    /// Only meaningful for `Recurrence::Single`. Never reset once true.
    pub date_passed: bool,
    pub time_label: String,
    pub state: String,
    pub event_type: String,
    pub image: Option<EventImage>,
    pub organizer: Organizer,
    pub hype: String,
    pub host: HostInfo,
    pub payout: Payout,
    pub tickets: serde_json::Value,
    pub total_available_tickets: i64,
    pub total_sold_tickets: i64,
    pub income: Income,
    pub created_at: DateTime<Utc>,
}

/// Everything needed to insert an event.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_name: String,
    pub location: String,
    pub date_stamp: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub time_label: String,
    pub state: String,
    pub event_type: String,
    pub image: Option<EventImage>,
    pub organizer: Organizer,
    pub hype: String,
    pub host: HostInfo,
    pub payout: Payout,
    pub tickets: serde_json::Value,
    pub total_available_tickets: i64,
    pub expected_income: i64,
}

/// Field-equality criteria for selecting events. `None` matches anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    pub id: Option<Uuid>,
    pub event_name: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub date_passed: Option<bool>,
    pub state: Option<String>,
    pub event_type: Option<String>,
    pub host_id: Option<Uuid>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.id.map_or(true, |id| event.id == id)
            && self
                .event_name
                .as_ref()
                .map_or(true, |n| &event.event_name == n)
            && self.recurrence.map_or(true, |r| event.recurrence == r)
            && self.date_passed.map_or(true, |p| event.date_passed == p)
            && self.state.as_ref().map_or(true, |s| &event.state == s)
            && self
                .event_type
                .as_ref()
                .map_or(true, |t| &event.event_type == t)
            && self.host_id.map_or(true, |h| event.host.host_id == h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSort {
    #[default]
    DateStampAscending,
    DateStampDescending,
}

/// A paged, sorted selection of events.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub filter: EventFilter,
    pub skip: usize,
    pub limit: Option<usize>,
    pub sort: EventSort,
}

impl EventQuery {
    pub fn all(filter: EventFilter) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }
}

/// A partial, optionally conditional update of an event.
///
/// The `expected_*` fields are guards: when set, the store applies the update
/// only if the stored value still equals the expectation, and otherwise
/// reports no match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPatch {
    pub date_stamp: Option<DateTime<Utc>>,
    pub date_passed: Option<bool>,
    pub expected_date_stamp: Option<DateTime<Utc>>,
    pub expected_date_passed: Option<bool>,
}

impl EventPatch {
    pub fn guards_hold(&self, event: &Event) -> bool {
        self.expected_date_stamp
            .map_or(true, |d| event.date_stamp == d)
            && self
                .expected_date_passed
                .map_or(true, |p| event.date_passed == p)
    }

    pub fn apply(&self, event: &mut Event) {
        if let Some(date_stamp) = self.date_stamp {
            event.date_stamp = date_stamp;
        }
        if let Some(date_passed) = self.date_passed {
            event.date_passed = date_passed;
        }
    }
}

//=========================================================================================
// Pages
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PageSection {
    pub h2: String,
    pub p: String,
    pub img: Option<String>,
}

/// Static content for one page of the site.
#[derive(Debug, Clone)]
pub struct Page {
    pub id: Uuid,
    /// Stable public handle, used by information pages.
    pub slug: String,
    pub title: String,
    pub tags: String,
    pub description: String,
    pub header: Option<String>,
    pub sections: Vec<PageSection>,
    pub created_at: DateTime<Utc>,
}
