//! crates/ticketing_core/src/ports.rs
//!
//! Defines the store contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    Event, EventFilter, EventPatch, EventQuery, NewEvent, NewUser, Page, User, UserCredentials,
    UserPatch,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the underlying store.
/// Missing items are not errors; lookups return `Option`.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Store Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>>;

    async fn find_user_by_social_id(&self, social_id: &str) -> PortResult<Option<User>>;

    async fn get_credentials(&self, social_id: &str) -> PortResult<Option<UserCredentials>>;

    /// Fails with `PortError::Conflict` when the social id is already taken.
    async fn create_user(&self, new_user: NewUser) -> PortResult<User>;

    async fn update_user_fields(&self, user_id: Uuid, patch: UserPatch) -> PortResult<Option<User>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn find_events(&self, query: &EventQuery) -> PortResult<Vec<Event>>;

    async fn find_event(&self, filter: &EventFilter) -> PortResult<Option<Event>>;

    /// Fails with `PortError::Conflict` when the event name is already taken.
    async fn create_event(&self, new_event: NewEvent) -> PortResult<Event>;

    /// Returns `None` when no event has this id or a guard in the patch did not hold.
    async fn update_event_fields(&self, id: Uuid, patch: EventPatch) -> PortResult<Option<Event>>;

    async fn delete_event(&self, id: Uuid) -> PortResult<Option<Event>>;
}

#[async_trait]
pub trait PageStore: Send + Sync {
    async fn find_page_by_title(&self, title: &str) -> PortResult<Option<Page>>;

    async fn find_page_by_slug(&self, slug: &str) -> PortResult<Option<Page>>;
}
