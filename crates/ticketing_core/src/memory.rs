//! crates/ticketing_core/src/memory.rs
//!
//! An in-process implementation of the store ports, for tests and local runs.
//! Conditional updates are applied under a single write lock, so guards behave
//! like per-document compare-and-set.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    Event, EventFilter, EventPatch, EventQuery, EventSort, Income, NewEvent, NewUser, Page, User,
    UserCredentials, UserPatch,
};
use crate::ports::{EventStore, PageStore, PortError, PortResult, UserStore};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, (User, String)>,
    events: HashMap<Uuid, Event>,
    pages: HashMap<String, Page>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event(&self, id: Uuid) -> Option<Event> {
        self.tables.read().await.events.get(&id).cloned()
    }

    pub async fn insert_page(&self, page: Page) {
        self.tables
            .write()
            .await
            .pages
            .insert(page.title.clone(), page);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&user_id).map(|(user, _)| user.clone()))
    }

    async fn find_user_by_social_id(&self, social_id: &str) -> PortResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| user.social_id == social_id)
            .map(|(user, _)| user.clone()))
    }

    async fn get_credentials(&self, social_id: &str) -> PortResult<Option<UserCredentials>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|(user, _)| user.social_id == social_id)
            .map(|(user, hash)| UserCredentials {
                user_id: user.user_id,
                social_id: user.social_id.clone(),
                password_hash: hash.clone(),
            }))
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|(user, _)| user.social_id == new_user.social_id)
        {
            return Err(PortError::Conflict(format!(
                "User {} already exists",
                new_user.social_id
            )));
        }

        let user = User {
            user_id: Uuid::new_v4(),
            social_id: new_user.social_id,
            name: new_user.name,
            email: new_user.email,
            account_type: Default::default(),
            account_number: None,
            bank: None,
            income: Income::default(),
            events_hosted: Vec::new(),
            created_at: Utc::now(),
        };
        tables
            .users
            .insert(user.user_id, (user.clone(), new_user.password_hash));
        Ok(user)
    }

    async fn update_user_fields(&self, user_id: Uuid, patch: UserPatch) -> PortResult<Option<User>> {
        let mut tables = self.tables.write().await;
        let Some((user, _)) = tables.users.get_mut(&user_id) else {
            return Ok(None);
        };

        if let Some(account_type) = patch.account_type {
            user.account_type = account_type;
        }
        if let Some(account_number) = patch.account_number {
            user.account_number = Some(account_number);
        }
        if let Some(bank) = patch.bank {
            user.bank = Some(bank);
        }
        if let Some(expected) = patch.expected_income {
            user.income.expected = expected;
        }
        if let Some(id) = patch.push_event_hosted {
            user.events_hosted.push(id);
        }
        if let Some(id) = patch.pull_event_hosted {
            user.events_hosted.retain(|hosted| *hosted != id);
        }
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn find_events(&self, query: &EventQuery) -> PortResult<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|event| query.filter.matches(event))
            .cloned()
            .collect();

        match query.sort {
            EventSort::DateStampAscending => events.sort_by_key(|e| e.date_stamp),
            EventSort::DateStampDescending => {
                events.sort_by_key(|e| std::cmp::Reverse(e.date_stamp))
            }
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(events.into_iter().skip(query.skip).take(limit).collect())
    }

    async fn find_event(&self, filter: &EventFilter) -> PortResult<Option<Event>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .values()
            .find(|event| filter.matches(event))
            .cloned())
    }

    async fn create_event(&self, new_event: NewEvent) -> PortResult<Event> {
        let mut tables = self.tables.write().await;
        if tables
            .events
            .values()
            .any(|event| event.event_name == new_event.event_name)
        {
            return Err(PortError::Conflict(format!(
                "Event {} already exists",
                new_event.event_name
            )));
        }

        let event = Event {
            id: Uuid::new_v4(),
            event_name: new_event.event_name,
            location: new_event.location,
            date_stamp: new_event.date_stamp,
            recurrence: new_event.recurrence,
            date_passed: false,
            time_label: new_event.time_label,
            state: new_event.state,
            event_type: new_event.event_type,
            image: new_event.image,
            organizer: new_event.organizer,
            hype: new_event.hype,
            host: new_event.host,
            payout: new_event.payout,
            tickets: new_event.tickets,
            total_available_tickets: new_event.total_available_tickets,
            total_sold_tickets: 0,
            income: Income {
                expected: new_event.expected_income,
                realized: 0,
            },
            created_at: Utc::now(),
        };
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn update_event_fields(&self, id: Uuid, patch: EventPatch) -> PortResult<Option<Event>> {
        let mut tables = self.tables.write().await;
        let Some(event) = tables.events.get_mut(&id) else {
            return Ok(None);
        };
        if !patch.guards_hold(event) {
            return Ok(None);
        }
        patch.apply(event);
        Ok(Some(event.clone()))
    }

    async fn delete_event(&self, id: Uuid) -> PortResult<Option<Event>> {
        Ok(self.tables.write().await.events.remove(&id))
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn find_page_by_title(&self, title: &str) -> PortResult<Option<Page>> {
        Ok(self.tables.read().await.pages.get(title).cloned())
    }

    async fn find_page_by_slug(&self, slug: &str) -> PortResult<Option<Page>> {
        let tables = self.tables.read().await;
        Ok(tables.pages.values().find(|page| page.slug == slug).cloned())
    }
}
