//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the store ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use ticketing_core::domain::{
    Event, EventFilter, EventImage, EventPatch, EventQuery, EventSort, HostInfo, Income, NewEvent,
    NewUser, Organizer, Page, PageSection, Payout, User, UserCredentials, UserPatch,
};
use ticketing_core::ports::{EventStore, PageStore, PortError, PortResult, UserStore};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the store ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn conflict_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => PortError::Conflict(what),
        _ => unexpected(e),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const USER_COLUMNS: &str = "user_id, social_id, name, email, account_type, account_number, \
     bank, income_expected, income_realized, events_hosted, created_at";

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    social_id: String,
    name: String,
    email: Option<String>,
    account_type: String,
    account_number: Option<String>,
    bank: Option<String>,
    income_expected: i64,
    income_realized: i64,
    events_hosted: Vec<Uuid>,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let account_type = self
            .account_type
            .parse()
            .map_err(|e: ticketing_core::domain::UnknownVariant| {
                PortError::Unexpected(format!("user {}: {}", self.user_id, e))
            })?;
        Ok(User {
            user_id: self.user_id,
            social_id: self.social_id,
            name: self.name,
            email: self.email,
            account_type,
            account_number: self.account_number,
            bank: self.bank,
            income: Income {
                expected: self.income_expected,
                realized: self.income_realized,
            },
            events_hosted: self.events_hosted,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    social_id: String,
    password_hash: String,
}

const EVENT_COLUMNS: &str = "id, event_name, location, date_stamp, recurrence, date_passed, \
     time_label, state, event_type, image_content_type, image_data, org_name, org_email, hype, \
     host_id, host_name, host_social, payout_account_number, payout_bank, tickets, \
     total_available_tickets, total_sold_tickets, income_expected, income_realized, created_at";

#[derive(FromRow)]
struct EventRecord {
    id: Uuid,
    event_name: String,
    location: String,
    date_stamp: DateTime<Utc>,
    recurrence: String,
    date_passed: bool,
    time_label: String,
    state: String,
    event_type: String,
    image_content_type: Option<String>,
    image_data: Option<Vec<u8>>,
    org_name: String,
    org_email: String,
    hype: String,
    host_id: Uuid,
    host_name: String,
    host_social: String,
    payout_account_number: String,
    payout_bank: String,
    tickets: serde_json::Value,
    total_available_tickets: i64,
    total_sold_tickets: i64,
    income_expected: i64,
    income_realized: i64,
    created_at: DateTime<Utc>,
}
impl EventRecord {
    fn to_domain(self) -> PortResult<Event> {
        let recurrence = self
            .recurrence
            .parse()
            .map_err(|e: ticketing_core::domain::UnknownVariant| {
                PortError::Unexpected(format!("event {}: {}", self.id, e))
            })?;
        let image = match (self.image_content_type, self.image_data) {
            (Some(content_type), Some(data)) => Some(EventImage { content_type, data }),
            _ => None,
        };
        Ok(Event {
            id: self.id,
            event_name: self.event_name,
            location: self.location,
            date_stamp: self.date_stamp,
            recurrence,
            date_passed: self.date_passed,
            time_label: self.time_label,
            state: self.state,
            event_type: self.event_type,
            image,
            organizer: Organizer {
                name: self.org_name,
                email: self.org_email,
            },
            hype: self.hype,
            host: HostInfo {
                host_id: self.host_id,
                host_name: self.host_name,
                host_social: self.host_social,
            },
            payout: Payout {
                account_number: self.payout_account_number,
                bank: self.payout_bank,
            },
            tickets: self.tickets,
            total_available_tickets: self.total_available_tickets,
            total_sold_tickets: self.total_sold_tickets,
            income: Income {
                expected: self.income_expected,
                realized: self.income_realized,
            },
            created_at: self.created_at,
        })
    }
}

#[derive(Deserialize)]
struct PageSectionRecord {
    h2: String,
    p: String,
    img: Option<String>,
}

#[derive(FromRow)]
struct PageRecord {
    id: Uuid,
    slug: String,
    title: String,
    tags: String,
    description: String,
    header: Option<String>,
    sections: Json<Vec<PageSectionRecord>>,
    created_at: DateTime<Utc>,
}
impl PageRecord {
    fn to_domain(self) -> Page {
        Page {
            id: self.id,
            slug: self.slug,
            title: self.title,
            tags: self.tags,
            description: self.description,
            header: self.header,
            sections: self
                .sections
                .0
                .into_iter()
                .map(|s| PageSection {
                    h2: s.h2,
                    p: s.p,
                    img: s.img,
                })
                .collect(),
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// Query Building Helpers
//=========================================================================================

fn push_event_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &EventFilter) {
    if let Some(id) = filter.id {
        qb.push(" AND id = ").push_bind(id);
    }
    if let Some(name) = &filter.event_name {
        qb.push(" AND event_name = ").push_bind(name.clone());
    }
    if let Some(recurrence) = filter.recurrence {
        qb.push(" AND recurrence = ").push_bind(recurrence.as_str());
    }
    if let Some(date_passed) = filter.date_passed {
        qb.push(" AND date_passed = ").push_bind(date_passed);
    }
    if let Some(state) = &filter.state {
        qb.push(" AND state = ").push_bind(state.clone());
    }
    if let Some(event_type) = &filter.event_type {
        qb.push(" AND event_type = ").push_bind(event_type.clone());
    }
    if let Some(host_id) = filter.host_id {
        qb.push(" AND host_id = ").push_bind(host_id);
    }
}

/// Postgres takes LIMIT and OFFSET as BIGINT. Larger counts saturate.
fn row_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

//=========================================================================================
// Store Trait Implementations
//=========================================================================================

#[async_trait]
impl UserStore for DbAdapter {
    async fn find_user_by_id(&self, user_id: Uuid) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn find_user_by_social_id(&self, social_id: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE social_id = $1"
        ))
        .bind(social_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn get_credentials(&self, social_id: &str) -> PortResult<Option<UserCredentials>> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, social_id, password_hash FROM users WHERE social_id = $1",
        )
        .bind(social_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| UserCredentials {
            user_id: r.user_id,
            social_id: r.social_id,
            password_hash: r.password_hash,
        }))
    }

    async fn create_user(&self, new_user: NewUser) -> PortResult<User> {
        let social_id = new_user.social_id.clone();
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (user_id, social_id, name, email, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_user.social_id)
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("User {} already exists", social_id)))?;
        record.to_domain()
    }

    async fn update_user_fields(&self, user_id: Uuid, patch: UserPatch) -> PortResult<Option<User>> {
        // `user_id = user_id` keeps the SET list non-empty for an empty patch.
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE users SET user_id = user_id");
        if let Some(account_type) = patch.account_type {
            qb.push(", account_type = ").push_bind(account_type.as_str());
        }
        if let Some(account_number) = patch.account_number {
            qb.push(", account_number = ").push_bind(account_number);
        }
        if let Some(bank) = patch.bank {
            qb.push(", bank = ").push_bind(bank);
        }
        if let Some(expected) = patch.expected_income {
            qb.push(", income_expected = ").push_bind(expected);
        }
        match (patch.push_event_hosted, patch.pull_event_hosted) {
            (Some(push), Some(pull)) => {
                qb.push(", events_hosted = array_append(array_remove(events_hosted, ")
                    .push_bind(pull)
                    .push("), ")
                    .push_bind(push)
                    .push(")");
            }
            (Some(push), None) => {
                qb.push(", events_hosted = array_append(events_hosted, ")
                    .push_bind(push)
                    .push(")");
            }
            (None, Some(pull)) => {
                qb.push(", events_hosted = array_remove(events_hosted, ")
                    .push_bind(pull)
                    .push(")");
            }
            (None, None) => {}
        }
        qb.push(" WHERE user_id = ").push_bind(user_id);
        qb.push(format!(" RETURNING {USER_COLUMNS}"));

        let record = qb
            .build_query_as::<UserRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(UserRecord::to_domain).transpose()
    }
}

#[async_trait]
impl EventStore for DbAdapter {
    async fn find_events(&self, query: &EventQuery) -> PortResult<Vec<Event>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
        push_event_filter(&mut qb, &query.filter);
        qb.push(match query.sort {
            EventSort::DateStampAscending => " ORDER BY date_stamp ASC, id ASC",
            EventSort::DateStampDescending => " ORDER BY date_stamp DESC, id ASC",
        });
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(row_count(limit));
        }
        qb.push(" OFFSET ").push_bind(row_count(query.skip));

        let records = qb
            .build_query_as::<EventRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        records.into_iter().map(EventRecord::to_domain).collect()
    }

    async fn find_event(&self, filter: &EventFilter) -> PortResult<Option<Event>> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {EVENT_COLUMNS} FROM events WHERE TRUE"));
        push_event_filter(&mut qb, filter);
        qb.push(" LIMIT 1");

        let record = qb
            .build_query_as::<EventRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(EventRecord::to_domain).transpose()
    }

    async fn create_event(&self, new_event: NewEvent) -> PortResult<Event> {
        let event_name = new_event.event_name.clone();
        let (image_content_type, image_data) = match new_event.image {
            Some(image) => (Some(image.content_type), Some(image.data)),
            None => (None, None),
        };
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "INSERT INTO events (id, event_name, location, date_stamp, recurrence, time_label, \
             state, event_type, image_content_type, image_data, org_name, org_email, hype, \
             host_id, host_name, host_social, payout_account_number, payout_bank, tickets, \
             total_available_tickets, income_expected) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_event.event_name)
        .bind(new_event.location)
        .bind(new_event.date_stamp)
        .bind(new_event.recurrence.as_str())
        .bind(new_event.time_label)
        .bind(new_event.state)
        .bind(new_event.event_type)
        .bind(image_content_type)
        .bind(image_data)
        .bind(new_event.organizer.name)
        .bind(new_event.organizer.email)
        .bind(new_event.hype)
        .bind(new_event.host.host_id)
        .bind(new_event.host.host_name)
        .bind(new_event.host.host_social)
        .bind(new_event.payout.account_number)
        .bind(new_event.payout.bank)
        .bind(Json(new_event.tickets))
        .bind(new_event.total_available_tickets)
        .bind(new_event.expected_income)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("Event {} already exists", event_name)))?;
        record.to_domain()
    }

    async fn update_event_fields(&self, id: Uuid, patch: EventPatch) -> PortResult<Option<Event>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE events SET id = id");
        if let Some(date_stamp) = patch.date_stamp {
            qb.push(", date_stamp = ").push_bind(date_stamp);
        }
        if let Some(date_passed) = patch.date_passed {
            qb.push(", date_passed = ").push_bind(date_passed);
        }
        qb.push(" WHERE id = ").push_bind(id);
        // Guards make this a per-row compare-and-set.
        if let Some(expected) = patch.expected_date_stamp {
            qb.push(" AND date_stamp = ").push_bind(expected);
        }
        if let Some(expected) = patch.expected_date_passed {
            qb.push(" AND date_passed = ").push_bind(expected);
        }
        qb.push(format!(" RETURNING {EVENT_COLUMNS}"));

        let record = qb
            .build_query_as::<EventRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        record.map(EventRecord::to_domain).transpose()
    }

    async fn delete_event(&self, id: Uuid) -> PortResult<Option<Event>> {
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "DELETE FROM events WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(EventRecord::to_domain).transpose()
    }
}

const PAGE_COLUMNS: &str = "id, slug, title, tags, description, header, sections, created_at";

#[async_trait]
impl PageStore for DbAdapter {
    async fn find_page_by_title(&self, title: &str) -> PortResult<Option<Page>> {
        let record = sqlx::query_as::<_, PageRecord>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE title = $1"
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PageRecord::to_domain))
    }

    async fn find_page_by_slug(&self, slug: &str) -> PortResult<Option<Page>> {
        let record = sqlx::query_as::<_, PageRecord>(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PageRecord::to_domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_counts_saturate_instead_of_wrapping() {
        assert_eq!(row_count(0), 0);
        assert_eq!(row_count(9), 9);
        assert_eq!(row_count(i64::MAX as usize), i64::MAX);
        assert_eq!(row_count(usize::MAX), i64::MAX);
    }
}
