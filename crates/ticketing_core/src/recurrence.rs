//! crates/ticketing_core/src/recurrence.rs
//!
//! Date rollover rules for recurring events, and the three sweeps that apply them.
//!
//! Every sweep is a best-effort batch: fetch the candidate set, then issue one
//! conditional update per elapsed event. A failed update is logged and left for
//! the next run, which will pick the event up again because it is still in the
//! past. Each run moves a recurring event forward by exactly one period, so an
//! event that is several periods overdue catches up over several runs.

use chrono::{DateTime, Duration, Months, Utc};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::{Event, EventFilter, EventPatch, EventQuery, Recurrence};
use crate::ports::{EventStore, PortResult};

impl Recurrence {
    /// The date of the next occurrence after `stamp`, or `None` for one-off events.
    ///
    /// Monthly steps land on the same day of the next month, clamped to its last day.
    pub fn advance(&self, stamp: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Recurrence::Single => None,
            Recurrence::Weekly => stamp.checked_add_signed(Duration::weeks(1)),
            Recurrence::Monthly => stamp.checked_add_months(Months::new(1)),
        }
    }
}

/// The tally of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Candidates returned by the scan.
    pub scanned: usize,
    /// Events actually written.
    pub updated: usize,
    /// Candidates not yet due, or whose guard no longer held at write time.
    pub skipped: usize,
    /// Updates that errored.
    pub failed: usize,
}

/// Which sweep to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    PassedEvents,
    WeeklyRollover,
    MonthlyRollover,
}

impl SweepKind {
    pub fn name(&self) -> &'static str {
        match self {
            SweepKind::PassedEvents => "passed-event sweep",
            SweepKind::WeeklyRollover => "weekly rollover",
            SweepKind::MonthlyRollover => "monthly rollover",
        }
    }

    pub async fn run(&self, store: &dyn EventStore, clock: &dyn Clock) -> PortResult<SweepReport> {
        match self {
            SweepKind::PassedEvents => sweep_passed_events(store, clock).await,
            SweepKind::WeeklyRollover => roll_weekly_events(store, clock).await,
            SweepKind::MonthlyRollover => roll_monthly_events(store, clock).await,
        }
    }
}

/// Marks every elapsed one-off event as passed. Passed events are never selected again.
pub async fn sweep_passed_events(
    store: &dyn EventStore,
    clock: &dyn Clock,
) -> PortResult<SweepReport> {
    let candidates = store
        .find_events(&EventQuery::all(EventFilter {
            recurrence: Some(Recurrence::Single),
            date_passed: Some(false),
            ..EventFilter::default()
        }))
        .await?;
    let now = clock.now();

    let report = apply_each(store, candidates, |event| {
        (event.date_stamp < now).then(|| EventPatch {
            date_passed: Some(true),
            expected_date_passed: Some(false),
            ..EventPatch::default()
        })
    })
    .await;
    info!(?report, "passed-event sweep finished");
    Ok(report)
}

pub async fn roll_weekly_events(
    store: &dyn EventStore,
    clock: &dyn Clock,
) -> PortResult<SweepReport> {
    roll_events(store, clock, Recurrence::Weekly).await
}

pub async fn roll_monthly_events(
    store: &dyn EventStore,
    clock: &dyn Clock,
) -> PortResult<SweepReport> {
    roll_events(store, clock, Recurrence::Monthly).await
}

/// Advances every elapsed event of `recurrence` by one period.
async fn roll_events(
    store: &dyn EventStore,
    clock: &dyn Clock,
    recurrence: Recurrence,
) -> PortResult<SweepReport> {
    let candidates = store
        .find_events(&EventQuery::all(EventFilter {
            recurrence: Some(recurrence),
            ..EventFilter::default()
        }))
        .await?;
    let now = clock.now();

    let report = apply_each(store, candidates, |event| {
        if event.date_stamp >= now {
            return None;
        }
        let next = recurrence.advance(event.date_stamp)?;
        Some(EventPatch {
            date_stamp: Some(next),
            expected_date_stamp: Some(event.date_stamp),
            ..EventPatch::default()
        })
    })
    .await;
    info!(%recurrence, ?report, "rollover finished");
    Ok(report)
}

async fn apply_each<F>(store: &dyn EventStore, candidates: Vec<Event>, patch_for: F) -> SweepReport
where
    F: Fn(&Event) -> Option<EventPatch>,
{
    let mut report = SweepReport {
        scanned: candidates.len(),
        ..SweepReport::default()
    };

    for event in &candidates {
        let Some(patch) = patch_for(event) else {
            report.skipped += 1;
            continue;
        };
        match store.update_event_fields(event.id, patch).await {
            Ok(Some(_)) => report.updated += 1,
            Ok(None) => report.skipped += 1,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "event update failed; will retry next run");
                report.failed += 1;
            }
        }
    }
    report
}
