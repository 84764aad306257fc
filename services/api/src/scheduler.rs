//! services/api/src/scheduler.rs
//!
//! Runs the recurrence sweeps on their wall-clock schedules, all in UTC.
//!
//! Each sweep gets its own task that waits for the next trigger instant and then
//! runs the sweep to completion. Cancellation only interrupts the wait; a sweep
//! that has started always finishes its batch.

use chrono::{DateTime, Datelike, Duration, Utc};
use std::sync::Arc;
use ticketing_core::{Clock, EventStore, SweepKind};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// When a sweep fires. Every trigger is on the hour, in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Every day at `hour`:00.
    Daily { hour: u32 },
    /// At `hour`:00 on days 1, 1 + step, 1 + 2 * step, ... of every month.
    EveryNthDayOfMonth { step: u32, hour: u32 },
}

impl Trigger {
    /// The first trigger instant strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let (hour, step) = match *self {
            Trigger::Daily { hour } => (hour, 1),
            Trigger::EveryNthDayOfMonth { step, hour } => (hour, step.max(1)),
        };
        let mut day = after.date_naive();
        // Two months covers any step that can match within a month.
        for _ in 0..62 {
            if (day.day() - 1) % step == 0 {
                if let Some(at) = day.and_hms_opt(hour, 0, 0) {
                    let at = at.and_utc();
                    if at > after {
                        return at;
                    }
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        after + Duration::days(1)
    }
}

/// A sweep and the trigger it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledSweep {
    pub kind: SweepKind,
    pub trigger: Trigger,
}

/// The production schedule: passed events at midnight every seventh day of the
/// month, weekly rollovers daily at 01:00, monthly rollovers daily at 02:00.
pub const DEFAULT_SCHEDULE: [ScheduledSweep; 3] = [
    ScheduledSweep {
        kind: SweepKind::PassedEvents,
        trigger: Trigger::EveryNthDayOfMonth { step: 7, hour: 0 },
    },
    ScheduledSweep {
        kind: SweepKind::WeeklyRollover,
        trigger: Trigger::Daily { hour: 1 },
    },
    ScheduledSweep {
        kind: SweepKind::MonthlyRollover,
        trigger: Trigger::Daily { hour: 2 },
    },
];

pub struct Scheduler {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    schedule: Vec<ScheduledSweep>,
}

impl Scheduler {
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            clock,
            schedule: DEFAULT_SCHEDULE.to_vec(),
        }
    }

    pub fn with_schedule(mut self, schedule: Vec<ScheduledSweep>) -> Self {
        self.schedule = schedule;
        self
    }

    /// Spawns one task per scheduled sweep. The tasks exit once `shutdown` is cancelled.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for job in self.schedule {
            tasks.spawn(run_job(
                job,
                self.events.clone(),
                self.clock.clone(),
                shutdown.clone(),
            ));
        }
        tasks
    }
}

async fn run_job(
    job: ScheduledSweep,
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) {
    let name = job.kind.name();
    let mut after = clock.now();
    loop {
        let next = job.trigger.next_after(after);
        info!(sweep = name, next = %next, "sweep scheduled");

        let wait = (next - clock.now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!(sweep = name, "sweep scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        match job.kind.run(events.as_ref(), clock.as_ref()).await {
            Ok(report) => info!(
                sweep = name,
                scanned = report.scanned,
                updated = report.updated,
                skipped = report.skipped,
                failed = report.failed,
                "sweep finished"
            ),
            Err(e) => error!(sweep = name, error = %e, "sweep failed to scan events"),
        }

        // Never fire the same trigger twice, even if the clock lags the timer.
        after = clock.now().max(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ticketing_core::{
        EventStore, HostInfo, ManualClock, MemoryStore, NewEvent, Organizer, Payout, Recurrence,
    };

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn daily_trigger_fires_later_the_same_day_or_tomorrow() {
        let daily = Trigger::Daily { hour: 1 };
        assert_eq!(daily.next_after(at(2024, 1, 1, 0, 30)), at(2024, 1, 1, 1, 0));
        assert_eq!(daily.next_after(at(2024, 1, 1, 1, 0)), at(2024, 1, 2, 1, 0));
        assert_eq!(daily.next_after(at(2024, 12, 31, 23, 0)), at(2025, 1, 1, 1, 0));
    }

    #[test]
    fn every_seventh_day_fires_on_days_1_8_15_22_29() {
        let trigger = Trigger::EveryNthDayOfMonth { step: 7, hour: 0 };
        let mut after = at(2024, 1, 1, 0, 30);
        let mut fired = Vec::new();
        for _ in 0..6 {
            after = trigger.next_after(after);
            fired.push(after);
        }
        assert_eq!(
            fired,
            vec![
                at(2024, 1, 8, 0, 0),
                at(2024, 1, 15, 0, 0),
                at(2024, 1, 22, 0, 0),
                at(2024, 1, 29, 0, 0),
                at(2024, 2, 1, 0, 0),
                at(2024, 2, 8, 0, 0),
            ]
        );
        assert_eq!(trigger.next_after(at(2024, 2, 29, 0, 0)), at(2024, 3, 1, 0, 0));
    }

    fn weekly_event(name: &str, date_stamp: DateTime<Utc>) -> NewEvent {
        NewEvent {
            event_name: name.to_string(),
            location: "Skyline Roof".to_string(),
            date_stamp,
            recurrence: Recurrence::Weekly,
            time_label: "7pm".to_string(),
            state: "Lagos".to_string(),
            event_type: "Concert".to_string(),
            image: None,
            organizer: Organizer {
                name: "Jazz Co".to_string(),
                email: "jazz@example.com".to_string(),
            },
            hype: "Smooth evening".to_string(),
            host: HostInfo {
                host_id: uuid::Uuid::new_v4(),
                host_name: "Host".to_string(),
                host_social: "host@example.com".to_string(),
            },
            payout: Payout {
                account_number: "0123456789".to_string(),
                bank: "First Bank".to_string(),
            },
            tickets: serde_json::json!([]),
            total_available_tickets: 100,
            expected_income: 1000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn weekly_rollover_runs_at_its_trigger() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(at(2024, 1, 1, 0, 30)));
        let overdue = store
            .create_event(weekly_event("Overdue", at(2023, 12, 1, 19, 0)))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let mut tasks = Scheduler::new(store.clone(), clock.clone()).spawn(shutdown.clone());

        // Before 01:00 nothing has run.
        tokio::time::sleep(std::time::Duration::from_secs(29 * 60)).await;
        assert_eq!(store.event(overdue.id).await.unwrap().date_stamp, at(2023, 12, 1, 19, 0));

        tokio::time::sleep(std::time::Duration::from_secs(2 * 60)).await;
        assert_eq!(store.event(overdue.id).await.unwrap().date_stamp, at(2023, 12, 8, 19, 0));

        shutdown.cancel();
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.is_ok());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_scheduler_runs_nothing() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(at(2024, 1, 1, 0, 30)));
        let overdue = store
            .create_event(weekly_event("Overdue", at(2023, 12, 1, 19, 0)))
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let mut tasks = Scheduler::new(store.clone(), clock.clone())
            .with_schedule(vec![ScheduledSweep {
                kind: SweepKind::WeeklyRollover,
                trigger: Trigger::Daily { hour: 1 },
            }])
            .spawn(shutdown.clone());
        shutdown.cancel();
        while let Some(joined) = tasks.join_next().await {
            assert!(joined.is_ok());
        }
        assert_eq!(store.event(overdue.id).await.unwrap().date_stamp, at(2023, 12, 1, 19, 0));
    }
}
