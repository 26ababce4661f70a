//! The reminder engine
//!
//! Once a minute all active reminders are evaluated, every firing is stored as a notification
//! and pushed to the device of its owner. A tick never takes the engine down: failures are logged
//! and the next tick starts fresh.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chrono::NaiveDateTime;
use chrono::Timelike;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::notifications::NotificationType;
use crate::push::Dispatcher;
use crate::storage::CreateNotificationValues;
use crate::storage::Storage;
use crate::utils::env_var;
use crate::utils::parse_minutes;

pub use evaluator::DEFAULT_LEAD_MINUTES;
pub use evaluator::Firing;
pub use evaluator::LeadTime;
pub use evaluator::due_set;
pub use evaluator::lead_times;

mod evaluator;

/// Time between two ticks
const TICK_PERIOD: Duration = Duration::from_secs(60);

/// What happened during a single tick
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Firings found
    pub due: usize,

    /// Notifications stored
    pub persisted: usize,

    /// Pushes accepted by the gateway
    pub delivered: usize,

    /// Notifications that could not be stored, or pushes that failed
    pub failed: usize,
}

/// Outcome of a single firing
enum Outcome {
    /// Stored, but there was no device to push to
    Stored,
    Delivered,
    PushFailed,
    StoreFailed,
}

/// Evaluates reminders and sends notifications for everything that is due
pub struct Scheduler<S: Storage> {
    storage: S,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    lead_times: Vec<LeadTime>,

    /// Set while a tick is in progress
    running: Arc<AtomicBool>,
}

impl<S: Storage> Clone for Scheduler<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            dispatcher: self.dispatcher.clone(),
            clock: self.clock.clone(),
            lead_times: self.lead_times.clone(),
            running: self.running.clone(),
        }
    }
}

/// Clears the running flag of the scheduler when dropped
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S: Storage> Scheduler<S> {
    /// Create a scheduler with lead times in minutes, the exact moment is always included
    pub fn new(
        storage: S,
        dispatcher: Dispatcher,
        clock: Arc<dyn Clock>,
        lead_minutes: &[u32],
    ) -> Self {
        Self {
            storage,
            dispatcher,
            clock,
            lead_times: lead_times(lead_minutes),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn lead_times(&self) -> &[LeadTime] {
        &self.lead_times
    }

    /// Run a tick for the current time
    ///
    /// Returns `None` when the previous tick is still running, that tick is left alone
    pub async fn tick(&self) -> Option<TickSummary> {
        if self.running.swap(true, Ordering::AcqRel) {
            tracing::warn!("Previous reminder tick still running, skipping tick");
            return None;
        }

        let _guard = RunningGuard(&self.running);

        Some(self.run_tick_at(self.clock.now()).await)
    }

    /// Run a tick as if it is `now`
    pub async fn run_tick_at(&self, now: NaiveDateTime) -> TickSummary {
        let reminders = match self.storage.find_all_active_reminders().await {
            Ok(reminders) => reminders,
            Err(err) => {
                tracing::error!("Could not load active reminders: {err}");
                return TickSummary::default();
            }
        };

        let firings = due_set(now, &self.lead_times, &reminders).collect::<Vec<_>>();
        if firings.is_empty() {
            return TickSummary::default();
        }

        tracing::debug!("{} reminder(s) due at {now}", firings.len());

        let outcomes = join_all(firings.iter().map(|firing| self.fire(firing, now))).await;

        let mut summary = TickSummary {
            due: firings.len(),
            ..TickSummary::default()
        };

        for outcome in outcomes {
            match outcome {
                Outcome::Stored => summary.persisted += 1,
                Outcome::Delivered => {
                    summary.persisted += 1;
                    summary.delivered += 1;
                }
                Outcome::PushFailed => {
                    summary.persisted += 1;
                    summary.failed += 1;
                }
                Outcome::StoreFailed => summary.failed += 1,
            }
        }

        summary
    }

    /// Store the notification of a firing and push it
    async fn fire(&self, firing: &Firing<'_>, now: NaiveDateTime) -> Outcome {
        let reminder = firing.reminder;

        let token = match self.storage.find_single_user_by_id(&reminder.user_id).await {
            Ok(user) => user.and_then(|user| user.push_token().map(ToString::to_string)),
            Err(err) => {
                tracing::error!(reminder_id = %reminder.id, "Could not load user: {err}");
                return Outcome::StoreFailed;
            }
        };

        let title = firing.title();
        let body = firing.body();
        let payload = firing.payload();

        let values = CreateNotificationValues {
            user_id: &reminder.user_id,
            title: &title,
            body: &body,
            notification_type: NotificationType::Reminder,
            data: Some(&payload),
            sent_at: token.as_ref().map(|_| now),
            scheduled_at: Some(firing.lead_time.target(now)),
        };

        if let Err(err) = self.storage.create_notification(&values).await {
            tracing::error!(reminder_id = %reminder.id, "Could not store notification: {err}");
            return Outcome::StoreFailed;
        }

        if token.is_none() {
            tracing::debug!(reminder_id = %reminder.id, "No push token, notification stored only");
            return Outcome::Stored;
        }

        let delivery = self
            .dispatcher
            .send(token.as_deref(), &title, &body, &payload)
            .await;

        if delivery.is_delivered() {
            tracing::info!(
                reminder_id = %reminder.id,
                lead_time = %firing.lead_time,
                "Reminder sent"
            );
            Outcome::Delivered
        } else {
            tracing::warn!(reminder_id = %reminder.id, "Reminder not delivered: {delivery:?}");
            Outcome::PushFailed
        }
    }
}

/// Lead times from `REMINDER_LEAD_MINUTES`, a comma separated list of minutes
///
/// Falls back to the defaults when unset or invalid
pub fn lead_minutes_from_env() -> Vec<u32> {
    let Some(value) = env_var("REMINDER_LEAD_MINUTES") else {
        return DEFAULT_LEAD_MINUTES.to_vec();
    };

    parse_minutes(&value).unwrap_or_else(|err| {
        tracing::warn!("Invalid `REMINDER_LEAD_MINUTES` ({value}): {err}, using defaults");
        DEFAULT_LEAD_MINUTES.to_vec()
    })
}

/// Time until the start of the next minute
fn get_start_delay(now: NaiveDateTime) -> Duration {
    let into_minute = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond()));

    TICK_PERIOD.saturating_sub(into_minute)
}

/// Run a tick in the background, ticks never block the loop
fn spawn_tick<S: Storage>(scheduler: &Scheduler<S>) {
    let scheduler = scheduler.clone();

    tokio::spawn(async move {
        if let Some(summary) = scheduler.tick().await
            && summary.due > 0
        {
            tracing::info!(
                due = summary.due,
                persisted = summary.persisted,
                delivered = summary.delivered,
                failed = summary.failed,
                "Reminder tick finished"
            );
        }
    });
}

/// Start the scheduler, ticking on every minute boundary until `shutdown` is cancelled
///
/// The first tick runs right away, missed ticks are not caught up
pub fn start_scheduler<S: Storage>(
    scheduler: Scheduler<S>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            "Reminder scheduler started with lead times {:?}",
            scheduler
                .lead_times()
                .iter()
                .map(|lead_time| lead_time.as_minutes())
                .collect::<Vec<_>>()
        );

        spawn_tick(&scheduler);

        let start_delay = get_start_delay(scheduler.clock.now());

        tokio::select! {
            () = shutdown.cancelled() => {
                tracing::info!("Reminder scheduler stopped");
                return;
            }
            () = tokio::time::sleep(start_delay) => {}
        }

        let mut interval = tokio::time::interval(TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = interval.tick() => spawn_tick(&scheduler),
            }
        }

        tracing::info!("Reminder scheduler stopped");
    })
}
