//! Which reminders are due at a given moment
//!
//! Pure: no I/O and no clock access, the current time is always passed in

use core::fmt;

use chrono::Duration;
use chrono::NaiveDateTime;
use chrono::Timelike;
use serde_json::Value;
use serde_json::json;

use crate::reminders::Reminder;

/// Lead times used when none are configured, in minutes
pub const DEFAULT_LEAD_MINUTES: [u32; 2] = [15, 10];

/// How long before its time a reminder fires, zero is the reminder time itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeadTime(u32);

impl LeadTime {
    /// Fire at the reminder time itself
    pub const EXACT: Self = Self(0);

    pub fn minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    pub fn as_minutes(self) -> u32 {
        self.0
    }

    pub fn is_exact(self) -> bool {
        self.0 == 0
    }

    /// The moment a reminder must be due to fire now with this lead time
    ///
    /// Truncated to the minute
    pub fn target(self, now: NaiveDateTime) -> NaiveDateTime {
        let target = now + Duration::minutes(i64::from(self.0));

        target
            .with_second(0)
            .and_then(|target| target.with_nanosecond(0))
            .unwrap_or(target)
    }
}

impl fmt::Display for LeadTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// Lead times from minutes, the exact moment is always included
///
/// Sorted from the longest lead time to the exact moment, without duplicates
pub fn lead_times(minutes: &[u32]) -> Vec<LeadTime> {
    let mut lead_times = minutes
        .iter()
        .copied()
        .map(LeadTime::minutes)
        .chain([LeadTime::EXACT])
        .collect::<Vec<_>>();

    lead_times.sort_unstable_by(|a, b| b.cmp(a));
    lead_times.dedup();

    lead_times
}

/// A reminder that fires now, for one of the lead times
#[derive(Clone, Copy, Debug)]
pub struct Firing<'a> {
    pub reminder: &'a Reminder,
    pub lead_time: LeadTime,
}

impl Firing<'_> {
    /// `<category> Reminder`
    pub fn title(&self) -> String {
        format!("{} Reminder", self.reminder.category)
    }

    /// What is due and when, followed by the notes of the reminder
    pub fn body(&self) -> String {
        let mut body = if self.lead_time.is_exact() {
            format!("Time for {}!", self.reminder.title)
        } else {
            format!(
                "{} minutes remaining to {}",
                self.lead_time.as_minutes(),
                self.reminder.title
            )
        };

        if let Some(notes) = self.reminder.notes.as_deref().filter(|notes| !notes.is_empty()) {
            body.push('\n');
            body.push_str(notes);
        }

        body
    }

    /// Data stored with the notification and sent along with the push
    pub fn payload(&self) -> Value {
        json!({
            "reminder_id": self.reminder.id.to_string(),
            "type": "reminder",
            "minutes_before": self.lead_time.as_minutes().to_string(),
        })
    }
}

/// All firings at `now`, per lead time in the given order
///
/// A reminder fires once per lead time that matches, there is no deduplication across lead
/// times
pub fn due_set<'a>(
    now: NaiveDateTime,
    lead_times: &'a [LeadTime],
    reminders: &'a [Reminder],
) -> impl Iterator<Item = Firing<'a>> + 'a {
    lead_times.iter().flat_map(move |lead_time| {
        let target = lead_time.target(now);

        reminders
            .iter()
            .filter(move |reminder| reminder.is_due_at(target))
            .map(move |reminder| Firing {
                reminder,
                lead_time: *lead_time,
            })
    })
}
