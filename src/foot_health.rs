//! Foot-care exercise logs, one record per user per day

use chrono::Days;
use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct FootHealthRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Unique per user
    pub date: NaiveDate,
    pub steps: u32,
    pub rollers: u32,
    pub resisted_exercise: u32,
    pub notes: Option<String>,
}

/// Period to compute statistics over, relative to today
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Today,
    /// The last 7 days and today
    Week,
    /// The last 30 days and today
    Month,
    #[default]
    All,
}

impl Period {
    /// First date included in the period
    pub fn start(self, today: NaiveDate) -> Option<NaiveDate> {
        match self {
            Self::Today => Some(today),
            Self::Week => today.checked_sub_days(Days::new(7)),
            Self::Month => today.checked_sub_days(Days::new(30)),
            Self::All => None,
        }
    }

    /// Is the date part of the period?
    pub fn contains(self, date: NaiveDate, today: NaiveDate) -> bool {
        match (self, self.start(today)) {
            (Self::Today, _) => date == today,
            (_, Some(start)) => date >= start,
            (_, None) => true,
        }
    }
}

/// Totals and rounded daily averages over a period
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_steps: u64,
    pub total_rollers: u64,
    pub total_resisted_exercise: u64,
    pub avg_steps: u64,
    pub avg_rollers: u64,
    pub avg_resisted_exercise: u64,
    pub total_days: u64,
}

fn rounded_average(total: u64, days: u64) -> u64 {
    if days == 0 {
        0
    } else {
        (total + days / 2) / days
    }
}

/// Compute the statistics of the records within the period
pub fn statistics(records: &[FootHealthRecord], period: Period, today: NaiveDate) -> Statistics {
    let (steps, rollers, resisted_exercise, days) = records
        .iter()
        .filter(|record| period.contains(record.date, today))
        .fold((0_u64, 0_u64, 0_u64, 0_u64), |totals, record| {
            (
                totals.0 + u64::from(record.steps),
                totals.1 + u64::from(record.rollers),
                totals.2 + u64::from(record.resisted_exercise),
                totals.3 + 1,
            )
        });

    Statistics {
        total_steps: steps,
        total_rollers: rollers,
        total_resisted_exercise: resisted_exercise,
        avg_steps: rounded_average(steps, days),
        avg_rollers: rounded_average(rollers, days),
        avg_resisted_exercise: rounded_average(resisted_exercise, days),
        total_days: days,
    }
}
