//! Blood sugar readings and the insights derived from them

use std::str::FromStr;

use chrono::NaiveDateTime;
use chrono::Timelike;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Highest value accepted, in mg/dL
pub const MAX_SUGAR_VALUE: f64 = 600.0;

/// Readings above this value are high
const HIGH_THRESHOLD: f64 = 180.0;

/// Readings below this value are low
const LOW_THRESHOLD: f64 = 70.0;

/// Averages above this value are not under control
const ELEVATED_AVERAGE: f64 = 150.0;

/// Minimum difference between the older and recent half to report a trend
const TREND_DELTA: f64 = 15.0;

/// Moment of the day the reading was taken
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ReadingType {
    Fasting,
    #[serde(rename = "Before Meal")]
    BeforeMeal,
    #[serde(rename = "After Meal")]
    AfterMeal,
    Bedtime,
}

impl ReadingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fasting => "Fasting",
            Self::BeforeMeal => "Before Meal",
            Self::AfterMeal => "After Meal",
            Self::Bedtime => "Bedtime",
        }
    }
}

impl FromStr for ReadingType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Fasting" => Ok(Self::Fasting),
            "Before Meal" => Ok(Self::BeforeMeal),
            "After Meal" => Ok(Self::AfterMeal),
            "Bedtime" => Ok(Self::Bedtime),
            _ => Err(format!("Unknown reading type: {value}")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SugarReading {
    pub id: Uuid,
    pub user_id: Uuid,
    /// In mg/dL, between 0 and 600
    pub value: f64,
    pub reading_type: ReadingType,
    pub notes: Option<String>,
    pub timestamp: NaiveDateTime,
}

/// Is the value a plausible reading?
pub fn is_valid_value(value: f64) -> bool {
    value.is_finite() && (0.0..=MAX_SUGAR_VALUE).contains(&value)
}

/// Counts over all readings of a user
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total: usize,
    pub high: usize,
    pub low: usize,
    pub normal: usize,
    /// Rounded average
    pub average: i64,
}

/// Insight messages and the statistics they are based on
#[derive(Debug, Default, Serialize)]
pub struct Insights {
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

fn average<'a, I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a f64>,
{
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_u32), |(sum, count), value| (sum + value, count + 1));

    (count > 0).then(|| sum / f64::from(count))
}

#[allow(clippy::cast_possible_truncation)] // sugar values are far below i64::MAX
fn round(value: f64) -> i64 {
    value.round() as i64
}

#[allow(clippy::cast_precision_loss)] // reading counts are small
fn percentage(part: usize, total: usize) -> i64 {
    round(part as f64 / total as f64 * 100.0)
}

/// Derive insights from readings, sorted oldest first
pub fn insights(readings: &[SugarReading]) -> Insights {
    let values = readings.iter().map(|reading| reading.value).collect::<Vec<_>>();

    let Some(average_value) = average(&values) else {
        return Insights::default();
    };

    let total = values.len();
    let high = values.iter().filter(|value| **value > HIGH_THRESHOLD).count();
    let low = values.iter().filter(|value| **value < LOW_THRESHOLD).count();

    let mut messages = Vec::new();

    let high_percentage = percentage(high, total);
    if high_percentage > 30 {
        messages.push(format!(
            "{high_percentage}% of your readings are high. Consider discussing medication adjustments with your doctor."
        ));
    }

    if low > 0 {
        messages.push(format!(
            "You've had {low} low sugar readings. Be careful and keep glucose tablets handy."
        ));
    }

    if average_value > ELEVATED_AVERAGE {
        messages.push(format!(
            "Your average sugar level is {} mg/dL, which is above normal range. Try to maintain better control.",
            round(average_value)
        ));
    } else if average_value >= LOW_THRESHOLD {
        messages.push(format!(
            "Great job! Your average sugar level of {} mg/dL is in the normal range.",
            round(average_value)
        ));
    }

    let morning = readings
        .iter()
        .filter(|reading| (5..11).contains(&reading.timestamp.hour()))
        .map(|reading| reading.value)
        .collect::<Vec<_>>();

    if morning.len() >= 3 {
        if let Some(morning_average) = average(&morning).filter(|avg| *avg > ELEVATED_AVERAGE) {
            messages.push(format!(
                "Your morning sugar levels tend to be high ({} mg/dL on average). This could be due to the dawn phenomenon.",
                round(morning_average)
            ));
        }
    }

    if total >= 10 {
        let (older, recent) = values.split_at(total / 2);

        if let (Some(older), Some(recent)) = (average(older), average(recent)) {
            if older - recent > TREND_DELTA {
                messages.push(format!(
                    "Excellent progress! Your average has improved from {} to {} mg/dL.",
                    round(older),
                    round(recent)
                ));
            } else if recent - older > TREND_DELTA {
                messages.push(
                    "Your sugar levels have increased recently. Consider reviewing your diet and medication with your doctor."
                        .to_string(),
                );
            }
        }
    }

    Insights {
        insights: messages,
        statistics: Some(Statistics {
            total,
            high,
            low,
            normal: total - high - low,
            average: round(average_value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn reading(value: f64, hour: u32, day: u32) -> SugarReading {
        SugarReading {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            value,
            reading_type: ReadingType::Fasting,
            notes: None,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, day)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_no_readings_no_insights() {
        let insights = insights(&[]);

        assert!(insights.insights.is_empty());
        assert!(insights.statistics.is_none());
    }

    #[test]
    fn test_statistics() {
        let readings = [
            reading(60.0, 14, 1),
            reading(100.0, 14, 2),
            reading(200.0, 14, 3),
            reading(120.0, 14, 4),
        ];

        let insights = insights(&readings);

        assert_eq!(
            Some(Statistics {
                total: 4,
                high: 1,
                low: 1,
                normal: 2,
                average: 120,
            }),
            insights.statistics
        );
        assert!(insights.insights.iter().any(|m| m.starts_with("You've had 1 low")));
        assert!(insights.insights.iter().any(|m| m.starts_with("Great job!")));
        // 25% high is not worth mentioning
        assert!(!insights.insights.iter().any(|m| m.contains("% of your readings")));
    }

    #[test]
    fn test_high_morning_readings() {
        let readings = [
            reading(190.0, 6, 1),
            reading(200.0, 7, 2),
            reading(210.0, 10, 3),
        ];

        let insights = insights(&readings);

        assert!(insights.insights.iter().any(|m| m.starts_with("100% of your readings are high")));
        assert!(insights.insights.iter().any(|m| m.contains("above normal range")));
        assert!(insights.insights.iter().any(|m| m.contains("dawn phenomenon")));
    }

    #[test]
    fn test_trend() {
        let improving = (1..=10)
            .map(|day| reading(if day <= 5 { 200.0 } else { 120.0 }, 14, day))
            .collect::<Vec<_>>();

        let insights_improving = insights(&improving);
        assert!(insights_improving
            .insights
            .iter()
            .any(|m| m == "Excellent progress! Your average has improved from 200 to 120 mg/dL."));

        let worsening = (1..=10)
            .map(|day| reading(if day <= 5 { 100.0 } else { 140.0 }, 14, day))
            .collect::<Vec<_>>();

        let insights_worsening = insights(&worsening);
        assert!(insights_worsening
            .insights
            .iter()
            .any(|m| m.starts_with("Your sugar levels have increased recently")));
    }

    #[test]
    fn test_is_valid_value() {
        assert!(is_valid_value(0.0));
        assert!(is_valid_value(600.0));
        assert!(!is_valid_value(600.5));
        assert!(!is_valid_value(-1.0));
        assert!(!is_valid_value(f64::NAN));
    }
}
