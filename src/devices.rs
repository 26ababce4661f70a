//! Wearable devices and the exercise telemetry they send

use chrono::NaiveDateTime;
use serde::Serialize;
use uuid::Uuid;

/// Default amount of readings in a listing
pub const DEFAULT_READINGS_LIMIT: usize = 100;

/// A single telemetry message of a device
#[derive(Clone, Debug, Serialize)]
pub struct DeviceReading {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub patient_id: Option<String>,
    pub session_id: String,
    pub exercise: String,
    pub angle_deg: Option<f64>,
    pub force_n: Option<f64>,
    pub velocity: Option<f64>,
    pub current_reps: i32,
    pub target_reps: i32,
    pub battery: Option<i32>,
    pub device_timestamp: NaiveDateTime,
    pub created_at: NaiveDateTime,
}

/// A device known for a user
#[derive(Clone, Debug, Serialize)]
pub struct UserDevice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub last_seen: NaiveDateTime,
}

/// Summary of a single exercise session
#[derive(Debug, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub exercise: String,
    pub device_id: String,
    pub total_readings: usize,
    pub max_reps: i32,
    pub target_reps: i32,
    pub avg_angle: Option<f64>,
    pub max_angle: Option<f64>,
    pub avg_force: Option<f64>,
    pub max_force: Option<f64>,
    pub avg_velocity: Option<f64>,
    pub session_start: NaiveDateTime,
    pub session_end: NaiveDateTime,
    pub min_battery: Option<i32>,
}

/// Average of the values that are present
fn average<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0_u32), |(sum, count), value| (sum + value, count + 1));

    (count > 0).then(|| sum / f64::from(count))
}

/// Maximum of the values that are present
fn maximum<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    values.fold(None, |max, value| match max {
        Some(max) if max >= value => Some(max),
        _ => Some(value),
    })
}

/// Summarize the readings of a session, `None` without readings
///
/// Exercise and device are taken from the first reading
pub fn session_stats(readings: &[DeviceReading]) -> Option<SessionStats> {
    let first = readings.first()?;

    let angles = || readings.iter().filter_map(|reading| reading.angle_deg);
    let forces = || readings.iter().filter_map(|reading| reading.force_n);

    Some(SessionStats {
        session_id: first.session_id.clone(),
        exercise: first.exercise.clone(),
        device_id: first.device_id.clone(),
        total_readings: readings.len(),
        max_reps: readings.iter().map(|r| r.current_reps).max().unwrap_or_default(),
        target_reps: readings.iter().map(|r| r.target_reps).max().unwrap_or_default(),
        avg_angle: average(angles()),
        max_angle: maximum(angles()),
        avg_force: average(forces()),
        max_force: maximum(forces()),
        avg_velocity: average(readings.iter().filter_map(|reading| reading.velocity)),
        session_start: readings
            .iter()
            .map(|r| r.device_timestamp)
            .min()
            .unwrap_or(first.device_timestamp),
        session_end: readings
            .iter()
            .map(|r| r.device_timestamp)
            .max()
            .unwrap_or(first.device_timestamp),
        min_battery: readings.iter().filter_map(|r| r.battery).min(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn reading(second: u32, reps: i32, angle: Option<f64>, battery: Option<i32>) -> DeviceReading {
        let timestamp = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, second)
            .unwrap();

        DeviceReading {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            device_id: "esp32-1".to_string(),
            patient_id: None,
            session_id: "session-1".to_string(),
            exercise: "ankle-flex".to_string(),
            angle_deg: angle,
            force_n: None,
            velocity: Some(1.0),
            current_reps: reps,
            target_reps: 10,
            battery,
            device_timestamp: timestamp,
            created_at: timestamp,
        }
    }

    #[test]
    fn test_session_stats() {
        let readings = [
            reading(30, 3, Some(40.0), Some(80)),
            reading(10, 1, Some(20.0), None),
            reading(20, 2, None, Some(82)),
        ];

        let stats = session_stats(&readings).unwrap();

        assert_eq!(3, stats.total_readings);
        assert_eq!(3, stats.max_reps);
        assert_eq!(10, stats.target_reps);
        assert_eq!(Some(30.0), stats.avg_angle);
        assert_eq!(Some(40.0), stats.max_angle);
        assert_eq!(None, stats.avg_force);
        assert_eq!(Some(80), stats.min_battery);
        assert_eq!(10, chrono::Timelike::second(&stats.session_start));
        assert_eq!(30, chrono::Timelike::second(&stats.session_end));
    }

    #[test]
    fn test_session_stats_without_readings() {
        assert!(session_stats(&[]).is_none());
    }
}
