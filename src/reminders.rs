//! Reminders
//!
//! Recurring obligations to notify a user: a time of day, a set of weekdays and a category

use core::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::Timelike;
use chrono::Weekday;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use uuid::Uuid;

/// All weekdays, in the order they are presented to clients
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Category of a reminder
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum ReminderCategory {
    /// Take medication
    Medication,

    /// Check the feet
    #[serde(rename = "Foot Check")]
    FootCheck,

    /// Measure blood sugar
    #[serde(rename = "Sugar Check")]
    SugarCheck,

    /// Go see the doctor
    #[serde(rename = "Doctor Visit")]
    DoctorVisit,

    /// Anything else
    Other,
}

impl ReminderCategory {
    /// Human readable label, also used on the wire and in notification titles
    pub fn label(self) -> &'static str {
        match self {
            Self::Medication => "Medication",
            Self::FootCheck => "Foot Check",
            Self::SugarCheck => "Sugar Check",
            Self::DoctorVisit => "Doctor Visit",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for ReminderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ReminderCategory {
    type Err = InvalidReminder;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Medication" => Ok(Self::Medication),
            "Foot Check" => Ok(Self::FootCheck),
            "Sugar Check" => Ok(Self::SugarCheck),
            "Doctor Visit" => Ok(Self::DoctorVisit),
            "Other" => Ok(Self::Other),
            _ => Err(InvalidReminder::Category),
        }
    }
}

/// Reasons a reminder field is rejected
#[derive(Debug, PartialEq, Eq)]
pub enum InvalidReminder {
    /// Unknown category
    Category,

    /// Time is not `HH:MM`
    Time,
}

impl fmt::Display for InvalidReminder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => f.write_str("Invalid reminder type"),
            Self::Time => f.write_str("Invalid time format, use HH:MM"),
        }
    }
}

impl std::error::Error for InvalidReminder {}

/// Time of day with minute precision, without a timezone
///
/// Ordering and equality are numeric on `(hour, minute)`, the default is midnight
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    /// Hour, 0 to 23
    hour: u8,

    /// Minute, 0 to 59
    minute: u8,
}

impl TimeOfDay {
    /// Create a time of day, `None` when out of range
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// The hour
    pub fn hour(self) -> u8 {
        self.hour
    }

    /// The minute
    pub fn minute(self) -> u8 {
        self.minute
    }

    /// Truncate a wall clock time to its minute, seconds and below are dropped
    #[allow(clippy::cast_possible_truncation)] // hour < 24 and minute < 60
    pub fn truncated(time: NaiveTime) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = InvalidReminder;

    /// Parse strictly `HH:MM`, two digits each
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let bytes = value.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return Err(InvalidReminder::Time);
        }

        let digits = [bytes[0], bytes[1], bytes[3], bytes[4]];
        if !digits.iter().all(u8::is_ascii_digit) {
            return Err(InvalidReminder::Time);
        }

        let hour = (digits[0] - b'0') * 10 + (digits[1] - b'0');
        let minute = (digits[2] - b'0') * 10 + (digits[3] - b'0');

        Self::new(hour, minute).ok_or(InvalidReminder::Time)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;

        value.parse().map_err(serde::de::Error::custom)
    }
}

/// A set of weekdays, one bit per day, Monday is the lowest bit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    /// No days at all, such a reminder never fires
    pub const EMPTY: Self = Self(0);

    /// Every day of the week
    pub const ALL: Self = Self(0b111_1111);

    /// Create a set from its raw bits, bits above the seventh are dropped
    pub fn from_bits(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Raw bits of the set
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Bit of a single weekday
    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_monday()
    }

    /// Is the day part of the set?
    pub fn contains(self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    /// Add or remove a single day
    pub fn set(&mut self, day: Weekday, enabled: bool) {
        if enabled {
            self.0 |= Self::bit(day);
        } else {
            self.0 &= !Self::bit(day);
        }
    }

    /// Copy of the set with a single day changed
    #[must_use]
    pub fn with(mut self, day: Weekday, enabled: bool) -> Self {
        self.set(day, enabled);
        self
    }

    /// Is the set empty?
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Apply a partial change, days left out keep their current value
    #[must_use]
    pub fn apply(self, changes: &DaysForm) -> Self {
        WEEKDAYS.iter().fold(self, |days, day| match changes.get(*day) {
            Some(enabled) => days.with(*day, enabled),
            None => days,
        })
    }
}

/// Lowercase English name of a weekday, as used on the wire
fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

impl Serialize for WeekdaySet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(WEEKDAYS.len()))?;
        for day in WEEKDAYS {
            map.serialize_entry(weekday_name(day), &self.contains(day))?;
        }
        map.end()
    }
}

/// Days as sent by a client, every day is optional
///
/// On create, missing days are `false`; on update, missing days are left untouched
#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct DaysForm {
    pub monday: Option<bool>,
    pub tuesday: Option<bool>,
    pub wednesday: Option<bool>,
    pub thursday: Option<bool>,
    pub friday: Option<bool>,
    pub saturday: Option<bool>,
    pub sunday: Option<bool>,
}

impl DaysForm {
    /// Value given for a single day
    pub fn get(&self, day: Weekday) -> Option<bool> {
        match day {
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
            Weekday::Sun => self.sunday,
        }
    }
}

/// Recurring reminder of a user
#[derive(Clone, Debug)]
pub struct Reminder {
    /// Reminder ID
    pub id: Uuid,

    /// The owning user
    pub user_id: Uuid,

    /// What to be reminded of
    pub title: String,

    /// Category, used in the notification title
    pub category: ReminderCategory,

    /// Time of day the reminder is due
    pub time: TimeOfDay,

    /// Days of the week the reminder is due
    pub days: WeekdaySet,

    /// Extra notes, appended to the notification body
    pub notes: Option<String>,

    /// Inactive reminders never fire
    pub is_active: bool,

    /// Creation date
    pub created_at: NaiveDateTime,
}

impl Reminder {
    /// Is the reminder due at the given minute?
    ///
    /// The weekday is taken from `target` and seconds are ignored
    pub fn is_due_at(&self, target: NaiveDateTime) -> bool {
        use chrono::Datelike;

        self.is_active
            && self.days.contains(target.weekday())
            && self.time == TimeOfDay::truncated(target.time())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(TimeOfDay::new(8, 0), "08:00".parse().ok());
        assert_eq!(TimeOfDay::new(23, 59), "23:59".parse().ok());
        assert_eq!(TimeOfDay::new(0, 0), "00:00".parse().ok());

        for invalid in ["24:00", "12:60", "8:00", "08:0", "08-00", "0800", "08:00:00", "ab:cd", ""] {
            assert_eq!(
                Err(InvalidReminder::Time),
                invalid.parse::<TimeOfDay>(),
                "{invalid}"
            );
        }
    }

    #[test]
    fn test_time_of_day_display_and_order() {
        let early = TimeOfDay::new(7, 5).unwrap();
        let late = TimeOfDay::new(19, 0).unwrap();

        assert_eq!("07:05", early.to_string());
        assert!(early < late);
    }

    #[test]
    fn test_truncated_drops_seconds() {
        let time = NaiveTime::from_hms_opt(8, 0, 59).unwrap();

        assert_eq!(TimeOfDay::new(8, 0).unwrap(), TimeOfDay::truncated(time));
    }

    #[test]
    fn test_weekday_set() {
        let mut days = WeekdaySet::EMPTY;
        assert!(days.is_empty());

        days.set(Weekday::Mon, true);
        days.set(Weekday::Sun, true);
        assert!(days.contains(Weekday::Mon));
        assert!(days.contains(Weekday::Sun));
        assert!(!days.contains(Weekday::Wed));

        days.set(Weekday::Mon, false);
        assert!(!days.contains(Weekday::Mon));

        assert!(WEEKDAYS.iter().all(|day| WeekdaySet::ALL.contains(*day)));
        assert_eq!(WeekdaySet::ALL, WeekdaySet::from_bits(0xff));
    }

    #[test]
    fn test_weekday_set_apply_keeps_missing_days() {
        let changes = DaysForm {
            monday: Some(false),
            friday: Some(true),
            ..DaysForm::default()
        };

        let days = WeekdaySet::EMPTY
            .with(Weekday::Mon, true)
            .with(Weekday::Tue, true)
            .apply(&changes);

        assert!(!days.contains(Weekday::Mon));
        assert!(days.contains(Weekday::Tue));
        assert!(days.contains(Weekday::Fri));
    }

    #[test]
    fn test_weekday_set_serializes_as_named_days() {
        let days = WeekdaySet::EMPTY.with(Weekday::Tue, true);
        let json = serde_json::to_value(days).unwrap();

        assert_eq!(Some(&serde_json::Value::Bool(true)), json.get("tuesday"));
        assert_eq!(Some(&serde_json::Value::Bool(false)), json.get("monday"));
        assert_eq!(7, json.as_object().unwrap().len());
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(
            Ok(ReminderCategory::FootCheck),
            "Foot Check".parse::<ReminderCategory>()
        );
        assert_eq!(
            "\"Doctor Visit\"",
            serde_json::to_string(&ReminderCategory::DoctorVisit).unwrap()
        );
        assert!("foot check".parse::<ReminderCategory>().is_err());
    }
}
