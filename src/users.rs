use core::fmt;
use std::str::FromStr;

use anyhow::Result;
use chrono::Datelike;
use chrono::naive::NaiveDateTime;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::password::generate;
use crate::password::hash;
use crate::storage::CreateUserValues;
use crate::storage::Storage;
use crate::utils::env_var_or_else;

/// Oldest diagnosis year accepted
pub const MIN_DIAGNOSIS_YEAR: i32 = 1900;

/// Highest age accepted
pub const MAX_AGE: u8 = 150;

/// Gender of a user
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Male" => Ok(Self::Male),
            "Female" => Ok(Self::Female),
            "Other" => Ok(Self::Other),
            _ => Err(format!("Unknown gender: {value}")),
        }
    }
}

/// Type of diabetes a user was diagnosed with
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum DiabetesType {
    #[serde(rename = "Type 1")]
    Type1,
    #[serde(rename = "Type 2")]
    Type2,
    Gestational,
}

impl DiabetesType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type1 => "Type 1",
            Self::Type2 => "Type 2",
            Self::Gestational => "Gestational",
        }
    }
}

impl FromStr for DiabetesType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Type 1" => Ok(Self::Type1),
            "Type 2" => Ok(Self::Type2),
            "Gestational" => Ok(Self::Gestational),
            _ => Err(format!("Unknown diabetes type: {value}")),
        }
    }
}

impl fmt::Display for DiabetesType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: Uuid,
    /// Rotated on logout, tokens carry it to be revoked
    pub session_id: Uuid,
    /// Always lower-cased
    pub email: String,
    pub name: String,
    pub hashed_password: String,
    /// Device token for push notifications
    pub fcm_token: Option<String>,
    pub profile_image: Option<String>,
    pub age: Option<u8>,
    pub gender: Option<Gender>,
    pub diabetes_type: Option<DiabetesType>,
    pub diagnosis_year: Option<i32>,
    pub medications: Vec<String>,
    pub is_developer: bool,
    pub created_at: NaiveDateTime,
    pub last_active: Option<NaiveDateTime>,
}

impl User {
    /// The push token, when there is a usable one
    pub fn push_token(&self) -> Option<&str> {
        self.fcm_token.as_deref().filter(|token| !token.is_empty())
    }
}

/// Normalize an email address for storage and lookups
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose email check: something, an `@`, a domain with a dot, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .split_once('.')
        .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        && !domain.ends_with('.')
}

/// Is the diagnosis year plausible, given the current year?
pub fn is_valid_diagnosis_year(year: i32, now: NaiveDateTime) -> bool {
    (MIN_DIAGNOSIS_YEAR..=now.year()).contains(&year)
}

/// Make sure there is a developer account, used for the developer dashboard
pub async fn ensure_developer_user<S: Storage>(storage: &S) -> Result<()> {
    let user = storage.find_developer_user().await?;

    if user.is_none() {
        let email = env_var_or_else("DEVELOPER_EMAIL", || {
            let email = format!("developer+{}@pakhealth.local", Uuid::new_v4().simple());
            tracing::info!("`DEVELOPER_EMAIL` not set, generating new email: {email}");
            email
        });

        let password = env_var_or_else("DEVELOPER_PASSWORD", || {
            let password = generate();
            tracing::info!("`DEVELOPER_PASSWORD` not set, generating new password: {password}");
            password
        });

        let hashed_password = hash(&password).map_err(|err| anyhow::anyhow!(err))?;
        let email = normalize_email(&email);

        let values = CreateUserValues {
            session_id: &Uuid::new_v4(),
            email: &email,
            name: "Developer",
            hashed_password: &hashed_password,
            fcm_token: None,
            is_developer: true,
        };

        storage.create_user(&values).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("someone@example.com"));
        assert!(is_valid_email("some.one+tag@sub.example.pk"));

        assert!(!is_valid_email("someone"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("someone@example"));
        assert!(!is_valid_email("someone@example."));
        assert!(!is_valid_email("some one@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!("someone@example.com", normalize_email(" SomeOne@Example.com "));
    }

    #[test]
    fn test_is_valid_diagnosis_year() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();

        assert!(is_valid_diagnosis_year(1900, now));
        assert!(is_valid_diagnosis_year(2024, now));
        assert!(!is_valid_diagnosis_year(1899, now));
        assert!(!is_valid_diagnosis_year(2025, now));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(Ok(DiabetesType::Type2), "Type 2".parse());
        assert_eq!(
            "\"Type 1\"",
            serde_json::to_string(&DiabetesType::Type1).unwrap()
        );
        assert_eq!(Ok(Gender::Female), "Female".parse());
        assert!("female".parse::<Gender>().is_err());
    }
}
