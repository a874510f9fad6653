use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{GradeRange, Grade, Roster};
use crate::error::{Error, Result};

pub type StudentId = i64;
pub type ProgramId = i64;
pub type LevelId = i64;
pub type CampId = i64;

pub const GUARDIAN: &str = "GUARDIAN";
pub const INSTRUCTOR: &str = "INSTRUCTOR";
pub const ADMIN: &str = "ADMIN";

/// Roles every deployment knows about. The first user ever created receives all of them.
pub const BUILTIN_ROLES: [&str; 3] = [GUARDIAN, INSTRUCTOR, ADMIN];

/// Role granted to every user on first sign-in.
pub const BASE_ROLE: &str = GUARDIAN;

/// A role and the endpoints it authorizes, keyed by path with a display title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub permissible_endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Google subject id. Stored as text: it does not fit in 64 bits.
    pub id: String,
    pub given_name: String,
    pub family_name: String,
    pub full_name: String,
    pub picture: String,
    pub primary_email: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_emails: Vec<String>,
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub student_ids: Vec<StudentId>,
    #[serde(default)]
    pub program_ids: Vec<ProgramId>,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    #[must_use]
    pub fn is_instructor(&self) -> bool {
        self.has_role(INSTRUCTOR)
    }
}

/// Profile returned by the identity provider after sign-in.
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub picture: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub birthdate: NaiveDate,
    pub school: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub birthdate: NaiveDate,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub grade: Option<Grade>,
}

/// Whether a program runs for half or a full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duration {
    Half,
    Full,
}

impl Duration {
    pub const fn as_str(self) -> &'static str {
        match self {
            Duration::Half => "half",
            Duration::Full => "full",
        }
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "half" => Ok(Duration::Half),
            "full" => Ok(Duration::Full),
            _ => Err(Error::Validation(format!("invalid duration: '{s}'"))),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub title: String,
    pub grade_range: GradeRange,
    pub duration: Duration,
    pub tags: String,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgram {
    pub title: String,
    pub grade_range: GradeRange,
    pub duration: Duration,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub program_id: ProgramId,
    pub title: String,
    pub description: String,
    /// 1-based position within the program. Dense over 1..=N.
    pub list_index: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewLevel {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Camp {
    pub id: CampId,
    pub program_id: ProgramId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_on: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_on: Option<NaiveDate>,
    #[serde(flatten)]
    pub roster: Roster,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCamp {
    pub program_id: ProgramId,
    #[serde(default)]
    pub starts_on: Option<NaiveDate>,
    #[serde(default)]
    pub ends_on: Option<NaiveDate>,
}

/// Checks that a camp's schedule is not inverted.
pub fn validate_schedule(starts_on: Option<NaiveDate>, ends_on: Option<NaiveDate>) -> Result<()> {
    if let (Some(start), Some(end)) = (starts_on, ends_on) {
        if end < start {
            return Err(Error::Validation(format!(
                "camp ends ({end}) before it starts ({start})"
            )));
        }
    }
    Ok(())
}

/// A camp together with the program it runs.
#[derive(Debug, Clone, Serialize)]
pub struct CampListing {
    #[serde(flatten)]
    pub camp: Camp,
    pub program: Program,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_roundtrip_str() {
        assert_eq!("half".parse::<Duration>().unwrap(), Duration::Half);
        assert_eq!(Duration::Full.to_string(), "full");
        assert!("HALF".parse::<Duration>().is_err());
    }

    #[test]
    fn test_validate_schedule() {
        let a = NaiveDate::from_ymd_opt(2025, 7, 1);
        let b = NaiveDate::from_ymd_opt(2025, 7, 5);
        assert!(validate_schedule(a, b).is_ok());
        assert!(validate_schedule(a, None).is_ok());
        assert!(validate_schedule(b, a).is_err());
    }
}
