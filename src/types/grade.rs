use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Grade represents a school grade as an ordinal: kindergarten is 0, then 1 through 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Grade(u8);

impl Grade {
    pub const KINDERGARTEN: Grade = Grade(0);
    pub const MAX: Grade = Grade(12);

    pub fn new(ordinal: u8) -> Result<Self> {
        if ordinal > Self::MAX.0 {
            return Err(Error::Validation(format!(
                "grade must be K or 1-12, got {ordinal}"
            )));
        }
        Ok(Self(ordinal))
    }

    pub const fn ordinal(self) -> u8 {
        self.0
    }
}

impl FromStr for Grade {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("k") {
            return Ok(Self::KINDERGARTEN);
        }
        let ordinal: u8 = s
            .parse()
            .map_err(|_| Error::Validation(format!("invalid grade: '{s}'")))?;
        Self::new(ordinal)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            write!(f, "K")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl TryFrom<String> for Grade {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Grade> for String {
    fn from(g: Grade) -> Self {
        g.to_string()
    }
}

/// Inclusive range of grades a program is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeRange {
    pub from: Grade,
    pub to: Grade,
}

impl GradeRange {
    pub fn new(from: Grade, to: Grade) -> Result<Self> {
        if from > to {
            return Err(Error::Validation(format!(
                "grade range is inverted: {from} > {to}"
            )));
        }
        Ok(Self { from, to })
    }

    #[must_use]
    pub fn contains(&self, grade: Grade) -> bool {
        self.from <= grade && grade <= self.to
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| Error::Validation(format!("invalid date '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grade() {
        assert_eq!("K".parse::<Grade>().unwrap(), Grade::KINDERGARTEN);
        assert_eq!("k".parse::<Grade>().unwrap(), Grade::KINDERGARTEN);
        assert_eq!("7".parse::<Grade>().unwrap().ordinal(), 7);
        assert!("13".parse::<Grade>().is_err());
        assert!("seventh".parse::<Grade>().is_err());
    }

    #[test]
    fn test_grade_display() {
        assert_eq!(Grade::KINDERGARTEN.to_string(), "K");
        assert_eq!(Grade::new(12).unwrap().to_string(), "12");
    }

    #[test]
    fn test_grade_range_rejects_inverted() {
        let k = Grade::KINDERGARTEN;
        let five = Grade::new(5).unwrap();
        assert!(GradeRange::new(k, five).is_ok());
        assert!(GradeRange::new(five, k).is_err());
        assert!(GradeRange::new(five, five).unwrap().contains(five));
    }

    #[test]
    fn test_parse_date() {
        let d = parse_date("2014-03-09").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2014, 3, 9).unwrap());
        assert!(parse_date("2014-3").is_err());
        assert!(parse_date("2014-02-30").is_err());
        assert!(matches!(parse_date(""), Err(Error::Validation(_))));
    }
}
