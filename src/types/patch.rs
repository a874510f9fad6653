//! Partial updates. A field set to `Some` overwrites the entity's value; `None` leaves it alone.
//! Optional entity fields use `Option<Option<T>>` so an explicit JSON `null` clears them.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::{Camp, Duration, Grade, GradeRange, Level, Program, Student, User, validate_schedule};
use crate::error::Result;

/// Maps a present field to `Some`, including `null` (as `Some(None)`). Paired with
/// `#[serde(default)]` so an absent field stays `None`.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub school: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub grade: Option<Option<Grade>>,
}

impl StudentPatch {
    pub fn apply(self, student: &mut Student) -> Result<()> {
        if let Some(name) = self.name {
            student.name = name;
        }
        if let Some(birthdate) = self.birthdate {
            student.birthdate = birthdate;
        }
        if let Some(school) = self.school {
            student.school = school;
        }
        if let Some(grade) = self.grade {
            student.grade = grade;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramPatch {
    pub title: Option<String>,
    pub from_grade: Option<Grade>,
    pub to_grade: Option<Grade>,
    pub duration: Option<Duration>,
    pub tags: Option<String>,
    pub description: Option<String>,
}

impl ProgramPatch {
    /// Applies the patch; the resulting grade range must not be inverted.
    pub fn apply(self, program: &mut Program) -> Result<()> {
        let from = self.from_grade.unwrap_or(program.grade_range.from);
        let to = self.to_grade.unwrap_or(program.grade_range.to);
        program.grade_range = GradeRange::new(from, to)?;

        if let Some(title) = self.title {
            program.title = title;
        }
        if let Some(duration) = self.duration {
            program.duration = duration;
        }
        if let Some(tags) = self.tags {
            program.tags = tags;
        }
        if let Some(description) = self.description {
            program.description = description;
        }
        Ok(())
    }
}

/// Level position is not patchable here; use the ordered-list move operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LevelPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

impl LevelPatch {
    pub fn apply(self, level: &mut Level) -> Result<()> {
        if let Some(title) = self.title {
            level.title = title;
        }
        if let Some(description) = self.description {
            level.description = description;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampPatch {
    pub program_id: Option<i64>,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
}

impl CampPatch {
    pub fn apply(self, camp: &mut Camp) -> Result<()> {
        let starts_on = self.starts_on.or(camp.starts_on);
        let ends_on = self.ends_on.or(camp.ends_on);
        validate_schedule(starts_on, ends_on)?;

        camp.starts_on = starts_on;
        camp.ends_on = ends_on;
        if let Some(program_id) = self.program_id {
            camp.program_id = program_id;
        }
        Ok(())
    }
}

/// Profile fields refreshed from the identity provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub full_name: Option<String>,
    pub picture: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) -> Result<()> {
        if let Some(given_name) = self.given_name {
            user.given_name = given_name;
        }
        if let Some(family_name) = self.family_name {
            user.family_name = family_name;
        }
        if let Some(full_name) = self.full_name {
            user.full_name = full_name;
        }
        if let Some(picture) = self.picture {
            user.picture = picture;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.given_name.is_none()
            && self.family_name.is_none()
            && self.full_name.is_none()
            && self.picture.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn program() -> Program {
        Program {
            id: 1,
            title: "Robotics".to_string(),
            grade_range: GradeRange::new(Grade::new(3).unwrap(), Grade::new(5).unwrap()).unwrap(),
            duration: Duration::Half,
            tags: "stem".to_string(),
            description: String::new(),
        }
    }

    fn student() -> Student {
        Student {
            id: 1,
            name: "Sam".to_string(),
            birthdate: NaiveDate::from_ymd_opt(2017, 3, 2).unwrap(),
            school: String::new(),
            grade: Some(Grade::new(2).unwrap()),
        }
    }

    fn student_patch(body: &str) -> StudentPatch {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_student_patch_null_grade_clears() {
        let mut s = student();
        student_patch(r#"{"school": "Lincoln"}"#).apply(&mut s).unwrap();
        assert_eq!(s.grade, Some(Grade::new(2).unwrap()));

        student_patch(r#"{"grade": "K"}"#).apply(&mut s).unwrap();
        assert_eq!(s.grade, Some(Grade::KINDERGARTEN));

        student_patch(r#"{"grade": null}"#).apply(&mut s).unwrap();
        assert_eq!(s.grade, None);
        assert_eq!(s.school, "Lincoln");
    }

    #[test]
    fn test_program_patch_only_touches_present_fields() {
        let mut p = program();
        ProgramPatch {
            description: Some("Build a rover".to_string()),
            ..Default::default()
        }
        .apply(&mut p)
        .unwrap();

        assert_eq!(p.title, "Robotics");
        assert_eq!(p.tags, "stem");
        assert_eq!(p.description, "Build a rover");
    }

    #[test]
    fn test_program_patch_rejects_inverted_range() {
        let mut p = program();
        let result = ProgramPatch {
            to_grade: Some(Grade::new(1).unwrap()),
            title: Some("changed".to_string()),
            ..Default::default()
        }
        .apply(&mut p);

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(p.title, "Robotics");
    }

    #[test]
    fn test_camp_patch_checks_merged_schedule() {
        let mut camp = Camp {
            id: 1,
            program_id: 1,
            starts_on: NaiveDate::from_ymd_opt(2025, 7, 7),
            ends_on: NaiveDate::from_ymd_opt(2025, 7, 11),
            roster: Default::default(),
        };
        let result = CampPatch {
            starts_on: NaiveDate::from_ymd_opt(2025, 7, 14),
            ..Default::default()
        }
        .apply(&mut camp);
        assert!(result.is_err());
        assert_eq!(camp.starts_on, NaiveDate::from_ymd_opt(2025, 7, 7));
    }
}
