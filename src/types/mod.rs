mod grade;
mod models;
mod patch;
mod roster;

pub use grade::{Grade, GradeRange, parse_date};
pub use models::*;
pub use patch::{CampPatch, LevelPatch, ProgramPatch, StudentPatch, UserPatch};
pub use roster::Roster;
