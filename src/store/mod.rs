mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use serde::Serialize;

use crate::error::Result;
use crate::types::*;

/// Outcome of removing an owner from a shared entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Unlinked {
    /// The ownership row existed and was removed.
    pub removed: bool,
    /// No owners remained, so the owned entity itself was deleted.
    pub pruned: bool,
}

/// Store defines the database interface.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Role reference data
    fn seed_roles(&self, roles: &[Role]) -> Result<()>;
    fn list_roles(&self) -> Result<Vec<Role>>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    fn count_users(&self) -> Result<i64>;
    fn update_user(&self, user: &User) -> Result<()>;
    fn delete_user(&self, id: &str) -> Result<bool>;

    // Student operations
    fn create_student(&self, student: &NewStudent) -> Result<Student>;
    fn get_student(&self, id: StudentId) -> Result<Option<Student>>;
    fn list_user_students(&self, user_id: &str) -> Result<Vec<Student>>;
    fn update_student(&self, student: &Student) -> Result<()>;
    fn delete_student(&self, id: StudentId) -> Result<bool>;

    // Guardianship (user <-> student, shared ownership)
    fn add_guardian(&self, user_id: &str, student_id: StudentId) -> Result<bool>;
    fn remove_guardian(&self, user_id: &str, student_id: StudentId) -> Result<Unlinked>;
    fn list_guardians(&self, student_id: StudentId) -> Result<Vec<String>>;

    // Program operations
    fn create_program(&self, program: &NewProgram) -> Result<Program>;
    fn get_program(&self, id: ProgramId) -> Result<Option<Program>>;
    fn list_programs(&self) -> Result<Vec<Program>>;
    fn list_user_programs(&self, user_id: &str) -> Result<Vec<Program>>;
    fn update_program(&self, program: &Program) -> Result<()>;
    fn delete_program(&self, id: ProgramId) -> Result<bool>;

    // Program ownership (instructor <-> program, shared ownership)
    fn add_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<bool>;
    fn remove_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<Unlinked>;
    fn list_program_owners(&self, program_id: ProgramId) -> Result<Vec<String>>;

    // Level operations (exclusively contained by a program). Writes that touch
    // `list_index` read, plan and write inside one transaction.
    /// Appends a level at position N+1. Fails with `NotFound` if the program is missing.
    fn append_level(&self, program_id: ProgramId, level: &NewLevel) -> Result<Level>;
    fn get_level(&self, id: LevelId) -> Result<Option<Level>>;
    /// Levels as stored, without repairing their order.
    fn list_levels(&self, program_id: ProgramId) -> Result<Vec<Level>>;
    /// Levels sorted by position, renumbered first if the stored order has gaps
    /// or duplicates.
    fn ordered_levels(&self, program_id: ProgramId) -> Result<Vec<Level>>;
    fn update_level(&self, level: &Level) -> Result<()>;
    /// Moves a level of `program_id` to `new_index` (clamped to 1..=N) and
    /// returns the program's levels in their new order.
    fn move_level(&self, program_id: ProgramId, level_id: LevelId, new_index: i64) -> Result<Vec<Level>>;
    /// Deletes a level of `program_id` and closes the gap it leaves.
    fn delete_level(&self, program_id: ProgramId, level_id: LevelId) -> Result<bool>;

    // Camp operations
    fn create_camp(&self, camp: &NewCamp) -> Result<Camp>;
    fn get_camp(&self, id: CampId) -> Result<Option<Camp>>;
    fn list_camps(&self) -> Result<Vec<Camp>>;
    fn list_instructor_camps(&self, user_id: &str) -> Result<Vec<Camp>>;
    fn update_camp(&self, camp: &Camp) -> Result<()>;
    fn delete_camp(&self, id: CampId) -> Result<bool>;
    /// Runs `edit` on the camp's current roster and persists the result when
    /// `edit` reports a change, all in one transaction. Returns the camp and
    /// whether its roster changed.
    fn edit_roster(
        &self,
        camp_id: CampId,
        edit: &mut dyn FnMut(&mut Roster) -> bool,
    ) -> Result<(Camp, bool)>;

    fn close(&self) -> Result<()>;
}
