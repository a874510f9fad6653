//! Shared ownership between users and the entities they hold.
//!
//! Guardians share students and instructors share programs; both relations are
//! reference counted, so removing the last owner deletes the owned entity.
//! Camps hold a roster of instructors with exactly one primary while non-empty.

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::repository::Entity;
use crate::store::{Store, Unlinked};
use crate::types::*;

pub struct Membership<'a> {
    store: &'a dyn Store,
}

impl<'a> Membership<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    fn user(&self, user_id: &str) -> Result<User> {
        self.store.get_user(user_id)?.ok_or(Error::NotFound)
    }

    fn instructor(&self, user_id: &str) -> Result<User> {
        let user = self.user(user_id)?;
        if !user.is_instructor() {
            warn!("Rejected non-instructor user {} for an instructor-only link", user_id);
            return Err(Error::ConstraintViolation(format!(
                "user {user_id} does not hold the {INSTRUCTOR} role"
            )));
        }
        Ok(user)
    }

    // Guardianship

    /// Creates a student already owned by `guardian_id`.
    pub fn create_student_for(&self, guardian_id: &str, fields: &NewStudent) -> Result<Student> {
        self.user(guardian_id)?;
        let student = Student::create_new(self.store, fields.clone())?;
        self.store.add_guardian(guardian_id, student.id)?;
        info!("Created student {} for guardian {}", student.id, guardian_id);
        Ok(student)
    }

    pub fn add_guardian(&self, user_id: &str, student_id: StudentId) -> Result<bool> {
        self.user(user_id)?;
        if self.store.get_student(student_id)?.is_none() {
            return Err(Error::NotFound);
        }
        let added = self.store.add_guardian(user_id, student_id)?;
        if added {
            info!("Linked guardian {} to student {}", user_id, student_id);
        }
        Ok(added)
    }

    /// Unlinks a guardian; the student is deleted once no guardian remains.
    pub fn remove_guardian(&self, user_id: &str, student_id: StudentId) -> Result<Unlinked> {
        let outcome = self.store.remove_guardian(user_id, student_id)?;
        if outcome.pruned {
            info!("Deleted student {} after its last guardian left", student_id);
        } else if outcome.removed {
            info!("Unlinked guardian {} from student {}", user_id, student_id);
        }
        Ok(outcome)
    }

    pub fn is_guardian(&self, user_id: &str, student_id: StudentId) -> Result<bool> {
        Ok(self
            .store
            .list_guardians(student_id)?
            .iter()
            .any(|id| id == user_id))
    }

    // Program ownership

    /// Creates a program already owned by `instructor_id`.
    pub fn create_program_for(&self, instructor_id: &str, fields: &NewProgram) -> Result<Program> {
        self.instructor(instructor_id)?;
        let program = Program::create_new(self.store, fields.clone())?;
        self.store.add_program_owner(instructor_id, program.id)?;
        info!("Created program {} for instructor {}", program.id, instructor_id);
        Ok(program)
    }

    pub fn add_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<bool> {
        self.instructor(user_id)?;
        if self.store.get_program(program_id)?.is_none() {
            return Err(Error::NotFound);
        }
        let added = self.store.add_program_owner(user_id, program_id)?;
        if added {
            info!("Linked instructor {} to program {}", user_id, program_id);
        }
        Ok(added)
    }

    /// Unlinks an owner; the program (and its levels and camps) is deleted once
    /// no owner remains.
    pub fn remove_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<Unlinked> {
        let outcome = self.store.remove_program_owner(user_id, program_id)?;
        if outcome.pruned {
            info!("Deleted program {} after its last owner left", program_id);
        } else if outcome.removed {
            info!("Unlinked instructor {} from program {}", user_id, program_id);
        }
        Ok(outcome)
    }

    pub fn is_program_owner(&self, user_id: &str, program_id: ProgramId) -> Result<bool> {
        Ok(self
            .store
            .list_program_owners(program_id)?
            .iter()
            .any(|id| id == user_id))
    }

    // Camp roster

    /// Assigns an instructor to a camp. The first instructor becomes primary.
    /// Users without the instructor role are rejected.
    pub fn add_instructor(&self, camp_id: CampId, user_id: &str) -> Result<Camp> {
        if self.store.get_camp(camp_id)?.is_none() {
            return Err(Error::NotFound);
        }
        self.instructor(user_id)?;

        let (camp, changed) = self
            .store
            .edit_roster(camp_id, &mut |roster: &mut Roster| roster.add(user_id))?;
        if changed {
            info!(
                "Added instructor {} to camp {} (primary: {:?})",
                user_id,
                camp.id,
                camp.roster.primary()
            );
        }
        Ok(camp)
    }

    /// Makes a rostered instructor the camp's primary. No-op for non-members.
    pub fn make_primary(&self, camp_id: CampId, user_id: &str) -> Result<Camp> {
        let (camp, changed) = self
            .store
            .edit_roster(camp_id, &mut |roster: &mut Roster| roster.make_primary(user_id))?;
        if changed {
            info!("Instructor {} is now primary for camp {}", user_id, camp.id);
        }
        Ok(camp)
    }

    /// Removes an instructor, promoting the earliest-added remaining one if the
    /// primary left.
    pub fn remove_instructor(&self, camp_id: CampId, user_id: &str) -> Result<Camp> {
        let (camp, changed) = self
            .store
            .edit_roster(camp_id, &mut |roster: &mut Roster| roster.remove(user_id))?;
        if changed {
            info!(
                "Removed instructor {} from camp {} (primary: {:?})",
                user_id,
                camp.id,
                camp.roster.primary()
            );
        }
        Ok(camp)
    }

    /// Takes a user off every camp roster they are on.
    pub fn leave_camps(&self, user_id: &str) -> Result<usize> {
        let camps = self.store.list_instructor_camps(user_id)?;
        for camp in &camps {
            self.remove_instructor(camp.id, user_id)?;
        }
        Ok(camps.len())
    }

    /// Drops every link a user holds, pruning students and programs left without
    /// owners and repairing camp rosters.
    pub fn detach_user(&self, user_id: &str) -> Result<()> {
        let Some(user) = self.store.get_user(user_id)? else {
            return Ok(());
        };

        for student_id in &user.student_ids {
            self.remove_guardian(user_id, *student_id)?;
        }
        for program_id in &user.program_ids {
            self.remove_program_owner(user_id, *program_id)?;
        }
        self.leave_camps(user_id)?;
        Ok(())
    }
}
