use tracing::info;

use super::Entity;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{GradeRange, NewProgram, Program, ProgramId, ProgramPatch};

fn validate(title: &str, range: &GradeRange) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("program title cannot be empty".to_string()));
    }
    GradeRange::new(range.from, range.to)?;
    Ok(())
}

impl Entity for Program {
    type Id = ProgramId;
    type Fields = NewProgram;
    type Patch = ProgramPatch;

    fn open_existing(store: &dyn Store, id: &ProgramId) -> Result<Option<Self>> {
        store.get_program(*id)
    }

    fn create_new(store: &dyn Store, fields: NewProgram) -> Result<Self> {
        validate(&fields.title, &fields.grade_range)?;
        let program = store.create_program(&fields)?;
        info!("Created program {} ({})", program.id, program.title);
        Ok(program)
    }

    fn update(store: &dyn Store, id: &ProgramId, patch: ProgramPatch) -> Result<Self> {
        let mut program = Self::open(store, id)?;
        patch.apply(&mut program)?;
        validate(&program.title, &program.grade_range)?;
        store.update_program(&program)?;
        Ok(program)
    }

    /// Deletes the program with its levels, camps and ownership rows.
    fn delete(store: &dyn Store, id: &ProgramId) -> Result<bool> {
        let deleted = store.delete_program(*id)?;
        if deleted {
            info!("Deleted program {}", id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{Duration, Grade};

    #[test]
    fn test_create_rejects_inverted_grades() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let fields = NewProgram {
            title: "Drama".to_string(),
            grade_range: GradeRange {
                from: Grade::new(8).unwrap(),
                to: Grade::new(2).unwrap(),
            },
            duration: Duration::Full,
            tags: String::new(),
            description: String::new(),
        };
        assert!(matches!(
            Program::create_new(&store, fields),
            Err(Error::Validation(_))
        ));
        assert!(store.list_programs().unwrap().is_empty());
    }
}
