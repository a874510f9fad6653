use super::Entity;
use crate::error::{Error, Result};
use crate::ordering::LevelList;
use crate::store::Store;
use crate::types::{Level, LevelId, LevelPatch, NewLevel, ProgramId};

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::Validation("level title cannot be empty".to_string()));
    }
    Ok(())
}

/// Levels are created and deleted through their program's [`LevelList`] so the
/// ordering stays dense.
impl Entity for Level {
    type Id = LevelId;
    type Fields = (ProgramId, NewLevel);
    type Patch = LevelPatch;

    fn open_existing(store: &dyn Store, id: &LevelId) -> Result<Option<Self>> {
        store.get_level(*id)
    }

    fn create_new(store: &dyn Store, (program_id, fields): (ProgramId, NewLevel)) -> Result<Self> {
        validate_title(&fields.title)?;
        LevelList::new(store, program_id).insert(&fields)
    }

    fn update(store: &dyn Store, id: &LevelId, patch: LevelPatch) -> Result<Self> {
        let mut level = Self::open(store, id)?;
        patch.apply(&mut level)?;
        validate_title(&level.title)?;
        store.update_level(&level)?;
        Ok(level)
    }

    fn delete(store: &dyn Store, id: &LevelId) -> Result<bool> {
        match store.get_level(*id)? {
            Some(level) => LevelList::new(store, level.program_id).delete(level.id),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use crate::types::{Duration, Grade, GradeRange, NewProgram};

    fn level_in_new_program(store: &SqliteStore) -> Level {
        let program = store
            .create_program(&NewProgram {
                title: "Robotics".to_string(),
                grade_range: GradeRange::new(Grade::new(4).unwrap(), Grade::new(8).unwrap()).unwrap(),
                duration: Duration::Full,
                tags: String::new(),
                description: String::new(),
            })
            .unwrap();
        Level::create_new(
            store,
            (
                program.id,
                NewLevel {
                    title: "Sensors".to_string(),
                    description: String::new(),
                },
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_update_rejects_blank_title() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        let level = level_in_new_program(&store);

        for title in ["", "   "] {
            let result = Level::update(
                &store,
                &level.id,
                LevelPatch {
                    title: Some(title.to_string()),
                    description: None,
                },
            );
            assert!(matches!(result, Err(Error::Validation(_))));
        }
        assert_eq!(store.get_level(level.id).unwrap().unwrap().title, "Sensors");

        let updated = Level::update(
            &store,
            &level.id,
            LevelPatch {
                title: None,
                description: Some("Light and touch".to_string()),
            },
        )
        .unwrap();
        assert_eq!(updated.title, "Sensors");
        assert_eq!(updated.description, "Light and touch");
    }

    #[test]
    fn test_create_rejects_blank_title() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();
        let level = level_in_new_program(&store);

        let result = Level::create_new(
            &store,
            (
                level.program_id,
                NewLevel {
                    title: " ".to_string(),
                    description: String::new(),
                },
            ),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(store.list_levels(level.program_id).unwrap().len(), 1);
    }
}
