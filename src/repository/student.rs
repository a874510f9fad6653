use tracing::info;

use super::Entity;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{NewStudent, Student, StudentId, StudentPatch};

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::Validation("student name cannot be empty".to_string()));
    }
    Ok(())
}

impl Entity for Student {
    type Id = StudentId;
    type Fields = NewStudent;
    type Patch = StudentPatch;

    fn open_existing(store: &dyn Store, id: &StudentId) -> Result<Option<Self>> {
        store.get_student(*id)
    }

    fn create_new(store: &dyn Store, fields: NewStudent) -> Result<Self> {
        validate_name(&fields.name)?;
        let student = store.create_student(&fields)?;
        info!("Created student {}", student.id);
        Ok(student)
    }

    fn update(store: &dyn Store, id: &StudentId, patch: StudentPatch) -> Result<Self> {
        let mut student = Self::open(store, id)?;
        patch.apply(&mut student)?;
        validate_name(&student.name)?;
        store.update_student(&student)?;
        Ok(student)
    }

    fn delete(store: &dyn Store, id: &StudentId) -> Result<bool> {
        let deleted = store.delete_student(*id)?;
        if deleted {
            info!("Deleted student {}", id);
        }
        Ok(deleted)
    }
}
