use tracing::info;

use super::Entity;
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Camp, CampId, CampPatch, NewCamp, validate_schedule};

impl Entity for Camp {
    type Id = CampId;
    type Fields = NewCamp;
    type Patch = CampPatch;

    fn open_existing(store: &dyn Store, id: &CampId) -> Result<Option<Self>> {
        store.get_camp(*id)
    }

    fn create_new(store: &dyn Store, fields: NewCamp) -> Result<Self> {
        validate_schedule(fields.starts_on, fields.ends_on)?;
        if store.get_program(fields.program_id)?.is_none() {
            return Err(Error::NotFound);
        }
        let camp = store.create_camp(&fields)?;
        info!("Scheduled camp {} for program {}", camp.id, camp.program_id);
        Ok(camp)
    }

    fn update(store: &dyn Store, id: &CampId, patch: CampPatch) -> Result<Self> {
        let mut camp = Self::open(store, id)?;
        if let Some(program_id) = patch.program_id {
            if store.get_program(program_id)?.is_none() {
                return Err(Error::NotFound);
            }
        }
        patch.apply(&mut camp)?;
        store.update_camp(&camp)?;
        Ok(camp)
    }

    fn delete(store: &dyn Store, id: &CampId) -> Result<bool> {
        let deleted = store.delete_camp(*id)?;
        if deleted {
            info!("Deleted camp {}", id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn test_camp_needs_existing_program() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.initialize().unwrap();

        let result = Camp::create_new(
            &store,
            NewCamp {
                program_id: 7,
                starts_on: NaiveDate::from_ymd_opt(2025, 8, 4),
                ends_on: None,
            },
        );
        assert!(matches!(result, Err(Error::NotFound)));
    }
}
