//! Ordered-list maintenance for program levels.
//!
//! Every program with N levels keeps `list_index` values that form exactly
//! `{1, ..., N}`. Planning is pure: the `plan_*` functions look at a snapshot and
//! return the index writes that keep the set dense. The store reads the
//! snapshot, plans and writes inside a single transaction, so concurrent edits
//! never plan against stale indices. [`LevelList`] is the program-scoped handle
//! callers go through.

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::{Level, LevelId, NewLevel, ProgramId};

/// A single `list_index` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexChange {
    pub level_id: LevelId,
    pub list_index: i64,
}

/// Index a newly appended level receives.
#[must_use]
pub fn next_index(levels: &[Level]) -> i64 {
    levels.len() as i64 + 1
}

/// Verifies that the indices of `levels` are a permutation of 1..=N.
pub fn check_dense(levels: &[Level]) -> Result<()> {
    let n = levels.len();
    let mut seen = vec![false; n];
    for level in levels {
        let idx = level.list_index;
        if idx < 1 || idx as usize > n {
            return Err(Error::ConstraintViolation(format!(
                "level {} has list_index {idx} outside 1..={n}",
                level.id
            )));
        }
        let slot = &mut seen[idx as usize - 1];
        if *slot {
            return Err(Error::ConstraintViolation(format!(
                "list_index {idx} is used by more than one level"
            )));
        }
        *slot = true;
    }
    Ok(())
}

/// Renumbers levels 1..=N in their current order (by index, then id).
/// Returns only the writes that actually change something.
#[must_use]
pub fn plan_renumber(levels: &[Level]) -> Vec<IndexChange> {
    let mut ordered: Vec<&Level> = levels.iter().collect();
    ordered.sort_by_key(|l| (l.list_index, l.id));
    ordered
        .into_iter()
        .enumerate()
        .filter_map(|(i, level)| {
            let list_index = i as i64 + 1;
            (level.list_index != list_index).then_some(IndexChange {
                level_id: level.id,
                list_index,
            })
        })
        .collect()
}

/// Plans moving `level_id` to `new_index` (clamped to 1..=N).
///
/// Moving up shifts the levels in `[new, old)` down by one; moving down shifts
/// the levels in `(old, new]` up by one. The moved level's own write comes last.
pub fn plan_move(levels: &[Level], level_id: LevelId, new_index: i64) -> Result<Vec<IndexChange>> {
    let moved = levels
        .iter()
        .find(|l| l.id == level_id)
        .ok_or(Error::NotFound)?;

    let n = levels.len() as i64;
    let new_index = new_index.clamp(1, n);
    let old_index = moved.list_index;

    if new_index == old_index {
        return Ok(Vec::new());
    }

    let mut changes: Vec<IndexChange> = levels
        .iter()
        .filter(|l| l.id != level_id)
        .filter_map(|l| {
            let idx = l.list_index;
            let shifted = if new_index < old_index && (new_index..old_index).contains(&idx) {
                idx + 1
            } else if new_index > old_index && (old_index + 1..=new_index).contains(&idx) {
                idx - 1
            } else {
                return None;
            };
            Some(IndexChange {
                level_id: l.id,
                list_index: shifted,
            })
        })
        .collect();

    changes.push(IndexChange {
        level_id,
        list_index: new_index,
    });
    Ok(changes)
}

/// Plans closing the gap left by deleting `level_id`: everything after it moves up one.
pub fn plan_delete(levels: &[Level], level_id: LevelId) -> Result<Vec<IndexChange>> {
    let deleted = levels
        .iter()
        .find(|l| l.id == level_id)
        .ok_or(Error::NotFound)?;

    Ok(levels
        .iter()
        .filter(|l| l.id != level_id && l.list_index > deleted.list_index)
        .map(|l| IndexChange {
            level_id: l.id,
            list_index: l.list_index - 1,
        })
        .collect())
}

/// Applies planned writes to an in-memory snapshot.
pub fn apply_changes(levels: &mut [Level], changes: &[IndexChange]) {
    for change in changes {
        if let Some(level) = levels.iter_mut().find(|l| l.id == change.level_id) {
            level.list_index = change.list_index;
        }
    }
}

/// The ordered level collection of one program, backed by a store.
pub struct LevelList<'a> {
    store: &'a dyn Store,
    program_id: ProgramId,
}

impl<'a> LevelList<'a> {
    pub fn new(store: &'a dyn Store, program_id: ProgramId) -> Self {
        Self { store, program_id }
    }

    /// Levels sorted by position, ready for display.
    pub fn sorted(&self) -> Result<Vec<Level>> {
        self.store.ordered_levels(self.program_id)
    }

    /// Reports the first defect in the persisted ordering, if any.
    pub fn check(&self) -> Result<()> {
        check_dense(&self.store.list_levels(self.program_id)?)
    }

    /// Appends a level at position N+1.
    pub fn insert(&self, level: &NewLevel) -> Result<Level> {
        let created = self.store.append_level(self.program_id, level)?;
        info!(
            "Appended level {} to program {} at {}",
            created.id, self.program_id, created.list_index
        );
        Ok(created)
    }

    /// Moves a level to `new_index`, shifting the levels in between.
    pub fn move_to(&self, level_id: LevelId, new_index: i64) -> Result<Level> {
        let levels = self.store.move_level(self.program_id, level_id, new_index)?;
        let moved = levels
            .into_iter()
            .find(|l| l.id == level_id)
            .ok_or(Error::NotFound)?;

        info!(
            "Moved level {} of program {} to {}",
            level_id, self.program_id, moved.list_index
        );
        Ok(moved)
    }

    /// Deletes a level and closes the gap. Deleting an absent level is a no-op.
    pub fn delete(&self, level_id: LevelId) -> Result<bool> {
        let deleted = self.store.delete_level(self.program_id, level_id)?;
        if deleted {
            info!("Deleted level {} from program {}", level_id, self.program_id);
        }
        Ok(deleted)
    }
}
