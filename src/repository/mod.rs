//! Per-entity load, create, update and delete on top of a [`Store`].
//!
//! Construction is split into two explicit factories: [`Entity::open_existing`]
//! returns `Ok(None)` on a miss, [`Entity::create_new`] always inserts. The
//! load-or-create merge is [`Entity::open_or_create`].

mod camp;
mod level;
mod program;
mod student;
mod user;

pub use user::{add_email, set_primary_email, set_roles, sign_in};

use crate::error::{Error, Result};
use crate::store::Store;

pub trait Entity: Sized {
    type Id: ?Sized;
    type Fields;
    type Patch;

    /// Loads the entity, or `Ok(None)` if no row has this id.
    fn open_existing(store: &dyn Store, id: &Self::Id) -> Result<Option<Self>>;

    /// Inserts a new entity and returns it with its assigned id.
    fn create_new(store: &dyn Store, fields: Self::Fields) -> Result<Self>;

    /// Loads, patches and persists the entity.
    fn update(store: &dyn Store, id: &Self::Id, patch: Self::Patch) -> Result<Self>;

    /// Removes the entity and whatever it exclusively contains. Deleting an
    /// absent id returns `Ok(false)`.
    fn delete(store: &dyn Store, id: &Self::Id) -> Result<bool>;

    /// Loads the entity, failing with [`Error::NotFound`] on a miss.
    fn open(store: &dyn Store, id: &Self::Id) -> Result<Self> {
        Self::open_existing(store, id)?.ok_or(Error::NotFound)
    }

    /// Loads the entity, falling back to creating it from `fields` on a miss.
    fn open_or_create(store: &dyn Store, id: &Self::Id, fields: Self::Fields) -> Result<Self> {
        match Self::open_existing(store, id)? {
            Some(entity) => Ok(entity),
            None => Self::create_new(store, fields),
        }
    }
}
