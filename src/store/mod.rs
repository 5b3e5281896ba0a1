//! Persistence of module and function counts.
//!
//! This module handles:
//! - Creating the SQLite schema
//! - Typed statements inside transactions (`StoreTx`)
//! - The shared attach/detach slot every component reads the database from

pub mod database;
pub mod schema;

pub use database::{Database, StoreTx};
pub use schema::SCHEMA_SQL;

use crate::utils::error::StoreError;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to the currently attached database, if any
///
/// **Public** - the registry and every function collection hold the same slot
#[derive(Default)]
pub struct StoreSlot {
    database: RefCell<Option<Rc<Database>>>,
}

impl StoreSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, database: Rc<Database>) {
        *self.database.borrow_mut() = Some(database);
    }

    pub fn detach(&self) -> Option<Rc<Database>> {
        self.database.borrow_mut().take()
    }

    /// The attached database, or `StoreError::Detached`
    pub fn get(&self) -> Result<Rc<Database>, StoreError> {
        self.database.borrow().clone().ok_or(StoreError::Detached)
    }

    pub fn is_attached(&self) -> bool {
        self.database.borrow().is_some()
    }
}
