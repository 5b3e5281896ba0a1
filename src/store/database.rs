//! SQLite-backed store with a typed transaction API.
//!
//! All reads and writes go through `Database::transaction`. The closure
//! receives a `StoreTx`; returning `Ok` commits, returning `Err` rolls back.

use super::schema::init_schema;
use crate::models::{Function, Module};
use crate::parser::ModuleObservation;
use crate::utils::error::StoreError;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

/// Handle to an open database
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) a database file and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!("Opening database: {}", path.display());
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// File backing this database; `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run `f` inside one transaction
    ///
    /// The transaction commits only if `f` returns `Ok`. Transactions do not
    /// nest: calling this from inside `f` fails.
    pub fn transaction<T, E>(&self, f: impl FnOnce(&StoreTx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StoreError::from)?;
        let store_tx = StoreTx { tx };
        let value = f(&store_tx)?;
        store_tx.tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Statements available inside a transaction
pub struct StoreTx<'c> {
    tx: rusqlite::Transaction<'c>,
}

impl StoreTx<'_> {
    pub fn module_exists(&self, name: &str) -> Result<bool, StoreError> {
        let found = self
            .tx
            .prepare_cached("SELECT 1 FROM modules WHERE name = ?1")?
            .exists(params![name])?;
        Ok(found)
    }

    /// Insert a module and return its assigned id
    pub fn insert_module(&self, module: &ModuleObservation) -> Result<i64, StoreError> {
        self.tx
            .prepare_cached("INSERT INTO modules (name, path, base, main) VALUES (?1, ?2, ?3, ?4)")?
            .execute(params![module.name, module.path, module.base as i64, module.main])?;
        Ok(self.tx.last_insert_rowid())
    }

    /// Refresh path, base and main flag of a known module
    pub fn update_module(&self, module: &ModuleObservation) -> Result<usize, StoreError> {
        let changed = self
            .tx
            .prepare_cached("UPDATE modules SET path = ?1, base = ?2, main = ?3 WHERE name = ?4")?
            .execute(params![module.path, module.base as i64, module.main, module.name])?;
        Ok(changed)
    }

    pub fn module_by_name(&self, name: &str) -> Result<Option<Module>, StoreError> {
        let module = self
            .tx
            .prepare_cached("SELECT * FROM modules WHERE name = ?1")?
            .query_row(params![name], module_from_row)
            .optional()?;
        Ok(module)
    }

    pub fn increment_module_calls(&self, id: i64, delta: u64) -> Result<usize, StoreError> {
        let changed = self
            .tx
            .prepare_cached("UPDATE modules SET calls = calls + ?1 WHERE id = ?2")?
            .execute(params![delta as i64, id])?;
        Ok(changed)
    }

    /// Modules with at least one call, hottest first
    pub fn modules_with_calls(&self) -> Result<Vec<Module>, StoreError> {
        let mut stmt = self
            .tx
            .prepare_cached("SELECT * FROM modules WHERE calls > 0 ORDER BY calls DESC")?;
        let modules = stmt
            .query_map([], module_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(modules)
    }

    /// Functions of one module, hottest first
    pub fn functions_in_module(&self, module_id: i64) -> Result<Vec<Function>, StoreError> {
        let mut stmt = self
            .tx
            .prepare_cached("SELECT * FROM functions WHERE module = ?1 ORDER BY calls DESC")?;
        let functions = stmt
            .query_map(params![module_id], function_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(functions)
    }

    pub fn function_by_name(&self, name: &str) -> Result<Option<Function>, StoreError> {
        let function = self
            .tx
            .prepare_cached("SELECT * FROM functions WHERE name = ?1")?
            .query_row(params![name], function_from_row)
            .optional()?;
        Ok(function)
    }

    pub fn function_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .tx
            .query_row("SELECT COUNT(*) FROM functions", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Insert a function and return its assigned id
    pub fn insert_function(&self, function: &Function) -> Result<i64, StoreError> {
        self.tx
            .prepare_cached(
                "INSERT INTO functions (name, module, offset, calls) VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![
                function.name,
                function.module,
                function.offset as i64,
                function.calls as i64
            ])?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn update_function_calls(&self, id: i64, calls: u64) -> Result<usize, StoreError> {
        let changed = self
            .tx
            .prepare_cached("UPDATE functions SET calls = ?1 WHERE id = ?2")?
            .execute(params![calls as i64, id])?;
        Ok(changed)
    }
}

fn module_from_row(row: &Row<'_>) -> rusqlite::Result<Module> {
    Ok(Module {
        id: row.get("id")?,
        name: row.get("name")?,
        path: row.get("path")?,
        base: row.get::<_, i64>("base")? as u64,
        main: row.get("main")?,
        calls: row.get::<_, i64>("calls")? as u64,
    })
}

fn function_from_row(row: &Row<'_>) -> rusqlite::Result<Function> {
    Ok(Function {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        module: row.get("module")?,
        offset: row.get::<_, i64>("offset")? as u64,
        calls: row.get::<_, i64>("calls")? as u64,
    })
}
