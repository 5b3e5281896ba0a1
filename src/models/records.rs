//! Module and function records as stored and shown in the live views.

use crate::observable::Ranked;
use serde::{Deserialize, Serialize};

/// A loaded binary or library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Row id assigned by storage
    pub id: i64,

    /// Unique, stable key from the instrumentation source
    pub name: String,

    pub path: String,

    /// Load address
    pub base: u64,

    /// Whether this is the traced program's own binary
    pub main: bool,

    /// Sum of all calls attributed to this module
    pub calls: u64,
}

impl Ranked for Module {
    fn calls(&self) -> u64 {
        self.calls
    }
}

/// A call target inside a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    /// Row id; `None` until the record is first flushed
    pub id: Option<i64>,

    /// Derived display name, unique across the store
    pub name: String,

    /// Id of the owning module
    pub module: i64,

    /// Offset inside the module; unique per module
    pub offset: u64,

    pub calls: u64,
}

impl Function {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

impl Ranked for Function {
    fn calls(&self) -> u64 {
        self.calls
    }
}
