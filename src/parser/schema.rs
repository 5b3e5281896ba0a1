//! Input schema: what the instrumentation source sends us.
//!
//! Addresses and offsets may arrive as JSON integers or as `0x`-prefixed
//! hex strings, since tracers usually render pointers as strings.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Symbol an address was resolved to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// Module name (file name of the binary or library)
    pub module: String,

    /// Offset of the function inside the module
    #[serde(deserialize_with = "deserialize_address")]
    pub offset: u64,
}

/// Call count observed for one raw address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub count: u64,

    /// Missing when the tracer could not resolve the address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<Symbol>,
}

/// One sampling interval: raw address -> sample
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceSummary {
    pub samples: BTreeMap<String, Sample>,
}

impl TraceSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolved sample
    pub fn with_symbol(mut self, address: &str, module: &str, offset: u64, count: u64) -> Self {
        self.samples.insert(
            address.to_string(),
            Sample {
                count,
                symbol: Some(Symbol {
                    module: module.to_string(),
                    offset,
                }),
            },
        );
        self
    }

    /// Add a sample whose address could not be resolved
    pub fn with_unresolved(mut self, address: &str, count: u64) -> Self {
        self.samples
            .insert(address.to_string(), Sample { count, symbol: None });
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A loaded module as reported by the instrumentation source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleObservation {
    pub name: String,
    pub path: String,

    #[serde(deserialize_with = "deserialize_address")]
    pub base: u64,

    /// Whether this is the traced program's own binary
    #[serde(default)]
    pub main: bool,
}

/// One line of an event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Current module list of the traced process
    Modules { modules: Vec<ModuleObservation> },

    /// Call counts for one sampling interval
    Summary { summary: TraceSummary },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAddress {
    Number(u64),
    Text(String),
}

/// Parse `0x1f`, `0X1F` or a decimal string
pub fn parse_address(text: &str) -> Result<u64, std::num::ParseIntError> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    }
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawAddress::deserialize(deserializer)? {
        RawAddress::Number(value) => Ok(value),
        RawAddress::Text(text) => parse_address(&text)
            .map_err(|e| serde::de::Error::custom(format!("invalid address {:?}: {}", text, e))),
    }
}
