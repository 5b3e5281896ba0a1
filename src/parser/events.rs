//! Reading newline-delimited JSON event logs.

use super::schema::TraceEvent;
use crate::utils::error::ParseError;
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse one event line
pub fn parse_event(line: &str) -> Result<TraceEvent, ParseError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ParseError::InvalidFormat("empty event line".to_string()));
    }
    Ok(serde_json::from_str(line)?)
}

/// Iterate over the events of a reader, skipping blank lines
///
/// Errors carry the 1-based line number.
pub fn read_events<R: BufRead>(reader: R) -> impl Iterator<Item = Result<TraceEvent, ParseError>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(parse_event(&line).map_err(|e| {
                ParseError::InvalidFormat(format!("line {}: {}", index + 1, e))
            })),
            Err(e) => Some(Err(ParseError::Io(e))),
        })
}

/// Open an event log file
pub fn open_events(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<TraceEvent, ParseError>>, ParseError> {
    let path = path.as_ref();
    debug!("Reading events from: {}", path.display());
    let file = File::open(path)?;
    Ok(read_events(BufReader::new(file)))
}
