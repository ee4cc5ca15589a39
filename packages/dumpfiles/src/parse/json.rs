//! Parser for JSON entity dumps.
//!
//! JSON dumps are one large array with one entity document per line:
//!
//! ```text
//! [
//! {"id":"Q1","type":"item",...},
//! {"id":"Q2","type":"item",...}
//! ]
//! ```
//!
//! JSON lines files (no brackets, no trailing commas) are read the same way.

use std::io::BufRead;

use serde_json::Value;

use crate::error::{DumpError, Result};
use crate::record::{EntityDocument, Record};

/// Streaming parser yielding one entity record per line.
///
/// A line that is not a valid entity document yields `CorruptDump` and parsing
/// continues with the next line. A read error yields `ReadFailure` and ends the
/// sequence.
pub struct JsonDumpParser<R> {
    reader: R,
    locator: String,
    site: String,
    line: Vec<u8>,
    byte_offset: u64,
    record_index: u64,
    finished: bool,
}

impl<R: BufRead> JsonDumpParser<R> {
    pub fn new(reader: R, locator: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            reader,
            locator: locator.into(),
            site: site.into(),
            line: Vec::with_capacity(8192),
            byte_offset: 0,
            record_index: 0,
            finished: false,
        }
    }

    fn parse_line(&self, line: &[u8]) -> std::result::Result<EntityDocument, String> {
        let json: Value = serde_json::from_slice(line).map_err(|e| e.to_string())?;
        EntityDocument::from_json(self.site.as_str(), json)
    }
}

impl<R: BufRead> Iterator for JsonDumpParser<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();
            let line_start = self.byte_offset;
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(read) => self.byte_offset += read as u64,
                Err(source) => {
                    self.finished = true;
                    return Some(Err(DumpError::ReadFailure {
                        locator: self.locator.clone(),
                        source,
                    }));
                }
            }

            let trimmed = self.line.trim_ascii();
            let trimmed = trimmed.strip_suffix(b",").unwrap_or(trimmed).trim_ascii_end();
            if trimmed.is_empty() || trimmed == b"[" || trimmed == b"]" {
                continue;
            }

            let record_index = self.record_index;
            self.record_index += 1;

            return Some(match self.parse_line(trimmed) {
                Ok(entity) => Ok(Record::Entity(entity)),
                Err(message) => Err(DumpError::CorruptDump {
                    locator: self.locator.clone(),
                    record_index,
                    byte_offset: line_start,
                    message,
                }),
            });
        }
    }
}
