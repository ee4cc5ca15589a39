//! Parser for MediaWiki XML export dumps.
//!
//! Yields one record per `<revision>`, carrying the title, namespace and id of
//! the enclosing `<page>`. The `<dbname>` of `<siteinfo>`, when present,
//! becomes the site of every record.
//!
//! Revisions of a page appear oldest first, so the last revision of each page
//! is its current one. The parser holds back one revision until it knows
//! whether another follows in the same page.

use std::io::{self, BufRead};

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{DumpError, Result};
use crate::record::{Record, Revision};

/// Page fields seen before its revisions.
#[derive(Debug, Default)]
struct PageState {
    title: String,
    namespace: i32,
    page_id: u64,
}

/// Streaming parser over a MediaWiki XML export.
///
/// Any XML error ends the sequence after a single `CorruptDump`; read errors
/// end it after a single `ReadFailure`.
pub struct XmlDumpParser<R> {
    reader: Reader<R>,
    locator: String,
    site: String,
    stack: Vec<Vec<u8>>,
    text: String,
    page: PageState,
    revision: Option<Revision>,
    pending: Option<Revision>,
    all_current: bool,
    record_index: u64,
    finished: bool,
}

impl<R: BufRead> XmlDumpParser<R> {
    pub fn new(reader: R, locator: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            reader: Reader::from_reader(reader),
            locator: locator.into(),
            site: site.into(),
            stack: Vec::new(),
            text: String::new(),
            page: PageState::default(),
            revision: None,
            pending: None,
            all_current: false,
            record_index: 0,
            finished: false,
        }
    }

    /// Mark every revision as current, as in dumps without history.
    #[must_use]
    pub fn all_current(mut self, all_current: bool) -> Self {
        self.all_current = all_current;
        self
    }

    fn emit(&mut self, revision: Revision) -> Option<Revision> {
        self.record_index += 1;
        Some(revision)
    }

    #[allow(clippy::unnecessary_cast)]
    fn position(&self) -> u64 {
        self.reader.buffer_position() as u64
    }

    fn corrupt(&self, message: impl Into<String>) -> DumpError {
        DumpError::CorruptDump {
            locator: self.locator.clone(),
            record_index: self.record_index,
            byte_offset: self.position(),
            message: message.into(),
        }
    }

    fn xml_error(&self, error: quick_xml::Error) -> DumpError {
        match error {
            quick_xml::Error::Io(source) => DumpError::ReadFailure {
                locator: self.locator.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            },
            other => self.corrupt(other.to_string()),
        }
    }

    fn parse_number<T: std::str::FromStr>(&self, element: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| self.corrupt(format!("invalid <{element}> value '{}'", value.trim())))
    }

    /// Read events until the next complete revision or the end of the dump.
    fn next_revision(&mut self) -> Result<Option<Revision>> {
        let mut buf = Vec::with_capacity(8192);

        loop {
            buf.clear();
            let event = match self.reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(e) => return Err(self.xml_error(e)),
            };

            match event {
                Event::Start(e) => {
                    let name = e.name().as_ref().to_vec();
                    if name == b"revision" {
                        self.revision = Some(Revision {
                            site: self.site.clone(),
                            page_id: self.page.page_id,
                            namespace: self.page.namespace,
                            title: self.page.title.clone(),
                            ..Revision::default()
                        });
                    } else if name == b"page" {
                        self.page = PageState::default();
                    }
                    self.stack.push(name);
                    self.text.clear();
                }
                Event::Empty(e) => {
                    if let Some(revision) = self.revision.as_mut() {
                        match e.name().as_ref() {
                            b"minor" => revision.minor = true,
                            b"text" => revision.text = Some(String::new()),
                            _ => {}
                        }
                    }
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| self.corrupt(err.to_string()))?;
                    self.text.push_str(&text);
                }
                Event::CData(e) => {
                    self.text.push_str(&String::from_utf8_lossy(&e));
                }
                Event::End(_) => {
                    let value = std::mem::take(&mut self.text);
                    let Some(name) = self.stack.pop() else {
                        return Err(self.corrupt("unbalanced closing tag"));
                    };
                    let parent = self.stack.last().cloned();
                    if let Some(revision) = self.end_element(parent.as_deref(), &name, value)? {
                        return Ok(Some(revision));
                    }
                }
                Event::Eof => {
                    if self.stack.is_empty() {
                        return Ok(None);
                    }
                    return Err(self.corrupt("unexpected end of dump inside an element"));
                }
                _ => {}
            }
        }
    }

    /// Store the text of a closed element; returns the revision it completes.
    fn end_element(
        &mut self,
        parent: Option<&[u8]>,
        name: &[u8],
        value: String,
    ) -> Result<Option<Revision>> {
        match (parent, name) {
            (Some(b"siteinfo"), b"dbname") => {
                let dbname = value.trim();
                if !dbname.is_empty() {
                    self.site = dbname.to_string();
                }
            }
            (Some(b"page"), b"title") => self.page.title = value,
            (Some(b"page"), b"ns") => self.page.namespace = self.parse_number("ns", &value)?,
            (Some(b"page"), b"id") => self.page.page_id = self.parse_number("id", &value)?,
            (Some(b"page"), b"revision") => {
                if let Some(mut revision) = self.revision.take() {
                    if self.all_current {
                        revision.is_current = true;
                        return Ok(self.emit(revision));
                    }
                    if let Some(previous) = self.pending.replace(revision) {
                        return Ok(self.emit(previous));
                    }
                }
            }
            (_, b"page") => {
                if let Some(mut revision) = self.pending.take() {
                    revision.is_current = true;
                    return Ok(self.emit(revision));
                }
            }
            (Some(b"revision"), field) => {
                let revision_id = match field {
                    b"id" => Some(self.parse_number::<u64>("id", &value)?),
                    _ => None,
                };
                let parent_id = match field {
                    b"parentid" => Some(self.parse_number::<u64>("parentid", &value)?),
                    _ => None,
                };
                let timestamp = match field {
                    b"timestamp" => Some(self.parse_timestamp(&value)?),
                    _ => None,
                };
                if let Some(revision) = self.revision.as_mut() {
                    match field {
                        b"id" => revision.revision_id = revision_id.unwrap_or_default(),
                        b"parentid" => revision.parent_revision_id = parent_id,
                        b"timestamp" => revision.timestamp = timestamp,
                        b"comment" => revision.comment = Some(value),
                        b"model" => revision.model = Some(value),
                        b"format" => revision.format = Some(value),
                        b"text" => revision.text = Some(value),
                        _ => {}
                    }
                }
            }
            (Some(b"contributor"), b"username" | b"ip") => {
                if let Some(revision) = self.revision.as_mut() {
                    revision.contributor = Some(value);
                }
            }
            (Some(b"contributor"), b"id") => {
                let id = self.parse_number::<u64>("id", &value)?;
                if let Some(revision) = self.revision.as_mut() {
                    revision.contributor_id = Some(id);
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn parse_timestamp(&self, value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| self.corrupt(format!("invalid <timestamp> value '{}'", value.trim())))
    }
}

impl<R: BufRead> Iterator for XmlDumpParser<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_revision() {
            Ok(Some(revision)) => Some(Ok(Record::Revision(revision))),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
