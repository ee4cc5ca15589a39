//! Streaming decompression and record parsing.
//!
//! Every stage pulls from the one below it on demand: nothing is read before
//! the first record is requested and no stage holds more than its buffer.

mod json;
mod xml;

use std::io::{BufReader, Read};

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;

pub use json::JsonDumpParser;
pub use xml::XmlDumpParser;

use crate::config::STREAM_BUFFER_SIZE;
use crate::dump::{Compression, DumpContentType};
use crate::error::Result;
use crate::fetch::TextStream;
use crate::record::Record;

/// Wrap a raw byte stream with the decoder for `compression`.
///
/// Dumps are often concatenations of several gzip members or bzip2 streams,
/// so the multi-member decoders are used.
pub fn decompress<R: Read + Send + 'static>(reader: R, compression: Compression) -> TextStream {
    match compression {
        Compression::None => Box::new(BufReader::with_capacity(STREAM_BUFFER_SIZE, reader)),
        Compression::Gzip => Box::new(BufReader::with_capacity(
            STREAM_BUFFER_SIZE,
            MultiGzDecoder::new(reader),
        )),
        Compression::Bzip2 => Box::new(BufReader::with_capacity(
            STREAM_BUFFER_SIZE,
            MultiBzDecoder::new(reader),
        )),
    }
}

type BoxedRecords = Box<dyn Iterator<Item = Result<Record>> + Send>;

/// Lazy, single-pass sequence of records read from one dump.
///
/// The stream owns every layer below it (parser, decoder, transport).
/// [`RecordStream::close`] releases them; it is idempotent and also runs when
/// the sequence is exhausted or the stream is dropped.
pub struct RecordStream {
    inner: Option<BoxedRecords>,
    locator: String,
    position: u64,
}

impl RecordStream {
    pub fn new(records: BoxedRecords, locator: impl Into<String>) -> Self {
        Self {
            inner: Some(records),
            locator: locator.into(),
            position: 0,
        }
    }

    /// Release the underlying stream. Later calls do nothing.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(locator = %self.locator, "Closed record stream");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    #[must_use]
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Number of items yielded so far, corrupt records included.
    ///
    /// The item last yielded has index `position() - 1`, the same index the
    /// parser reports in `CorruptDump`.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl Iterator for RecordStream {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.inner.as_mut()?.next();
        match next {
            Some(_) => self.position += 1,
            None => self.close(),
        }
        next
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Parse a decompressed dump stream into records of the given content type.
pub fn parse_records(
    stream: TextStream,
    content_type: DumpContentType,
    locator: &str,
    site: &str,
) -> RecordStream {
    let records: BoxedRecords = match content_type {
        DumpContentType::Json => Box::new(JsonDumpParser::new(stream, locator, site)),
        DumpContentType::Current | DumpContentType::Full => Box::new(
            XmlDumpParser::new(stream, locator, site)
                .all_current(content_type.has_current_revisions_only()),
        ),
    };
    RecordStream::new(records, locator)
}
