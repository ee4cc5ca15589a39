//! In-memory fetcher for tests.

use std::collections::HashMap;
use std::io::{self, BufRead, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{check_accessor, ByteStream, ResourceFetcher, TextStream};
use crate::dump::Compression;
use crate::error::{DumpError, Result};

/// A registered in-memory resource.
#[derive(Debug, Clone)]
struct MockResource {
    contents: Vec<u8>,
    compression: Compression,
}

/// Fetcher serving registered in-memory resources.
///
/// Contents are stored as they should be seen after decompression: the
/// declared compression only decides which accessor may open a resource.
/// Unregistered locators are `NotFound` for every accessor.
#[derive(Debug, Default)]
pub struct MockFetcher {
    resources: HashMap<String, MockResource>,
    failing_readers: AtomicBool,
    accesses: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contents` under `locator` with its declared compression.
    pub fn set_resource(
        &mut self,
        locator: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        compression: Compression,
    ) {
        self.resources.insert(
            locator.into(),
            MockResource {
                contents: contents.into(),
                compression,
            },
        );
    }

    /// Builder form of [`MockFetcher::set_resource`].
    pub fn with_resource(
        mut self,
        locator: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        compression: Compression,
    ) -> Self {
        self.set_resource(locator, contents, compression);
        self
    }

    /// Make every stream handed out from now on fail on its first read.
    ///
    /// Opening still succeeds, which simulates a connection that drops after
    /// the resource was found.
    pub fn set_failing_readers(&self, failing: bool) {
        self.failing_readers.store(failing, Ordering::SeqCst);
    }

    /// Number of accessor and probe calls made so far.
    pub fn access_count(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    fn lookup(&self, locator: &str) -> Result<&MockResource> {
        self.accesses.fetch_add(1, Ordering::SeqCst);
        self.resources
            .get(locator)
            .ok_or_else(|| DumpError::not_found(locator, "not mocked"))
    }

    fn stream(&self, resource: &MockResource) -> TextStream {
        if self.failing_readers.load(Ordering::SeqCst) {
            Box::new(FailingReader)
        } else {
            Box::new(Cursor::new(resource.contents.clone()))
        }
    }

    fn open_typed(&self, locator: &str, requested: Compression) -> Result<TextStream> {
        let resource = self.lookup(locator)?;
        check_accessor(locator, resource.compression, requested)?;
        Ok(self.stream(resource))
    }
}

impl ResourceFetcher for MockFetcher {
    fn open_text(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::None)
    }

    fn open_gzip(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::Gzip)
    }

    fn open_bz2(&self, locator: &str) -> Result<TextStream> {
        self.open_typed(locator, Compression::Bzip2)
    }

    fn open_raw(&self, locator: &str) -> Result<ByteStream> {
        let resource = self.lookup(locator)?;
        if self.failing_readers.load(Ordering::SeqCst) {
            Ok(Box::new(FailingReader))
        } else {
            Ok(Box::new(Cursor::new(resource.contents.clone())))
        }
    }

    fn probe(&self, locator: &str) -> Result<()> {
        self.lookup(locator).map(|_| ())
    }
}

/// Reader whose every read fails like a dropped connection.
struct FailingReader;

impl FailingReader {
    fn error() -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionReset, "simulated connection failure")
    }
}

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(Self::error())
    }
}

impl BufRead for FailingReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Err(Self::error())
    }

    fn consume(&mut self, _amt: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_is_not_found_for_every_accessor() {
        let fetcher = MockFetcher::new();
        assert!(fetcher.open_text("x").err().unwrap().is_not_found());
        assert!(fetcher.open_gzip("x").err().unwrap().is_not_found());
        assert!(fetcher.open_bz2("x").err().unwrap().is_not_found());
        assert!(fetcher.open_raw("x").err().unwrap().is_not_found());
        assert!(fetcher.probe("x").unwrap_err().is_not_found());
        assert_eq!(fetcher.access_count(), 5);
    }

    #[test]
    fn test_raw_access_skips_type_check() {
        let fetcher = MockFetcher::new().with_resource("d.gz", "abc", Compression::Gzip);
        let mut content = String::new();
        fetcher
            .open_raw("d.gz")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "abc");
    }

    #[test]
    fn test_failing_readers_fail_on_read_not_open() {
        let fetcher = MockFetcher::new().with_resource("listing", "<html/>", Compression::None);
        fetcher.set_failing_readers(true);

        let mut stream = fetcher.open_text("listing").unwrap();
        let mut line = String::new();
        let err = stream.read_line(&mut line).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);

        fetcher.set_failing_readers(false);
        let mut stream = fetcher.open_text("listing").unwrap();
        stream.read_line(&mut line).unwrap();
        assert_eq!(line, "<html/>");
    }
}
