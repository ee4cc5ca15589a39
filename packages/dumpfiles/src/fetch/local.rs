//! Filesystem fetcher: locators are paths.

use std::fs::File;
use std::path::Path;

use super::{check_accessor, ByteStream, ResourceFetcher, TextStream};
use crate::dump::Compression;
use crate::error::{DumpError, Result};
use crate::parse::decompress;

/// Opens dump files from local disk.
///
/// The declared compression of a file is read from its name.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

impl LocalFetcher {
    pub fn new() -> Self {
        Self
    }

    fn open_file(locator: &str) -> Result<File> {
        let path = Path::new(locator);
        if !path.is_file() {
            return Err(DumpError::not_found(locator, "no such file"));
        }
        File::open(path).map_err(|e| DumpError::not_found(locator, e.to_string()))
    }

    fn open_typed(locator: &str, requested: Compression) -> Result<TextStream> {
        let file = Self::open_file(locator)?;
        check_accessor(locator, Compression::from_locator(locator), requested)?;
        Ok(decompress(file, requested))
    }
}

impl ResourceFetcher for LocalFetcher {
    fn open_text(&self, locator: &str) -> Result<TextStream> {
        Self::open_typed(locator, Compression::None)
    }

    fn open_gzip(&self, locator: &str) -> Result<TextStream> {
        Self::open_typed(locator, Compression::Gzip)
    }

    fn open_bz2(&self, locator: &str) -> Result<TextStream> {
        Self::open_typed(locator, Compression::Bzip2)
    }

    fn open_raw(&self, locator: &str) -> Result<ByteStream> {
        Ok(Box::new(Self::open_file(locator)?))
    }

    fn probe(&self, locator: &str) -> Result<()> {
        Self::open_file(locator).map(|_| ())
    }
}
