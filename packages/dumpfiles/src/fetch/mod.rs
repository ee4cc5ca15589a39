//! Resource fetching: where bytes come from, separated from what shape they have.
//!
//! A [`ResourceFetcher`] opens named resources through typed accessors. Each
//! resource has a declared [`Compression`]; opening it through an accessor for
//! a different compression fails with [`DumpError::WrongAccessor`], which is
//! distinct from [`DumpError::NotFound`]. A source that cannot be reached right
//! now is [`DumpError::Unavailable`], never `NotFound`. Streams are returned
//! without reading any content, so read failures surface later, from the
//! stream itself.

mod http;
mod local;
mod mock;

use std::io::{BufRead, Read};
use std::sync::Arc;

pub use http::{create_client, HttpFetcher};
pub use local::LocalFetcher;
pub use mock::MockFetcher;

use crate::dump::Compression;
use crate::error::{DumpError, Result};

/// Decompressed, buffered text stream.
pub type TextStream = Box<dyn BufRead + Send>;

/// Raw byte stream, exactly as stored at the source.
pub type ByteStream = Box<dyn Read + Send>;

/// Capability to open remote or local resources.
///
/// Implementations never retry; retry policy belongs to the caller.
pub trait ResourceFetcher: Send + Sync {
    /// Open an uncompressed resource (listing page, plain dump).
    fn open_text(&self, locator: &str) -> Result<TextStream>;

    /// Open a gzip resource, returning its decompressed content.
    fn open_gzip(&self, locator: &str) -> Result<TextStream>;

    /// Open a bzip2 resource, returning its decompressed content.
    fn open_bz2(&self, locator: &str) -> Result<TextStream>;

    /// Open a resource's bytes without any content type check.
    fn open_raw(&self, locator: &str) -> Result<ByteStream>;

    /// Confirm that a resource exists without exposing its content.
    fn probe(&self, locator: &str) -> Result<()>;
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Arc<F> {
    fn open_text(&self, locator: &str) -> Result<TextStream> {
        (**self).open_text(locator)
    }

    fn open_gzip(&self, locator: &str) -> Result<TextStream> {
        (**self).open_gzip(locator)
    }

    fn open_bz2(&self, locator: &str) -> Result<TextStream> {
        (**self).open_bz2(locator)
    }

    fn open_raw(&self, locator: &str) -> Result<ByteStream> {
        (**self).open_raw(locator)
    }

    fn probe(&self, locator: &str) -> Result<()> {
        (**self).probe(locator)
    }
}

/// Open a resource through the accessor matching `compression`.
pub fn open_decompressed(
    fetcher: &dyn ResourceFetcher,
    locator: &str,
    compression: Compression,
) -> Result<TextStream> {
    match compression {
        Compression::None => fetcher.open_text(locator),
        Compression::Gzip => fetcher.open_gzip(locator),
        Compression::Bzip2 => fetcher.open_bz2(locator),
    }
}

/// Fail with `WrongAccessor` unless the declared and requested types agree.
pub(crate) fn check_accessor(
    locator: &str,
    declared: Compression,
    requested: Compression,
) -> Result<()> {
    if declared == requested {
        Ok(())
    } else {
        Err(DumpError::WrongAccessor {
            locator: locator.to_string(),
            declared,
            requested,
        })
    }
}
