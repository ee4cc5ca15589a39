//! Error types for dump discovery, fetching and processing.
//!
//! Uses the dual-error pattern: `DumpError` for library consumers with
//! detailed error context, and `ConsumerError` for failures raised by
//! caller-supplied record consumers.

use thiserror::Error;

use crate::dump::{Compression, DumpContentType};

/// Main error type for the dumpfiles library.
#[derive(Debug, Error)]
pub enum DumpError {
    /// The resource does not exist.
    #[error("Resource not found: {locator} ({reason})")]
    NotFound { locator: String, reason: String },

    /// The resource could not be reached right now (connection failure,
    /// timeout or server error). Asking again later may succeed.
    #[error("Resource unavailable: {locator} ({reason})")]
    Unavailable { locator: String, reason: String },

    /// The resource exists but was opened through an accessor that does not
    /// match its declared compression.
    #[error("Cannot open {declared} resource {locator} as {requested}")]
    WrongAccessor {
        locator: String,
        declared: Compression,
        requested: Compression,
    },

    /// The resource was opened but reading from it failed.
    #[error("Failed to read {locator}: {source}")]
    ReadFailure {
        locator: String,
        #[source]
        source: std::io::Error,
    },

    /// The decompressed content does not match the expected record format.
    #[error("Corrupt dump {locator} at record {record_index} (byte {byte_offset}): {message}")]
    CorruptDump {
        locator: String,
        record_index: u64,
        byte_offset: u64,
        message: String,
    },

    /// Discovery found no usable dump.
    #[error("No {content_type} dump available for {project}")]
    NoDumpAvailable {
        content_type: DumpContentType,
        project: String,
    },

    /// A network resource was requested while offline mode is enabled.
    #[error("Refusing to access {locator} in offline mode")]
    OfflineMode { locator: String },

    /// Invalid dump date.
    #[error("Invalid dump date: '{0}'. Expected YYYYMMDD (e.g., 20150713)")]
    InvalidDate(String),

    /// Invalid project name.
    #[error("Invalid project name: '{0}'. Expected a wiki database name (e.g., wikidatawiki)")]
    InvalidProjectName(String),

    /// A local file name that the naming convention cannot interpret.
    #[error("Cannot determine dump type and date from file name: {0}")]
    UnknownDumpFile(String),

    /// HTTP client error outside of an individual request.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DumpError {
    /// Whether this error means "the thing is not there" rather than a failure.
    ///
    /// Discovery uses this to treat missing dates and missing listings as empty
    /// results instead of aborting.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::ReadFailure { .. })
    }

    pub(crate) fn not_found(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotFound {
            locator: locator.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}

/// Error type returned by record consumers.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome of handing one record to a consumer.
pub type ConsumerResult = std::result::Result<(), ConsumerError>;

/// Result type alias for dumpfiles operations.
pub type Result<T> = std::result::Result<T, DumpError>;
