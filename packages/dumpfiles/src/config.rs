//! Configuration constants, validation functions and processing settings.

use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{DumpError, Result};

/// Base URL of the public dump archive.
pub const DEFAULT_ARCHIVE_URL: &str = "https://dumps.wikimedia.org";

/// Project whose dumps are processed when none is configured.
pub const DEFAULT_PROJECT: &str = "wikidatawiki";

/// HTTP connect timeout in seconds.
///
/// Only bounds connection setup: reading a multi-gigabyte dump legitimately
/// takes hours, so no overall request timeout is applied to dump streams.
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts when fetching small resources such as listings.
pub const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds).
pub const RETRY_BASE_DELAY_MS: u64 = 500;

/// Read buffer size for decompressed dump streams (1 MB).
pub const STREAM_BUFFER_SIZE: usize = 1024 * 1024;

/// Date stamp used by the archive: YYYYMMDD.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("valid regex"));

/// Wiki database names: lowercase letters, digits and underscores.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PROJECT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid regex"));

/// Validate a project (wiki database) name.
///
/// # Examples
/// ```
/// use kbdump_dumpfiles::config::validate_project_name;
///
/// assert!(validate_project_name("wikidatawiki").is_ok());
/// assert!(validate_project_name("../etc").is_err());
/// ```
pub fn validate_project_name(project: &str) -> Result<()> {
    if PROJECT_PATTERN.is_match(project) {
        Ok(())
    } else {
        Err(DumpError::InvalidProjectName(project.to_string()))
    }
}

/// Parse an archive date stamp (YYYYMMDD).
///
/// # Examples
/// ```
/// use kbdump_dumpfiles::config::parse_dump_date;
///
/// assert!(parse_dump_date("20150713").is_ok());
/// assert!(parse_dump_date("2015-07-13").is_err());
/// assert!(parse_dump_date("20151332").is_err()); // Invalid month and day
/// ```
pub fn parse_dump_date(stamp: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(stamp) {
        return Err(DumpError::InvalidDate(stamp.to_string()));
    }
    NaiveDate::parse_from_str(stamp, "%Y%m%d").map_err(|_| DumpError::InvalidDate(stamp.to_string()))
}

/// Format a date as an archive date stamp (YYYYMMDD).
#[must_use]
pub fn format_dump_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Settings for one processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Project (wiki database name) whose dumps are processed.
    pub project_name: String,

    /// Forbid all network access.
    pub offline: bool,

    /// Directory scanned for local dump files.
    pub local_directory: Option<PathBuf>,

    /// Root URL of the dump archive.
    pub archive_url: String,

    /// Log and skip corrupt records instead of aborting the run.
    pub skip_corrupt_records: bool,
}

impl ProcessingConfig {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            offline: false,
            local_directory: None,
            archive_url: DEFAULT_ARCHIVE_URL.to_string(),
            skip_corrupt_records: false,
        }
    }

    /// Read settings from `KBDUMP_*` environment variables.
    ///
    /// Unset variables fall back to the defaults of [`ProcessingConfig::new`].
    pub fn from_env() -> Result<Self> {
        let project_name =
            std::env::var("KBDUMP_PROJECT").unwrap_or_else(|_| DEFAULT_PROJECT.into());
        validate_project_name(&project_name)?;

        let offline = std::env::var("KBDUMP_OFFLINE")
            .ok()
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let local_directory = std::env::var("KBDUMP_DUMP_DIR").ok().map(PathBuf::from);

        let archive_url =
            std::env::var("KBDUMP_ARCHIVE_URL").unwrap_or_else(|_| DEFAULT_ARCHIVE_URL.into());

        Ok(Self {
            project_name,
            offline,
            local_directory,
            archive_url,
            skip_corrupt_records: false,
        })
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_local_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.local_directory = Some(directory.into());
        self
    }

    pub fn with_archive_url(mut self, archive_url: impl Into<String>) -> Self {
        self.archive_url = archive_url.into();
        self
    }

    pub fn with_skip_corrupt_records(mut self, skip: bool) -> Self {
        self.skip_corrupt_records = skip;
        self
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PROJECT)
    }
}
