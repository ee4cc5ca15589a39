//! Dump descriptors: immutable values describing one candidate dump file.

pub mod naming;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::format_dump_date;
use crate::error::DumpError;

pub use naming::{DumpNaming, ParsedFileName, WikimediaNaming};

/// Logical encoding of the records in a dump, independent of compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpContentType {
    /// One JSON entity document per line.
    Json,

    /// MediaWiki XML export with the current revision of every page.
    Current,

    /// MediaWiki XML export with the full revision history.
    Full,
}

impl DumpContentType {
    /// All content types, in the order they are listed to users.
    pub const ALL: [Self; 3] = [Self::Json, Self::Current, Self::Full];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Current => "current",
            Self::Full => "full",
        }
    }

    /// Whether every record of this type is the current revision of its page.
    #[must_use]
    pub fn has_current_revisions_only(&self) -> bool {
        matches!(self, Self::Json | Self::Current)
    }

    /// Whether records of this type are XML revisions (as opposed to entities).
    #[must_use]
    pub fn is_xml(&self) -> bool {
        matches!(self, Self::Current | Self::Full)
    }
}

impl fmt::Display for DumpContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DumpContentType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "current" => Ok(Self::Current),
            "full" | "history" => Ok(Self::Full),
            other => Err(format!(
                "unknown dump type '{other}' (expected json, current or full)"
            )),
        }
    }
}

/// Byte-level encoding wrapping a dump's content.
///
/// Also used by fetchers as the declared type of a resource: a resource can
/// only be opened through the accessor matching its compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Plain text, HTML or uncompressed dump content.
    None,

    /// gzip, possibly with multiple members.
    Gzip,

    /// bzip2, possibly multi-stream.
    Bzip2,
}

impl Compression {
    /// File name suffix signalling this compression.
    #[must_use]
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Gzip => ".gz",
            Self::Bzip2 => ".bz2",
        }
    }

    /// Derive the compression from a URL or file name suffix.
    ///
    /// # Examples
    /// ```
    /// use kbdump_dumpfiles::dump::Compression;
    ///
    /// assert_eq!(Compression::from_locator("a/b.json.gz"), Compression::Gzip);
    /// assert_eq!(Compression::from_locator("a/b.xml.bz2"), Compression::Bzip2);
    /// assert_eq!(Compression::from_locator("https://host/listing/"), Compression::None);
    /// ```
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        let lower = locator.to_lowercase();
        if lower.ends_with(".gz") {
            Self::Gzip
        } else if lower.ends_with(".bz2") {
            Self::Bzip2
        } else {
            Self::None
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "plain",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        })
    }
}

/// Where the bytes of a dump can be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum DumpLocator {
    /// URL on the remote archive, opened through a fetcher.
    Remote(String),

    /// File on local disk.
    Local(PathBuf),
}

impl DumpLocator {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Display for DumpLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Immutable description of one dump file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpDescriptor {
    project_name: String,
    content_type: DumpContentType,
    date: NaiveDate,
    compression: Compression,
    locator: DumpLocator,
}

impl DumpDescriptor {
    /// Describe a dump published on the remote archive.
    pub fn remote(
        project_name: impl Into<String>,
        content_type: DumpContentType,
        date: NaiveDate,
        compression: Compression,
        url: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            content_type,
            date,
            compression,
            locator: DumpLocator::Remote(url.into()),
        }
    }

    /// Describe a dump stored on local disk.
    pub fn local(
        project_name: impl Into<String>,
        content_type: DumpContentType,
        date: NaiveDate,
        compression: Compression,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            content_type,
            date,
            compression,
            locator: DumpLocator::Local(path.into()),
        }
    }

    /// Describe a local file, reading type, date and compression from its name.
    ///
    /// # Errors
    /// Returns `DumpError::UnknownDumpFile` when the naming convention does not
    /// recognize the file name.
    pub fn from_local_file(
        project_name: impl Into<String>,
        path: &Path,
        naming: &dyn DumpNaming,
    ) -> crate::error::Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DumpError::UnknownDumpFile(path.display().to_string()))?;
        let parsed = naming
            .parse_file_name(file_name)
            .ok_or_else(|| DumpError::UnknownDumpFile(file_name.to_string()))?;
        Ok(Self::local(
            project_name,
            parsed.content_type,
            parsed.date,
            parsed.compression,
            path,
        ))
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn content_type(&self) -> DumpContentType {
        self.content_type
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Publication date in the archive's `YYYYMMDD` form.
    #[must_use]
    pub fn date_stamp(&self) -> String {
        format_dump_date(self.date)
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn locator(&self) -> &DumpLocator {
        &self.locator
    }

    /// Whether `other` describes the same published dump (type and date),
    /// regardless of where its bytes live.
    #[must_use]
    pub fn is_same_dump(&self, other: &DumpDescriptor) -> bool {
        self.content_type == other.content_type && self.date == other.date
    }
}

impl fmt::Display for DumpDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} dump {} ({})",
            self.project_name,
            self.content_type,
            self.date_stamp(),
            self.locator
        )
    }
}
