//! Naming conventions of the dump archive and of local dump files.
//!
//! The archive layout, the grammar of its listing pages and the way dump files
//! are named on disk are host conventions rather than properties of the dumps
//! themselves, so they sit behind the [`DumpNaming`] trait.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::{Compression, DumpContentType};
use crate::config::{format_dump_date, parse_dump_date, DEFAULT_ARCHIVE_URL};

/// Directory links in an archive listing: `href="20210301/"`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LISTING_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="(\d{8})/?""#).expect("valid regex"));

/// Eight-digit date embedded in a file name, not part of a longer number.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static FILE_DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").expect("valid regex"));

/// Type, date and compression read from a local file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFileName {
    pub content_type: DumpContentType,
    pub date: NaiveDate,
    pub compression: Compression,
}

/// Strategy describing where dumps live and how they are named.
pub trait DumpNaming: Send + Sync {
    /// URL of the listing page enumerating the dump dates for a content type.
    fn listing_url(&self, project: &str, content_type: DumpContentType) -> String;

    /// URL of the dump of the given type published at `date`.
    fn dump_url(&self, project: &str, content_type: DumpContentType, date: NaiveDate) -> String;

    /// Compression used by the archive for a content type.
    fn remote_compression(&self, content_type: DumpContentType) -> Compression;

    /// Canonical file name of a dump, used when storing it locally.
    fn file_name(&self, project: &str, content_type: DumpContentType, date: NaiveDate) -> String;

    /// Extract the publication dates from a listing page, most recent first.
    fn parse_dates(&self, listing: &str) -> Vec<NaiveDate>;

    /// Interpret a local file name, or `None` if it is not a dump file.
    fn parse_file_name(&self, file_name: &str) -> Option<ParsedFileName>;
}

/// Layout of dumps.wikimedia.org and of the files it publishes.
#[derive(Debug, Clone)]
pub struct WikimediaNaming {
    base_url: String,
}

impl WikimediaNaming {
    /// Create a naming strategy for an archive mirror rooted at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Directory holding all dated dump directories of a content type.
    fn type_directory(&self, project: &str, content_type: DumpContentType) -> String {
        match content_type {
            DumpContentType::Json => format!("{}/other/wikibase/{project}", self.base_url),
            DumpContentType::Current | DumpContentType::Full => {
                format!("{}/{project}", self.base_url)
            }
        }
    }
}

impl Default for WikimediaNaming {
    fn default() -> Self {
        Self::new(DEFAULT_ARCHIVE_URL)
    }
}

impl DumpNaming for WikimediaNaming {
    fn listing_url(&self, project: &str, content_type: DumpContentType) -> String {
        format!("{}/", self.type_directory(project, content_type))
    }

    fn dump_url(&self, project: &str, content_type: DumpContentType, date: NaiveDate) -> String {
        format!(
            "{}/{}/{}",
            self.type_directory(project, content_type),
            format_dump_date(date),
            self.file_name(project, content_type, date)
        )
    }

    fn remote_compression(&self, content_type: DumpContentType) -> Compression {
        match content_type {
            DumpContentType::Json => Compression::Gzip,
            DumpContentType::Current | DumpContentType::Full => Compression::Bzip2,
        }
    }

    fn file_name(&self, project: &str, content_type: DumpContentType, date: NaiveDate) -> String {
        let stamp = format_dump_date(date);
        let suffix = self.remote_compression(content_type).suffix();
        match content_type {
            DumpContentType::Json => {
                // JSON dumps drop the trailing "wiki": wikidatawiki -> wikidata
                let short = project.strip_suffix("wiki").unwrap_or(project);
                format!("{short}-{stamp}-all.json{suffix}")
            }
            DumpContentType::Current => {
                format!("{project}-{stamp}-pages-meta-current.xml{suffix}")
            }
            DumpContentType::Full => {
                format!("{project}-{stamp}-pages-meta-history.xml{suffix}")
            }
        }
    }

    fn parse_dates(&self, listing: &str) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = LISTING_DATE_PATTERN
            .captures_iter(listing)
            .filter_map(|caps| parse_dump_date(&caps[1]).ok())
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));
        dates.dedup();
        dates
    }

    fn parse_file_name(&self, file_name: &str) -> Option<ParsedFileName> {
        let compression = Compression::from_locator(file_name);
        let lower = file_name.to_lowercase();
        let stem = &lower[..lower.len() - compression.suffix().len()];

        let content_type = if stem.contains("pages-meta-history") {
            DumpContentType::Full
        } else if stem.contains("pages-meta-current") || stem.contains("pages-articles") {
            DumpContentType::Current
        } else if stem.ends_with(".json") {
            DumpContentType::Json
        } else if stem.ends_with(".xml") {
            DumpContentType::Current
        } else {
            return None;
        };

        let date = FILE_DATE_PATTERN
            .captures(stem)
            .and_then(|caps| parse_dump_date(&caps[1]).ok())?;

        Some(ParsedFileName {
            content_type,
            date,
            compression,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_listing_url() {
        let naming = WikimediaNaming::new("https://dumps.example.org/");
        assert_eq!(
            naming.listing_url("wikidatawiki", DumpContentType::Json),
            "https://dumps.example.org/other/wikibase/wikidatawiki/"
        );
        assert_eq!(
            naming.listing_url("wikidatawiki", DumpContentType::Full),
            "https://dumps.example.org/wikidatawiki/"
        );
    }

    #[test]
    fn test_dump_url() {
        let naming = WikimediaNaming::new("https://dumps.example.org");
        assert_eq!(
            naming.dump_url("wikidatawiki", DumpContentType::Json, date(2015, 7, 13)),
            "https://dumps.example.org/other/wikibase/wikidatawiki/20150713/wikidata-20150713-all.json.gz"
        );
        assert_eq!(
            naming.dump_url("wikidatawiki", DumpContentType::Current, date(2015, 7, 13)),
            "https://dumps.example.org/wikidatawiki/20150713/wikidatawiki-20150713-pages-meta-current.xml.bz2"
        );
    }

    #[test]
    fn test_parse_dates_sorted_and_deduplicated() {
        let listing = r#"<html><body><pre>
<a href="../">../</a>
<a href="20210101/">20210101/</a>   01-Jan-2021 00:00    -
<a href="20210301/">20210301/</a>   01-Mar-2021 00:00    -
<a href="20210201/">20210201/</a>   01-Feb-2021 00:00    -
<a href="20210201/">20210201/</a>
<a href="latest/">latest/</a>
<a href="20219999/">20219999/</a>
</pre></body></html>"#;

        let naming = WikimediaNaming::default();
        assert_eq!(
            naming.parse_dates(listing),
            vec![date(2021, 3, 1), date(2021, 2, 1), date(2021, 1, 1)]
        );
    }

    #[test]
    fn test_parse_dates_empty_listing() {
        let naming = WikimediaNaming::default();
        assert!(naming.parse_dates("<html>nothing here</html>").is_empty());
    }

    #[test]
    fn test_parse_file_name_variants() {
        let naming = WikimediaNaming::default();

        assert_eq!(
            naming.parse_file_name("20150713.json.gz"),
            Some(ParsedFileName {
                content_type: DumpContentType::Json,
                date: date(2015, 7, 13),
                compression: Compression::Gzip,
            })
        );
        assert_eq!(
            naming.parse_file_name("wikidatawiki-20210201-pages-meta-history.xml.bz2"),
            Some(ParsedFileName {
                content_type: DumpContentType::Full,
                date: date(2021, 2, 1),
                compression: Compression::Bzip2,
            })
        );
        assert_eq!(
            naming.parse_file_name("wikidatawiki-20210201-pages-meta-current.xml"),
            Some(ParsedFileName {
                content_type: DumpContentType::Current,
                date: date(2021, 2, 1),
                compression: Compression::None,
            })
        );
    }

    #[test]
    fn test_parse_file_name_rejects_unrelated_files() {
        let naming = WikimediaNaming::default();
        assert_eq!(naming.parse_file_name("README.md"), None);
        assert_eq!(naming.parse_file_name("dump.json.gz"), None); // no date
        assert_eq!(naming.parse_file_name("20150713.csv"), None); // no content marker
        assert_eq!(naming.parse_file_name("201507130.json"), None); // nine digits
    }

    #[test]
    fn test_file_name_round_trips_through_parser() {
        let naming = WikimediaNaming::default();
        for content_type in DumpContentType::ALL {
            let name = naming.file_name("wikidatawiki", content_type, date(2020, 12, 31));
            let parsed = naming.parse_file_name(&name).unwrap();
            assert_eq!(parsed.content_type, content_type);
            assert_eq!(parsed.date, date(2020, 12, 31));
        }
    }
}
