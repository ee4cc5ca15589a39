//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;

pub const JSON_FIXTURE: &str = "wikidata-20210301-all.json";
pub const XML_FIXTURE: &str = "enwiki-20210301-pages-meta-history.xml";
pub const LISTING_FIXTURE: &str = "listing.html";

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Load fixture file content.
pub fn load_fixture(name: &str) -> String {
    let path = fixture_path(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", path.display(), e))
}

pub fn gzip(content: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

pub fn bzip2(content: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(content).unwrap();
    encoder.finish().unwrap()
}

/// JSON dump with entities Q1..=Qcount.
pub fn json_dump(count: usize) -> String {
    let lines: Vec<String> = (1..=count)
        .map(|i| format!("{{\"type\":\"item\",\"id\":\"Q{i}\"}}"))
        .collect();
    format!("[\n{}\n]\n", lines.join(",\n"))
}
