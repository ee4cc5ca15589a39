//! kbdump dumpfiles - Discover, fetch and stream knowledge-base dumps.
//!
//! This crate finds the dumps a wiki project publishes (JSON entity dumps and
//! XML revision dumps), opens them from the archive or from local disk,
//! decompresses and parses them lazily, and dispatches every record to the
//! consumers registered for it.
//!
//! # Example
//!
//! ```
//! use kbdump_dumpfiles::config;
//! use kbdump_dumpfiles::DumpContentType;
//!
//! assert!(config::validate_project_name("wikidatawiki").is_ok());
//! assert_eq!("current".parse::<DumpContentType>(), Ok(DumpContentType::Current));
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Configuration constants, validation and processing settings
//! - [`error`]: Error types and Result alias
//! - [`dump`]: Dump descriptors, content types and the naming strategy
//! - [`fetch`]: Resource fetchers (HTTP, local files, in-memory mock)
//! - [`discovery`]: Finding and selecting dumps
//! - [`parse`]: Decompression and streaming record parsers
//! - [`record`]: Parsed records
//! - [`filter`]: Composable record filters
//! - [`controller`]: Consumer registration and dispatch
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod config;
pub mod controller;
pub mod discovery;
pub mod dump;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod parse;
pub mod record;

// Re-export commonly used items
pub use config::ProcessingConfig;
pub use controller::{
    consumer_fn, ConsumerFailure, DumpProcessingController, FailurePolicy, ProcessingReport,
    RecordConsumer,
};
pub use discovery::{DumpManager, RetryPolicy};
pub use dump::{Compression, DumpContentType, DumpDescriptor, DumpLocator, WikimediaNaming};
pub use error::{ConsumerError, ConsumerResult, DumpError, Result};
pub use fetch::{HttpFetcher, LocalFetcher, MockFetcher, ResourceFetcher};
pub use filter::RecordFilter;
pub use record::{EntityDocument, Record, Revision};
