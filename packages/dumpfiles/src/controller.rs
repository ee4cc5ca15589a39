//! Processing controller: consumer registration and record dispatch.
//!
//! The controller selects a dump (or takes an explicit one), opens it, parses
//! it lazily and hands every record to each registered consumer whose filter
//! accepts it, in registration order. Consumer failures are reported and never
//! abort the run.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};

use crate::config::{validate_project_name, ProcessingConfig};
use crate::discovery::{DumpManager, RetryPolicy};
use crate::dump::{Compression, DumpContentType, DumpDescriptor, DumpLocator, DumpNaming};
use crate::error::{ConsumerResult, DumpError, Result};
use crate::fetch::{open_decompressed, LocalFetcher, ResourceFetcher, TextStream};
use crate::filter::RecordFilter;
use crate::parse::parse_records;
use crate::record::Record;

/// Receives the records of a dump.
pub trait RecordConsumer {
    /// Handle one record. `is_current` tells whether it is the current
    /// revision of its page.
    fn process_record(&mut self, record: &Record, is_current: bool) -> ConsumerResult;

    /// Called once after the last record of a dump.
    fn finish(&mut self) -> ConsumerResult {
        Ok(())
    }
}

/// Lets the caller keep a handle on a consumer while the controller uses it.
impl<C: RecordConsumer + ?Sized> RecordConsumer for Rc<RefCell<C>> {
    fn process_record(&mut self, record: &Record, is_current: bool) -> ConsumerResult {
        self.borrow_mut().process_record(record, is_current)
    }

    fn finish(&mut self) -> ConsumerResult {
        self.borrow_mut().finish()
    }
}

impl<C: RecordConsumer + ?Sized> RecordConsumer for Box<C> {
    fn process_record(&mut self, record: &Record, is_current: bool) -> ConsumerResult {
        (**self).process_record(record, is_current)
    }

    fn finish(&mut self) -> ConsumerResult {
        (**self).finish()
    }
}

/// Consumer backed by a closure. See [`consumer_fn`].
pub struct FnConsumer<F>(F);

impl<F> RecordConsumer for FnConsumer<F>
where
    F: FnMut(&Record, bool) -> ConsumerResult,
{
    fn process_record(&mut self, record: &Record, is_current: bool) -> ConsumerResult {
        (self.0)(record, is_current)
    }
}

/// Use a closure as a record consumer.
///
/// # Examples
/// ```
/// use kbdump_dumpfiles::{consumer_fn, DumpProcessingController, MockFetcher};
///
/// let mut controller = DumpProcessingController::new("wikidatawiki", MockFetcher::new());
/// controller.register_consumer(
///     consumer_fn(|record, _| {
///         println!("{}", record.site());
///         Ok(())
///     }),
///     None,
///     false,
/// );
/// assert_eq!(controller.consumer_count(), 1);
/// ```
pub fn consumer_fn<F>(f: F) -> FnConsumer<F>
where
    F: FnMut(&Record, bool) -> ConsumerResult,
{
    FnConsumer(f)
}

/// What happens to a record's dispatch after one of its consumers fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Consumers registered after the failing one still receive the record.
    #[default]
    ContinueWithRemaining,
    /// Consumers registered after the failing one skip this record.
    SkipRemainingConsumers,
}

/// A consumer error, reported out of band.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerFailure {
    /// Registration index of the consumer.
    pub consumer_index: usize,
    /// Index of the record in the dump, `None` for a failing `finish()`.
    pub record_index: Option<u64>,
    pub message: String,
}

impl fmt::Display for ConsumerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.record_index {
            Some(record) => write!(
                f,
                "consumer {} failed on record {}: {}",
                self.consumer_index, record, self.message
            ),
            None => write!(
                f,
                "consumer {} failed to finish: {}",
                self.consumer_index, self.message
            ),
        }
    }
}

/// Outcome of processing one dump.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingReport {
    pub dump: DumpDescriptor,
    /// Records parsed and dispatched.
    pub records_processed: u64,
    pub consumer_failures: Vec<ConsumerFailure>,
    pub corrupt_records_skipped: u64,
}

impl ProcessingReport {
    fn new(dump: DumpDescriptor) -> Self {
        Self {
            dump,
            records_processed: 0,
            consumer_failures: Vec::new(),
            corrupt_records_skipped: 0,
        }
    }
}

type FailureHandler = Box<dyn FnMut(&ConsumerFailure)>;

/// A consumer with the filter deciding which records it receives.
pub struct RegisteredConsumer {
    consumer: Box<dyn RecordConsumer>,
    filter: RecordFilter,
}

impl RegisteredConsumer {
    #[must_use]
    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }
}

/// Drives discovery, parsing and dispatch for one project.
pub struct DumpProcessingController {
    manager: DumpManager,
    fetcher: Box<dyn ResourceFetcher>,
    consumers: Vec<RegisteredConsumer>,
    offline: bool,
    skip_corrupt_records: bool,
    failure_policy: FailurePolicy,
    failure_handler: Option<FailureHandler>,
}

impl DumpProcessingController {
    /// Controller for `project_name` reading remote resources through `fetcher`.
    pub fn new(project_name: impl Into<String>, fetcher: impl ResourceFetcher + 'static) -> Self {
        Self {
            manager: DumpManager::new(project_name),
            fetcher: Box::new(fetcher),
            consumers: Vec::new(),
            offline: false,
            skip_corrupt_records: false,
            failure_policy: FailurePolicy::default(),
            failure_handler: None,
        }
    }

    /// Controller configured from processing settings.
    ///
    /// # Errors
    /// Returns `DumpError::InvalidProjectName` for a malformed project name.
    pub fn from_config(
        config: &ProcessingConfig,
        fetcher: impl ResourceFetcher + 'static,
    ) -> Result<Self> {
        validate_project_name(&config.project_name)?;

        let mut controller = Self::new(config.project_name.as_str(), fetcher);
        controller.manager = DumpManager::from_config(config);
        controller.set_offline_mode(config.offline);
        controller.set_skip_corrupt_records(config.skip_corrupt_records);
        Ok(controller)
    }

    /// Register a consumer for records of `site` (any site when `None`),
    /// optionally only current revisions.
    pub fn register_consumer(
        &mut self,
        consumer: impl RecordConsumer + 'static,
        site: Option<&str>,
        current_only: bool,
    ) {
        self.register_consumer_with_filter(consumer, RecordFilter::from_options(site, current_only));
    }

    pub fn register_consumer_with_filter(
        &mut self,
        consumer: impl RecordConsumer + 'static,
        filter: RecordFilter,
    ) {
        tracing::debug!(index = self.consumers.len(), filter = ?filter, "Registered consumer");
        self.consumers.push(RegisteredConsumer {
            consumer: Box::new(consumer),
            filter,
        });
    }

    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    #[must_use]
    pub fn consumers(&self) -> &[RegisteredConsumer] {
        &self.consumers
    }

    /// Forbid (or allow again) all network access.
    pub fn set_offline_mode(&mut self, offline: bool) {
        self.offline = offline;
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Directory searched for local dump files.
    pub fn set_local_directory(&mut self, directory: impl Into<PathBuf>) {
        self.manager = self.manager.clone().with_local_directory(directory);
    }

    pub fn set_naming(&mut self, naming: impl DumpNaming + 'static) {
        self.manager = self.manager.clone().with_naming(naming);
    }

    pub fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.manager = self.manager.clone().with_retry(retry);
    }

    /// Skip corrupt records instead of failing the run.
    pub fn set_skip_corrupt_records(&mut self, skip: bool) {
        self.skip_corrupt_records = skip;
    }

    pub fn set_failure_policy(&mut self, policy: FailurePolicy) {
        self.failure_policy = policy;
    }

    /// Receive consumer failures as they happen.
    ///
    /// Without a handler, failures are logged as warnings. They are always
    /// collected in the [`ProcessingReport`].
    pub fn set_failure_handler(&mut self, handler: impl FnMut(&ConsumerFailure) + 'static) {
        self.failure_handler = Some(Box::new(handler));
    }

    #[must_use]
    pub fn dump_manager(&self) -> &DumpManager {
        &self.manager
    }

    /// Discover the most recent dump of a content type and process it.
    ///
    /// # Errors
    /// `NoDumpAvailable` when discovery finds nothing, plus any error of
    /// [`DumpProcessingController::process_dump`].
    pub fn process_most_recent_dump(
        &mut self,
        content_type: DumpContentType,
    ) -> Result<ProcessingReport> {
        let dump = self.find_most_recent_dump(content_type)?;
        self.process_dump(&dump)
    }

    /// Most recent dump of a content type, honoring offline mode.
    pub fn find_most_recent_dump(&self, content_type: DumpContentType) -> Result<DumpDescriptor> {
        let fetcher = (!self.offline).then_some(self.fetcher.as_ref());
        self.manager.find_most_recent(fetcher, content_type)
    }

    /// Process a local file, reading its date from the file name when the
    /// naming convention recognizes it and from its modification time otherwise.
    pub fn process_local_file(
        &mut self,
        path: &Path,
        content_type: DumpContentType,
    ) -> Result<ProcessingReport> {
        let dump = self.describe_local_file(path, content_type)?;
        self.process_dump(&dump)
    }

    fn describe_local_file(
        &self,
        path: &Path,
        content_type: DumpContentType,
    ) -> Result<DumpDescriptor> {
        let locator = path.display().to_string();
        let metadata =
            fs::metadata(path).map_err(|e| DumpError::not_found(locator.as_str(), e.to_string()))?;

        let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        let date = match self.manager.naming().parse_file_name(file_name) {
            Some(parsed) => parsed.date,
            None => DateTime::<Utc>::from(metadata.modified()?).date_naive(),
        };

        Ok(DumpDescriptor::local(
            self.manager.project_name(),
            content_type,
            date,
            Compression::from_locator(&locator),
            path,
        ))
    }

    /// Process an explicit dump, bypassing discovery.
    ///
    /// # Errors
    /// - `OfflineMode` for a remote dump while offline
    /// - `NotFound` / `WrongAccessor` when the dump cannot be opened
    /// - `Unavailable` when the archive cannot be reached
    /// - `ReadFailure` when reading fails mid-stream
    /// - `CorruptDump` unless corrupt records are skipped
    pub fn process_dump(&mut self, dump: &DumpDescriptor) -> Result<ProcessingReport> {
        let locator = dump.locator().to_string();
        let stream = self.open_dump(dump)?;
        let mut records =
            parse_records(stream, dump.content_type(), &locator, dump.project_name());
        let mut report = ProcessingReport::new(dump.clone());

        tracing::info!(dump = %dump, consumers = self.consumers.len(), "Processing dump");

        while let Some(item) = records.next() {
            let record = match item {
                Ok(record) => record,
                Err(e @ DumpError::CorruptDump { .. }) if self.skip_corrupt_records => {
                    tracing::warn!(error = %e, "Skipping corrupt record");
                    report.corrupt_records_skipped += 1;
                    continue;
                }
                Err(e) => {
                    records.close();
                    return Err(e);
                }
            };

            let record_index = records.position().saturating_sub(1);
            self.dispatch(&record, record_index, &mut report);
            report.records_processed += 1;
        }
        records.close();

        self.finish_consumers(&mut report);

        tracing::info!(
            records = report.records_processed,
            failures = report.consumer_failures.len(),
            skipped = report.corrupt_records_skipped,
            "Finished processing dump"
        );
        Ok(report)
    }

    /// Copy a remote dump into `target_dir`. Refused in offline mode.
    pub fn download_dump(&self, dump: &DumpDescriptor, target_dir: &Path) -> Result<DumpDescriptor> {
        if let (true, DumpLocator::Remote(url)) = (self.offline, dump.locator()) {
            return Err(DumpError::OfflineMode {
                locator: url.clone(),
            });
        }
        self.manager.download(self.fetcher.as_ref(), dump, target_dir)
    }

    fn open_dump(&self, dump: &DumpDescriptor) -> Result<TextStream> {
        match dump.locator() {
            DumpLocator::Local(path) => {
                let locator = path
                    .to_str()
                    .ok_or_else(|| DumpError::UnknownDumpFile(path.display().to_string()))?;
                open_decompressed(&LocalFetcher, locator, dump.compression())
            }
            DumpLocator::Remote(url) if self.offline => Err(DumpError::OfflineMode {
                locator: url.clone(),
            }),
            DumpLocator::Remote(url) => {
                open_decompressed(self.fetcher.as_ref(), url, dump.compression())
            }
        }
    }

    fn dispatch(
        &mut self,
        record: &Record,
        record_index: u64,
        report: &mut ProcessingReport,
    ) {
        let is_current = record.is_current();
        for (consumer_index, registered) in self.consumers.iter_mut().enumerate() {
            if !registered.filter.accepts(record, is_current) {
                continue;
            }
            if let Err(e) = registered.consumer.process_record(record, is_current) {
                let failure = ConsumerFailure {
                    consumer_index,
                    record_index: Some(record_index),
                    message: e.to_string(),
                };
                report_failure(&mut self.failure_handler, &failure);
                report.consumer_failures.push(failure);

                if self.failure_policy == FailurePolicy::SkipRemainingConsumers {
                    break;
                }
            }
        }
    }

    fn finish_consumers(&mut self, report: &mut ProcessingReport) {
        for (consumer_index, registered) in self.consumers.iter_mut().enumerate() {
            if let Err(e) = registered.consumer.finish() {
                let failure = ConsumerFailure {
                    consumer_index,
                    record_index: None,
                    message: e.to_string(),
                };
                report_failure(&mut self.failure_handler, &failure);
                report.consumer_failures.push(failure);
            }
        }
    }
}

fn report_failure(handler: &mut Option<FailureHandler>, failure: &ConsumerFailure) {
    match handler {
        Some(handler) => handler(failure),
        None => tracing::warn!(
            consumer = failure.consumer_index,
            record = ?failure.record_index,
            error = %failure.message,
            "Consumer failed"
        ),
    }
}
