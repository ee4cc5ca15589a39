//! Dump discovery: finding candidate dumps and selecting the one to process.
//!
//! Candidates come from a remote listing (one directory per publication date)
//! and from a local directory. Discovery only confirms that dumps exist; it
//! never opens their content.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use crate::config::{ProcessingConfig, MAX_RETRIES, RETRY_BASE_DELAY_MS};
use crate::dump::{DumpContentType, DumpDescriptor, DumpLocator, DumpNaming, WikimediaNaming};
use crate::error::{DumpError, Result};
use crate::fetch::ResourceFetcher;

/// Upper bound for a single backoff delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Retry policy for small reads such as listing pages.
///
/// Only transient errors (`Unavailable`, `ReadFailure`) are retried: a missing
/// resource or a wrong accessor will not go away by asking again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Try exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `operation` until it succeeds, fails permanently or attempts run out.
    ///
    /// Uses exponential backoff: base, 2 × base, 4 × base, ... capped at
    /// [`MAX_RETRY_DELAY`].
    pub fn run<T>(&self, what: &str, mut operation: impl FnMut() -> Result<T>) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after delay");
                thread::sleep(delay);
            }
            attempt += 1;

            match operation() {
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        error = %e,
                        what,
                        attempt,
                        max_attempts = attempts,
                        "Transient failure, will retry"
                    );
                }
                result => return result,
            }
        }
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        }
    }
}

/// Finds and selects dumps of one project.
#[derive(Clone)]
pub struct DumpManager {
    project_name: String,
    naming: Arc<dyn DumpNaming>,
    local_directory: Option<PathBuf>,
    retry: RetryPolicy,
}

impl DumpManager {
    /// Manager for `project_name` using the public archive layout.
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            naming: Arc::new(WikimediaNaming::default()),
            local_directory: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Manager for the project, archive and local directory of `config`.
    #[must_use]
    pub fn from_config(config: &ProcessingConfig) -> Self {
        let manager = Self::new(config.project_name.as_str())
            .with_naming(WikimediaNaming::new(config.archive_url.as_str()));
        match &config.local_directory {
            Some(directory) => manager.with_local_directory(directory),
            None => manager,
        }
    }

    pub fn with_naming(mut self, naming: impl DumpNaming + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn with_local_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.local_directory = Some(directory.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    #[must_use]
    pub fn naming(&self) -> &dyn DumpNaming {
        self.naming.as_ref()
    }

    #[must_use]
    pub fn local_directory(&self) -> Option<&Path> {
        self.local_directory.as_deref()
    }

    /// Local dumps of a content type, most recent first.
    ///
    /// Without a local directory, or when it does not exist, there are none.
    pub fn local_dumps(&self, content_type: DumpContentType) -> Result<Vec<DumpDescriptor>> {
        let Some(directory) = self.local_directory.as_deref() else {
            return Ok(Vec::new());
        };
        if !directory.is_dir() {
            tracing::warn!(directory = %directory.display(), "Local dump directory does not exist");
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        Ok(self.local_dumps_from_files(&files, content_type))
    }

    /// Dumps of a content type among explicitly given files, most recent first.
    ///
    /// Files the naming convention does not recognize are ignored.
    #[must_use]
    pub fn local_dumps_from_files(
        &self,
        files: &[PathBuf],
        content_type: DumpContentType,
    ) -> Vec<DumpDescriptor> {
        let mut dumps: Vec<DumpDescriptor> = files
            .iter()
            .filter_map(|path| {
                DumpDescriptor::from_local_file(self.project_name.as_str(), path, self.naming())
                    .ok()
            })
            .filter(|dump| dump.content_type() == content_type)
            .collect();
        dumps.sort_by(|a, b| b.date().cmp(&a.date()));
        tracing::debug!(
            count = dumps.len(),
            content_type = %content_type,
            "Found local dumps"
        );
        dumps
    }

    /// Publication dates listed by the archive, most recent first.
    ///
    /// A missing listing yields no dates. An unreachable archive is an error.
    pub fn online_dates(
        &self,
        fetcher: &dyn ResourceFetcher,
        content_type: DumpContentType,
    ) -> Result<Vec<NaiveDate>> {
        let url = self.naming.listing_url(&self.project_name, content_type);
        let listing = self.retry.run(&url, || {
            let mut listing = String::new();
            fetcher
                .open_text(&url)?
                .read_to_string(&mut listing)
                .map_err(|source| DumpError::ReadFailure {
                    locator: url.clone(),
                    source,
                })?;
            Ok(listing)
        });

        match listing {
            Ok(listing) => {
                let dates = self.naming.parse_dates(&listing);
                tracing::debug!(url = %url, count = dates.len(), "Read dump listing");
                Ok(dates)
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(url = %url, error = %e, "Dump listing not available");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Check whether the dump of a date exists on the archive.
    ///
    /// Returns `None` when the probe reports the dump as missing. A transient
    /// failure is retried and then returned as an error, never as "missing".
    pub fn probe_online_dump(
        &self,
        fetcher: &dyn ResourceFetcher,
        content_type: DumpContentType,
        date: NaiveDate,
    ) -> Result<Option<DumpDescriptor>> {
        let url = self.naming.dump_url(&self.project_name, content_type, date);
        match self.retry.run(&url, || fetcher.probe(&url)) {
            Ok(()) => Ok(Some(DumpDescriptor::remote(
                self.project_name.as_str(),
                content_type,
                date,
                self.naming.remote_compression(content_type),
                url,
            ))),
            Err(e) if e.is_not_found() => {
                tracing::debug!(url = %url, "No dump at this date");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// All online dumps of a content type that exist, most recent first.
    pub fn online_dumps(
        &self,
        fetcher: &dyn ResourceFetcher,
        content_type: DumpContentType,
    ) -> Result<Vec<DumpDescriptor>> {
        let mut dumps = Vec::new();
        for date in self.online_dates(fetcher, content_type)? {
            if let Some(dump) = self.probe_online_dump(fetcher, content_type, date)? {
                dumps.push(dump);
            }
        }
        Ok(dumps)
    }

    /// Select the most recent usable dump of a content type.
    ///
    /// With `fetcher` set to `None` (offline), only local dumps are considered
    /// and nothing touches the network. Online, local and remote candidates
    /// compete on date; for the same dump the local copy wins and remote dates
    /// older than the best local dump are never probed.
    ///
    /// # Errors
    /// `NoDumpAvailable` when no candidate exists.
    pub fn find_most_recent(
        &self,
        fetcher: Option<&dyn ResourceFetcher>,
        content_type: DumpContentType,
    ) -> Result<DumpDescriptor> {
        let best_local = self.local_dumps(content_type)?.into_iter().next();

        if let Some(fetcher) = fetcher {
            for date in self.online_dates(fetcher, content_type)? {
                if best_local.as_ref().is_some_and(|local| local.date() >= date) {
                    break;
                }
                if let Some(dump) = self.probe_online_dump(fetcher, content_type, date)? {
                    tracing::info!(dump = %dump, "Selected online dump");
                    return Ok(dump);
                }
            }
        }

        match best_local {
            Some(dump) => {
                tracing::info!(dump = %dump, "Selected local dump");
                Ok(dump)
            }
            None => Err(DumpError::NoDumpAvailable {
                content_type,
                project: self.project_name.clone(),
            }),
        }
    }

    /// Copy a remote dump into `target_dir` under its canonical file name.
    ///
    /// Returns a descriptor for the local copy. Local descriptors are returned
    /// unchanged. The file only appears under its final name once complete.
    pub fn download(
        &self,
        fetcher: &dyn ResourceFetcher,
        dump: &DumpDescriptor,
        target_dir: &Path,
    ) -> Result<DumpDescriptor> {
        let DumpLocator::Remote(url) = dump.locator() else {
            return Ok(dump.clone());
        };

        let file_name = self
            .naming
            .file_name(dump.project_name(), dump.content_type(), dump.date());
        let target = target_dir.join(&file_name);
        let partial = target_dir.join(format!("{file_name}.part"));

        tracing::info!(url = %url, target = %target.display(), "Downloading dump");
        let mut reader = fetcher.open_raw(url)?;
        let mut file = File::create(&partial)?;
        let copied = copy_stream(&mut reader, &mut file, url).and_then(|bytes| {
            file.sync_all()?;
            Ok(bytes)
        });
        let bytes = match copied {
            Ok(bytes) => bytes,
            Err(e) => {
                drop(file);
                if let Err(remove_error) = fs::remove_file(&partial) {
                    tracing::warn!(error = %remove_error, "Could not remove partial download");
                }
                return Err(e);
            }
        };
        fs::rename(&partial, &target)?;
        tracing::info!(bytes, target = %target.display(), "Download complete");

        Ok(DumpDescriptor::local(
            dump.project_name(),
            dump.content_type(),
            dump.date(),
            dump.compression(),
            target,
        ))
    }
}

/// Copy all bytes, telling read failures apart from write failures.
fn copy_stream(reader: &mut dyn Read, writer: &mut File, locator: &str) -> Result<u64> {
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(DumpError::ReadFailure {
                    locator: locator.to_string(),
                    source,
                })
            }
        };
        io::Write::write_all(writer, &buf[..read])?;
        total += read as u64;
    }
}
