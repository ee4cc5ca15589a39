//! Command-line interface for kbdump.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::{validate_project_name, ProcessingConfig};
use crate::controller::{DumpProcessingController, RecordConsumer};
use crate::discovery::DumpManager;
use crate::dump::{DumpContentType, DumpDescriptor};
use crate::error::{ConsumerResult, DumpError, Result};
use crate::fetch::HttpFetcher;
use crate::record::Record;

/// kbdump - Discover, download and process knowledge-base dumps.
#[derive(Parser)]
#[command(name = "kbdump")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project (wiki database name), e.g. wikidatawiki
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Never access the network; only use local dumps
    #[arg(long, global = true)]
    pub offline: bool,

    /// Directory containing local dump files
    #[arg(short = 'd', long, global = true)]
    pub dump_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process the most recent dump (or a given file) and count its records.
    Process {
        /// Dump content type: json, current or full
        #[arg(short = 't', long = "type", default_value = "json")]
        content_type: DumpContentType,

        /// Process this file instead of discovering a dump
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Only count records from this site
        #[arg(long)]
        site: Option<String>,

        /// Only count current revisions
        #[arg(long)]
        current_only: bool,

        /// Skip corrupt records instead of stopping
        #[arg(long)]
        skip_corrupt: bool,
    },

    /// List the dumps that are available for a content type.
    List {
        /// Dump content type: json, current or full
        #[arg(short = 't', long = "type", default_value = "json")]
        content_type: DumpContentType,
    },

    /// Download the most recent dump of a content type.
    Download {
        /// Dump content type: json, current or full
        #[arg(short = 't', long = "type", default_value = "json")]
        content_type: DumpContentType,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    match cli.command {
        Commands::Process {
            content_type,
            file,
            site,
            current_only,
            skip_corrupt,
        } => process_command(
            &config.with_skip_corrupt_records(skip_corrupt),
            content_type,
            file.as_deref(),
            site.as_deref(),
            current_only,
        ),
        Commands::List { content_type } => list_command(&config, content_type),
        Commands::Download {
            content_type,
            output,
        } => download_command(&config, content_type, output.as_deref()),
    }
}

/// Environment settings, overridden by command-line options.
fn build_config(cli: &Cli) -> Result<ProcessingConfig> {
    let mut config = ProcessingConfig::from_env()?;
    if let Some(project) = &cli.project {
        validate_project_name(project)?;
        config.project_name = project.clone();
    }
    if cli.offline {
        config.offline = true;
    }
    if let Some(dump_dir) = &cli.dump_dir {
        config.local_directory = Some(dump_dir.clone());
    }
    Ok(config)
}

fn create_controller(config: &ProcessingConfig) -> Result<DumpProcessingController> {
    DumpProcessingController::from_config(config, HttpFetcher::new()?)
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Counts records by kind, reporting progress on a spinner.
#[derive(Debug)]
pub struct RecordCounter {
    pub entities: u64,
    pub revisions: u64,
    progress: Option<ProgressBar>,
}

impl RecordCounter {
    pub fn new(progress: Option<ProgressBar>) -> Self {
        Self {
            entities: 0,
            revisions: 0,
            progress,
        }
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.entities + self.revisions
    }
}

impl RecordConsumer for RecordCounter {
    fn process_record(&mut self, record: &Record, _is_current: bool) -> ConsumerResult {
        match record {
            Record::Entity(_) => self.entities += 1,
            Record::Revision(_) => self.revisions += 1,
        }
        if let Some(pb) = &self.progress {
            if self.total() % 1000 == 0 {
                pb.set_message(format!("Processed {} records...", self.total()));
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> ConsumerResult {
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        Ok(())
    }
}

/// Execute the process command.
fn process_command(
    config: &ProcessingConfig,
    content_type: DumpContentType,
    file: Option<&Path>,
    site: Option<&str>,
    current_only: bool,
) -> Result<()> {
    let mut controller = create_controller(config)?;

    let pb = spinner("Opening dump...");
    let counter = Rc::new(RefCell::new(RecordCounter::new(Some(pb.clone()))));
    controller.register_consumer(counter.clone(), site, current_only);

    let result = match file {
        Some(path) => controller.process_local_file(path, content_type),
        None => controller.process_most_recent_dump(content_type),
    };
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    let counter = counter.borrow();
    println!(
        "{} {}",
        style("Processed").bold(),
        style(&report.dump).cyan()
    );
    println!("  Records: {}", report.records_processed);
    println!("  Counted: {}", style(counter.total()).green());
    println!("  Entities: {}", counter.entities);
    println!("  Revisions: {}", counter.revisions);
    if report.corrupt_records_skipped > 0 {
        println!(
            "  Corrupt records skipped: {}",
            style(report.corrupt_records_skipped).yellow().bold()
        );
    }
    if !report.consumer_failures.is_empty() {
        println!(
            "  Consumer failures: {}",
            style(report.consumer_failures.len()).yellow().bold()
        );
    }

    Ok(())
}

/// Execute the list command.
fn list_command(config: &ProcessingConfig, content_type: DumpContentType) -> Result<()> {
    validate_project_name(&config.project_name)?;
    let manager = DumpManager::from_config(config);

    let mut dumps = manager.local_dumps(content_type)?;
    if !config.offline {
        let fetcher = HttpFetcher::new()?;
        let pb = spinner("Reading dump listing...");
        let online = manager.online_dumps(&fetcher, content_type);
        pb.finish_and_clear();
        dumps.extend(online?);
    }
    dumps.sort_by(|a, b| b.date().cmp(&a.date()));

    if dumps.is_empty() {
        println!(
            "No {} dumps found for {}",
            content_type,
            style(manager.project_name()).cyan()
        );
        return Ok(());
    }

    println!(
        "{} {} dumps for {}",
        style("Available").bold(),
        content_type,
        style(manager.project_name()).cyan()
    );
    for dump in &dumps {
        print_dump_line(dump);
    }
    Ok(())
}

fn print_dump_line(dump: &DumpDescriptor) {
    let origin = if dump.locator().is_local() {
        style("local").green()
    } else {
        style("remote").blue()
    };
    println!("  {}  {:<6}  {}", dump.date_stamp(), origin, dump.locator());
}

/// Execute the download command.
fn download_command(
    config: &ProcessingConfig,
    content_type: DumpContentType,
    output: Option<&Path>,
) -> Result<()> {
    let output_dir = output.unwrap_or_else(|| Path::new("."));
    if !output_dir.is_dir() {
        return Err(DumpError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Output directory does not exist: {}", output_dir.display()),
        )));
    }

    let controller = create_controller(config)?;

    let pb = spinner("Looking for the most recent dump...");
    let downloaded = controller
        .find_most_recent_dump(content_type)
        .and_then(|dump| {
            pb.set_message(format!("Downloading {}...", dump.locator()));
            controller.download_dump(&dump, output_dir)
        });
    pb.finish_and_clear();
    let downloaded = downloaded?;

    println!(
        "{} {}",
        style("Saved to:").green().bold(),
        downloaded.locator()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_process_defaults() {
        let cli = Cli::parse_from(["kbdump", "process"]);

        let Commands::Process {
            content_type,
            file,
            current_only,
            ..
        } = cli.command
        else {
            panic!("expected process command");
        };
        assert_eq!(content_type, DumpContentType::Json);
        assert!(file.is_none());
        assert!(!current_only);
        assert!(!cli.offline);
    }

    #[test]
    fn test_cli_parse_process_with_options() {
        let cli = Cli::parse_from([
            "kbdump",
            "process",
            "--type",
            "full",
            "--offline",
            "--dump-dir",
            "/data/dumps",
            "--site",
            "enwiki",
        ]);

        let Commands::Process {
            content_type, site, ..
        } = cli.command
        else {
            panic!("expected process command");
        };
        assert_eq!(content_type, DumpContentType::Full);
        assert_eq!(site.as_deref(), Some("enwiki"));
        assert!(cli.offline);
        assert_eq!(cli.dump_dir, Some(PathBuf::from("/data/dumps")));
    }

    #[test]
    fn test_cli_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["kbdump", "list", "--type", "yaml"]).is_err());
    }

    #[test]
    fn test_record_counter() {
        let mut counter = RecordCounter::new(None);
        let revision = Record::Revision(crate::record::Revision::default());
        counter.process_record(&revision, true).unwrap();
        counter.process_record(&revision, false).unwrap();
        assert_eq!(counter.revisions, 2);
        assert_eq!(counter.total(), 2);
    }
}
