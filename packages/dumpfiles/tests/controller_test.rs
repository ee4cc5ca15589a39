//! End-to-end tests for discovery, parsing and dispatch through the controller.

mod common;

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use std::sync::Arc;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use kbdump_dumpfiles::dump::DumpNaming;
use kbdump_dumpfiles::{
    consumer_fn, Compression, ConsumerResult, DumpContentType, DumpDescriptor, DumpError,
    DumpProcessingController, MockFetcher, Record, RecordConsumer, RecordFilter, WikimediaNaming,
};

use common::{bzip2, fixture_path, gzip, json_dump, load_fixture, JSON_FIXTURE, XML_FIXTURE};

type Log = Rc<RefCell<Vec<(usize, String)>>>;

/// Records `(consumer, record id)` pairs into a shared log.
struct Recorder {
    index: usize,
    log: Log,
    fail_on: Option<String>,
}

impl RecordConsumer for Recorder {
    fn process_record(&mut self, record: &Record, _is_current: bool) -> ConsumerResult {
        let id = record_id(record);
        self.log.borrow_mut().push((self.index, id.clone()));
        if self.fail_on.as_deref() == Some(id.as_str()) {
            return Err(format!("consumer {} rejects {id}", self.index).into());
        }
        Ok(())
    }
}

fn record_id(record: &Record) -> String {
    match record {
        Record::Entity(entity) => entity.id.clone(),
        Record::Revision(revision) => revision.revision_id.to_string(),
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn remote_json_dump(url: &str) -> DumpDescriptor {
    DumpDescriptor::remote(
        "wikidatawiki",
        DumpContentType::Json,
        date(2021, 3, 1),
        Compression::Gzip,
        url,
    )
}

fn ids_of(log: &Log, consumer: usize) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|(index, _)| *index == consumer)
        .map(|(_, id)| id.clone())
        .collect()
}

#[test]
fn test_every_consumer_receives_every_record_in_order() {
    let url = "https://dumps.test/wikidata-20210301-all.json.gz";
    let fetcher = MockFetcher::new().with_resource(url, json_dump(4), Compression::Gzip);
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher);
    let log: Log = Rc::default();
    for index in 0..3 {
        controller.register_consumer(
            Recorder {
                index,
                log: log.clone(),
                fail_on: None,
            },
            None,
            false,
        );
    }

    let report = controller.process_dump(&remote_json_dump(url)).unwrap();

    assert_eq!(report.records_processed, 4);
    let expected: Vec<(usize, String)> = (1..=4)
        .flat_map(|record| (0..3).map(move |consumer| (consumer, format!("Q{record}"))))
        .collect();
    assert_eq!(*log.borrow(), expected);
}

#[test]
fn test_processing_is_deterministic() {
    let url = "https://dumps.test/wikidata-20210301-all.json.gz";
    let fetcher = MockFetcher::new().with_resource(url, json_dump(5), Compression::Gzip);
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher);
    let log: Log = Rc::default();
    controller.register_consumer(
        Recorder {
            index: 0,
            log: log.clone(),
            fail_on: None,
        },
        None,
        false,
    );

    controller.process_dump(&remote_json_dump(url)).unwrap();
    let first_run = log.borrow().clone();
    log.borrow_mut().clear();
    controller.process_dump(&remote_json_dump(url)).unwrap();

    assert_eq!(*log.borrow(), first_run);
}

#[test]
fn test_failing_consumer_does_not_affect_others() {
    let url = "https://dumps.test/wikidata-20210301-all.json.gz";
    let fetcher = MockFetcher::new().with_resource(url, json_dump(8), Compression::Gzip);
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher);
    let log: Log = Rc::default();
    for index in 0..3 {
        controller.register_consumer(
            Recorder {
                index,
                log: log.clone(),
                fail_on: (index == 1).then(|| "Q5".to_string()),
            },
            None,
            false,
        );
    }

    let report = controller.process_dump(&remote_json_dump(url)).unwrap();

    let all: Vec<String> = (1..=8).map(|i| format!("Q{i}")).collect();
    assert_eq!(ids_of(&log, 0), all);
    assert_eq!(ids_of(&log, 1), all);
    assert_eq!(ids_of(&log, 2), all);

    assert_eq!(report.consumer_failures.len(), 1);
    let failure = &report.consumer_failures[0];
    assert_eq!(failure.consumer_index, 1);
    assert_eq!(failure.record_index, Some(4));
    assert_eq!(failure.message, "consumer 1 rejects Q5");
}

#[test]
fn test_site_and_current_filters() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enwiki-20210301-pages-meta-history.xml.bz2");
    fs::write(&path, bzip2(load_fixture(XML_FIXTURE).as_bytes())).unwrap();

    let mut controller = DumpProcessingController::new("enwiki", MockFetcher::new());
    let log: Log = Rc::default();
    let recorder = |index| Recorder {
        index,
        log: log.clone(),
        fail_on: None,
    };
    controller.register_consumer(recorder(0), Some("enwiki"), false);
    controller.register_consumer(recorder(1), Some("dewiki"), false);
    controller.register_consumer(recorder(2), None, true);
    let main_namespace = RecordFilter::any().matching(|record, _| {
        record.as_revision().is_some_and(|revision| revision.namespace == 0)
    });
    controller.register_consumer_with_filter(recorder(3), main_namespace);

    let report = controller
        .process_local_file(&path, DumpContentType::Full)
        .unwrap();

    assert_eq!(report.records_processed, 3);
    assert_eq!(report.dump.date(), date(2021, 3, 1));
    assert_eq!(ids_of(&log, 0), vec!["100", "101", "200"]);
    assert!(ids_of(&log, 1).is_empty());
    // Only the latest revision of each page is current
    assert_eq!(ids_of(&log, 2), vec!["101", "200"]);
    assert_eq!(ids_of(&log, 3), vec!["100", "101"]);
}

#[test]
fn test_current_dump_records_are_current() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("enwiki-20210301-pages-meta-current.xml");
    fs::copy(fixture_path(XML_FIXTURE), &path).unwrap();

    let mut controller = DumpProcessingController::new("enwiki", MockFetcher::new());
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    controller.register_consumer(
        consumer_fn(move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        }),
        None,
        true,
    );

    controller
        .process_local_file(&path, DumpContentType::Current)
        .unwrap();
    assert_eq!(*count.borrow(), 3);
}

#[test]
fn test_offline_processes_local_gzip_dump_without_fetcher() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("wikidata-20210301-all.json.gz"),
        gzip(load_fixture(JSON_FIXTURE).as_bytes()),
    )
    .unwrap();
    fs::write(dir.path().join("wikidata-20210101-all.json.gz"), gzip(b"[\n]\n")).unwrap();

    let fetcher = Arc::new(MockFetcher::new());
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher.clone());
    controller.set_offline_mode(true);
    controller.set_local_directory(dir.path());
    let labels = Rc::new(RefCell::new(Vec::new()));
    let sink = labels.clone();
    controller.register_consumer(
        consumer_fn(move |record, is_current| {
            assert!(is_current);
            let entity = record.as_entity().ok_or("not an entity")?;
            sink.borrow_mut()
                .push(entity.label("en").unwrap_or_default().to_string());
            Ok(())
        }),
        None,
        false,
    );

    let report = controller
        .process_most_recent_dump(DumpContentType::Json)
        .unwrap();

    assert_eq!(report.dump.date(), date(2021, 3, 1));
    assert!(report.dump.locator().is_local());
    assert_eq!(
        *labels.borrow(),
        vec!["universe", "Douglas Adams", "instance of"]
    );
    assert_eq!(fetcher.access_count(), 0);
}

#[test]
fn test_offline_without_local_dumps_is_no_dump_available() {
    let fetcher = Arc::new(MockFetcher::new());
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher.clone());
    controller.set_offline_mode(true);

    let err = controller
        .process_most_recent_dump(DumpContentType::Current)
        .unwrap_err();

    assert!(matches!(
        err,
        DumpError::NoDumpAvailable {
            content_type: DumpContentType::Current,
            ..
        }
    ));
    assert_eq!(fetcher.access_count(), 0);
}

#[test]
fn test_online_empty_discovery_is_no_dump_available() {
    let mut controller = DumpProcessingController::new("wikidatawiki", MockFetcher::new());
    let err = controller
        .process_most_recent_dump(DumpContentType::Json)
        .unwrap_err();
    assert!(matches!(err, DumpError::NoDumpAvailable { .. }));
}

#[test]
fn test_online_discovery_then_processing() {
    let naming = WikimediaNaming::default();
    let listing = naming.listing_url("wikidatawiki", DumpContentType::Json);
    let dump_url = naming.dump_url("wikidatawiki", DumpContentType::Json, date(2021, 2, 1));
    let fetcher = MockFetcher::new()
        .with_resource(listing, load_fixture(common::LISTING_FIXTURE), Compression::None)
        .with_resource(dump_url.as_str(), json_dump(2), Compression::Gzip);

    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher);
    let count = Rc::new(RefCell::new(0));
    let counter = count.clone();
    controller.register_consumer(
        consumer_fn(move |_, _| {
            *counter.borrow_mut() += 1;
            Ok(())
        }),
        None,
        false,
    );

    let report = controller
        .process_most_recent_dump(DumpContentType::Json)
        .unwrap();

    assert_eq!(report.dump.date(), date(2021, 2, 1));
    assert_eq!(report.dump.locator().to_string(), dump_url);
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn test_read_failure_mid_stream_is_reported() {
    let url = "https://dumps.test/wikidata-20210301-all.json.gz";
    let fetcher = MockFetcher::new().with_resource(url, json_dump(2), Compression::Gzip);
    fetcher.set_failing_readers(true);
    let mut controller = DumpProcessingController::new("wikidatawiki", fetcher);

    let err = controller.process_dump(&remote_json_dump(url)).unwrap_err();
    assert!(matches!(err, DumpError::ReadFailure { .. }));
}

#[test]
fn test_missing_remote_dump_is_not_found() {
    let mut controller = DumpProcessingController::new("wikidatawiki", MockFetcher::new());
    let err = controller
        .process_dump(&remote_json_dump("https://dumps.test/missing.json.gz"))
        .unwrap_err();
    assert!(err.is_not_found());
}
