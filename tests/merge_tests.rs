//! Tests for merging containers
//!
//! These tests verify:
//! - K-way merge order, duplicates and empty inputs
//! - Compatibility checks and atomic output
//! - Recovery of an output left behind by an interrupted promotion
//! - Liveness reporting
//! - Single-pass and batch orchestration, incl. append-by-merge

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use warcmap::counters::{Counter, ProgressReporter};
use warcmap::merge::{recover_output, LivenessWatcher};
use warcmap::storage::{Compression, ContainerMeta, MapFileReader, MapFileWriter, DATA_FILE, INDEX_FILE};
use warcmap::{Config, Counters, MapFileMerger, MergeOrchestrator, WarcMapError};

// =============================================================================
// Helper Functions
// =============================================================================

fn config() -> Config {
    Config::builder()
        .index_interval(2)
        .workers(2)
        .liveness_interval(Duration::from_millis(5))
        .build()
}

fn write_container(path: &Path, meta: ContainerMeta, entries: &[(&str, &str)]) -> PathBuf {
    let mut writer = MapFileWriter::create(path, meta).unwrap();
    for (k, v) in entries {
        writer.append(k.as_bytes(), v.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
    path.to_path_buf()
}

fn docs(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    write_container(path, ContainerMeta::documents(Compression::Deflate, 2), entries)
}

fn refs(path: &Path, entries: &[(&str, &str)]) -> PathBuf {
    write_container(path, ContainerMeta::references(Compression::None, 2), entries)
}

fn contents(path: &Path) -> Vec<(String, String)> {
    MapFileReader::open(path)
        .unwrap()
        .scan()
        .unwrap()
        .map(|e| {
            let (k, v) = e.unwrap();
            (String::from_utf8(k).unwrap(), String::from_utf8(v).unwrap())
        })
        .collect()
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Default)]
struct CountingProgress(AtomicU64);

impl ProgressReporter for CountingProgress {
    fn progress(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

// =============================================================================
// K-Way Merge
// =============================================================================

#[test]
fn test_merge_interleaves_inputs() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("1", "x"), ("3", "y")]);
    let b = docs(&temp.path().join("b"), &[("2", "z")]);
    let out = temp.path().join("out");

    let stats = MapFileMerger::new(&config()).merge(&[a, b], &out).unwrap();

    assert_eq!(stats.inputs, 2);
    assert_eq!(stats.entries_written, 3);
    assert_eq!(contents(&out), pairs(&[("1", "x"), ("2", "z"), ("3", "y")]));
    MapFileReader::open(&out).unwrap().verify().unwrap();
}

#[test]
fn test_merge_keeps_duplicates_in_input_order() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("k", "from-a")]);
    let b = docs(&temp.path().join("b"), &[("k", "from-b"), ("m", "only-b")]);
    let out = temp.path().join("out");

    MapFileMerger::new(&config())
        .merge(&[b.clone(), a.clone()], &out)
        .unwrap();
    assert_eq!(
        contents(&out),
        pairs(&[("k", "from-b"), ("k", "from-a"), ("m", "only-b")])
    );
    assert_eq!(
        MapFileReader::open(&out).unwrap().get(b"k").unwrap(),
        Some(b"from-b".to_vec())
    );
}

#[test]
fn test_merge_with_empty_input_is_complete() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("a", "1"), ("c", "3")]);
    let empty = docs(&temp.path().join("empty"), &[]);
    let b = docs(&temp.path().join("b"), &[("b", "2")]);
    let out = temp.path().join("out");

    let counters = Arc::new(Counters::new());
    let stats = MapFileMerger::new(&config())
        .with_counters(counters.clone())
        .merge(&[a, empty, b], &out)
        .unwrap();

    assert_eq!(stats.empty_inputs, 1);
    assert_eq!(contents(&out), pairs(&[("a", "1"), ("b", "2"), ("c", "3")]));
    assert_eq!(counters.get(Counter::ContainersToBeMerged), 3);
    assert_eq!(counters.get(Counter::EmptyInputContainers), 1);
    assert_eq!(counters.get(Counter::InputsExhausted), 2);
    assert_eq!(counters.get(Counter::EntriesWritten), 3);
    assert_eq!(counters.get(Counter::MergesFinished), 1);
}

#[test]
fn test_merge_applies_configured_compression() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("a", "1")]);
    let out = temp.path().join("out");

    let config = Config::builder()
        .compression(Compression::None)
        .index_interval(7)
        .build();
    MapFileMerger::new(&config).merge(&[a], &out).unwrap();

    let reader = MapFileReader::open(&out).unwrap();
    assert_eq!(reader.meta().compression, Compression::None);
    assert_eq!(reader.meta().index_interval, 7);
}

#[test]
fn test_incompatible_inputs_leave_no_output() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("a", "1")]);
    let b = refs(&temp.path().join("b"), &[("b", "2")]);
    let out = temp.path().join("out");

    let result = MapFileMerger::new(&config()).merge(&[a, b], &out);
    assert!(matches!(result, Err(WarcMapError::IncompatibleContainers(_))));
    assert!(!out.exists());
    assert!(!temp.path().join(".out.merging").exists());
}

#[test]
fn test_input_failing_mid_merge_keeps_previous_output() {
    let temp = TempDir::new().unwrap();
    let out = refs(&temp.path().join("out"), &[("a", "old")]);
    let good = refs(&temp.path().join("good"), &[("b", "2")]);
    let bad = refs(
        &temp.path().join("bad"),
        &[("k1", "value-1"), ("k2", "value-2"), ("k3", "value-3"), ("k4", "value-4"), ("k5", "value-5")],
    );

    // The last entry now runs into the footer; opening still succeeds
    let data_path = bad.join(DATA_FILE);
    let bytes = fs::read(&data_path).unwrap();
    let footer_start = bytes.len() - 16;
    let mut shortened = bytes[..footer_start - 3].to_vec();
    shortened.extend_from_slice(&bytes[footer_start..]);
    fs::write(&data_path, shortened).unwrap();

    let result = MapFileMerger::new(&config()).merge(&[out.clone(), good, bad], &out);

    assert!(matches!(result, Err(WarcMapError::CorruptContainer { .. })));
    assert!(!temp.path().join(".out.merging").exists());
    assert!(!temp.path().join(".out.previous").exists());
    assert_eq!(contents(&out), pairs(&[("a", "old")]));
}

#[test]
fn test_replacing_output_leaves_no_backup() {
    let temp = TempDir::new().unwrap();
    let out = docs(&temp.path().join("out"), &[("a", "1")]);
    let b = docs(&temp.path().join("b"), &[("b", "2")]);

    MapFileMerger::new(&config()).merge(&[out.clone(), b], &out).unwrap();

    assert_eq!(contents(&out), pairs(&[("a", "1"), ("b", "2")]));
    assert!(!temp.path().join(".out.previous").exists());
}

#[test]
fn test_recover_restores_backup_without_output() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    docs(&temp.path().join(".out.previous"), &[("a", "old")]);

    recover_output(&out).unwrap();

    assert_eq!(contents(&out), pairs(&[("a", "old")]));
    assert!(!temp.path().join(".out.previous").exists());
}

#[test]
fn test_recover_drops_backup_next_to_output() {
    let temp = TempDir::new().unwrap();
    let out = docs(&temp.path().join("out"), &[("a", "new")]);
    docs(&temp.path().join(".out.previous"), &[("a", "old")]);

    recover_output(&out).unwrap();

    assert_eq!(contents(&out), pairs(&[("a", "new")]));
    assert!(!temp.path().join(".out.previous").exists());
}

#[test]
fn test_merge_readers_refuses_unrecovered_backup() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("b", "2")]);
    let out = temp.path().join("out");
    docs(&temp.path().join(".out.previous"), &[("a", "old")]);

    let readers = vec![MapFileReader::open(&a).unwrap()];
    let result = MapFileMerger::new(&config()).merge_readers(&readers, &out);

    assert!(matches!(result, Err(WarcMapError::CorruptContainer { .. })));
    assert!(!out.exists());
    assert_eq!(contents(&temp.path().join(".out.previous")), pairs(&[("a", "old")]));
}

#[test]
fn test_merge_of_nothing_fails() {
    let temp = TempDir::new().unwrap();
    let result = MapFileMerger::new(&config()).merge(&[], &temp.path().join("out"));
    assert!(matches!(result, Err(WarcMapError::NoContainersFound(_))));
}

#[test]
fn test_merge_reports_progress() {
    let temp = TempDir::new().unwrap();
    let a = docs(&temp.path().join("a"), &[("a", "1"), ("b", "2")]);
    let progress = Arc::new(CountingProgress::default());

    MapFileMerger::new(&config())
        .with_progress(progress.clone())
        .merge(&[a], &temp.path().join("out"))
        .unwrap();
    assert!(progress.0.load(Ordering::Relaxed) >= 2);
}

// =============================================================================
// Liveness
// =============================================================================

#[test]
fn test_liveness_watcher_reports_growth() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("growing");
    fs::write(&path, b"some bytes").unwrap();

    let progress = Arc::new(CountingProgress::default());
    let watcher =
        LivenessWatcher::spawn(&path, Duration::from_millis(5), progress.clone()).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while progress.0.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    watcher.stop();

    let seen = progress.0.load(Ordering::Relaxed);
    assert!(seen >= 1);

    // No further signals once stopped
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(progress.0.load(Ordering::Relaxed), seen);
}

#[test]
fn test_liveness_watcher_ignores_missing_file() {
    let temp = TempDir::new().unwrap();
    let progress = Arc::new(CountingProgress::default());
    let watcher = LivenessWatcher::spawn(
        &temp.path().join("absent"),
        Duration::from_millis(2),
        progress.clone(),
    )
    .unwrap();
    std::thread::sleep(Duration::from_millis(30));
    drop(watcher);
    assert_eq!(progress.0.load(Ordering::Relaxed), 0);
}

// =============================================================================
// Orchestration
// =============================================================================

#[test]
fn test_single_pass_merge_by_pattern() {
    let temp = TempDir::new().unwrap();
    docs(&temp.path().join("part-0"), &[("b", "2")]);
    docs(&temp.path().join("part-1"), &[("a", "1")]);
    fs::create_dir_all(temp.path().join("part-2")).unwrap(); // not a container
    let out = temp.path().join("merged");

    let pattern = format!("{}/part-*", temp.path().display());
    let stats = MergeOrchestrator::new(&config())
        .merge_containers(&pattern, &out)
        .unwrap();

    assert_eq!(stats.inputs, 2);
    assert_eq!(contents(&out), pairs(&[("a", "1"), ("b", "2")]));
}

#[test]
fn test_single_pass_merge_appends_to_existing_output() {
    let temp = TempDir::new().unwrap();
    let out = docs(&temp.path().join("merged"), &[("a", "old")]);
    docs(&temp.path().join("part-0"), &[("a", "new"), ("b", "2")]);

    let pattern = format!("{}/part-*", temp.path().display());
    MergeOrchestrator::new(&config())
        .merge_containers(&pattern, &out)
        .unwrap();

    assert_eq!(contents(&out), pairs(&[("a", "old"), ("a", "new"), ("b", "2")]));
}

#[test]
fn test_single_pass_merge_restores_interrupted_output() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("merged");
    docs(&temp.path().join(".merged.previous"), &[("a", "old")]);
    docs(&temp.path().join("part-0"), &[("b", "2")]);

    let pattern = format!("{}/part-*", temp.path().display());
    let stats = MergeOrchestrator::new(&config())
        .merge_containers(&pattern, &out)
        .unwrap();

    assert_eq!(stats.inputs, 2);
    assert_eq!(contents(&out), pairs(&[("a", "old"), ("b", "2")]));
    assert!(!temp.path().join(".merged.previous").exists());
}

#[test]
fn test_single_pass_without_matches_fails() {
    let temp = TempDir::new().unwrap();
    let pattern = format!("{}/nothing-*", temp.path().display());
    let result = MergeOrchestrator::new(&config()).merge_containers(&pattern, &temp.path().join("out"));
    assert!(matches!(result, Err(WarcMapError::NoContainersFound(_))));
}

#[test]
fn test_batch_merge_groups_shards_by_name() {
    let temp = TempDir::new().unwrap();
    let b0 = temp.path().join("batch-0");
    let b1 = temp.path().join("batch-1");
    docs(&b0.join("data-r-00000"), &[("u1", "doc1")]);
    refs(&b0.join("uri-r-00000"), &[("http://a/", "u1")]);
    docs(&b1.join("data-r-00000"), &[("u0", "doc0")]);
    docs(&b1.join("data-r-00001"), &[("u2", "doc2")]);
    let out = temp.path().join("store");

    let pattern = format!("{}/batch-*", temp.path().display());
    let stats = MergeOrchestrator::new(&config())
        .merge_batches(&pattern, &out)
        .unwrap();

    assert_eq!(stats.len(), 3);
    assert_eq!(
        contents(&out.join("data-r-00000")),
        pairs(&[("u0", "doc0"), ("u1", "doc1")])
    );
    assert_eq!(contents(&out.join("data-r-00001")), pairs(&[("u2", "doc2")]));
    assert_eq!(contents(&out.join("uri-r-00000")), pairs(&[("http://a/", "u1")]));
}

#[test]
fn test_batch_merge_appends_to_existing_store() {
    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first");
    let second = temp.path().join("second");
    docs(&first.join("data-r-00000"), &[("b", "2")]);
    docs(&second.join("data-r-00000"), &[("a", "1"), ("c", "3")]);
    let out = temp.path().join("store");

    let orchestrator = MergeOrchestrator::new(&config());
    orchestrator.merge_batch_dirs(&[first], &out).unwrap();
    orchestrator.merge_batch_dirs(&[second], &out).unwrap();

    assert_eq!(
        contents(&out.join("data-r-00000")),
        pairs(&[("a", "1"), ("b", "2"), ("c", "3")])
    );
}

#[test]
fn test_batch_merge_skips_corrupt_candidate() {
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("good");
    let bad = temp.path().join("bad");
    docs(&good.join("data-r-00000"), &[("a", "1")]);
    let broken = bad.join("data-r-00000");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("data"), b"definitely not a container file").unwrap();
    fs::write(broken.join("index"), b"").unwrap();
    let out = temp.path().join("store");

    let stats = MergeOrchestrator::new(&config())
        .merge_batch_dirs(&[good, bad], &out)
        .unwrap();

    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].inputs, 1);
    assert_eq!(contents(&out.join("data-r-00000")), pairs(&[("a", "1")]));
}

#[test]
fn test_batch_merge_keeps_unreadable_existing_output() {
    let temp = TempDir::new().unwrap();
    let batch = temp.path().join("batch");
    docs(&batch.join("data-r-00000"), &[("z", "26")]);
    let out = temp.path().join("store");
    let existing = docs(&out.join("data-r-00000"), &[("a", "1"), ("b", "2"), ("c", "3")]);

    let data_before = fs::read(existing.join(DATA_FILE)).unwrap();
    let index_before = fs::read(existing.join(INDEX_FILE)).unwrap();
    fs::write(existing.join(INDEX_FILE), b"WI").unwrap();

    let result = MergeOrchestrator::new(&config()).merge_batch_dirs(&[batch], &out);
    assert!(result.is_err());
    assert_eq!(fs::read(existing.join(DATA_FILE)).unwrap(), data_before);
    assert!(!out.join(".data-r-00000.merging").exists());

    // Repairing the index brings back the untouched entries
    fs::write(existing.join(INDEX_FILE), index_before).unwrap();
    assert_eq!(contents(&existing), pairs(&[("a", "1"), ("b", "2"), ("c", "3")]));
}

#[test]
fn test_batch_merge_without_shards_fails() {
    let temp = TempDir::new().unwrap();
    let empty = temp.path().join("empty");
    fs::create_dir_all(&empty).unwrap();

    let result = MergeOrchestrator::new(&config()).merge_batch_dirs(&[empty], &temp.path().join("out"));
    assert!(matches!(result, Err(WarcMapError::NoContainersFound(_))));
}
