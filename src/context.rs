//! State shared by every indexing worker.

use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::{
        Mutex,
        RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::Serialize;
use tantivy::IndexWriter;
use tracing::{info, warn};

use crate::{
    document::DatasetDocument,
    error::{Error, Result},
    tantivy_index::SearchIndex,
};

/// Progress is logged every time this many datasets have been recorded.
const PROGRESS_INTERVAL: u64 = 1000;

/// Run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub datasets: u64,
    pub files: u64,
    pub bytes: u64,
    pub errors: u64,
}

impl IngestStats {
    pub fn add(&mut self, other: IngestStats) {
        self.datasets += other.datasets;
        self.files += other.files;
        self.bytes += other.bytes;
        self.errors += other.errors;
    }
}

/// One line of the error log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    pub dataset: String,
    pub file: String,
    pub error: String,
}

impl ErrorRecord {
    pub fn new(
        dataset: impl Into<String>,
        file: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            file: file.into(),
            error: error.to_string().replace(['\r', '\n'], " "),
        }
    }
}

pub struct SharedIndexingContext {
    index: SearchIndex,
    // Adds only need `&IndexWriter`; commits need it exclusively.
    writer: RwLock<IndexWriter>,
    stats: Mutex<IngestStats>,
    error_log: Mutex<BufWriter<File>>,
    submitted: AtomicU64,
    commit_interval: u64,
}

impl SharedIndexingContext {
    /// Create the index writer and truncate the error log.
    pub fn open(
        index: SearchIndex,
        writer_budget: usize,
        error_log: &Path,
        commit_interval: u64,
    ) -> Result<Self> {
        let writer = index.writer(writer_budget)?;
        let log = File::create(error_log)?;

        Ok(Self {
            index,
            writer: RwLock::new(writer),
            stats: Mutex::new(IngestStats::default()),
            error_log: Mutex::new(BufWriter::new(log)),
            submitted: AtomicU64::new(0),
            commit_interval: commit_interval.max(1),
        })
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    /// Add `doc`, replacing any document with the same id. Returns the
    /// 1-based submission ordinal.
    pub fn submit(&self, doc: &DatasetDocument) -> Result<u64> {
        let writer = self
            .writer
            .read()
            .map_err(|_| Error::LockPoisoned("index writer"))?;
        self.index.add_document(&writer, doc)?;
        Ok(self.submitted.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Number of documents submitted so far.
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Add `delta` to the run counters and return the new totals.
    pub fn record_stats(&self, delta: IngestStats) -> Result<IngestStats> {
        let snapshot = {
            let mut stats = self
                .stats
                .lock()
                .map_err(|_| Error::LockPoisoned("run statistics"))?;
            stats.add(delta);
            *stats
        };

        if delta.datasets > 0 && snapshot.datasets % PROGRESS_INTERVAL == 0 {
            info!(
                datasets = snapshot.datasets,
                files = snapshot.files,
                bytes = snapshot.bytes,
                errors = snapshot.errors,
                "indexing progress"
            );
        }
        Ok(snapshot)
    }

    pub fn stats(&self) -> Result<IngestStats> {
        self.stats
            .lock()
            .map(|stats| *stats)
            .map_err(|_| Error::LockPoisoned("run statistics"))
    }

    /// Append one record to the error log and flush it.
    pub fn log_error(&self, record: &ErrorRecord) -> Result<()> {
        warn!(
            dataset = %record.dataset,
            file = %record.file,
            "{}",
            record.error
        );

        let mut log = self
            .error_log
            .lock()
            .map_err(|_| Error::LockPoisoned("error log"))?;
        serde_json::to_writer(&mut *log, record)?;
        log.write_all(b"\n")?;
        log.flush()?;
        Ok(())
    }

    /// Commit when `ordinal` falls on the commit interval. Returns whether
    /// a commit happened.
    pub fn commit_periodically(&self, ordinal: u64) -> Result<bool> {
        if ordinal == 0 || ordinal % self.commit_interval != 0 {
            return Ok(false);
        }
        self.commit()?;
        Ok(true)
    }

    pub fn commit(&self) -> Result<()> {
        let mut writer = self
            .writer
            .write()
            .map_err(|_| Error::LockPoisoned("index writer"))?;
        writer.commit()?;
        Ok(())
    }

    /// Commit outstanding documents, wait for merges and flush the error
    /// log. Returns the final counters.
    pub fn close(self) -> Result<IngestStats> {
        let mut writer = self
            .writer
            .into_inner()
            .map_err(|_| Error::LockPoisoned("index writer"))?;
        writer.commit()?;
        writer.wait_merging_threads()?;

        let mut log = self
            .error_log
            .into_inner()
            .map_err(|_| Error::LockPoisoned("error log"))?;
        log.flush()?;

        self.stats
            .into_inner()
            .map_err(|_| Error::LockPoisoned("run statistics"))
    }
}

impl fmt::Debug for SharedIndexingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedIndexingContext")
            .field("submitted", &self.submitted())
            .field("commit_interval", &self.commit_interval)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        document::DatasetField,
        tantivy_index::{MIN_WRITER_BUDGET, default_analyzer},
    };

    fn context(log: &Path, commit_interval: u64) -> SharedIndexingContext {
        let index = SearchIndex::open_in_ram(default_analyzer()).unwrap();
        SharedIndexingContext::open(
            index,
            MIN_WRITER_BUDGET,
            log,
            commit_interval,
        )
        .unwrap()
    }

    fn doc(id: &str) -> DatasetDocument {
        let mut doc = DatasetDocument::with_id(id);
        doc.push(DatasetField::Title, format!("dataset {id}"));
        doc
    }

    #[test]
    fn commits_on_interval() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(&tmp.path().join("errors.log"), 2);

        let first = ctx.submit(&doc("1")).unwrap();
        assert!(!ctx.commit_periodically(first).unwrap());
        assert!(!ctx.index().contains("1").unwrap());

        let second = ctx.submit(&doc("2")).unwrap();
        assert_eq!(second, 2);
        assert!(ctx.commit_periodically(second).unwrap());
        assert_eq!(ctx.index().num_docs().unwrap(), 2);
    }

    #[test]
    fn close_commits_remaining_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let index_dir = tmp.path().join("index");
        let index =
            SearchIndex::open(&index_dir, default_analyzer()).unwrap();
        let ctx = SharedIndexingContext::open(
            index,
            MIN_WRITER_BUDGET,
            &tmp.path().join("errors.log"),
            50,
        )
        .unwrap();

        ctx.submit(&doc("1")).unwrap();
        ctx.close().unwrap();

        let reopened =
            SearchIndex::open(&index_dir, default_analyzer()).unwrap();
        assert!(reopened.contains("1").unwrap());
    }

    #[test]
    fn error_log_has_one_json_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("errors.log");
        let ctx = context(&log, 50);

        ctx.log_error(&ErrorRecord::new("dataset-1", "a.ttl", "bad\nturtle"))
            .unwrap();
        ctx.log_error(&ErrorRecord::new("dataset-2", "dataset.json", "gone"))
            .unwrap();

        let text = std::fs::read_to_string(&log).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["dataset"], "dataset-1");
        assert_eq!(first["error"], "bad turtle");
    }

    #[test]
    fn concurrent_stats_updates_are_not_lost() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Arc::new(context(&tmp.path().join("errors.log"), 50));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        ctx.record_stats(IngestStats {
                            datasets: 1,
                            files: 2,
                            bytes: 10,
                            errors: 1,
                        })
                        .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ctx.stats().unwrap(), IngestStats {
            datasets: 800,
            files: 1600,
            bytes: 8000,
            errors: 800,
        });
    }

    #[test]
    fn concurrent_submits_get_distinct_ordinals() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = Arc::new(context(&tmp.path().join("errors.log"), 7));

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || {
                    (0..25)
                        .map(|i| {
                            let ordinal =
                                ctx.submit(&doc(&format!("{t}-{i}"))).unwrap();
                            ctx.commit_periodically(ordinal).unwrap();
                            ordinal
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ordinals: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ordinals.sort_unstable();
        assert_eq!(ordinals, (1..=100).collect::<Vec<_>>());

        ctx.commit().unwrap();
        assert_eq!(ctx.index().num_docs().unwrap(), 100);
    }
}
