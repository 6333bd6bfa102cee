//! Concurrent indexing of a datasets root.
//!
//! The dataset directories are listed once and pushed into a channel that
//! never grows afterwards. A dedicated rayon pool runs one worker loop per
//! thread; each worker pulls a directory, builds its document privately and
//! submits it through the [`SharedIndexingContext`].

use std::{
    path::Path,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use crossbeam_channel::Receiver;
use tantivy::tokenizer::TextAnalyzer;
use tracing::{debug, info, warn};

use crate::{
    annotations::merge_annotations,
    builder::{DatasetBuild, DatasetDocumentBuilder},
    config::{IndexerConfig, charset_from_label},
    context::{ErrorRecord, IngestStats, SharedIndexingContext},
    descriptor::DESCRIPTOR_FILE,
    error::{Error, Result},
    status::write_status,
    tantivy_index::{MIN_WRITER_BUDGET, SearchIndex},
    walker::{DatasetDir, EntryKind, discover_datasets, list_entries},
};

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub stats: IngestStats,
    /// Datasets skipped by the denylist or because they were already indexed.
    pub skipped: u64,
    pub elapsed: Duration,
    pub expected: Option<u64>,
}

impl RunSummary {
    /// `(expected, indexed)` when the run indexed a different number of
    /// datasets than announced.
    pub fn count_mismatch(&self) -> Option<(u64, u64)> {
        self.expected
            .filter(|expected| *expected != self.stats.datasets)
            .map(|expected| (expected, self.stats.datasets))
    }
}

pub struct Indexer {
    config: IndexerConfig,
    context: SharedIndexingContext,
    builder: DatasetDocumentBuilder,
}

impl Indexer {
    /// Validate `config`, open the index and the error log.
    pub fn new(config: IndexerConfig, analyzer: TextAnalyzer) -> Result<Self> {
        config.validate()?;

        let index = SearchIndex::open(&config.index_dir, analyzer)?;
        let context = SharedIndexingContext::open(
            index,
            config.writer_budget(),
            &config.error_log,
            config.commit_interval,
        )?;
        let builder = DatasetDocumentBuilder::from_config(&config);

        Ok(Self {
            config,
            context,
            builder,
        })
    }

    /// Index every dataset under the datasets root and close the index.
    pub fn run(self) -> Result<RunSummary> {
        let start = Instant::now();
        let datasets = discover_datasets(&self.config.datasets_dir)?;
        info!(
            datasets = datasets.len(),
            threads = self.config.threads,
            root = %self.config.datasets_dir.display(),
            "indexing started"
        );

        let (sender, receiver) = crossbeam_channel::bounded(datasets.len());
        for dataset in datasets {
            sender.try_send(dataset).map_err(|_| {
                Error::Config("dataset worklist rejected an entry".into())
            })?;
        }
        drop(sender);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .thread_name(|i| format!("dsindex-worker-{i}"))
            .build()?;

        let abort = AtomicBool::new(false);
        let skipped = AtomicU64::new(0);
        let worker_error = pool
            .broadcast(|_| self.worker_loop(&receiver, &abort, &skipped))
            .into_iter()
            .find_map(Result::err);

        let Indexer {
            config, context, ..
        } = self;
        let closed = context.close();
        if let Some(err) = worker_error {
            if let Err(close_err) = closed {
                warn!("closing the index after a failed run: {close_err}");
            }
            return Err(err);
        }
        let stats = closed?;

        let summary = RunSummary {
            stats,
            skipped: skipped.into_inner(),
            elapsed: start.elapsed(),
            expected: config.expected_datasets,
        };
        info!(
            datasets = stats.datasets,
            files = stats.files,
            bytes = stats.bytes,
            errors = stats.errors,
            skipped = summary.skipped,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "indexing finished"
        );
        if let Some((expected, indexed)) = summary.count_mismatch() {
            warn!("expected to index {expected} datasets, indexed {indexed}");
        }
        Ok(summary)
    }

    fn worker_loop(
        &self,
        receiver: &Receiver<DatasetDir>,
        abort: &AtomicBool,
        skipped: &AtomicU64,
    ) -> Result<()> {
        // The worklist is complete before any worker starts, so an empty
        // channel means there is nothing left to do.
        while !abort.load(Ordering::SeqCst) {
            let Ok(dir) = receiver.try_recv() else {
                break;
            };

            if let Err(err) = self.dispatch(&dir, skipped) {
                abort.store(true, Ordering::SeqCst);
                return Err(err);
            }
        }
        Ok(())
    }

    fn dispatch(&self, dir: &DatasetDir, skipped: &AtomicU64) -> Result<()> {
        if self.config.is_denied(dir) {
            debug!(dataset = %dir.name, "skipping denylisted dataset");
            skipped.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        if self.config.resume && self.already_indexed(dir)? {
            debug!(dataset = %dir.name, "skipping indexed dataset");
            skipped.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        self.process(dir)
    }

    fn already_indexed(&self, dir: &DatasetDir) -> Result<bool> {
        match self.builder.peek_id(dir) {
            Ok(id) => self.context.index().contains(&id),
            // Let the full build report the broken descriptor.
            Err(_) => Ok(false),
        }
    }

    /// Build and submit one dataset. Errors returned here end the run.
    fn process(&self, dir: &DatasetDir) -> Result<()> {
        let build = match self.builder.build(dir) {
            Ok(build) => build,
            Err(err) => {
                self.context.log_error(&ErrorRecord::new(
                    &err.dataset,
                    &err.file,
                    &err.source,
                ))?;
                self.context.record_stats(IngestStats {
                    errors: 1,
                    ..IngestStats::default()
                })?;
                return Ok(());
            }
        };

        for report in build.failures() {
            let reason = report.outcome.reason().unwrap_or_default();
            self.context.log_error(&ErrorRecord::new(
                &build.dataset,
                &report.file,
                reason,
            ))?;
        }

        let ordinal = self.context.submit(&build.document)?;
        let mut delta = build.stats();
        self.write_back_status(&build, &mut delta)?;
        self.context.record_stats(delta)?;
        self.context.commit_periodically(ordinal)?;
        Ok(())
    }

    fn write_back_status(
        &self,
        build: &DatasetBuild,
        delta: &mut IngestStats,
    ) -> Result<()> {
        let written = write_status(
            &build.status.descriptor,
            &self.config.status_key,
            build.status.status,
            self.config.charset,
        );
        if let Err(err) = written {
            self.context.log_error(&ErrorRecord::new(
                &build.dataset,
                DESCRIPTOR_FILE,
                format!("cannot record status: {err}"),
            ))?;
            delta.errors += 1;
        }
        Ok(())
    }
}

/// Index `datasets_dir` into `index_dir` with default settings otherwise.
pub fn index(
    datasets_dir: &Path,
    index_dir: &Path,
    analyzer: TextAnalyzer,
    ram_buffer_mb: usize,
    charset: &str,
    expected_datasets: u64,
) -> Result<RunSummary> {
    let mut config = IndexerConfig::new(datasets_dir, index_dir);
    config.ram_buffer_mb = ram_buffer_mb;
    config.charset = charset_from_label(charset)?;
    config.expected_datasets = Some(expected_datasets);

    Indexer::new(config, analyzer)?.run()
}

/// Append the arrays of `annotation_file` to the indexed document of
/// `dataset_id` and commit. Returns the number of values added.
pub fn update_from_mined_annotations(
    index_dir: &Path,
    analyzer: TextAnalyzer,
    dataset_id: &str,
    annotation_file: &Path,
) -> Result<usize> {
    let index = SearchIndex::open(index_dir, analyzer)?;
    let mut writer = index.writer(MIN_WRITER_BUDGET)?;

    let mut doc =
        index
            .get_document(dataset_id)?
            .ok_or_else(|| Error::NotFound {
                kind: "dataset",
                name: dataset_id.to_string(),
            })?;
    let added = merge_annotations(annotation_file, &mut doc)?;
    index.add_document(&writer, &doc)?;

    writer.commit()?;
    writer.wait_merging_threads()?;
    Ok(added)
}

/// Merge every annotation file under the datasets root into the document
/// named after its directory. Returns the number of files merged.
///
/// Datasets that are not indexed, or whose annotation file is unreadable,
/// are logged and skipped.
pub fn update_index_from_annotations(
    config: &IndexerConfig,
    analyzer: TextAnalyzer,
) -> Result<u64> {
    let index = SearchIndex::open(&config.index_dir, analyzer)?;
    let mut writer = index.writer(config.writer_budget())?;
    let mut merged = 0;

    for dir in discover_datasets(&config.datasets_dir)? {
        if config.is_denied(&dir) {
            continue;
        }

        let annotations = list_entries(&dir.path)?
            .into_iter()
            .filter(|entry| entry.kind == EntryKind::Annotation);
        for entry in annotations {
            let id = dir.derived_id();
            let Some(mut doc) = index.get_document(id)? else {
                warn!(dataset = %dir.name, "annotated dataset is not indexed");
                continue;
            };
            if let Err(err) = merge_annotations(&entry.path, &mut doc) {
                warn!(
                    dataset = %dir.name,
                    file = %entry.file_name(),
                    "cannot merge annotations: {err}"
                );
                continue;
            }

            index.add_document(&writer, &doc)?;
            // Later files of the same dataset read the merged document back.
            writer.commit()?;
            merged += 1;
        }
    }

    writer.commit()?;
    writer.wait_merging_threads()?;
    info!(merged, "annotation update finished");
    Ok(merged)
}
