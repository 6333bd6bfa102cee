//! Assembly of one index document per dataset directory.

use std::{
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;
use tracing::debug;

use crate::{
    annotations::merge_annotations,
    config::{DEFAULT_MAX_GRAPH_FILE_BYTES, IndexerConfig, MB},
    context::IngestStats,
    descriptor::{DESCRIPTOR_FILE, ReadMode, read_descriptor_file},
    document::DatasetDocument,
    error::{Error, Result},
    status::IngestStatus,
    triples::GraphStream,
    walker::{DatasetDir, DatasetEntry, EntryKind, list_entries},
};

/// What happened to one file of a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Graph file streamed to the end.
    Parsed { triples: u64 },
    /// Annotation file merged.
    Merged { values: usize },
    /// Never handed to a parser.
    Skipped { reason: String },
    /// Parsing started and failed.
    Failed { reason: String },
}

impl FileOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, FileOutcome::Skipped { .. } | FileOutcome::Failed { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            FileOutcome::Skipped { reason } | FileOutcome::Failed { reason } => {
                Some(reason.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub file: String,
    pub kind: EntryKind,
    pub bytes: u64,
    pub outcome: FileOutcome,
}

/// Status write-back the dispatcher performs once the document has been
/// submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub descriptor: PathBuf,
    pub status: IngestStatus,
}

/// Everything produced for one dataset.
#[derive(Debug, Clone)]
pub struct DatasetBuild {
    /// Directory name of the dataset.
    pub dataset: String,
    pub document: DatasetDocument,
    pub files: Vec<FileReport>,
    /// Graph files streamed without error.
    pub parsed: usize,
    /// Graph files in the directory, the descriptor excluded.
    pub total: usize,
    pub status: StatusRequest,
}

impl DatasetBuild {
    /// Reports that must end up in the error log.
    pub fn failures(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|r| r.outcome.is_error())
    }

    /// Counter contribution of this dataset once it is submitted.
    pub fn stats(&self) -> IngestStats {
        let attempted = self.files.iter().filter(|r| {
            r.kind == EntryKind::Graph
                && !matches!(r.outcome, FileOutcome::Skipped { .. })
        });

        let (files, bytes) =
            attempted.fold((0, 0), |(n, b), r| (n + 1, b + r.bytes));
        IngestStats {
            datasets: 1,
            files,
            bytes,
            errors: self.failures().count() as u64,
        }
    }
}

/// A failure that prevents a dataset from being indexed at all.
#[derive(Debug, thiserror::Error)]
#[error("dataset {dataset}: {source}")]
pub struct DatasetError {
    pub dataset: String,
    /// File the failure is attributed to.
    pub file: String,
    #[source]
    pub source: Error,
}

#[derive(Debug, Clone)]
pub struct DatasetDocumentBuilder {
    max_graph_file_bytes: u64,
    encoding: &'static Encoding,
}

impl Default for DatasetDocumentBuilder {
    fn default() -> Self {
        Self {
            max_graph_file_bytes: DEFAULT_MAX_GRAPH_FILE_BYTES,
            encoding: encoding_rs::UTF_8,
        }
    }
}

impl DatasetDocumentBuilder {
    pub fn new(max_graph_file_bytes: u64, encoding: &'static Encoding) -> Self {
        Self {
            max_graph_file_bytes,
            encoding,
        }
    }

    pub fn from_config(config: &IndexerConfig) -> Self {
        Self::new(config.max_graph_file_bytes, config.charset)
    }

    /// Dataset id from the leading metadata of the descriptor, falling back
    /// to the directory name.
    pub fn peek_id(&self, dir: &DatasetDir) -> Result<String> {
        let fields = read_descriptor_file(
            &dir.descriptor_path(),
            ReadMode::MetadataOnly,
            self.encoding,
        )?;
        Ok(fields
            .document
            .id()
            .unwrap_or(dir.derived_id())
            .to_string())
    }

    /// Build the document for one dataset directory.
    ///
    /// Only a missing or malformed descriptor (or an unreadable directory)
    /// fails the whole dataset. Problems with individual files end up in
    /// [`DatasetBuild::files`].
    pub fn build(
        &self,
        dir: &DatasetDir,
    ) -> std::result::Result<DatasetBuild, DatasetError> {
        let dataset_error = |file: &str, source| DatasetError {
            dataset: dir.name.clone(),
            file: file.to_string(),
            source,
        };

        let entries =
            list_entries(&dir.path).map_err(|e| dataset_error("", e))?;
        let descriptor = entries
            .iter()
            .find(|e| e.kind == EntryKind::Descriptor)
            .ok_or_else(|| {
                dataset_error(
                    DESCRIPTOR_FILE,
                    Error::MissingDescriptor(dir.path.clone()),
                )
            })?;

        let mut document = read_descriptor_file(
            &descriptor.path,
            ReadMode::Full,
            self.encoding,
        )
        .map_err(|e| dataset_error(DESCRIPTOR_FILE, e))?
        .document;
        document.set_id_if_absent(dir.derived_id());

        let mut files = Vec::new();
        for entry in &entries {
            let outcome = match entry.kind {
                EntryKind::Descriptor => continue,
                EntryKind::Graph => self.ingest_graph(entry, &mut document),
                EntryKind::Annotation => {
                    match merge_annotations(&entry.path, &mut document) {
                        Ok(values) => FileOutcome::Merged { values },
                        Err(e) => FileOutcome::Failed {
                            reason: e.to_string(),
                        },
                    }
                }
                EntryKind::Other => {
                    debug!(
                        dataset = %dir.name,
                        file = %entry.file_name(),
                        "ignoring unrecognized file"
                    );
                    continue;
                }
            };

            files.push(FileReport {
                file: entry.file_name(),
                kind: entry.kind,
                bytes: entry.len,
                outcome,
            });
        }

        let graph_reports =
            files.iter().filter(|r| r.kind == EntryKind::Graph);
        let total = graph_reports.clone().count();
        let parsed = graph_reports
            .filter(|r| matches!(r.outcome, FileOutcome::Parsed { .. }))
            .count();
        let status = IngestStatus::from_counts(parsed, total);

        debug!(
            dataset = %dir.name,
            parsed,
            total,
            values = document.len(),
            %status,
            "built dataset document"
        );

        Ok(DatasetBuild {
            dataset: dir.name.clone(),
            document,
            files,
            parsed,
            total,
            status: StatusRequest {
                descriptor: descriptor.path.clone(),
                status,
            },
        })
    }

    fn ingest_graph(
        &self,
        entry: &DatasetEntry,
        document: &mut DatasetDocument,
    ) -> FileOutcome {
        if entry.len > self.max_graph_file_bytes {
            return FileOutcome::Skipped {
                reason: format!(
                    "bigger than {} MB",
                    self.max_graph_file_bytes / MB
                ),
            };
        }
        stream_graph(&entry.path, document)
    }
}

/// Stream every triple of `path` into `document`.
///
/// Triples read before a failure stay in the document. A panicking parser
/// is reported like any other parse failure.
fn stream_graph(path: &Path, document: &mut DatasetDocument) -> FileOutcome {
    let streamed = panic::catch_unwind(AssertUnwindSafe(|| -> Result<u64> {
        let mut stream = GraphStream::open(path)?;
        let mut triples = 0;
        for triple in &mut stream {
            triple?.contribute(document);
            triples += 1;
        }
        stream.close();
        Ok(triples)
    }));

    match streamed {
        Ok(Ok(triples)) => FileOutcome::Parsed { triples },
        Ok(Err(e)) => FileOutcome::Failed {
            reason: e.to_string(),
        },
        Err(_) => FileOutcome::Failed {
            reason: "graph parser panicked".to_string(),
        },
    }
}
