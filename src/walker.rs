use std::path::{Path, PathBuf};

use crate::{
    annotations::is_annotation_file,
    descriptor::DESCRIPTOR_FILE,
    error::Result,
    triples::is_graph_file,
};

/// Prefix of dataset directory names, stripped to get the dataset id.
const DATASET_DIR_PREFIX: &str = "dataset-";

/// A dataset directory found under the datasets root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDir {
    /// Directory name, e.g. `dataset-42`.
    pub name: String,
    pub path: PathBuf,
}

impl DatasetDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Self { name, path }
    }

    /// Dataset id implied by the directory name (`dataset-42` -> `42`).
    pub fn derived_id(&self) -> &str {
        self.name
            .strip_prefix(DATASET_DIR_PREFIX)
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.name)
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.path.join(DESCRIPTOR_FILE)
    }
}

/// What a file inside a dataset directory is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Descriptor,
    Graph,
    Annotation,
    Other,
}

/// A file inside a dataset directory.
#[derive(Debug, Clone)]
pub struct DatasetEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    /// Logical file length in bytes.
    pub len: u64,
}

impl DatasetEntry {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Classify a dataset entry by name. The descriptor wins over the graph
/// extensions, which win over the annotation marker.
pub fn classify_entry(path: &Path) -> EntryKind {
    let is_descriptor = path
        .file_name()
        .is_some_and(|name| name == DESCRIPTOR_FILE);
    if is_descriptor {
        EntryKind::Descriptor
    } else if is_graph_file(path) {
        EntryKind::Graph
    } else if is_annotation_file(path) {
        EntryKind::Annotation
    } else {
        EntryKind::Other
    }
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// List the dataset directories directly under `root`.
///
/// Skips hidden entries and plain files. Symlinks to directories are
/// followed. Results are sorted by name.
pub fn discover_datasets(root: &Path) -> Result<Vec<DatasetDir>> {
    let mut results = Vec::new();

    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_name = entry.file_name();
        if is_hidden(&file_name.to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        let file_type = entry.file_type()?;
        let is_dir = if file_type.is_symlink() {
            // Broken symlinks are skipped.
            path.canonicalize().is_ok_and(|resolved| resolved.is_dir())
        } else {
            file_type.is_dir()
        };

        if is_dir {
            results.push(DatasetDir::new(path));
        }
    }

    results.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(results)
}

/// List and classify the files of one dataset directory.
///
/// Subdirectories and hidden files are not part of a dataset.
pub fn list_entries(dir: &Path) -> Result<Vec<DatasetEntry>> {
    let mut entries = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if is_hidden(&entry.file_name().to_string_lossy()) {
            continue;
        }

        let path = entry.path();
        let metadata = match std::fs::metadata(&path) {
            Ok(m) => m,
            Err(_) => continue,
        };
        if !metadata.is_file() {
            continue;
        }

        entries.push(DatasetEntry {
            kind: classify_entry(&path),
            len: metadata.len(),
            path,
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
