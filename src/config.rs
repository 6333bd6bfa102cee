use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use encoding_rs::Encoding;

use crate::{
    error::{Error, Result},
    status::DEFAULT_STATUS_KEY,
    walker::DatasetDir,
};

pub const MB: u64 = 1024 * 1024;

pub const DEFAULT_RAM_BUFFER_MB: usize = 512;
pub const DEFAULT_COMMIT_INTERVAL: u64 = 50;
pub const DEFAULT_MAX_GRAPH_FILE_BYTES: u64 = 500 * MB;
pub const DEFAULT_CHARSET: &str = "UTF-8";
pub const ERROR_LOG_FILE: &str = "errors.log";

/// Settings for one indexing run.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Root holding one subdirectory per dataset.
    pub datasets_dir: PathBuf,
    pub index_dir: PathBuf,
    /// Writer memory budget in MiB.
    pub ram_buffer_mb: usize,
    /// Encoding of the descriptor files.
    pub charset: &'static Encoding,
    /// Number of datasets the run is expected to index, if known.
    pub expected_datasets: Option<u64>,
    pub threads: usize,
    /// JSON-lines file receiving one record per error.
    pub error_log: PathBuf,
    /// Directory names or dataset ids never to index.
    pub denylist: HashSet<String>,
    /// Commit after every n-th submitted document.
    pub commit_interval: u64,
    /// Graph files above this size are skipped unparsed.
    pub max_graph_file_bytes: u64,
    /// Descriptor key the ingest status is written under.
    pub status_key: String,
    /// Skip datasets already present in the index.
    pub resume: bool,
}

impl IndexerConfig {
    pub fn new(
        datasets_dir: impl Into<PathBuf>,
        index_dir: impl Into<PathBuf>,
    ) -> Self {
        let index_dir = index_dir.into();
        let error_log = default_error_log(&index_dir);
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            datasets_dir: datasets_dir.into(),
            index_dir,
            ram_buffer_mb: DEFAULT_RAM_BUFFER_MB,
            charset: encoding_rs::UTF_8,
            expected_datasets: None,
            threads,
            error_log,
            denylist: HashSet::new(),
            commit_interval: DEFAULT_COMMIT_INTERVAL,
            max_graph_file_bytes: DEFAULT_MAX_GRAPH_FILE_BYTES,
            status_key: DEFAULT_STATUS_KEY.to_string(),
            resume: false,
        }
    }

    /// Set the descriptor encoding from a label such as `UTF-8` or
    /// `ISO-8859-1`.
    pub fn with_charset(mut self, label: &str) -> Result<Self> {
        self.charset = charset_from_label(label)?;
        Ok(self)
    }

    pub fn with_denylist<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.denylist.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Check the settings and create the index directory.
    pub fn validate(&self) -> Result<()> {
        if self.ram_buffer_mb == 0 {
            return Err(Error::Config("RAM buffer size must be positive".into()));
        }
        if self.expected_datasets == Some(0) {
            return Err(Error::Config(
                "expected number of datasets must be positive".into(),
            ));
        }
        if self.threads == 0 {
            return Err(Error::Config("thread count must be positive".into()));
        }
        if self.commit_interval == 0 {
            return Err(Error::Config(
                "commit interval must be positive".into(),
            ));
        }
        if self.status_key.is_empty() {
            return Err(Error::Config("status key must not be empty".into()));
        }
        if !self.datasets_dir.is_dir() {
            return Err(Error::Config(format!(
                "datasets directory is not a readable directory: {}",
                self.datasets_dir.display()
            )));
        }

        std::fs::create_dir_all(&self.index_dir)
            .map_err(|_| Error::DataDir(self.index_dir.clone()))?;
        if let Some(parent) = self.error_log.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|_| Error::DataDir(parent.to_path_buf()))?;
        }
        Ok(())
    }

    /// Writer memory budget in bytes.
    pub fn writer_budget(&self) -> usize {
        self.ram_buffer_mb.saturating_mul(MB as usize)
    }

    pub fn is_denied(&self, dir: &DatasetDir) -> bool {
        self.denylist.contains(&dir.name)
            || self.denylist.contains(dir.derived_id())
    }
}

pub fn charset_from_label(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::Config(format!("unknown charset: {label}")))
}

/// `errors.log` next to the index directory.
fn default_error_log(index_dir: &Path) -> PathBuf {
    match index_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            parent.join(ERROR_LOG_FILE)
        }
        _ => PathBuf::from(ERROR_LOG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path) -> IndexerConfig {
        std::fs::create_dir_all(root.join("datasets")).unwrap();
        IndexerConfig::new(root.join("datasets"), root.join("out/index"))
    }

    #[test]
    fn defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = config(tmp.path());
        assert_eq!(config.ram_buffer_mb, 512);
        assert_eq!(config.commit_interval, 50);
        assert_eq!(config.max_graph_file_bytes, 500 * MB);
        assert_eq!(config.status_key, "indexable");
        assert_eq!(config.error_log, tmp.path().join("out/errors.log"));
        assert!(config.threads >= 1);
        config.validate().unwrap();
        assert!(tmp.path().join("out/index").is_dir());
    }

    #[test]
    fn rejects_zero_values() {
        let tmp = tempfile::tempdir().unwrap();
        let base = config(tmp.path());

        let mut c = base.clone();
        c.ram_buffer_mb = 0;
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = base.clone();
        c.expected_datasets = Some(0);
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = base;
        c.threads = 0;
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn missing_datasets_dir_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let c = IndexerConfig::new(tmp.path().join("nope"), tmp.path());
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn charset_labels() {
        assert_eq!(charset_from_label("utf-8").unwrap(), encoding_rs::UTF_8);
        assert_eq!(
            charset_from_label("latin1").unwrap(),
            encoding_rs::WINDOWS_1252
        );
        assert!(charset_from_label("klingon").is_err());
    }

    #[test]
    fn denylist_matches_name_or_id() {
        let tmp = tempfile::tempdir().unwrap();
        let c = config(tmp.path()).with_denylist(["dataset-11580", "42"]);
        assert!(c.is_denied(&DatasetDir::new("/d/dataset-11580")));
        assert!(c.is_denied(&DatasetDir::new("/d/dataset-42")));
        assert!(!c.is_denied(&DatasetDir::new("/d/dataset-1")));
    }

    #[test]
    fn writer_budget_in_bytes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut c = config(tmp.path());
        c.ram_buffer_mb = 16;
        assert_eq!(c.writer_budget(), 16 * 1024 * 1024);
    }
}
