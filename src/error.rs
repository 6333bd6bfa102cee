use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("missing dataset.json descriptor in {0}")]
    MissingDescriptor(PathBuf),

    #[error("malformed descriptor {path}: {source}")]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("descriptor {path} cannot be written back as {encoding}")]
    Encoding {
        path: PathBuf,
        encoding: &'static str,
    },

    #[error("cannot parse graph file {path}: {message}")]
    Graph { path: PathBuf, message: String },

    #[error("unsupported graph format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("{0} lock poisoned by a panicking worker")]
    LockPoisoned(&'static str),
}
