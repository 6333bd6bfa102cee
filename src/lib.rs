//! dsindex - a concurrent full-text indexer for collections of RDF datasets.
//!
//! Every dataset lives in its own directory holding a `dataset.json`
//! descriptor next to any number of graph files (Turtle, N-Triples,
//! RDF/XML, N3, JSON-LD). Each dataset becomes one document in a
//! [Tantivy](https://github.com/quickwit-oss/tantivy) index: the descriptor
//! metadata plus every triple term, sorted into classes, entities, literals
//! and properties. After indexing, the descriptor records how much of the
//! dataset's graph content could be parsed.
//!
//! # Quick start
//!
//! ```no_run
//! use dsindex::{Indexer, IndexerConfig, SearchIndex};
//! use dsindex::tantivy_index::default_analyzer;
//!
//! let mut config = IndexerConfig::new("/data/datasets", "/data/index");
//! config.threads = 8;
//! let summary = Indexer::new(config, default_analyzer())
//!     .unwrap()
//!     .run()
//!     .unwrap();
//! let stats = &summary.stats;
//! println!("{} datasets, {} errors", stats.datasets, stats.errors);
//!
//! let index =
//!     SearchIndex::open("/data/index".as_ref(), default_analyzer()).unwrap();
//! for hit in index.search("protein interaction", 10).unwrap() {
//!     println!("{}. {} {}", hit.rank, hit.id, hit.title);
//! }
//! ```

pub mod annotations;
pub mod builder;
pub mod config;
pub mod context;
pub mod data_dir;
pub mod descriptor;
pub mod document;
pub mod error;
pub mod pipeline;
pub mod status;
pub mod tantivy_index;
pub mod triples;
pub mod walker;

pub use builder::{DatasetBuild, DatasetDocumentBuilder, DatasetError};
pub use config::IndexerConfig;
pub use context::{ErrorRecord, IngestStats, SharedIndexingContext};
pub use data_dir::DataDir;
pub use document::{Bucket, DatasetDocument, DatasetField};
pub use error::{Error, Result};
pub use pipeline::{
    Indexer,
    RunSummary,
    index,
    update_from_mined_annotations,
    update_index_from_annotations,
};
pub use status::IngestStatus;
pub use tantivy_index::SearchIndex;
