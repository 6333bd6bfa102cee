use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use dsindex::{
    config::{DEFAULT_CHARSET, DEFAULT_RAM_BUFFER_MB},
    status::DEFAULT_STATUS_KEY,
};

#[derive(Debug, Parser)]
#[command(
    name = "dsindex",
    about = "Build a full-text index over a collection of RDF datasets"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Index every dataset directory under a root
    Index(IndexArgs),
    /// Merge a mined annotation file into one indexed dataset
    Merge(MergeArgs),
    /// Merge every mined annotation file under a root into the index
    MergeAll(MergeAllArgs),
    /// Search the index
    Search(SearchArgs),
    /// Show the ingest status recorded in a dataset descriptor
    Status(StatusArgs),
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory holding one subdirectory per dataset
    pub datasets_dir: PathBuf,

    /// Index directory (defaults to <data-dir>/index)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Index writer memory budget in MiB
    #[arg(long, default_value_t = DEFAULT_RAM_BUFFER_MB)]
    pub ram_buffer_mb: usize,

    /// Encoding of the dataset.json descriptors
    #[arg(long, default_value = DEFAULT_CHARSET)]
    pub charset: String,

    /// Number of datasets the run is expected to index
    #[arg(long)]
    pub expected: Option<u64>,

    /// Worker threads (defaults to the number of CPUs)
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Error log (defaults to <data-dir>/errors.log)
    #[arg(long)]
    pub error_log: Option<PathBuf>,

    /// Dataset directory name or id to leave out (repeatable)
    #[arg(long = "skip", value_name = "ID")]
    pub skip: Vec<String>,

    /// Descriptor key the ingest status is written under
    #[arg(long, default_value = DEFAULT_STATUS_KEY)]
    pub status_key: String,

    /// Skip datasets that are already in the index
    #[arg(long)]
    pub resume: bool,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Id of the indexed dataset
    pub dataset_id: String,

    /// Mined annotation JSON file
    pub annotation_file: PathBuf,

    /// Index directory (defaults to <data-dir>/index)
    #[arg(long)]
    pub index: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MergeAllArgs {
    /// Directory holding one subdirectory per dataset
    pub datasets_dir: PathBuf,

    /// Index directory (defaults to <data-dir>/index)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Dataset directory name or id to leave out (repeatable)
    #[arg(long = "skip", value_name = "ID")]
    pub skip: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Index directory (defaults to <data-dir>/index)
    #[arg(long)]
    pub index: Option<PathBuf>,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = 10)]
    pub count: usize,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Dataset directory
    pub dataset_dir: PathBuf,

    /// Descriptor key the ingest status is read from
    #[arg(long, default_value = DEFAULT_STATUS_KEY)]
    pub status_key: String,

    /// Encoding of the descriptor
    #[arg(long, default_value = DEFAULT_CHARSET)]
    pub charset: String,
}
