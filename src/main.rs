use std::path::{Path, PathBuf};

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{
    Cli,
    Command,
    IndexArgs,
    MergeAllArgs,
    MergeArgs,
    SearchArgs,
    StatusArgs,
};
use dsindex::{
    DataDir,
    Error,
    Indexer,
    IndexerConfig,
    Result,
    RunSummary,
    SearchIndex,
    config::charset_from_label,
    descriptor::DESCRIPTOR_FILE,
    pipeline,
    status::read_status,
    tantivy_index::default_analyzer,
};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("DSINDEX_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Index(args) => cmd_index(&data_dir, args),
        Command::Merge(args) => cmd_merge(&data_dir, &args),
        Command::MergeAll(args) => cmd_merge_all(&data_dir, args),
        Command::Search(args) => cmd_search(&data_dir, &args),
        Command::Status(args) => cmd_status(&args),
    }
}

fn index_dir(data_dir: &DataDir, explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => data_dir.index_dir(),
    }
}

fn cmd_index(data_dir: &DataDir, args: IndexArgs) -> Result<()> {
    let index = index_dir(data_dir, args.index.as_deref())?;
    let mut config = IndexerConfig::new(args.datasets_dir, index)
        .with_charset(&args.charset)?
        .with_denylist(args.skip);
    config.ram_buffer_mb = args.ram_buffer_mb;
    config.expected_datasets = args.expected;
    config.error_log = args.error_log.unwrap_or_else(|| data_dir.error_log());
    config.status_key = args.status_key;
    config.resume = args.resume;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }

    let error_log = config.error_log.clone();
    let summary = Indexer::new(config, default_analyzer())?.run()?;
    print_summary(&summary, &error_log);
    Ok(())
}

fn print_summary(summary: &RunSummary, error_log: &Path) {
    let stats = &summary.stats;
    println!("Datasets indexed: {}", stats.datasets);
    println!("Datasets skipped: {}", summary.skipped);
    println!("Graph files:      {}", stats.files);
    println!("Bytes:            {}", stats.bytes);
    println!("Errors:           {}", stats.errors);
    println!("Elapsed:          {:.1}s", summary.elapsed.as_secs_f64());
    if stats.errors > 0 {
        println!("Error log:        {}", error_log.display());
    }
    if let Some((expected, indexed)) = summary.count_mismatch() {
        println!("Expected {expected} datasets, indexed {indexed}");
    }
}

fn cmd_merge(data_dir: &DataDir, args: &MergeArgs) -> Result<()> {
    let index = index_dir(data_dir, args.index.as_deref())?;
    let added = pipeline::update_from_mined_annotations(
        &index,
        default_analyzer(),
        &args.dataset_id,
        &args.annotation_file,
    )?;
    println!("Merged {added} values into dataset '{}'", args.dataset_id);
    Ok(())
}

fn cmd_merge_all(data_dir: &DataDir, args: MergeAllArgs) -> Result<()> {
    let index = index_dir(data_dir, args.index.as_deref())?;
    let config =
        IndexerConfig::new(args.datasets_dir, index).with_denylist(args.skip);
    if !config.datasets_dir.is_dir() {
        return Err(Error::Config(format!(
            "datasets directory is not a readable directory: {}",
            config.datasets_dir.display()
        )));
    }

    let merged =
        pipeline::update_index_from_annotations(&config, default_analyzer())?;
    println!("Merged {merged} annotation file(s)");
    Ok(())
}

fn cmd_search(data_dir: &DataDir, args: &SearchArgs) -> Result<()> {
    let index = index_dir(data_dir, args.index.as_deref())?;
    let search_index = SearchIndex::open(&index, default_analyzer())?;
    let hits = search_index.search(&args.query, args.count)?;

    if args.json {
        let output = serde_json::json!({
            "query": args.query,
            "result_count": hits.len(),
            "results": hits,
        });
        println!("{output}");
    } else if hits.is_empty() {
        println!("No results for '{}'", args.query);
    } else {
        for hit in &hits {
            println!(
                "{:>3}. {:.4}  {}  {}",
                hit.rank, hit.score, hit.id, hit.title
            );
        }
    }
    Ok(())
}

fn cmd_status(args: &StatusArgs) -> Result<()> {
    let descriptor = args.dataset_dir.join(DESCRIPTOR_FILE);
    let encoding = charset_from_label(&args.charset)?;

    match read_status(&descriptor, &args.status_key, encoding)? {
        Some(status) => {
            println!(
                "{}: {status} ({})",
                args.dataset_dir.display(),
                status.code()
            );
        }
        None => println!("{}: not indexed", args.dataset_dir.display()),
    }
    Ok(())
}
