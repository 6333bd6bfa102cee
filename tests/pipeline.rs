use std::path::{Path, PathBuf};

use dsindex::{
    Indexer,
    IndexerConfig,
    IngestStats,
    IngestStatus,
    RunSummary,
    SearchIndex,
    status::read_status,
    tantivy_index::default_analyzer,
};

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

const BIRDS_TTL: &str = "\
@prefix ex: <http://example.org/birds#> .
@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .
@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .

ex:Sparrow rdf:type rdfs:Class .
ex:hasWingspan rdf:type rdf:Property .
ex:jack rdf:type ex:Sparrow ;
    ex:hasWingspan \"21cm\" .
";

const FISH_NT: &str = "\
<http://example.org/fish/nemo> <http://example.org/fish/swimsIn> \"reef\" .
<http://example.org/fish/nemo> <http://example.org/fish/friendOf> _:dory .
";

fn write_dataset(
    root: &Path,
    name: &str,
    files: &[(&str, &str)],
) -> TestResult<PathBuf> {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir)?;
    for (file, content) in files {
        std::fs::write(dir.join(file), content)?;
    }
    Ok(dir)
}

/// Eight datasets covering every status plus one denylisted and one
/// descriptor-less directory.
fn corpus(root: &Path) -> TestResult {
    write_dataset(root, "dataset-1", &[
        ("dataset.json", r#"{"dataset_id":"1","title":"Birds","tags":"nature;;air"}"#),
        ("birds.ttl", BIRDS_TTL),
    ])?;
    write_dataset(root, "dataset-2", &[
        ("dataset.json", r#"{"dataset_id":"2","title":"Fish","author":"Ada"}"#),
        ("fish.nt", FISH_NT),
        ("broken.ttl", "@prefix ex: <http://e.org/> . ex:a ex:b"),
    ])?;
    write_dataset(root, "dataset-3", &[(
        "dataset.json",
        r#"{"dataset_id":"3","title":"Empty","description":"no graphs"}"#,
    )])?;
    write_dataset(root, "dataset-4", &[
        ("dataset.json", r#"{"title":"Unnamed","size":1.50}"#),
        ("data.nt", FISH_NT),
        ("notes.txt", "not a graph"),
    ])?;
    write_dataset(root, "dataset-5", &[
        ("dataset.json", r#"{"dataset_id":"5","title":"Mined"}"#),
        (
            "dataset-5-scriptmined.json",
            r#"{"classes":["Galaxy"],"entities":["andromeda"]}"#,
        ),
    ])?;
    write_dataset(root, "dataset-6", &[("orphan.ttl", BIRDS_TTL)])?;
    write_dataset(root, "dataset-11580", &[
        ("dataset.json", r#"{"dataset_id":"11580","title":"Denied"}"#),
        ("huge.ttl", BIRDS_TTL),
    ])?;
    for i in 7..=9 {
        let descriptor =
            format!(r#"{{"dataset_id":"{i}","title":"Extra {i}"}}"#);
        write_dataset(root, &format!("dataset-{i}"), &[
            ("dataset.json", descriptor.as_str()),
            ("extra.nt", FISH_NT),
        ])?;
    }
    Ok(())
}

fn run(tmp: &Path, threads: usize) -> TestResult<(RunSummary, IndexerConfig)> {
    let root = tmp.join("datasets");
    corpus(&root)?;

    let mut config = IndexerConfig::new(&root, tmp.join("index"))
        .with_denylist(["dataset-11580"]);
    config.threads = threads;
    config.ram_buffer_mb = 16;
    config.error_log = tmp.join("errors.log");
    config.commit_interval = 3;

    let summary = Indexer::new(config.clone(), default_analyzer())?.run()?;
    Ok((summary, config))
}

fn status_of(root: &Path, name: &str) -> TestResult<Option<IngestStatus>> {
    let descriptor = root.join(name).join("dataset.json");
    Ok(read_status(&descriptor, "indexable", encoding_rs::UTF_8)?)
}

#[test]
fn single_and_multi_threaded_runs_agree() -> TestResult {
    let one = tempfile::tempdir()?;
    let four = tempfile::tempdir()?;

    let (single, _) = run(one.path(), 1)?;
    let (multi, _) = run(four.path(), 4)?;

    assert_eq!(single.stats, multi.stats);
    assert_eq!(single.skipped, multi.skipped);
    assert_eq!(single.stats, IngestStats {
        datasets: 8,
        files: 7,
        bytes: single.stats.bytes,
        errors: 2,
    });
    assert_eq!(
        single.stats.bytes,
        (BIRDS_TTL.len() + 5 * FISH_NT.len() + 39) as u64
    );
    Ok(())
}

#[test]
fn statuses_are_written_back() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (_, config) = run(tmp.path(), 4)?;
    let root = &config.datasets_dir;

    assert_eq!(status_of(root, "dataset-1")?, Some(IngestStatus::Full));
    assert_eq!(status_of(root, "dataset-2")?, Some(IngestStatus::Partial));
    assert_eq!(status_of(root, "dataset-3")?, Some(IngestStatus::Empty));
    assert_eq!(status_of(root, "dataset-5")?, Some(IngestStatus::Empty));
    assert_eq!(status_of(root, "dataset-11580")?, None);

    // Untouched keys keep their order and number formatting.
    let text = std::fs::read_to_string(root.join("dataset-4/dataset.json"))?;
    assert_eq!(text, r#"{"title":"Unnamed","size":1.50,"indexable":2}"#);
    Ok(())
}

#[test]
fn denylisted_dataset_is_never_read() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (summary, config) = run(tmp.path(), 2)?;

    assert_eq!(summary.skipped, 1);
    let log = std::fs::read_to_string(&config.error_log)?;
    assert!(!log.contains("dataset-11580"));

    let index = SearchIndex::open(&config.index_dir, default_analyzer())?;
    assert!(!index.contains("11580")?);
    Ok(())
}

#[test]
fn error_log_names_dataset_and_file() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (_, config) = run(tmp.path(), 3)?;

    let log = std::fs::read_to_string(&config.error_log)?;
    let records: Vec<serde_json::Value> = log
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 2);

    let mut pairs: Vec<(String, String)> = records
        .iter()
        .map(|r| {
            (
                r["dataset"].as_str().unwrap_or_default().to_string(),
                r["file"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    pairs.sort();
    assert_eq!(pairs, vec![
        ("dataset-2".to_string(), "broken.ttl".to_string()),
        ("dataset-6".to_string(), "dataset.json".to_string()),
    ]);
    Ok(())
}

#[test]
fn index_is_searchable_after_run() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (_, config) = run(tmp.path(), 4)?;
    let index = SearchIndex::open(&config.index_dir, default_analyzer())?;

    assert_eq!(index.num_docs()?, 8);
    assert_eq!(index.search("sparrow", 10)?[0].id, "1");
    assert_eq!(index.search("galaxy", 10)?[0].id, "5");
    // The id of dataset-4 comes from its directory name.
    assert!(index.contains("4")?);

    let reef: Vec<_> =
        index.search("reef", 10)?.into_iter().map(|h| h.id).collect();
    assert_eq!(reef.len(), 5);
    assert!(reef.contains(&"2".to_string()));
    Ok(())
}

#[test]
fn rerunning_replaces_documents() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (_, config) = run(tmp.path(), 2)?;
    let summary = Indexer::new(config.clone(), default_analyzer())?.run()?;

    assert_eq!(summary.stats.datasets, 8);
    let index = SearchIndex::open(&config.index_dir, default_analyzer())?;
    assert_eq!(index.num_docs()?, 8);
    Ok(())
}

#[test]
fn oversize_graph_file_is_skipped() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("datasets");
    let dir = write_dataset(&root, "dataset-1", &[
        ("dataset.json", r#"{"dataset_id":"1"}"#),
        ("small.nt", FISH_NT),
    ])?;
    // Sparse file just over 500 MiB; it must never be opened for parsing.
    let big = std::fs::File::create(dir.join("big.ttl"))?;
    big.set_len(500 * 1024 * 1024 + 1)?;

    let mut config = IndexerConfig::new(&root, tmp.path().join("index"));
    config.threads = 1;
    config.ram_buffer_mb = 16;
    config.error_log = tmp.path().join("errors.log");
    let summary = Indexer::new(config.clone(), default_analyzer())?.run()?;

    assert_eq!(summary.stats.files, 1);
    assert_eq!(summary.stats.bytes, FISH_NT.len() as u64);
    assert_eq!(summary.stats.errors, 1);
    assert_eq!(status_of(&root, "dataset-1")?, Some(IngestStatus::Partial));

    let log = std::fs::read_to_string(&config.error_log)?;
    assert!(log.contains("bigger than 500 MB"));
    Ok(())
}

#[test]
fn convenience_entry_point() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().join("datasets");
    write_dataset(&root, "dataset-1", &[
        ("dataset.json", r#"{"dataset_id":"1","title":"Birds"}"#),
        ("birds.ttl", BIRDS_TTL),
    ])?;

    let summary = dsindex::index(
        &root,
        &tmp.path().join("out/index"),
        default_analyzer(),
        16,
        "UTF-8",
        2,
    )?;
    assert_eq!(summary.stats.datasets, 1);
    assert_eq!(summary.count_mismatch(), Some((2, 1)));
    Ok(())
}

#[test]
fn bulk_annotation_update() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let (_, config) = run(tmp.path(), 2)?;

    std::fs::write(
        config.datasets_dir.join("dataset-3/dataset-3-scriptmined.json"),
        r#"{"literals":["nebula"]}"#,
    )?;
    let merged =
        dsindex::update_index_from_annotations(&config, default_analyzer())?;
    // dataset-3 plus the file dataset-5 already had.
    assert_eq!(merged, 2);

    let index = SearchIndex::open(&config.index_dir, default_analyzer())?;
    assert_eq!(index.search("nebula", 10)?[0].id, "3");
    assert_eq!(index.num_docs()?, 8);
    Ok(())
}
