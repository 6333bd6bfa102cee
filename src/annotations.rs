//! Pre-mined annotation files.
//!
//! Some datasets could not be parsed in-process and were mined out of band.
//! The results sit next to the descriptor as `<name>-scriptmined.json` with
//! already-classified `classes`, `entities`, `literals` and `properties`
//! arrays, which bypass triple classification entirely.

use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    document::{Bucket, DatasetDocument},
    error::Result,
};

/// Marker in the file name of a pre-mined annotation file.
pub const ANNOTATION_MARKER: &str = "-scriptmined";

#[derive(Debug, Default, Deserialize)]
struct MinedAnnotations {
    #[serde(default)]
    classes: Vec<Value>,
    #[serde(default)]
    entities: Vec<Value>,
    #[serde(default)]
    literals: Vec<Value>,
    #[serde(default)]
    properties: Vec<Value>,
}

impl MinedAnnotations {
    fn bucket(&self, bucket: Bucket) -> &[Value] {
        match bucket {
            Bucket::Classes => &self.classes,
            Bucket::Entities => &self.entities,
            Bucket::Literals => &self.literals,
            Bucket::Properties => &self.properties,
        }
    }
}

pub fn is_annotation_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(ANNOTATION_MARKER))
}

/// Merge the annotation arrays of `path` into `doc`.
///
/// Non-string array elements are ignored. Returns the number of values
/// added.
pub fn merge_annotations(
    path: &Path,
    doc: &mut DatasetDocument,
) -> Result<usize> {
    let file = File::open(path)?;
    let mined: MinedAnnotations =
        serde_json::from_reader(BufReader::new(file))?;

    let mut added = 0;
    for bucket in Bucket::ALL {
        for value in mined.bucket(bucket) {
            if let Some(text) = value.as_str() {
                doc.push_bucket(bucket, text);
                added += 1;
            }
        }
    }
    Ok(added)
}
