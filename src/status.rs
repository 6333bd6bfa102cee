use std::{io::Write, path::Path};

use encoding_rs::Encoding;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Descriptor key the ingest status is written under, unless configured
/// otherwise.
pub const DEFAULT_STATUS_KEY: &str = "indexable";

/// How much of a dataset's graph content made it into the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestStatus {
    Empty = 0,
    Partial = 1,
    Full = 2,
}

impl IngestStatus {
    /// Status for `parsed` successfully parsed files out of `total`.
    ///
    /// A dataset without graph files is `Empty`.
    pub fn from_counts(parsed: usize, total: usize) -> Self {
        if parsed == 0 {
            IngestStatus::Empty
        } else if parsed >= total {
            IngestStatus::Full
        } else {
            IngestStatus::Partial
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(IngestStatus::Empty),
            1 => Some(IngestStatus::Partial),
            2 => Some(IngestStatus::Full),
            _ => None,
        }
    }
}

impl std::fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestStatus::Empty => "empty",
            IngestStatus::Partial => "partial",
            IngestStatus::Full => "full",
        };
        f.write_str(name)
    }
}

static UTF_8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// A descriptor as decoded from disk, with what it takes to encode it back.
struct RawDescriptor {
    object: Map<String, Value>,
    encoding: &'static Encoding,
    bom: &'static [u8],
    lossless: bool,
}

fn read_object(
    path: &Path,
    encoding: &'static Encoding,
) -> Result<RawDescriptor> {
    let bytes = std::fs::read(path)?;
    let (text, encoding, malformed) = encoding.decode(&bytes);
    let bom: &'static [u8] = match Encoding::for_bom(&bytes) {
        Some((bom_encoding, _)) if bom_encoding == encoding_rs::UTF_8 => {
            &UTF_8_BOM
        }
        _ => &[],
    };

    let descriptor_error = |source| Error::Descriptor {
        path: path.to_path_buf(),
        source,
    };
    match serde_json::from_str::<Value>(&text).map_err(descriptor_error)? {
        Value::Object(object) => Ok(RawDescriptor {
            object,
            encoding,
            bom,
            lossless: !malformed,
        }),
        _ => {
            use serde::de::Error as _;
            Err(descriptor_error(serde_json::Error::custom(
                "descriptor root is not an object",
            )))
        }
    }
}

/// Record `status` under `key` in the descriptor at `path`.
///
/// An existing `key` is overwritten in place; every other key keeps its
/// position and value. The file keeps its encoding and byte order mark
/// and is replaced atomically. A descriptor that would not survive the
/// trip back to its encoding is left untouched and reported as
/// [`Error::Encoding`].
pub fn write_status(
    path: &Path,
    key: &str,
    status: IngestStatus,
    encoding: &'static Encoding,
) -> Result<()> {
    let raw = read_object(path, encoding)?;
    let encoding = raw.encoding;
    let unwritable = || Error::Encoding {
        path: path.to_path_buf(),
        encoding: encoding.name(),
    };
    // UTF-16 and replacement decoders have no matching encoder.
    if !raw.lossless || encoding.output_encoding() != encoding {
        return Err(unwritable());
    }

    let mut object = raw.object;
    object.insert(key.to_string(), Value::from(status.code()));
    let text = serde_json::to_string(&object)?;
    let (bytes, _, unmappable) = encoding.encode(&text);
    if unmappable {
        return Err(unwritable());
    }

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(raw.bom)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    let permissions = std::fs::metadata(path)?.permissions();
    std::fs::set_permissions(tmp.path(), permissions)?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// The status currently recorded in the descriptor, if any.
pub fn read_status(
    path: &Path,
    key: &str,
    encoding: &'static Encoding,
) -> Result<Option<IngestStatus>> {
    let raw = read_object(path, encoding)?;
    Ok(raw
        .object
        .get(key)
        .and_then(Value::as_u64)
        .and_then(IngestStatus::from_code))
}
