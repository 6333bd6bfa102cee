//! Streaming extraction of metadata fields from `dataset.json`.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use encoding_rs::Encoding;
use serde::de::{
    DeserializeSeed,
    Deserializer,
    IgnoredAny,
    MapAccess,
    Visitor,
};
use serde_json::Value;

use crate::{
    document::{DatasetDocument, DatasetField},
    error::{Error, Result},
};

/// File name of the per-dataset metadata descriptor.
pub const DESCRIPTOR_FILE: &str = "dataset.json";

/// Separator used inside the `tags` string.
const TAG_SEPARATOR: char = ';';

/// How much of the descriptor to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Walk the whole object, skipping keys outside the whitelist.
    Full,
    /// Stop at the first key outside the whitelist without reading the
    /// rest of the stream.
    MetadataOnly,
}

/// Fields gathered from a descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorFields {
    pub document: DatasetDocument,
    /// Set when [`ReadMode::MetadataOnly`] stopped before the end of the
    /// object.
    pub stopped_early: bool,
}

#[derive(Debug, Clone, Copy)]
enum MetaKey {
    DatasetId,
    Title,
    Description,
    Author,
    Tags,
}

impl MetaKey {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "dataset_id" => Some(Self::DatasetId),
            "title" => Some(Self::Title),
            "description" => Some(Self::Description),
            "author" => Some(Self::Author),
            "tags" => Some(Self::Tags),
            _ => None,
        }
    }
}

struct DescriptorSeed<'a> {
    fields: &'a mut DescriptorFields,
    mode: ReadMode,
}

impl<'de> DeserializeSeed<'de> for DescriptorSeed<'_> {
    type Value = ();

    fn deserialize<D>(
        self,
        deserializer: D,
    ) -> std::result::Result<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for DescriptorSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a dataset descriptor object")
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        while let Some(key) = map.next_key::<String>()? {
            match MetaKey::from_key(&key) {
                Some(meta) => {
                    let value: Value = map.next_value()?;
                    apply(meta, &value, &mut self.fields.document);
                }
                None if self.mode == ReadMode::MetadataOnly => {
                    self.fields.stopped_early = true;
                    return Ok(());
                }
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(())
    }
}

fn apply(key: MetaKey, value: &Value, doc: &mut DatasetDocument) {
    let mut texts = Vec::new();
    collect_text(value, &mut texts);

    for text in texts {
        match key {
            MetaKey::DatasetId => {
                doc.set_id_if_absent(text);
            }
            MetaKey::Title => doc.push(DatasetField::Title, text),
            MetaKey::Description => doc.push(DatasetField::Description, text),
            MetaKey::Author => doc.push(DatasetField::Author, text),
            // Empty segments are kept, "a;;b" yields three tags.
            MetaKey::Tags => {
                for tag in text.split(TAG_SEPARATOR) {
                    doc.push(DatasetField::Tags, tag);
                }
            }
        }
    }
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Number(n) => out.push(n.to_string()),
        Value::Bool(b) => out.push(b.to_string()),
        Value::Array(items) => {
            for item in items {
                if !item.is_array() {
                    collect_text(item, out);
                }
            }
        }
        Value::Null | Value::Object(_) => {}
    }
}

/// Read whitelisted metadata fields from a JSON descriptor stream.
///
/// Only `dataset_id`, `title`, `description`, `author` and `tags` are
/// interpreted; everything else is skipped without being materialized.
pub fn read_descriptor<R: Read>(
    reader: R,
    mode: ReadMode,
) -> serde_json::Result<DescriptorFields> {
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut fields = DescriptorFields::default();

    let outcome = DescriptorSeed {
        fields: &mut fields,
        mode,
    }
    .deserialize(&mut de);

    match outcome {
        Ok(()) => {
            de.end()?;
            Ok(fields)
        }
        // The deserializer complains about the unread remainder of the
        // object; that remainder is exactly what we chose not to read.
        Err(_) if fields.stopped_early => Ok(fields),
        Err(e) => Err(e),
    }
}

const UTF_8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Read a descriptor file, decoding it with `encoding` first when it is
/// not UTF-8. A leading byte order mark is skipped.
pub fn read_descriptor_file(
    path: &Path,
    mode: ReadMode,
    encoding: &'static Encoding,
) -> Result<DescriptorFields> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => {
            Error::MissingDescriptor(path.to_path_buf())
        }
        _ => Error::Io(e),
    })?;

    let parsed = if encoding == encoding_rs::UTF_8 {
        let mut reader = BufReader::new(file);
        if reader.fill_buf()?.starts_with(UTF_8_BOM) {
            reader.consume(UTF_8_BOM.len());
        }
        read_descriptor(reader, mode)
    } else {
        let mut bytes = Vec::new();
        BufReader::new(file).read_to_end(&mut bytes)?;
        let (text, _, _) = encoding.decode(&bytes);
        read_descriptor(text.as_bytes(), mode)
    };

    parsed.map_err(|source| Error::Descriptor {
        path: path.to_path_buf(),
        source,
    })
}
