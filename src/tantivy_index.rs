use std::{collections::HashSet, path::Path};

use serde::Serialize;
use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    Term,
    collector::TopDocs,
    query::{QueryParser, TermQuery},
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::{
    document::{DatasetDocument, DatasetField},
    error::{Error, Result},
};

/// Name the text analyzer is registered under.
pub const ANALYZER_NAME: &str = "dataset";

/// Smallest writer budget tantivy accepts comfortably.
pub const MIN_WRITER_BUDGET: usize = 15_000_000;

/// Per-field BM25 boosts applied by [`SearchIndex::search`].
pub const FIELD_BOOSTS: [(DatasetField, f32); 8] = [
    (DatasetField::Title, 1.0),
    (DatasetField::Description, 0.9),
    (DatasetField::Author, 0.9),
    (DatasetField::Tags, 0.6),
    (DatasetField::Entities, 0.2),
    (DatasetField::Literals, 0.3),
    (DatasetField::Classes, 0.1),
    (DatasetField::Properties, 0.1),
];

/// Manages the tantivy index holding one document per dataset.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Debug, Clone, Copy)]
struct SchemaFields {
    id: Field,
    text: [Field; 8],
}

impl SchemaFields {
    fn resolve(schema: &Schema) -> Result<Self> {
        let mut text = [Field::from_field_id(0); 8];
        for (slot, field) in text.iter_mut().zip(DatasetField::TEXT) {
            *slot = schema.get_field(field.as_str())?;
        }
        Ok(Self {
            id: schema.get_field(DatasetField::Id.as_str())?,
            text,
        })
    }

    fn get(&self, field: DatasetField) -> Field {
        DatasetField::TEXT
            .iter()
            .position(|f| *f == field)
            .map_or(self.id, |i| self.text[i])
    }

    fn text(&self) -> Vec<Field> {
        self.text.to_vec()
    }
}

/// A ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// 1-based, counting only distinct datasets.
    pub rank: usize,
    pub score: f32,
    pub id: String,
    pub title: String,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();
    builder.add_text_field(DatasetField::Id.as_str(), STRING | STORED);

    for field in DatasetField::TEXT {
        let opts = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(ANALYZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();
        builder.add_text_field(field.as_str(), opts);
    }

    builder.build()
}

/// English analyzer used unless the caller supplies its own.
pub fn default_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build()
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path, analyzer: TextAnalyzer) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index, analyzer)
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram(analyzer: TextAnalyzer) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), analyzer)
    }

    fn from_index(index: Index, analyzer: TextAnalyzer) -> Result<Self> {
        index.tokenizers().register(ANALYZER_NAME, analyzer);
        let fields = SchemaFields::resolve(&index.schema())?;
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget.max(MIN_WRITER_BUDGET))?)
    }

    /// Add a dataset document, replacing any document with the same id.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        doc: &DatasetDocument,
    ) -> Result<()> {
        let id = doc.id().ok_or_else(|| Error::NotFound {
            kind: "dataset id",
            name: doc.first(DatasetField::Title).unwrap_or("").to_string(),
        })?;

        let mut stored = TantivyDocument::new();
        stored.add_text(self.fields.id, id);
        for (field, value) in doc.entries() {
            stored.add_text(self.fields.get(field), value);
        }

        writer.delete_term(Term::from_field_text(self.fields.id, id));
        writer.add_document(stored)?;
        Ok(())
    }

    /// Load the committed document for `id`.
    pub fn get_document(&self, id: &str) -> Result<Option<DatasetDocument>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let query = TermQuery::new(
            Term::from_field_text(self.fields.id, id),
            IndexRecordOption::Basic,
        );
        let top_docs = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_, address)) = top_docs.into_iter().next() else {
            return Ok(None);
        };

        let stored: TantivyDocument = searcher.doc(address)?;
        let mut doc = DatasetDocument::with_id(id);
        for field in DatasetField::TEXT {
            for value in stored.get_all(self.fields.get(field)) {
                if let Some(text) = value.as_str() {
                    doc.push(field, text);
                }
            }
        }
        Ok(Some(doc))
    }

    pub fn contains(&self, id: &str) -> Result<bool> {
        self.reader.reload()?;
        let query = TermQuery::new(
            Term::from_field_text(self.fields.id, id),
            IndexRecordOption::Basic,
        );
        let top_docs =
            self.reader.searcher().search(&query, &TopDocs::with_limit(1))?;
        Ok(!top_docs.is_empty())
    }

    /// Number of committed documents.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }

    /// Search the index with BM25 scoring across every text field.
    ///
    /// Hits sharing an id are collapsed onto the best-scoring one and ranks
    /// count distinct datasets only.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let mut parser =
            QueryParser::for_index(&self.index, self.fields.text());
        for (field, boost) in FIELD_BOOSTS {
            parser.set_field_boost(self.fields.get(field), boost);
        }

        let (query, _errors) = parser.parse_query_lenient(query_str);
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut seen = HashSet::new();
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let id = extract_text(&doc, self.fields.id);
            if !seen.insert(id.clone()) {
                continue;
            }
            hits.push(SearchHit {
                rank: hits.len() + 1,
                score,
                id,
                title: extract_text(
                    &doc,
                    self.fields.get(DatasetField::Title),
                ),
            });
        }

        Ok(hits)
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
