//! Streaming triple extraction and term classification.

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use oxigraph::{
    io::{RdfFormat, RdfParser},
    model::{NamedNode, Quad, Term},
};
use percent_encoding::{AsciiSet, CONTROLS, percent_encode};

use crate::{
    document::{Bucket, DatasetDocument},
    error::{Error, Result},
};

/// File extensions recognized as graph files.
pub const GRAPH_EXTENSIONS: &[&str] = &[
    "rdf", "rdfs", "ttl", "owl", "n3", "nt", "jsonld", "xml", "ntriples",
];

/// A triple whose subject and object have been assigned a bucket.
///
/// Every component is a plain string, empty when the term has no textual
/// form, so a triple always contributes three values to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedTriple {
    pub subject: (Bucket, String),
    pub predicate: String,
    pub object: (Bucket, String),
}

impl ClassifiedTriple {
    /// Add the subject, predicate (as a property) and object to `doc`.
    pub fn contribute(self, doc: &mut DatasetDocument) {
        let (subject_bucket, subject) = self.subject;
        let (object_bucket, object) = self.object;
        doc.push_bucket(subject_bucket, subject);
        doc.push_bucket(Bucket::Properties, self.predicate);
        doc.push_bucket(object_bucket, object);
    }
}

pub fn is_graph_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| GRAPH_EXTENSIONS.contains(&ext))
}

/// Map a graph file extension to the parser format.
pub fn graph_format(path: &Path) -> Option<RdfFormat> {
    let ext = path.extension()?.to_str()?;
    let canonical = match ext {
        "rdfs" | "owl" | "xml" => "rdf",
        "ntriples" => "nt",
        other => other,
    };
    RdfFormat::from_extension(canonical)
}

/// The local part of an IRI: whatever follows the last `#`, `/` or `:`.
///
/// IRIs with an empty local part are returned whole.
pub fn local_name(iri: &str) -> &str {
    let cut = iri
        .rfind('#')
        .or_else(|| iri.rfind('/'))
        .or_else(|| iri.rfind(':'));
    match cut {
        Some(i) if i + 1 < iri.len() => &iri[i + 1..],
        _ => iri,
    }
}

/// Textual form of a term: the local name of an IRI, the lexical form of a
/// literal, the full text of anything else.
pub fn render_term(term: &Term) -> String {
    #[allow(unreachable_patterns)]
    match term {
        Term::NamedNode(node) => local_name(node.as_str()).to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        Term::BlankNode(node) => node.to_string(),
        other => other.to_string(),
    }
}

/// Classify one triple.
///
/// A subject is a class or a property only when the predicate is `type`
/// and the object reads `Class` or `Property`; every other subject is an
/// entity. Objects are literals or entities.
pub fn classify(
    subject: &Term,
    predicate: &NamedNode,
    object: &Term,
) -> ClassifiedTriple {
    let predicate = local_name(predicate.as_str()).to_string();
    let subject_value = render_term(subject);
    let object_value = render_term(object);

    let subject_bucket = if predicate == "type" {
        match object_value.as_str() {
            "Property" => Bucket::Properties,
            "Class" => Bucket::Classes,
            _ => Bucket::Entities,
        }
    } else {
        Bucket::Entities
    };

    let object_bucket = match object {
        Term::Literal(_) => Bucket::Literals,
        _ => Bucket::Entities,
    };

    ClassifiedTriple {
        subject: (subject_bucket, subject_value),
        predicate,
        object: (object_bucket, object_value),
    }
}

fn classify_quad(quad: Quad) -> ClassifiedTriple {
    let subject: Term = quad.subject.into();
    classify(&subject, &quad.predicate, &quad.object)
}

/// Characters escaped in the path of a `file:` base IRI.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// `file:` IRI for an absolute path, percent-encoding anything an IRI
/// cannot carry verbatim.
fn file_iri(abs: &Path) -> String {
    let bytes = abs.as_os_str().as_encoded_bytes();
    let encoded = percent_encode(bytes, PATH_ESCAPE).to_string();
    if encoded.starts_with('/') {
        format!("file://{encoded}")
    } else {
        format!("file:///{encoded}")
    }
}

type QuadIter = Box<dyn Iterator<Item = std::result::Result<Quad, String>>>;

/// Pull-based stream of classified triples from one graph file.
///
/// The file handle is released by [`GraphStream::close`], on the first
/// parse error, at end of input, or on drop, whichever comes first.
pub struct GraphStream {
    path: PathBuf,
    quads: Option<QuadIter>,
}

impl GraphStream {
    pub fn open(path: &Path) -> Result<Self> {
        let format = graph_format(path)
            .ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;
        let file = File::open(path)?;

        let base = path
            .canonicalize()
            .map(|abs| file_iri(&abs))
            .unwrap_or_default();
        let parser = match RdfParser::from_format(format).with_base_iri(&base)
        {
            Ok(parser) => parser,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    base = %base,
                    error = %e,
                    "parsing without base IRI"
                );
                RdfParser::from_format(format)
            }
        };

        let quads = parser
            .for_reader(BufReader::new(file))
            .map(|quad| quad.map_err(|e| e.to_string()));

        Ok(Self {
            path: path.to_path_buf(),
            quads: Some(Box::new(quads)),
        })
    }

    pub fn close(&mut self) {
        self.quads = None;
    }
}

impl Iterator for GraphStream {
    type Item = Result<ClassifiedTriple>;

    fn next(&mut self) -> Option<Self::Item> {
        let quads = self.quads.as_mut()?;
        match quads.next() {
            Some(Ok(quad)) => Some(Ok(classify_quad(quad))),
            Some(Err(message)) => {
                self.close();
                Some(Err(Error::Graph {
                    path: self.path.clone(),
                    message,
                }))
            }
            None => {
                self.close();
                None
            }
        }
    }
}

impl std::fmt::Debug for GraphStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStream")
            .field("path", &self.path)
            .field("open", &self.quads.is_some())
            .finish()
    }
}
