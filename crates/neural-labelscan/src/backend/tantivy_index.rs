//! On-disk label index backed by tantivy.
//!
//! Schema:
//! - `node_id` (u64, indexed + fast): one document per node, deleted by term
//! - `label` (u64, indexed, multi-valued): the inverted label lists
//! - `document` (bytes, stored): the encoded [`IndexDocument`]
//!
//! The completeness of each commit is stored as the tantivy commit payload,
//! so an index left behind by an interrupted rebuild is recognizable on open.

use super::{Completeness, DirectoryFactory, IndexBackend, NodeIds};
use crate::document::IndexDocument;
use crate::error::BackendError;
use neural_core::{LabelId, NodeId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tantivy::collector::Count;
use tantivy::columnar::Column;
use tantivy::directory::MmapDirectory;
use tantivy::query::{EnableScoring, Query, Scorer, TermQuery};
use tantivy::schema::{Field, FieldType, IndexRecordOption, NumericOptions, Schema, Value, STORED};
use tantivy::{
    DocAddress, DocSet, Index, IndexReader, IndexSettings, IndexWriter, ReloadPolicy, Searcher,
    TantivyDocument, Term, TERMINATED,
};

const NODE_ID_FIELD: &str = "node_id";
const LABEL_FIELD: &str = "label";
const DOCUMENT_FIELD: &str = "document";

/// Smallest writer heap tantivy accepts for a single indexing thread.
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

#[derive(Debug, Clone, Copy)]
struct LabelFields {
    node_id: Field,
    label: Field,
    document: Field,
}

fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();
    schema_builder.add_u64_field(NODE_ID_FIELD, NumericOptions::default().set_indexed().set_fast());
    schema_builder.add_u64_field(LABEL_FIELD, NumericOptions::default().set_indexed());
    schema_builder.add_bytes_field(DOCUMENT_FIELD, STORED);
    schema_builder.build()
}

/// Resolves the label fields, rejecting schemas this backend did not write.
fn resolve_fields(schema: &Schema) -> Result<LabelFields, BackendError> {
    let field = |name: &str| {
        schema
            .get_field(name)
            .map_err(|_| BackendError::Corrupt(format!("missing field '{name}'")))
    };
    let fields = LabelFields {
        node_id: field(NODE_ID_FIELD)?,
        label: field(LABEL_FIELD)?,
        document: field(DOCUMENT_FIELD)?,
    };

    let valid = |field: Field| match schema.get_field_entry(field).field_type() {
        FieldType::U64(options) if field == fields.node_id => {
            options.is_indexed() && options.is_fast()
        }
        FieldType::U64(options) if field == fields.label => options.is_indexed(),
        FieldType::Bytes(options) if field == fields.document => options.is_stored(),
        _ => false,
    };
    for (name, field) in [
        (NODE_ID_FIELD, fields.node_id),
        (LABEL_FIELD, fields.label),
        (DOCUMENT_FIELD, fields.document),
    ] {
        if !valid(field) {
            return Err(BackendError::Corrupt(format!("field '{name}' has the wrong type")));
        }
    }
    Ok(fields)
}

/// Opens tantivy label indexes.
#[derive(Debug, Clone)]
pub struct TantivyDirectoryFactory {
    writer_heap_bytes: usize,
}

impl TantivyDirectoryFactory {
    /// Creates a factory whose writers use `writer_heap_bytes` of indexing heap.
    ///
    /// Values below [`MIN_WRITER_HEAP_BYTES`] are raised to it. Configuration
    /// paths that must reject such values validate before calling this.
    pub fn new(writer_heap_bytes: usize) -> Self {
        Self {
            writer_heap_bytes: writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES),
        }
    }
}

impl Default for TantivyDirectoryFactory {
    fn default() -> Self {
        Self::new(50_000_000)
    }
}

impl DirectoryFactory for TantivyDirectoryFactory {
    fn name(&self) -> &str {
        "tantivy"
    }

    fn open(&self, path: &Path) -> Result<Arc<dyn IndexBackend>, BackendError> {
        let index = TantivyLabelIndex::open(path, self.writer_heap_bytes)?;
        Ok(Arc::new(index))
    }
}

/// Writes accepted since the last commit.
struct PendingWrites {
    writer: IndexWriter,
    /// `None` marks a pending delete.
    documents: HashMap<NodeId, Option<IndexDocument>>,
    /// `delete_all` is pending; committed documents are no longer current.
    cleared: bool,
}

/// A label index stored in a tantivy directory.
pub struct TantivyLabelIndex {
    index: Index,
    reader: IndexReader,
    fields: LabelFields,
    pending: Mutex<PendingWrites>,
}

impl TantivyLabelIndex {
    /// Opens the index at `path`, creating an empty one if the directory holds none.
    pub fn open(path: &Path, writer_heap_bytes: usize) -> Result<Self, BackendError> {
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)?;

        let exists = Index::exists(&directory).map_err(tantivy::TantivyError::from)?;
        let index = if exists {
            Index::open(directory).map_err(|e| BackendError::Corrupt(e.to_string()))?
        } else {
            tracing::debug!(path = %path.display(), "Creating empty label index");
            Index::create(directory, build_schema(), IndexSettings::default())?
        };

        let fields = resolve_fields(&index.schema())?;
        // An unreadable payload is as bad as a broken meta.json
        let metas = index
            .load_metas()
            .map_err(|e| BackendError::Corrupt(e.to_string()))?;
        if let Some(marker) = metas.payload.as_deref() {
            if Completeness::parse(marker).is_none() {
                return Err(BackendError::Corrupt(format!("unknown commit marker '{marker}'")));
            }
        }

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer = index.writer_with_num_threads(1, writer_heap_bytes.max(MIN_WRITER_HEAP_BYTES))?;

        Ok(Self {
            index,
            reader,
            fields,
            pending: Mutex::new(PendingWrites {
                writer,
                documents: HashMap::new(),
                cleared: false,
            }),
        })
    }

    fn pending(&self) -> MutexGuard<'_, PendingWrites> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn node_term(&self, node: NodeId) -> Term {
        Term::from_field_u64(self.fields.node_id, node.as_u64())
    }

    fn label_term(&self, label: LabelId) -> Term {
        Term::from_field_u64(self.fields.label, u64::from(label.as_u32()))
    }

    /// Walks the committed documents matching `term`.
    fn scan(&self, searcher: Searcher, term: Term) -> Result<TermScan, BackendError> {
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let weight = query.weight(EnableScoring::disabled_from_searcher(&searcher))?;

        let mut segments = Vec::with_capacity(searcher.segment_readers().len());
        for segment_reader in searcher.segment_readers() {
            segments.push(weight.scorer(segment_reader, 1.0)?);
        }

        Ok(TermScan {
            searcher,
            segments,
            segment_ord: 0,
        })
    }

    fn read_committed(&self, node: NodeId) -> Result<Option<IndexDocument>, BackendError> {
        let searcher = self.reader.searcher();
        let Some(address) = self.scan(searcher.clone(), self.node_term(node))?.next() else {
            return Ok(None);
        };

        let stored: TantivyDocument = searcher.doc(address)?;
        let bytes = stored
            .get_first(self.fields.document)
            .and_then(|value| value.as_bytes())
            .ok_or_else(|| BackendError::Corrupt(format!("{node} has no stored document")))?;

        let document = IndexDocument::from_bytes(bytes)?;
        if document.node() != node {
            return Err(BackendError::Corrupt(format!(
                "document stored under {node} belongs to {}",
                document.node()
            )));
        }
        Ok(Some(document))
    }
}

impl IndexBackend for TantivyLabelIndex {
    fn write_document(&self, document: &IndexDocument) -> Result<(), BackendError> {
        let bytes = document.to_bytes()?;

        let mut doc = TantivyDocument::new();
        doc.add_u64(self.fields.node_id, document.node().as_u64());
        for label in document.labels() {
            doc.add_u64(self.fields.label, u64::from(label.as_u32()));
        }
        doc.add_bytes(self.fields.document, bytes);

        let mut pending = self.pending();
        pending.writer.delete_term(self.node_term(document.node()));
        pending.writer.add_document(doc)?;
        pending.documents.insert(document.node(), Some(document.clone()));
        Ok(())
    }

    fn delete_document(&self, node: NodeId) -> Result<(), BackendError> {
        let mut pending = self.pending();
        pending.writer.delete_term(self.node_term(node));
        pending.documents.insert(node, None);
        Ok(())
    }

    fn read_document(&self, node: NodeId) -> Result<Option<IndexDocument>, BackendError> {
        {
            let pending = self.pending();
            if let Some(document) = pending.documents.get(&node) {
                return Ok(document.clone());
            }
            if pending.cleared {
                return Ok(None);
            }
        }
        self.read_committed(node)
    }

    fn delete_all(&self) -> Result<(), BackendError> {
        let mut pending = self.pending();
        // Buffered adds outlive delete_all_documents
        pending.writer.rollback()?;
        pending.writer.delete_all_documents()?;
        pending.documents.clear();
        pending.cleared = true;
        Ok(())
    }

    fn commit(&self, completeness: Completeness) -> Result<(), BackendError> {
        let mut pending = self.pending();
        let mut prepared = pending.writer.prepare_commit()?;
        prepared.set_payload(completeness.as_str());
        let opstamp = prepared.commit()?;

        pending.documents.clear();
        pending.cleared = false;
        self.reader.reload()?;

        tracing::trace!(opstamp, %completeness, "Committed label index");
        Ok(())
    }

    fn last_commit(&self) -> Result<Option<Completeness>, BackendError> {
        let metas = self.index.load_metas()?;
        match metas.payload.as_deref() {
            None => Ok(None),
            Some(marker) => Completeness::parse(marker)
                .map(Some)
                .ok_or_else(|| BackendError::Corrupt(format!("unknown commit marker '{marker}'"))),
        }
    }

    fn search(&self, label: LabelId) -> Result<NodeIds, BackendError> {
        let searcher = self.reader.searcher();

        let mut node_ids: Vec<Column<u64>> = Vec::with_capacity(searcher.segment_readers().len());
        for segment_reader in searcher.segment_readers() {
            node_ids.push(segment_reader.fast_fields().u64(NODE_ID_FIELD)?);
        }

        let scan = self.scan(searcher, self.label_term(label))?;
        Ok(Box::new(scan.filter_map(move |address| {
            node_ids[address.segment_ord as usize]
                .first(address.doc_id)
                .map(NodeId::new)
        })))
    }

    fn count(&self, label: LabelId) -> Result<u64, BackendError> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.label_term(label), IndexRecordOption::Basic);
        Ok(searcher.search(&query, &Count)? as u64)
    }
}

impl std::fmt::Debug for TantivyLabelIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyLabelIndex")
            .field("fields", &self.fields)
            .field("num_docs", &self.reader.searcher().num_docs())
            .finish_non_exhaustive()
    }
}

/// Live documents matching one term, segment by segment in doc id order.
///
/// Holds its own searcher, so later commits do not affect a running scan.
struct TermScan {
    searcher: Searcher,
    segments: Vec<Box<dyn Scorer>>,
    segment_ord: usize,
}

impl Iterator for TermScan {
    type Item = DocAddress;

    fn next(&mut self) -> Option<DocAddress> {
        while self.segment_ord < self.segments.len() {
            let segment_reader = self.searcher.segment_reader(self.segment_ord as u32);
            let scorer = &mut self.segments[self.segment_ord];

            let mut doc = scorer.doc();
            while doc != TERMINATED {
                scorer.advance();
                if !segment_reader.is_deleted(doc) {
                    return Some(DocAddress::new(self.segment_ord as u32, doc));
                }
                doc = scorer.doc();
            }
            self.segment_ord += 1;
        }
        None
    }
}

// =============================================================================
// Tests
// =============================================================================
