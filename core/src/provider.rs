use crate::error::{Error, Result};
use crate::stats::{Aggregate, CorpusStats, Posting};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of collection statistics. Scoring never looks at document text; everything it needs
/// comes through these four calls.
pub trait StatsProvider {
    /// Number of distinct terms in the collection.
    fn vocabulary_size(&self) -> Result<f64>;

    fn corpus_aggregate(&self, kind: Aggregate) -> Result<f64>;

    /// Every document containing `term`, with the term's raw frequency in it.
    fn postings_for(&self, term: &str) -> Result<Vec<Posting>>;

    /// Length (sum of term frequencies) of the document with engine id `doc_id`.
    fn document_length(&self, doc_id: &str) -> Result<u64>;
}

impl<P: StatsProvider + ?Sized> StatsProvider for &P {
    fn vocabulary_size(&self) -> Result<f64> {
        (**self).vocabulary_size()
    }
    fn corpus_aggregate(&self, kind: Aggregate) -> Result<f64> {
        (**self).corpus_aggregate(kind)
    }
    fn postings_for(&self, term: &str) -> Result<Vec<Posting>> {
        (**self).postings_for(term)
    }
    fn document_length(&self, doc_id: &str) -> Result<u64> {
        (**self).document_length(doc_id)
    }
}

/// Statistics held entirely in memory: hand-built fixtures, or a captured snapshot of another
/// provider for a fixed set of terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
    pub corpus: CorpusStats,
    pub postings: HashMap<String, Vec<Posting>>,
    pub doc_lengths: HashMap<String, u64>,
}

impl MemoryStats {
    pub fn new(corpus: CorpusStats) -> Self {
        Self { corpus, postings: HashMap::new(), doc_lengths: HashMap::new() }
    }

    /// Register a document. `doc_id` doubles as its docno.
    pub fn with_document(mut self, doc_id: &str, length: u64) -> Self {
        self.doc_lengths.insert(doc_id.to_string(), length);
        self
    }

    /// Record that `doc_id` contains `term` `tf` times. Lengths are left for lazy lookup.
    pub fn with_posting(mut self, term: &str, doc_id: &str, tf: u32) -> Self {
        self.postings.entry(term.to_string()).or_default().push(Posting {
            doc_id: doc_id.to_string(),
            docno: doc_id.to_string(),
            tf,
            length: None,
        });
        self
    }

    /// Pull aggregates plus the postings of `terms` (and the lengths of every document they
    /// touch) out of `provider`.
    pub fn capture<P, I, S>(provider: &P, terms: I) -> Result<Self>
    where
        P: StatsProvider + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let corpus = CorpusStats::collect(provider)?;
        let mut out = MemoryStats::new(corpus);
        for term in terms {
            let term = term.as_ref();
            if out.postings.contains_key(term) {
                continue;
            }
            let mut postings = provider.postings_for(term)?;
            for p in postings.iter_mut() {
                let length = match (p.length, out.doc_lengths.get(&p.doc_id)) {
                    (Some(len), _) => len,
                    (None, Some(&len)) => len,
                    (None, None) => provider.document_length(&p.doc_id)?,
                };
                out.doc_lengths.insert(p.doc_id.clone(), length);
                p.length = Some(length);
            }
            tracing::debug!(term, hits = postings.len(), "captured postings");
            out.postings.insert(term.to_string(), postings);
        }
        Ok(out)
    }
}

impl StatsProvider for MemoryStats {
    fn vocabulary_size(&self) -> Result<f64> {
        Ok(self.corpus.vocabulary)
    }

    fn corpus_aggregate(&self, kind: Aggregate) -> Result<f64> {
        Ok(match kind {
            Aggregate::AvgDocLength => self.corpus.avg_doc_length,
            Aggregate::TotalDocs => self.corpus.num_docs,
            Aggregate::CorpusLength => self.corpus.corpus_length,
        })
    }

    fn postings_for(&self, term: &str) -> Result<Vec<Posting>> {
        Ok(self.postings.get(term).cloned().unwrap_or_default())
    }

    fn document_length(&self, doc_id: &str) -> Result<u64> {
        self.doc_lengths
            .get(doc_id)
            .copied()
            .ok_or_else(|| Error::Provider(format!("unknown document {doc_id}")))
    }
}
