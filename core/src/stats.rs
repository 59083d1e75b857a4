use crate::error::{Error, Result};
use crate::provider::StatsProvider;
use serde::{Deserialize, Serialize};

/// One (term, document) hit as reported by the statistics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Engine-internal document id, used for length lookups.
    pub doc_id: String,
    /// External document identifier written to run files.
    pub docno: String,
    /// Raw frequency of the term in the document.
    pub tf: u32,
    /// Document length when the engine resolved it alongside the hit.
    pub length: Option<u64>,
}

/// Corpus-level scalars the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregate {
    AvgDocLength,
    TotalDocs,
    CorpusLength,
}

/// Collection-wide statistics, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    /// Distinct-term vocabulary size.
    pub vocabulary: f64,
    pub avg_doc_length: f64,
    pub num_docs: f64,
    pub corpus_length: f64,
}

impl CorpusStats {
    /// Read the four aggregates once. All four are used as denominators; zero is rejected.
    pub fn collect<P: StatsProvider + ?Sized>(provider: &P) -> Result<Self> {
        let stats = CorpusStats {
            vocabulary: provider.vocabulary_size()?,
            avg_doc_length: provider.corpus_aggregate(Aggregate::AvgDocLength)?,
            num_docs: provider.corpus_aggregate(Aggregate::TotalDocs)?,
            corpus_length: provider.corpus_aggregate(Aggregate::CorpusLength)?,
        };
        stats.validate()?;
        Ok(stats)
    }

    pub fn validate(&self) -> Result<()> {
        let fields = [
            (self.vocabulary, "vocabulary size"),
            (self.avg_doc_length, "average document length"),
            (self.num_docs, "document count"),
            (self.corpus_length, "corpus length"),
        ];
        for (value, what) in fields {
            if !(value > 0.0) || !value.is_finite() {
                return Err(Error::ZeroDenominator { what });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_vocabulary_is_rejected() {
        let stats = CorpusStats { vocabulary: 0.0, avg_doc_length: 5.0, num_docs: 3.0, corpus_length: 15.0 };
        assert!(matches!(stats.validate(), Err(Error::ZeroDenominator { what: "vocabulary size" })));
    }

    #[test]
    fn positive_aggregates_pass() {
        let stats = CorpusStats { vocabulary: 10.0, avg_doc_length: 5.0, num_docs: 3.0, corpus_length: 15.0 };
        assert!(stats.validate().is_ok());
    }
}
