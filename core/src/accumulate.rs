//! Per-query score accumulation.
//!
//! A [`QueryState`] is created fresh for every query and dropped once its rankings are written,
//! so nothing accumulated for one query can leak into the next.

use crate::error::{Error, Result};
use crate::models::{self, Model, ScoringParams};
use crate::provider::StatsProvider;
use crate::query::Query;
use crate::stats::CorpusStats;
use std::collections::{BTreeSet, HashMap};

/// Accumulated scores of one document under every model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModelScores {
    pub okapi_tf: f64,
    pub tf_idf: f64,
    pub bm25: f64,
    pub laplace: f64,
    pub jelinek_mercer: f64,
}

impl ModelScores {
    pub fn get(&self, model: Model) -> f64 {
        match model {
            Model::OkapiTf => self.okapi_tf,
            Model::TfIdf => self.tf_idf,
            Model::Bm25 => self.bm25,
            Model::Laplace => self.laplace,
            Model::JelinekMercer => self.jelinek_mercer,
        }
    }

    fn add(&mut self, other: &ModelScores) {
        self.okapi_tf += other.okapi_tf;
        self.tf_idf += other.tf_idf;
        self.bm25 += other.bm25;
        self.laplace += other.laplace;
        self.jelinek_mercer += other.jelinek_mercer;
    }
}

/// A document matched by at least one query term.
#[derive(Debug, Clone, Default)]
pub struct DocEntry {
    pub scores: ModelScores,
    /// Query terms observed in this document.
    pub matched: BTreeSet<String>,
}

/// Everything accumulated for a single query.
///
/// One entry per matched document holds all five scores, so every model ranks exactly the same
/// document set.
#[derive(Debug, Default)]
pub struct QueryState {
    docs: HashMap<String, DocEntry>,
    /// docno -> length, resolved on first sight.
    doc_lengths: HashMap<String, f64>,
    /// term -> summed tf over the term's postings.
    corpus_tf: HashMap<String, f64>,
    /// Order in which documents were first matched; keeps ranking ties deterministic.
    first_seen: Vec<String>,
    completed: bool,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, docno: &str) -> Option<&DocEntry> {
        self.docs.get(docno)
    }

    pub fn corpus_tf(&self, term: &str) -> Option<f64> {
        self.corpus_tf.get(term).copied()
    }

    pub fn doc_length(&self, docno: &str) -> Option<f64> {
        self.doc_lengths.get(docno).copied()
    }

    /// `(docno, score)` pairs for one model in first-seen order.
    pub fn scores(&self, model: Model) -> Vec<(&str, f64)> {
        self.first_seen
            .iter()
            .map(|docno| (docno.as_str(), self.docs[docno].scores.get(model)))
            .collect()
    }

    /// Walk the postings of one query term and fold its contribution into every matched
    /// document. Fails once language-model completion has run.
    pub fn accumulate_term<P: StatsProvider + ?Sized>(
        &mut self,
        provider: &P,
        corpus: &CorpusStats,
        params: &ScoringParams,
        term: &str,
        tfq: u32,
    ) -> Result<()> {
        if self.completed {
            return Err(Error::AccumulateAfterCompletion { term: term.to_string() });
        }
        let postings = provider.postings_for(term)?;
        let doc_freq = postings.len() as f64;
        let tfd_corpus = *self
            .corpus_tf
            .entry(term.to_string())
            .or_insert_with(|| postings.iter().map(|p| p.tf as f64).sum());
        tracing::debug!(term, tfq, doc_freq, tfd_corpus, "scoring term");
        if postings.is_empty() {
            tracing::warn!(term, "query term does not occur in the collection");
            return Ok(());
        }

        let tfq = tfq as f64;
        for posting in &postings {
            let doc_length = match self.doc_lengths.get(&posting.docno) {
                Some(&len) => len,
                None => {
                    let len = match posting.length {
                        Some(len) => len,
                        None => provider.document_length(&posting.doc_id)?,
                    } as f64;
                    self.doc_lengths.insert(posting.docno.clone(), len);
                    len
                }
            };
            let tfd = posting.tf as f64;

            let okapi_tf = models::okapi_tf(tfd, doc_length, corpus.avg_doc_length)?;
            let contribution = ModelScores {
                okapi_tf,
                tf_idf: models::tf_idf(okapi_tf, corpus.num_docs, doc_freq)?,
                bm25: models::bm25(params, tfd, tfq, corpus.num_docs, doc_freq, doc_length, corpus.avg_doc_length)?,
                laplace: models::unigram_laplace(tfd, doc_length, corpus.vocabulary)?,
                jelinek_mercer: models::unigram_jelinek_mercer(params, tfd, doc_length, tfd_corpus, corpus.corpus_length)?,
            };

            if !self.docs.contains_key(&posting.docno) {
                self.first_seen.push(posting.docno.clone());
            }
            let entry = self.docs.entry(posting.docno.clone()).or_default();
            if entry.matched.insert(term.to_string()) {
                entry.scores.add(&contribution);
            }
        }
        Ok(())
    }

    /// Add corpus-background mass to both language-model scores for every query term a document
    /// does not contain. Runs once, after all terms are accumulated; later calls are no-ops.
    ///
    /// Terms absent from the whole collection get Laplace background only: their Jelinek-Mercer
    /// background would be `ln 0`.
    pub fn complete_language_models(
        &mut self,
        corpus: &CorpusStats,
        params: &ScoringParams,
        query: &Query,
    ) -> Result<()> {
        if self.completed {
            return Ok(());
        }
        self.completed = true;

        let mut jm_background: HashMap<&str, Option<f64>> = HashMap::new();
        for term in query.terms.keys() {
            let background = match self.corpus_tf.get(term.as_str()) {
                Some(&tfd_corpus) if tfd_corpus > 0.0 => {
                    Some(models::jelinek_mercer_background(params, tfd_corpus, corpus.corpus_length)?)
                }
                _ => None,
            };
            jm_background.insert(term.as_str(), background);
        }

        for (docno, entry) in self.docs.iter_mut() {
            let doc_length = self.doc_lengths[docno];
            let laplace = models::laplace_background(doc_length, corpus.vocabulary)?;
            for term in query.terms.keys() {
                if entry.matched.contains(term) {
                    continue;
                }
                entry.scores.laplace += laplace;
                if let Some(jm) = jm_background[term.as_str()] {
                    entry.scores.jelinek_mercer += jm;
                }
            }
        }
        Ok(())
    }
}

/// Score one query end to end: accumulate every term, then complete the language models.
pub fn score_query<P: StatsProvider + ?Sized>(
    provider: &P,
    corpus: &CorpusStats,
    params: &ScoringParams,
    query: &Query,
) -> Result<QueryState> {
    let mut state = QueryState::new();
    for (term, &tfq) in &query.terms {
        state.accumulate_term(provider, corpus, params, term, tfq)?;
    }
    state.complete_language_models(corpus, params, query)?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryStats;
    use std::collections::BTreeMap;

    fn corpus() -> CorpusStats {
        CorpusStats { vocabulary: 10.0, avg_doc_length: 5.0, num_docs: 2.0, corpus_length: 10.0 }
    }

    fn query(terms: &[(&str, u32)]) -> Query {
        Query {
            id: "1".into(),
            terms: terms.iter().map(|(t, n)| (t.to_string(), *n)).collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn repeated_accumulation_of_a_term_is_not_double_counted() {
        let stats = MemoryStats::new(corpus()).with_document("d1", 5).with_posting("cat", "d1", 2);
        let params = ScoringParams::default();
        let mut state = QueryState::new();
        state.accumulate_term(&stats, &corpus(), &params, "cat", 1).unwrap();
        let once = state.get("d1").unwrap().scores;
        state.accumulate_term(&stats, &corpus(), &params, "cat", 1).unwrap();
        assert_eq!(state.get("d1").unwrap().scores, once);
    }

    #[test]
    fn completion_runs_once() {
        let stats = MemoryStats::new(corpus())
            .with_document("d1", 5)
            .with_document("d2", 5)
            .with_posting("cat", "d1", 2)
            .with_posting("dog", "d2", 1);
        let params = ScoringParams::default();
        let q = query(&[("cat", 1), ("dog", 1)]);
        let mut state = score_query(&stats, &corpus(), &params, &q).unwrap();
        let before = state.get("d1").unwrap().scores;
        state.complete_language_models(&corpus(), &params, &q).unwrap();
        assert_eq!(state.get("d1").unwrap().scores, before);
    }

    #[test]
    fn accumulating_after_completion_is_refused() {
        let stats = MemoryStats::new(corpus())
            .with_document("d1", 5)
            .with_document("d2", 5)
            .with_posting("cat", "d1", 2)
            .with_posting("dog", "d2", 1);
        let params = ScoringParams::default();
        let mut state = QueryState::new();
        state.accumulate_term(&stats, &corpus(), &params, "cat", 1).unwrap();
        state.complete_language_models(&corpus(), &params, &query(&[("cat", 1)])).unwrap();
        let before = state.get("d1").unwrap().scores;

        let err = state.accumulate_term(&stats, &corpus(), &params, "dog", 1).unwrap_err();
        assert!(matches!(err, Error::AccumulateAfterCompletion { ref term } if term == "dog"));
        assert!(state.get("d2").is_none());
        assert_eq!(state.get("d1").unwrap().scores, before);
        assert_eq!(state.corpus_tf("dog"), None);
    }

    #[test]
    fn corpus_tf_sums_postings_once_per_query() {
        let stats = MemoryStats::new(corpus())
            .with_document("d1", 5)
            .with_document("d2", 5)
            .with_posting("dog", "d1", 2)
            .with_posting("dog", "d2", 3);
        let state = score_query(&stats, &corpus(), &ScoringParams::default(), &query(&[("dog", 1), ("ghost", 1)])).unwrap();
        assert_eq!(state.corpus_tf("dog"), Some(5.0));
        assert_eq!(state.corpus_tf("ghost"), Some(0.0));
        assert_eq!(state.corpus_tf("cat"), None);
    }

    #[test]
    fn unknown_term_only_adds_laplace_background() {
        let stats = MemoryStats::new(corpus()).with_document("d1", 5).with_posting("cat", "d1", 2);
        let params = ScoringParams::default();
        let with_ghost = score_query(&stats, &corpus(), &params, &query(&[("cat", 1), ("ghost", 1)])).unwrap();
        let alone = score_query(&stats, &corpus(), &params, &query(&[("cat", 1)])).unwrap();
        let a = with_ghost.get("d1").unwrap().scores;
        let b = alone.get("d1").unwrap().scores;
        assert_eq!(a.jelinek_mercer, b.jelinek_mercer);
        assert!((a.laplace - b.laplace - (1.0f64 / 15.0).ln()).abs() < 1e-12);
        assert_eq!(with_ghost.len(), 1);
    }

    #[test]
    fn length_lookup_happens_once_per_document() {
        let stats = MemoryStats::new(corpus())
            .with_document("d1", 5)
            .with_posting("cat", "d1", 2)
            .with_posting("dog", "d1", 1);
        let params = ScoringParams::default();
        let state = score_query(&stats, &corpus(), &params, &query(&[("cat", 1), ("dog", 1)])).unwrap();
        assert_eq!(state.doc_length("d1"), Some(5.0));
        assert_eq!(state.get("d1").unwrap().matched.len(), 2);
    }

    #[test]
    fn zero_length_document_fails_loudly() {
        let stats = MemoryStats::new(corpus()).with_document("d1", 0).with_posting("cat", "d1", 2);
        let params = ScoringParams::default();
        let err = score_query(&stats, &corpus(), &params, &query(&[("cat", 1)])).unwrap_err();
        assert!(matches!(err, Error::ZeroDenominator { .. }));
    }
}
