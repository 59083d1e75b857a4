//! The five retrieval functions. Each takes already-resolved statistics and returns a
//! contribution for one (term, document) pair; summing across terms happens in `accumulate`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tunable constants of BM25 and Jelinek-Mercer smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    pub k1: f64,
    pub k2: f64,
    pub b: f64,
    pub lambda: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self { k1: 1.2, k2: 100.0, b: 0.75, lambda: 0.5 }
    }
}

impl ScoringParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.k1 >= 0.0) || !(self.k2 >= 0.0) {
            return Err(Error::InvalidParams(format!("k1={} k2={} must be >= 0", self.k1, self.k2)));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(Error::InvalidParams(format!("b={} must lie in [0, 1]", self.b)));
        }
        // lambda == 1 leaves no background mass for unseen terms
        if !(0.0..1.0).contains(&self.lambda) {
            return Err(Error::InvalidParams(format!("lambda={} must lie in [0, 1)", self.lambda)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    OkapiTf,
    TfIdf,
    Bm25,
    Laplace,
    JelinekMercer,
}

impl Model {
    pub const ALL: [Model; 5] = [Model::OkapiTf, Model::TfIdf, Model::Bm25, Model::Laplace, Model::JelinekMercer];

    pub fn name(self) -> &'static str {
        match self {
            Model::OkapiTf => "okapi-tf",
            Model::TfIdf => "tf-idf",
            Model::Bm25 => "bm25",
            Model::Laplace => "lm-laplace",
            Model::JelinekMercer => "lm-jelinek-mercer",
        }
    }

    /// Run file this model's rankings are appended to.
    pub fn file_name(self) -> &'static str {
        match self {
            Model::OkapiTf => "okaptf.txt",
            Model::TfIdf => "tfidf.txt",
            Model::Bm25 => "okapiBM25.txt",
            Model::Laplace => "uniLaplace.txt",
            Model::JelinekMercer => "uniJM.txt",
        }
    }
}

fn nonzero(value: f64, what: &'static str) -> Result<f64> {
    if value == 0.0 {
        Err(Error::ZeroDenominator { what })
    } else {
        Ok(value)
    }
}

fn ln(value: f64, what: &'static str) -> Result<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value.ln())
    } else {
        Err(Error::Domain { what, value })
    }
}

/// `tf / (tf + 0.5 + 1.5 * docLength / avgDocLength)`
pub fn okapi_tf(tf: f64, doc_length: f64, avg_doc_length: f64) -> Result<f64> {
    let avg = nonzero(avg_doc_length, "average document length")?;
    let denom = nonzero(tf + 0.5 + 1.5 * (doc_length / avg), "okapi tf normalizer")?;
    Ok(tf / denom)
}

/// Okapi TF weighted by `ln(numDocs / docFreq)`.
pub fn tf_idf(okapi_tf_score: f64, num_docs: f64, doc_freq: f64) -> Result<f64> {
    let df = nonzero(doc_freq, "document frequency")?;
    Ok(okapi_tf_score * ln(num_docs / df, "idf")?)
}

/// BM25 with a query-term saturation factor.
///
/// The query component `(tfq + k2*tfq) / (tfq + k2)` is applied per term and then summed over
/// terms, which is not how textbook BM25 treats query frequency. Rankings produced here are
/// expected to match that form exactly, so it stays.
pub fn bm25(
    params: &ScoringParams,
    tfd: f64,
    tfq: f64,
    num_docs: f64,
    doc_freq: f64,
    doc_length: f64,
    avg_doc_length: f64,
) -> Result<f64> {
    let ScoringParams { k1, k2, b, .. } = *params;
    let avg = nonzero(avg_doc_length, "average document length")?;
    let idf = ln((num_docs + 0.5) / (doc_freq + 0.5), "bm25 idf")?;
    let doc_term = (tfd + k1 * tfd) / nonzero(tfd + k1 * ((1.0 - b) + b * (doc_length / avg)), "bm25 document normalizer")?;
    let query_term = (tfq + k2 * tfq) / nonzero(tfq + k2, "bm25 query normalizer")?;
    Ok(idf * doc_term * query_term)
}

/// Add-one smoothed unigram likelihood, `ln((tfd + 1) / (docLength + V))`.
pub fn unigram_laplace(tfd: f64, doc_length: f64, vocabulary: f64) -> Result<f64> {
    let denom = nonzero(doc_length + vocabulary, "document length plus vocabulary")?;
    ln((tfd + 1.0) / denom, "laplace likelihood")
}

/// Jelinek-Mercer interpolation of document and corpus likelihoods.
///
/// `doc_length` must be the length of the document the term was observed in.
pub fn unigram_jelinek_mercer(
    params: &ScoringParams,
    tfd: f64,
    doc_length: f64,
    tfd_corpus: f64,
    corpus_length: f64,
) -> Result<f64> {
    let lambda = params.lambda;
    let doc = lambda * tfd / nonzero(doc_length, "document length")?;
    let background = (1.0 - lambda) * tfd_corpus / nonzero(corpus_length, "corpus length")?;
    ln(doc + background, "jelinek-mercer likelihood")
}

/// Laplace contribution of a query term absent from a document.
pub fn laplace_background(doc_length: f64, vocabulary: f64) -> Result<f64> {
    unigram_laplace(0.0, doc_length, vocabulary)
}

/// Jelinek-Mercer contribution of a query term absent from a document.
pub fn jelinek_mercer_background(params: &ScoringParams, tfd_corpus: f64, corpus_length: f64) -> Result<f64> {
    let background = (1.0 - params.lambda) * tfd_corpus / nonzero(corpus_length, "corpus length")?;
    ln(background, "jelinek-mercer background")
}
