//! `StatsProvider` backed by an Elasticsearch index, spoken to over its REST API.
//!
//! Term frequencies and document lengths come from term vectors, so the text field must be
//! indexed with `term_vector` enabled (or be able to compute them on the fly), and the length
//! aggregations need doc values or fielddata on it.
//!
//! The corpus aggregates and the per-document lengths are measured differently. The `stats`
//! aggregation runs `doc[field].size()`, which counts the *distinct* terms of each document, so
//! `avgDocLength` and `corpusLength` are averages and sums of distinct-term counts. Per-document
//! lengths come from term vectors and sum raw term frequencies.

use ircore::{Aggregate, Error, Posting, Result, StatsProvider};
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt::Display;
use std::time::Duration;

const SCROLL_KEEP_ALIVE: &str = "1m";

#[derive(Debug, Clone)]
pub struct ElasticConfig {
    pub base_url: String,
    pub index: String,
    /// Analyzed field holding document text.
    pub text_field: String,
    /// Stored field holding the external document id.
    pub docno_field: String,
    pub timeout_secs: u64,
    /// Page size for scrolled searches and term-vector batches.
    pub batch_size: usize,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".into(),
            index: "ap_dataset".into(),
            text_field: "text".into(),
            docno_field: "docno".into(),
            timeout_secs: 30,
            batch_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct LengthStats {
    count: f64,
    avg: f64,
    sum: f64,
}

pub struct ElasticStats {
    client: Client,
    base: Url,
    config: ElasticConfig,
    lengths: Mutex<Option<LengthStats>>,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    #[serde(default)]
    tokens: Vec<AnalyzeToken>,
}

#[derive(Deserialize)]
struct AnalyzeToken {
    token: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_source", default)]
    source: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct AggResponse<A> {
    aggregations: A,
}

#[derive(Deserialize)]
struct VocabularyAggs {
    unique_terms: ValueAgg,
}

#[derive(Deserialize)]
struct ValueAgg {
    value: f64,
}

#[derive(Deserialize)]
struct LengthAggs {
    doc_length: StatsAgg,
}

#[derive(Deserialize)]
struct StatsAgg {
    count: f64,
    avg: Option<f64>,
    sum: f64,
}

#[derive(Deserialize)]
struct MultiTermVectors {
    docs: Vec<TermVectorDoc>,
}

#[derive(Deserialize)]
struct TermVectorDoc {
    #[serde(rename = "_id")]
    id: String,
    #[serde(default)]
    found: bool,
    #[serde(default)]
    term_vectors: HashMap<String, FieldVector>,
}

#[derive(Deserialize)]
struct FieldVector {
    terms: HashMap<String, TermInfo>,
}

#[derive(Deserialize)]
struct TermInfo {
    term_freq: u64,
}

impl TermVectorDoc {
    fn field(&self, field: &str) -> Option<&FieldVector> {
        self.term_vectors.get(field)
    }
}

impl FieldVector {
    fn length(&self) -> u64 {
        self.terms.values().map(|t| t.term_freq).sum()
    }
}

fn provider_err<E: Display>(context: impl Display) -> impl FnOnce(E) -> Error {
    move |e| Error::Provider(format!("{context}: {e}"))
}

impl ElasticStats {
    pub fn connect(config: ElasticConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(provider_err(&config.base_url))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(provider_err("building http client"))?;
        Ok(Self { client, base, config, lengths: Mutex::new(None) })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Provider(format!("{} cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn call<T: DeserializeOwned>(&self, method: Method, url: Url, body: Option<&Value>) -> Result<T> {
        tracing::trace!(%method, %url, "elasticsearch request");
        let mut req = self.client.request(method, url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().map_err(provider_err(&url))?;
        let resp = resp.error_for_status().map_err(provider_err(&url))?;
        resp.json::<T>().map_err(provider_err(format!("decoding response of {url}")))
    }

    fn post<T: DeserializeOwned>(&self, segments: &[&str], body: &Value) -> Result<T> {
        let url = self.endpoint(segments)?;
        self.call(Method::POST, url, Some(body))
    }

    fn match_query(&self, term: &str) -> Value {
        let mut field = serde_json::Map::new();
        field.insert(self.config.text_field.clone(), Value::from(term));
        json!({ "match": field })
    }

    /// The term as the index's analyzer stores it, or `None` when the analyzer drops it.
    fn analyze(&self, term: &str) -> Result<Option<String>> {
        let body = json!({ "field": self.config.text_field, "text": term });
        let resp: AnalyzeResponse = self.post(&[&self.config.index, "_analyze"], &body)?;
        Ok(resp.tokens.into_iter().next().map(|t| t.token))
    }

    fn count(&self, term: &str) -> Result<u64> {
        let body = json!({ "query": self.match_query(term) });
        let resp: CountResponse = self.post(&[&self.config.index, "_count"], &body)?;
        Ok(resp.count)
    }

    /// `(engine id, docno)` of every document matching `term`.
    fn matching_docs(&self, term: &str, expected: u64) -> Result<Vec<(String, String)>> {
        let body = json!({
            "query": self.match_query(term),
            "size": self.config.batch_size,
            "sort": ["_doc"],
            "_source": [self.config.docno_field],
        });
        let mut url = self.endpoint(&[&self.config.index, "_search"])?;
        url.query_pairs_mut().append_pair("scroll", SCROLL_KEEP_ALIVE);
        let mut page: SearchResponse = self.call(Method::POST, url, Some(&body))?;

        let mut docs = Vec::with_capacity(expected as usize);
        let mut scroll_id = page.scroll_id.take();
        loop {
            if page.hits.hits.is_empty() {
                break;
            }
            for hit in page.hits.hits {
                let docno = match hit.source.get(&self.config.docno_field).and_then(Value::as_str) {
                    Some(docno) => docno.to_string(),
                    None => {
                        return Err(Error::Provider(format!(
                            "hit {} has no {:?} field",
                            hit.id, self.config.docno_field
                        )))
                    }
                };
                docs.push((hit.id, docno));
            }
            if docs.len() as u64 >= expected {
                break;
            }
            let Some(id) = scroll_id.clone() else { break };
            let body = json!({ "scroll": SCROLL_KEEP_ALIVE, "scroll_id": id });
            page = self.post(&["_search", "scroll"], &body)?;
            if page.scroll_id.is_some() {
                scroll_id = page.scroll_id.take();
            }
        }

        if let Some(id) = scroll_id {
            let url = self.endpoint(&["_search", "scroll"])?;
            if let Err(e) = self.call::<Value>(Method::DELETE, url, Some(&json!({ "scroll_id": [id] }))) {
                tracing::debug!(error = %e, "failed to clear scroll");
            }
        }
        Ok(docs)
    }

    fn term_vectors(&self, ids: &[String]) -> Result<Vec<TermVectorDoc>> {
        let body = json!({
            "ids": ids,
            "parameters": {
                "fields": [self.config.text_field],
                "positions": false,
                "offsets": false,
                "payloads": false,
                "term_statistics": false,
                "field_statistics": false,
            }
        });
        let resp: MultiTermVectors = self.post(&[&self.config.index, "_mtermvectors"], &body)?;
        Ok(resp.docs)
    }

    fn length_stats(&self) -> Result<LengthStats> {
        let mut cached = self.lengths.lock();
        if let Some(stats) = *cached {
            return Ok(stats);
        }
        let body = json!({
            "size": 0,
            "aggs": {
                "doc_length": {
                    "stats": {
                        "script": {
                            "source": "doc[params.field].size()",
                            "params": { "field": self.config.text_field },
                        }
                    }
                }
            }
        });
        let resp: AggResponse<LengthAggs> = self.post(&[&self.config.index, "_search"], &body)?;
        let agg = resp.aggregations.doc_length;
        let stats = LengthStats { count: agg.count, avg: agg.avg.unwrap_or(0.0), sum: agg.sum };
        *cached = Some(stats);
        Ok(stats)
    }
}

impl StatsProvider for ElasticStats {
    fn vocabulary_size(&self) -> Result<f64> {
        let body = json!({
            "size": 0,
            "aggs": { "unique_terms": { "cardinality": { "field": self.config.text_field } } }
        });
        let resp: AggResponse<VocabularyAggs> = self.post(&[&self.config.index, "_search"], &body)?;
        Ok(resp.aggregations.unique_terms.value)
    }

    fn corpus_aggregate(&self, kind: Aggregate) -> Result<f64> {
        let stats = self.length_stats()?;
        Ok(match kind {
            Aggregate::AvgDocLength => stats.avg,
            Aggregate::TotalDocs => stats.count,
            Aggregate::CorpusLength => stats.sum,
        })
    }

    fn postings_for(&self, term: &str) -> Result<Vec<Posting>> {
        let Some(analyzed) = self.analyze(term)? else {
            tracing::debug!(term, "analyzer produced no token");
            return Ok(Vec::new());
        };
        let doc_freq = self.count(term)?;
        if doc_freq == 0 {
            return Ok(Vec::new());
        }
        let docs = self.matching_docs(term, doc_freq)?;
        if docs.len() as u64 != doc_freq {
            tracing::warn!(term, doc_freq, hits = docs.len(), "count and search disagree");
        }

        let mut postings = Vec::with_capacity(docs.len());
        for chunk in docs.chunks(self.config.batch_size.max(1)) {
            let ids: Vec<String> = chunk.iter().map(|(id, _)| id.clone()).collect();
            let docnos: HashMap<&str, &str> = chunk.iter().map(|(id, no)| (id.as_str(), no.as_str())).collect();
            for tv in self.term_vectors(&ids)? {
                let field = match (tv.found, tv.field(&self.config.text_field)) {
                    (true, Some(field)) => field,
                    _ => return Err(Error::Provider(format!("no term vector for document {}", tv.id))),
                };
                let Some(info) = field.terms.get(&analyzed) else {
                    tracing::debug!(term, doc = %tv.id, "matched document lacks analyzed term");
                    continue;
                };
                let docno = docnos
                    .get(tv.id.as_str())
                    .ok_or_else(|| Error::Provider(format!("unexpected term vector for {}", tv.id)))?;
                postings.push(Posting {
                    doc_id: tv.id.clone(),
                    docno: docno.to_string(),
                    tf: u32::try_from(info.term_freq).map_err(provider_err(format!(
                        "term frequency of {term:?} in document {}",
                        tv.id
                    )))?,
                    length: Some(field.length()),
                });
            }
        }
        Ok(postings)
    }

    fn document_length(&self, doc_id: &str) -> Result<u64> {
        let mut url = self.endpoint(&[&self.config.index, "_termvectors", doc_id])?;
        url.query_pairs_mut()
            .append_pair("fields", &self.config.text_field)
            .append_pair("positions", "false")
            .append_pair("offsets", "false")
            .append_pair("payloads", "false");
        let tv: TermVectorDoc = self.call(Method::GET, url, None)?;
        tv.field(&self.config.text_field)
            .map(FieldVector::length)
            .ok_or_else(|| Error::Provider(format!("no term vector for document {doc_id}")))
    }
}
