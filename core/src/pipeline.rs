use crate::accumulate::score_query;
use crate::error::Result;
use crate::models::{Model, ScoringParams};
use crate::provider::StatsProvider;
use crate::query::Query;
use crate::rank::{RunConfig, RunWriter};
use crate::stats::CorpusStats;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub queries: usize,
    pub empty_queries: usize,
    pub lines_written: Vec<(Model, usize)>,
}

/// Drives a run: corpus statistics once, then each query scored and flushed in turn.
pub struct Pipeline<P> {
    provider: P,
    params: ScoringParams,
    corpus: CorpusStats,
}

impl<P: StatsProvider> Pipeline<P> {
    pub fn new(provider: P, params: ScoringParams) -> Result<Self> {
        params.validate()?;
        let corpus = CorpusStats::collect(&provider)?;
        tracing::info!(
            vocabulary = corpus.vocabulary,
            avg_doc_length = corpus.avg_doc_length,
            num_docs = corpus.num_docs,
            corpus_length = corpus.corpus_length,
            "collected corpus statistics"
        );
        Ok(Self { provider, params, corpus })
    }

    pub fn corpus(&self) -> &CorpusStats {
        &self.corpus
    }

    pub fn run(&self, queries: &[Query], config: RunConfig) -> Result<RunSummary> {
        let mut writer = RunWriter::create(config)?;
        let mut empty_queries = 0;
        for query in queries {
            let start = Instant::now();
            if query.is_empty() {
                tracing::warn!(query = %query.id, "query has no content terms after stopword removal");
                empty_queries += 1;
            }
            let state = score_query(&self.provider, &self.corpus, &self.params, query)?;
            writer.write_query(&query.id, &state)?;
            tracing::info!(
                query = %query.id,
                terms = query.terms.len(),
                docs = state.len(),
                took_s = start.elapsed().as_secs_f64(),
                "query scored"
            );
        }
        Ok(RunSummary { queries: queries.len(), empty_queries, lines_written: writer.lines_written() })
    }
}
