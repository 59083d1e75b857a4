use crate::accumulate::QueryState;
use crate::error::{Error, Result};
use crate::models::Model;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_DEPTH: usize = 1000;
pub const DEFAULT_RUN_TAG: &str = "Exp";

/// One line of a run file.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDoc<'a> {
    pub docno: &'a str,
    pub rank: usize,
    pub score: f64,
}

/// Sort by descending score and keep the first `depth` entries. The sort is stable, so tied
/// documents keep their input order.
pub fn rank<'a>(mut scores: Vec<(&'a str, f64)>, depth: usize) -> Vec<RankedDoc<'a>> {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    scores
        .into_iter()
        .take(depth)
        .enumerate()
        .map(|(i, (docno, score))| RankedDoc { docno, rank: i + 1, score })
        .collect()
}

/// Write ranked lines as `<query> Q0 <docno> <rank> <score> <tag>`.
pub fn write_ranking<W: Write>(
    out: &mut W,
    model: Model,
    query_id: &str,
    ranked: &[RankedDoc<'_>],
    run_tag: &str,
) -> Result<()> {
    if let Some(doc) = ranked.iter().find(|d| !d.score.is_finite()) {
        return Err(Error::NonFiniteScore { model: model.name(), docno: doc.docno.to_string(), score: doc.score });
    }
    for doc in ranked {
        writeln!(out, "{} Q0 {} {} {} {}", query_id, doc.docno, doc.rank, doc.score, run_tag)?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub depth: usize,
    pub run_tag: String,
}

impl RunConfig {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        Self { output_dir: output_dir.as_ref().to_path_buf(), depth: DEFAULT_DEPTH, run_tag: DEFAULT_RUN_TAG.to_string() }
    }
}

/// The five run files of one run. Files are truncated when the writer is opened and then
/// appended to query by query.
pub struct RunWriter {
    config: RunConfig,
    files: Vec<(Model, BufWriter<File>)>,
    lines: [usize; 5],
}

impl RunWriter {
    pub fn create(config: RunConfig) -> Result<Self> {
        create_dir_all(&config.output_dir)?;
        let mut files = Vec::with_capacity(Model::ALL.len());
        for model in Model::ALL {
            let f = File::create(config.output_dir.join(model.file_name()))?;
            files.push((model, BufWriter::new(f)));
        }
        Ok(Self { config, files, lines: [0; 5] })
    }

    /// Rank and append one query's results to every run file, then flush.
    pub fn write_query(&mut self, query_id: &str, state: &QueryState) -> Result<()> {
        for (i, (model, out)) in self.files.iter_mut().enumerate() {
            let ranked = rank(state.scores(*model), self.config.depth);
            write_ranking(out, *model, query_id, &ranked, &self.config.run_tag)?;
            out.flush()?;
            self.lines[i] += ranked.len();
        }
        Ok(())
    }

    /// Lines written so far, per model.
    pub fn lines_written(&self) -> Vec<(Model, usize)> {
        Model::ALL.iter().copied().zip(self.lines.iter().copied()).collect()
    }
}
