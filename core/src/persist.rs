use crate::error::{Error, Result};
use crate::provider::MemoryStats;
use crate::stats::{CorpusStats, Posting};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub corpus: CorpusStats,
    pub num_terms: usize,
}

pub struct SnapshotPaths {
    pub root: PathBuf,
}

impl SnapshotPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn postings(&self) -> PathBuf { self.root.join("postings.bin") }
    fn doc_lengths(&self) -> PathBuf { self.root.join("doc_lengths.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path).map_err(|e| Error::Snapshot(format!("{}: {e}", path.display())))?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

pub fn save_postings(paths: &SnapshotPaths, postings: &HashMap<String, Vec<Posting>>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.postings())?;
    let bytes = bincode::serialize(postings)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_postings(paths: &SnapshotPaths) -> Result<HashMap<String, Vec<Posting>>> {
    let buf = read_bytes(&paths.postings())?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_doc_lengths(paths: &SnapshotPaths, lengths: &HashMap<String, u64>) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.doc_lengths())?;
    let bytes = bincode::serialize(lengths)?;
    f.write_all(&bytes)?;
    Ok(())
}

pub fn load_doc_lengths(paths: &SnapshotPaths) -> Result<HashMap<String, u64>> {
    let buf = read_bytes(&paths.doc_lengths())?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_meta(paths: &SnapshotPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let mut f = File::create(paths.meta())?;
    let json = serde_json::to_string_pretty(meta)?;
    f.write_all(json.as_bytes())?;
    Ok(())
}

pub fn load_meta(paths: &SnapshotPaths) -> Result<MetaFile> {
    let buf = read_bytes(&paths.meta())?;
    let meta: MetaFile = serde_json::from_slice(&buf)?;
    Ok(meta)
}

/// Write a captured provider to `paths.root`.
pub fn save_snapshot(paths: &SnapshotPaths, stats: &MemoryStats, created_at: &str) -> Result<()> {
    save_postings(paths, &stats.postings)?;
    save_doc_lengths(paths, &stats.doc_lengths)?;
    let meta = MetaFile {
        version: SNAPSHOT_VERSION,
        created_at: created_at.to_string(),
        corpus: stats.corpus,
        num_terms: stats.postings.len(),
    };
    save_meta(paths, &meta)
}

pub fn load_snapshot(paths: &SnapshotPaths) -> Result<MemoryStats> {
    let meta = load_meta(paths)?;
    if meta.version != SNAPSHOT_VERSION {
        return Err(Error::Snapshot(format!(
            "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
            meta.version
        )));
    }
    meta.corpus.validate()?;
    let postings = load_postings(paths)?;
    let doc_lengths = load_doc_lengths(paths)?;
    Ok(MemoryStats { corpus: meta.corpus, postings, doc_lengths })
}
