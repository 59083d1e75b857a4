pub mod accumulate;
pub mod error;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod provider;
pub mod query;
pub mod rank;
pub mod stats;
pub mod stopwords;

pub use error::{Error, Result};
pub use models::{Model, ScoringParams};
pub use provider::{MemoryStats, StatsProvider};
pub use stats::{Aggregate, CorpusStats, Posting};
