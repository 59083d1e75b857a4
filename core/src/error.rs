use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A scoring formula was handed a zero where it divides.
    #[error("zero denominator: {what}")]
    ZeroDenominator { what: &'static str },

    /// Logarithm of a non-positive argument.
    #[error("log domain error in {what}: argument {value}")]
    Domain { what: &'static str, value: f64 },

    #[error("non-finite {model} score {score} for document {docno}")]
    NonFiniteScore { model: &'static str, docno: String, score: f64 },

    /// A term was accumulated after language-model completion already ran for the query.
    #[error("term {term:?} accumulated after language-model completion")]
    AccumulateAfterCompletion { term: String },

    #[error("malformed query line: {line:?}")]
    MalformedQuery { line: String },

    #[error("statistics provider: {0}")]
    Provider(String),

    #[error("snapshot: {0}")]
    Snapshot(String),

    #[error("invalid scoring parameter: {0}")]
    InvalidParams(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Snapshot(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Snapshot(e.to_string())
    }
}
