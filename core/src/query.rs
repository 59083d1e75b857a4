use crate::error::{Error, Result};
use crate::stopwords::StopwordFilter;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

lazy_static! {
    // "<id>.  Document <word> <word> <need statement>"
    static ref QUERY_LINE: Regex =
        Regex::new(r"^([0-9]+)\.\s+Document\s+[a-z]+\s+[a-z]+\s+(.*)$").expect("valid regex");
    static ref COMMA: Regex = Regex::new(r",\s").expect("valid regex");
}

/// A parsed query: its id and the frequency of each content term.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: String,
    pub terms: BTreeMap<String, u32>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Total number of content words, repeats included.
    pub fn len(&self) -> u32 {
        self.terms.values().sum()
    }
}

pub struct QueryParser<'a> {
    stopwords: &'a StopwordFilter,
}

impl<'a> QueryParser<'a> {
    pub fn new(stopwords: &'a StopwordFilter) -> Self {
        Self { stopwords }
    }

    /// Parse one line. Blank lines yield `None`; a line without the `<id>. Document <w> <w>`
    /// prefix is an error.
    pub fn parse_line(&self, line: &str) -> Result<Option<Query>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let normalized = COMMA.replace_all(line, " ");
        let normalized = match normalized.strip_suffix('.') {
            Some(head) => head.to_string(),
            None => normalized.into_owned(),
        };
        let caps = QUERY_LINE
            .captures(&normalized)
            .ok_or_else(|| Error::MalformedQuery { line: line.to_string() })?;
        let id = caps[1].to_string();

        let mut terms: BTreeMap<String, u32> = BTreeMap::new();
        for word in caps[2].split_whitespace() {
            if self.stopwords.is_stopword(word) {
                continue;
            }
            *terms.entry(word.to_string()).or_insert(0) += 1;
        }
        Ok(Some(Query { id, terms }))
    }

    pub fn parse_all(&self, text: &str) -> Result<Vec<Query>> {
        let mut queries = Vec::new();
        for line in text.lines() {
            if let Some(q) = self.parse_line(line)? {
                queries.push(q);
            }
        }
        Ok(queries)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Query>> {
        let text = fs::read_to_string(path)?;
        self.parse_all(&text)
    }
}
