//! Find text in the buffer and map hits back onto the tree.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::editing::buffer::TextBuffer;
use crate::editing::resolver::{ResolvedOffset, resolve_buffer_offset};
use crate::editing::tree::{DocumentTree, TextRange};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchMode {
    #[default]
    Literal,
    Regex,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub pattern: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl SearchQuery {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Literal,
            case_sensitive: false,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            mode: SearchMode::Regex,
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, yes: bool) -> Self {
        self.case_sensitive = yes;
        self
    }

    fn compile(&self) -> Result<Regex, SearchError> {
        let source = match self.mode {
            SearchMode::Literal => regex::escape(&self.pattern),
            SearchMode::Regex => self.pattern.clone(),
        };
        RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|err| SearchError::InvalidPattern {
                pattern: self.pattern.clone(),
                source: err,
            })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// One match. `range` is in chars; `location` is where the match starts in the tree.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub range: TextRange,
    pub text: String,
    pub location: Option<ResolvedOffset>,
}

/// Every non-overlapping match of `query` in document order.
///
/// An empty pattern finds nothing, and neither do patterns that only match the empty string.
pub fn search(
    tree: &DocumentTree,
    buffer: &TextBuffer,
    query: &SearchQuery,
) -> Result<Vec<SearchHit>, SearchError> {
    if query.pattern.is_empty() {
        return Ok(Vec::new());
    }
    let regex = query.compile()?;
    let text = buffer.get_text();

    // Matches come back in byte offsets; walk forward once to convert to chars
    let mut hits = Vec::new();
    let mut chars_before = 0;
    let mut bytes_seen = 0;
    for found in regex.find_iter(&text) {
        if found.as_str().is_empty() {
            continue;
        }
        chars_before += text[bytes_seen..found.start()].chars().count();
        let len = found.as_str().chars().count();
        let range = TextRange::new(chars_before, chars_before + len);
        chars_before += len;
        bytes_seen = found.end();
        hits.push(SearchHit {
            range,
            text: found.as_str().to_string(),
            location: resolve_buffer_offset(tree, range.start),
        });
    }
    log::debug!("search {:?} found {} hits", query.pattern, hits.len());
    Ok(hits)
}
