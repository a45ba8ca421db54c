//! Greedy word -> grapheme decomposition.

use crate::error::{ReadError, Result};

/// Grapheme alphabet partitioned by length (in letters).
///
/// `by_length()[k]` holds the graphemes of exactly `k` letters, in the order
/// they were given. Bucket 0 is always empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphemeAlphabet {
    by_length: Vec<Vec<String>>,
}

impl GraphemeAlphabet {
    pub fn new<I, S>(graphemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut by_length: Vec<Vec<String>> = vec![Vec::new()];
        for g in graphemes {
            let g = g.into();
            let len = g.chars().count();
            if len == 0 {
                continue;
            }
            if by_length.len() <= len {
                by_length.resize(len + 1, Vec::new());
            }
            if !by_length[len].contains(&g) {
                by_length[len].push(g);
            }
        }
        Self { by_length }
    }

    pub fn by_length(&self) -> &[Vec<String>] {
        &self.by_length
    }

    pub fn max_len(&self) -> usize {
        self.by_length.len() - 1
    }

    /// All graphemes, shortest first.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.by_length.iter().flatten().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_length.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, grapheme: &str) -> bool {
        self.by_length
            .get(grapheme.chars().count())
            .is_some_and(|bucket| bucket.iter().any(|g| g == grapheme))
    }

    /// Split `word` into graphemes, always taking the longest one that
    /// matches at the cursor.
    ///
    /// Fails on the first position no grapheme covers; there is no
    /// backtracking into a different segmentation.
    pub fn decompose(&self, word: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut rest = word;
        while !rest.is_empty() {
            let grapheme = self
                .by_length
                .iter()
                .rev()
                .flatten()
                .find(|g| rest.starts_with(g.as_str()))
                .ok_or_else(|| ReadError::Decomposition {
                    remainder: rest.to_string(),
                    word: word.to_string(),
                })?;
            rest = &rest[grapheme.len()..];
            out.push(grapheme.clone());
        }
        Ok(out)
    }
}
