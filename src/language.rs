//! Language data: letters, graphemes, vocabulary and suffixes.
//!
//! A language directory holds plain text files:
//!
//! - `letters`, `graphemes`: whitespace separated symbols;
//! - `vocabulary` (or `stems` in stem/suffix mode): one word per line;
//! - `suffixes` (stem/suffix mode only): one suffix per line.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{ReadError, Result};
use crate::tokenizer::GraphemeAlphabet;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub accepted_words: usize,
    /// Entries rejected for containing letters outside the alphabet.
    pub skipped_words: usize,
    /// Repeated entries; only the first occurrence is kept.
    pub duplicate_words: usize,
}

#[derive(Debug, Clone)]
pub struct Language {
    letters: Vec<char>,
    graphemes: GraphemeAlphabet,
    vocabulary: BTreeMap<char, Vec<String>>,
    suffixes: Option<Vec<String>>,
    report: LoadReport,
}

impl Language {
    /// Build a language from in-memory lists. `suffixes` enables stem/suffix
    /// mode, in which case `words` are stems.
    pub fn new<W, S>(
        letters: impl IntoIterator<Item = char>,
        graphemes: GraphemeAlphabet,
        words: W,
        suffixes: Option<S>,
    ) -> Self
    where
        W: IntoIterator,
        W::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<String>,
    {
        let mut alphabet: Vec<char> = Vec::new();
        for c in letters {
            if !alphabet.contains(&c) {
                alphabet.push(c);
            }
        }
        let letters = alphabet;
        for grapheme in graphemes.iter() {
            if let Some(c) = grapheme.chars().find(|c| !letters.contains(c)) {
                warn!(grapheme, letter = %c, "grapheme uses a letter outside the alphabet");
            }
        }

        let mut vocabulary: BTreeMap<char, Vec<String>> = BTreeMap::new();
        let mut report = LoadReport::default();
        for word in words {
            let word: String = word.into();
            let word = word.trim();
            let Some(first) = word.chars().next() else {
                continue;
            };
            if let Some(c) = word.chars().find(|c| !letters.contains(c)) {
                warn!(word, letter = %c, "vocabulary entry skipped: unknown letter");
                report.skipped_words += 1;
                continue;
            }
            let bucket = vocabulary.entry(first).or_default();
            if bucket.iter().any(|w| w == word) {
                warn!(word, "vocabulary entry skipped: duplicate");
                report.duplicate_words += 1;
                continue;
            }
            bucket.push(word.to_string());
            report.accepted_words += 1;
        }

        let suffixes = suffixes.map(|list| {
            let mut kept: Vec<String> = Vec::new();
            for s in list {
                let s: String = s.into();
                let s = s.trim();
                if s.is_empty() {
                    continue;
                }
                if kept.iter().any(|k| k == s) {
                    warn!(suffix = s, "suffix entry skipped: duplicate");
                    continue;
                }
                kept.push(s.to_string());
            }
            kept
        });

        Self {
            letters,
            graphemes,
            vocabulary,
            suffixes,
            report,
        }
    }

    /// Read a language directory. With `stems_and_suffixes` the word list comes
    /// from `stems` and the `suffixes` file is read as well.
    pub fn load(dir: impl AsRef<Path>, stems_and_suffixes: bool) -> Result<Self> {
        let dir = dir.as_ref();
        let letters: Vec<char> = read(dir, "letters")?
            .split_whitespace()
            .flat_map(str::chars)
            .collect();
        let graphemes = GraphemeAlphabet::new(read(dir, "graphemes")?.split_whitespace());
        let words = read(dir, if stems_and_suffixes { "stems" } else { "vocabulary" })?;
        let suffixes = if stems_and_suffixes {
            Some(read(dir, "suffixes")?)
        } else {
            None
        };

        let language = Self::new(
            letters,
            graphemes,
            words.lines(),
            suffixes.as_deref().map(str::lines),
        );
        info!(
            dir = %dir.display(),
            words = language.report.accepted_words,
            skipped = language.report.skipped_words,
            duplicates = language.report.duplicate_words,
            "language loaded"
        );
        Ok(language)
    }

    pub fn letters(&self) -> &[char] {
        &self.letters
    }

    pub fn is_letter(&self, c: char) -> bool {
        self.letters.contains(&c)
    }

    pub fn graphemes(&self) -> &GraphemeAlphabet {
        &self.graphemes
    }

    pub fn vocabulary(&self) -> &BTreeMap<char, Vec<String>> {
        &self.vocabulary
    }

    /// Vocabulary bucket of words starting with `first`.
    pub fn words_starting_with(&self, first: char) -> &[String] {
        self.vocabulary.get(&first).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Some` in stem/suffix mode.
    pub fn suffixes(&self) -> Option<&[String]> {
        self.suffixes.as_deref()
    }

    pub fn report(&self) -> LoadReport {
        self.report
    }
}

fn read(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    std::fs::read_to_string(&path).map_err(|source| ReadError::Language { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet() -> GraphemeAlphabet {
        GraphemeAlphabet::new(["a", "e", "ea", "l", "ll", "s", "t", "u", "z"])
    }

    #[test]
    fn unknown_letters_are_skipped_and_counted() {
        let language = Language::new(
            "aelstuz".chars(),
            alphabet(),
            ["lute", "lüte", "", "tell", "tall", "zest", "wolf"],
            None::<Vec<String>>,
        );
        assert_eq!(
            language.report(),
            LoadReport {
                accepted_words: 4,
                skipped_words: 2,
                duplicate_words: 0,
            }
        );
        assert_eq!(language.words_starting_with('t'), ["tell", "tall"]);
        assert_eq!(language.words_starting_with('l'), ["lute"]);
        assert!(language.words_starting_with('w').is_empty());
        assert!(language.suffixes().is_none());
    }

    #[test]
    fn repeated_entries_are_kept_once() {
        let language = Language::new(
            "aelstu".chars(),
            alphabet(),
            ["lute", "tell", " lute", "tell", "tall"],
            Some(["s", "s ", "es"]),
        );
        assert_eq!(
            language.report(),
            LoadReport {
                accepted_words: 3,
                skipped_words: 0,
                duplicate_words: 2,
            }
        );
        assert_eq!(language.words_starting_with('l'), ["lute"]);
        assert_eq!(language.words_starting_with('t'), ["tell", "tall"]);
        assert_eq!(language.suffixes().unwrap(), ["s", "es"]);
    }

    #[test]
    fn loads_a_directory() {
        let dir = std::env::temp_dir().join(format!("readnet-lang-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("letters"), "a e l s t u z\n").unwrap();
        std::fs::write(dir.join("graphemes"), "a e ea l ll s t u z").unwrap();
        std::fs::write(dir.join("stems"), "tell\nzest\n\nsel\n").unwrap();
        std::fs::write(dir.join("suffixes"), "s\nes\n").unwrap();

        let language = Language::load(&dir, true).unwrap();
        assert_eq!(language.letters(), ['a', 'e', 'l', 's', 't', 'u', 'z']);
        assert!(language.graphemes().contains("ll"));
        assert_eq!(language.report().accepted_words, 3);
        assert_eq!(language.suffixes().unwrap(), ["s", "es"]);

        // Plain mode needs a vocabulary file, which is missing here.
        match Language::load(&dir, false) {
            Err(ReadError::Language { path, .. }) => assert!(path.ends_with("vocabulary")),
            other => panic!("expected a language error, got {other:?}"),
        }
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
