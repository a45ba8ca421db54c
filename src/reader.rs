//! One word, end to end: prune, build, schedule, decode.

use tracing::{info, warn};

use crate::automaton::bounded_distance;
use crate::config::ModelParams;
use crate::decision::{DecisionEngine, Ranked};
use crate::engine::SimulationEngine;
use crate::error::{ReadError, Result};
use crate::language::Language;
use crate::probes::{RunContext, TimeWindow};
use crate::scheduler::FocusScheduler;
use crate::topology::ReadingNetwork;

/// Outcome of reading one input.
#[derive(Debug, Clone)]
pub struct Reading {
    pub input: String,
    pub decoded: String,
    pub window: TimeWindow,
    pub candidates: Vec<String>,
    /// Probes and groups of the run, for reports and further decisions.
    pub context: RunContext,
}

impl Reading {
    /// Candidate words ranked by lexical unit activity over the run.
    pub fn word_ranking<E: SimulationEngine>(&self, engine: &E) -> Result<Vec<Ranked>> {
        DecisionEngine::new(engine, &self.context.probes, self.window)?.score(&self.candidates)
    }
}

#[derive(Debug, Clone)]
pub struct Reader {
    language: Language,
    params: ModelParams,
}

impl Reader {
    pub fn new(language: Language, params: ModelParams) -> Self {
        Self { language, params }
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Vocabulary entries sharing the input's first letter and lying within
    /// `prune_distance` edits of it.
    pub fn candidates(&self, input: &str) -> Vec<String> {
        let Some(first) = input.chars().next() else {
            return Vec::new();
        };
        self.language
            .words_starting_with(first)
            .iter()
            .filter(|w| bounded_distance(w, input, self.params.prune_distance).is_some())
            .cloned()
            .collect()
    }

    /// Read `input` on `engine`, which is reset first.
    pub fn read<E: SimulationEngine>(&self, engine: &mut E, input: &str) -> Result<Reading> {
        let len = input.chars().count();
        if len == 0 {
            return Err(ReadError::EmptyInput);
        }
        if len > self.params.max_text_len {
            return Err(ReadError::InputTooLong {
                input: input.to_string(),
                max: self.params.max_text_len,
            });
        }

        let candidates = self.candidates(input);
        if candidates.is_empty() {
            warn!(input, "no vocabulary entry within reach of the input");
        }

        engine.reset();
        let network = ReadingNetwork::build(engine, &self.language, &candidates, input, &self.params)?;
        let mut context = RunContext::new();
        network.setup_reporting(engine, &mut context)?;

        let window = FocusScheduler::new(&self.params).run(engine, &network, &context)?;
        let decoded = DecisionEngine::new(&*engine, &context.probes, window)?
            .decode(&context.reading, self.params.stop_policy)?;
        info!(input, decoded = decoded.as_str(), "word read");

        Ok(Reading {
            input: input.to_string(),
            decoded,
            window,
            candidates,
            context,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::GraphemeAlphabet;

    fn reader() -> Reader {
        let language = Language::new(
            "aelstuz".chars(),
            GraphemeAlphabet::new(["a", "e", "ea", "l", "ll", "s", "t", "u", "z"]),
            ["lute", "lease", "least", "else", "tell", "tall"],
            None::<Vec<String>>,
        );
        Reader::new(language, ModelParams::default())
    }

    #[test]
    fn candidates_share_the_first_letter() {
        let reader = reader();
        assert_eq!(reader.candidates("lute"), ["lute", "lease", "least"]);
        assert_eq!(reader.candidates("ltue"), ["lute", "lease", "least"]);
        assert!(reader.candidates("zest").is_empty());
        assert!(reader.candidates("").is_empty());
    }

    #[test]
    fn tight_pruning_keeps_close_words_only() {
        let mut reader = reader();
        reader.params.prune_distance = 2;
        assert_eq!(reader.candidates("ltue"), ["lute"]);
        reader.params.prune_distance = 0;
        assert_eq!(reader.candidates("tell"), ["tell"]);
    }

    #[test]
    fn repeated_vocabulary_lines_still_read() {
        let language = Language::new(
            "aelstuz".chars(),
            GraphemeAlphabet::new(["a", "e", "l", "ll", "s", "t", "u", "z"]),
            ["lute", "lute", "tell"],
            None::<Vec<String>>,
        );
        assert_eq!(language.report().duplicate_words, 1);
        let reader = Reader::new(language, ModelParams::default());
        assert_eq!(reader.candidates("lute"), ["lute"]);

        let mut engine = crate::recording::RecordingEngine::new();
        let reading = reader.read(&mut engine, "lute").unwrap();
        assert_eq!(reading.candidates, ["lute"]);
        assert_eq!(reading.decoded, "");
    }
}
