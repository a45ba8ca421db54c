//! Network topology builder.
//!
//! Lays out the position-indexed population graph for one input and wires
//! every static connection into the engine:
//!
//! ```text
//! letters[pos] ──> heads[len] ──> graphemes[pos] <──> lexical ──> pool ─┐
//!      │                              ^                   ^             │
//!      └──────────────────────────────┼───────────────────┴─────────────┘
//!                                  suffixes
//! ```
//!
//! Weights that change during reading (letter -> head, head -> grapheme,
//! suffix -> grapheme) are only created here; [`crate::scheduler`] assigns them.

use hashbrown::HashMap;
use tracing::{info, warn};

use crate::automaton::bounded_distance;
use crate::config::{ModelParams, WeightSpec};
use crate::engine::{EngineError, Population, SimulationEngine, Synapse, SynapseModel};
use crate::error::{ReadError, Result};
use crate::language::Language;
use crate::probes::{ProbeGroup, RunContext};

/// Populations at one input position (or one layer), one per label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hypercolumn {
    columns: Vec<(String, Population)>,
}

impl Hypercolumn {
    fn create<E, I>(engine: &mut E, labels: I, size: usize) -> Result<Self>
    where
        E: SimulationEngine,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut columns = Vec::new();
        for label in labels {
            columns.push((label.into(), engine.create_population(size, None)?));
        }
        Ok(Self { columns })
    }

    pub fn get(&self, label: &str) -> Option<&Population> {
        self.columns
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, pop)| pop)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Population)> {
        self.columns.iter().map(|(l, pop)| (l.as_str(), pop))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Every neuron of every column.
    pub fn cells(&self) -> Population {
        Population::union_all(self.columns.iter().map(|(_, pop)| pop))
    }
}

/// A suffix unit and its grapheme decomposition.
#[derive(Debug, Clone, PartialEq)]
pub struct SuffixUnit {
    pub suffix: String,
    pub population: Population,
    pub graphemes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReadingNetwork {
    input: String,
    max_text_len: usize,
    letters: Vec<Hypercolumn>,
    /// Indexed by grapheme length; bucket 0 is always empty.
    heads_by_length: Vec<Hypercolumn>,
    graphemes: Vec<Hypercolumn>,
    lexical: Hypercolumn,
    lexical_pool: Population,
    suffixes: Option<Vec<SuffixUnit>>,
    grapheme_frequency: HashMap<String, f64>,
}

impl ReadingNetwork {
    /// Create every population and static connection for reading `input`
    /// against `candidates`.
    ///
    /// The engine is expected to be freshly reset. Fails on an oversized or
    /// empty input and on candidates (or suffixes) the grapheme alphabet
    /// cannot decompose.
    pub fn build<E: SimulationEngine>(
        engine: &mut E,
        language: &Language,
        candidates: &[String],
        input: &str,
        params: &ModelParams,
    ) -> Result<Self> {
        let input_len = input.chars().count();
        if input_len == 0 {
            return Err(ReadError::EmptyInput);
        }
        if input_len > params.max_text_len {
            return Err(ReadError::InputTooLong {
                input: input.to_string(),
                max: params.max_text_len,
            });
        }

        let alphabet = language.graphemes();
        let decompositions = candidates
            .iter()
            .map(|w| alphabet.decompose(w))
            .collect::<Result<Vec<_>>>()?;
        let suffix_decompositions = match language.suffixes() {
            Some(list) => Some(
                list.iter()
                    .map(|s| alphabet.decompose(s))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        let grapheme_frequency = relative_frequencies(decompositions.iter().flatten());

        for (name, stp) in &params.synapse_models {
            engine.register_model(name, SynapseModel::ShortTerm(*stp));
        }

        let cols = &params.columns;
        let max = params.max_text_len;

        let lexical = Hypercolumn::create(engine, candidates.iter().cloned(), cols.lexical)?;
        let suffixes = match (language.suffixes(), suffix_decompositions) {
            (Some(list), Some(decomps)) => {
                let mut units = Vec::with_capacity(list.len());
                for (suffix, graphemes) in list.iter().zip(decomps) {
                    units.push(SuffixUnit {
                        suffix: suffix.clone(),
                        population: engine.create_population(cols.lexical, None)?,
                        graphemes,
                    });
                }
                Some(units)
            }
            _ => None,
        };
        let lexical_pool = engine.create_population(cols.lexical_pool, None)?;
        let letters = (0..max)
            .map(|_| {
                Hypercolumn::create(
                    engine,
                    language.letters().iter().map(char::to_string),
                    cols.letter,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        let heads_by_length = alphabet
            .by_length()
            .iter()
            .map(|bucket| Hypercolumn::create(engine, bucket.iter().cloned(), cols.head))
            .collect::<Result<Vec<_>>>()?;
        let graphemes = (0..max)
            .map(|_| Hypercolumn::create(engine, alphabet.iter(), cols.grapheme))
            .collect::<Result<Vec<_>>>()?;

        let network = Self {
            input: input.to_string(),
            max_text_len: max,
            letters,
            heads_by_length,
            graphemes,
            lexical,
            lexical_pool,
            suffixes,
            grapheme_frequency,
        };

        network.drive_input(engine, params)?;
        network.wire_letters(engine, params)?;
        network.wire_heads(engine, params)?;
        network.wire_lexical(engine, params, &decompositions)?;
        network.wire_suffixes(engine, params)?;
        network.wire_grapheme_inhibition(engine, params)?;

        info!(
            input,
            candidates = candidates.len(),
            suffixes = network.suffixes.as_ref().map_or(0, Vec::len),
            positions = max,
            "reading network built"
        );
        Ok(network)
    }

    /// Register the probes and groups of one reading run.
    pub fn setup_reporting<E: SimulationEngine>(
        &self,
        engine: &mut E,
        context: &mut RunContext,
    ) -> Result<()> {
        context.reset();
        let probes = &mut context.probes;

        for (word, pop) in self.lexical.iter() {
            probes.insert(engine, word, pop)?;
        }
        if let Some(suffixes) = &self.suffixes {
            for unit in suffixes {
                probes.insert(engine, suffix_probe(&unit.suffix), &unit.population)?;
            }
        }
        probes.insert(engine, "lexical_inhibition", &self.lexical_pool)?;
        for heads in &self.heads_by_length {
            for (grapheme, pop) in heads.iter() {
                probes.insert(engine, head_probe(grapheme), pop)?;
            }
        }

        let words: Vec<String> = self.lexical.labels().map(str::to_string).collect();
        context.report_groups.push(ProbeGroup::new(
            "Head",
            self.heads_by_length
                .iter()
                .flat_map(Hypercolumn::labels)
                .map(head_probe)
                .collect(),
        ));
        context
            .report_groups
            .push(ProbeGroup::new("Words", words.clone()));
        if let Some(suffixes) = &self.suffixes {
            context.report_groups.push(ProbeGroup::new(
                "Suffixes",
                suffixes.iter().map(|u| suffix_probe(&u.suffix)).collect(),
            ));
            context.stems = Some(ProbeGroup::new("Stems", words));
        }

        for (pos, hypercol) in self.graphemes.iter().enumerate() {
            let mut labels = Vec::with_capacity(hypercol.len());
            for (grapheme, pop) in hypercol.iter() {
                let label = grapheme_probe(pos, grapheme);
                context.probes.insert(engine, label.as_str(), pop)?;
                labels.push(label);
            }
            context
                .reading
                .push(ProbeGroup::new(format!("Reading-{pos}"), labels));
        }
        Ok(())
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn max_text_len(&self) -> usize {
        self.max_text_len
    }

    pub fn letter_hypercolumns(&self) -> &[Hypercolumn] {
        &self.letters
    }

    pub fn heads_by_length(&self) -> &[Hypercolumn] {
        &self.heads_by_length
    }

    /// All reading-head cells.
    pub fn head_cells(&self) -> Population {
        let layers: Vec<Population> = self.heads_by_length.iter().map(Hypercolumn::cells).collect();
        Population::union_all(&layers)
    }

    pub fn grapheme_hypercolumns(&self) -> &[Hypercolumn] {
        &self.graphemes
    }

    pub fn lexical(&self) -> &Hypercolumn {
        &self.lexical
    }

    pub fn lexical_pool(&self) -> &Population {
        &self.lexical_pool
    }

    pub fn suffixes(&self) -> Option<&[SuffixUnit]> {
        self.suffixes.as_deref()
    }

    /// Share of `grapheme` among all grapheme occurrences in the candidates.
    pub fn grapheme_frequency(&self, grapheme: &str) -> f64 {
        self.grapheme_frequency.get(grapheme).copied().unwrap_or(0.0)
    }

    fn drive_input<E: SimulationEngine>(&self, engine: &mut E, params: &ModelParams) -> Result<()> {
        let drive = &params.letter_drive;
        for (pos, c) in self.input.chars().enumerate() {
            let mut buf = [0u8; 4];
            match self.letters[pos].get(c.encode_utf8(&mut buf)) {
                Some(col) => {
                    let source = engine.create_poisson_source(drive.source);
                    engine.drive(source, col, drive.weight)?;
                }
                None => warn!(letter = %c, pos, "input letter outside the alphabet, position left undriven"),
            }
        }
        Ok(())
    }

    fn wire_letters<E: SimulationEngine>(&self, engine: &mut E, params: &ModelParams) -> Result<()> {
        let input_len = self.input.chars().count();
        let heads: Vec<(&str, &Population)> =
            self.heads_by_length.iter().flat_map(Hypercolumn::iter).collect();
        let letter_lexical = match &params.letter_lexical_model {
            Some(name) => Some(
                engine
                    .model_id(name)
                    .ok_or_else(|| EngineError::UnknownModel(name.clone()))?,
            ),
            None => None,
        };

        for (pos, hypercol) in self.letters.iter().enumerate() {
            let cells = hypercol.cells();

            for later in &self.letters[pos + 1..] {
                connect(engine, &cells, &later.cells(), &params.letter_col_lateral_inhibition, 1)?;
            }

            for (letter, letter_col) in hypercol.iter() {
                for (grapheme, head_col) in &heads {
                    if grapheme.contains(letter) {
                        connect(engine, letter_col, head_col, &params.letter_head_excitation, 1)?;
                    }
                }
            }

            for (word, word_col) in self.lexical.iter() {
                let len = word.chars().count();
                if pos >= len {
                    connect(engine, &cells, word_col, &params.shorter_word_inhibition, len)?;
                    continue;
                }
                for (letter, letter_col) in hypercol.iter() {
                    let spec = letter_role(word, len, pos, letter, self.suffixes.is_some(), params);
                    let Some(weight) = spec.resolve(len) else {
                        connect(engine, letter_col, word_col, spec, len)?;
                        continue;
                    };
                    match letter_lexical {
                        Some(model) => {
                            engine.connect(letter_col, word_col, Synapse::Model(model))?;
                            let conns = engine.connections(letter_col, word_col);
                            engine.set_weight(&conns, weight)?;
                        }
                        None => engine.connect(letter_col, word_col, Synapse::Fixed(weight))?,
                    }
                }
            }

            if let Some(suffixes) = &self.suffixes {
                for unit in suffixes {
                    let len = unit.suffix.chars().count();
                    if input_len.saturating_sub(pos) > len {
                        continue;
                    }
                    for (letter, letter_col) in hypercol.iter() {
                        let spec = if unit.suffix.contains(letter) {
                            &params.member_letter_excitation_suffix
                        } else {
                            &params.absent_letter_inhibition_suffix
                        };
                        connect(engine, letter_col, &unit.population, spec, len)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn wire_heads<E: SimulationEngine>(&self, engine: &mut E, params: &ModelParams) -> Result<()> {
        for heads in &self.heads_by_length {
            for (grapheme, head_col) in heads.iter() {
                for hypercol in &self.graphemes {
                    if let Some(target) = hypercol.get(grapheme) {
                        connect(engine, head_col, target, &params.head_grapheme_synapse, 1)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn wire_lexical<E: SimulationEngine>(
        &self,
        engine: &mut E,
        params: &ModelParams,
        decompositions: &[Vec<String>],
    ) -> Result<()> {
        let lexical_cells = self.lexical.cells();
        if !lexical_cells.is_empty() {
            connect(
                engine,
                &lexical_cells,
                &self.lexical_pool,
                &params.lexical_inhibiting_pop_excitation,
                1,
            )?;
        }

        for ((word, word_col), decomposition) in self.lexical.iter().zip(decompositions) {
            let len = word.chars().count();
            connect(engine, &self.lexical_pool, word_col, &params.lexical_inhibiting_pop_feedback, len)?;

            for (hypercol, grapheme) in self.graphemes.iter().zip(decomposition) {
                let Some(target) = hypercol.get(grapheme) else {
                    continue;
                };
                let weight = params.lexical_grapheme_base_excitation / self.grapheme_frequency(grapheme);
                engine.connect(word_col, target, Synapse::Fixed(weight))?;
                if let Some(feedback) = &params.grapheme_lexical_feedback {
                    connect(engine, target, word_col, feedback, len)?;
                }
            }

            for (other, other_col) in self.lexical.iter() {
                if other != word
                    && bounded_distance(word, other, params.lexical_similarity_distance).is_some()
                {
                    connect(engine, word_col, other_col, &params.lexical_lateral_inhibition, len)?;
                }
            }
        }
        Ok(())
    }

    fn wire_suffixes<E: SimulationEngine>(&self, engine: &mut E, params: &ModelParams) -> Result<()> {
        let Some(suffixes) = &self.suffixes else {
            return Ok(());
        };
        for unit in suffixes {
            let len = unit.suffix.chars().count();
            for other in suffixes {
                if other.suffix != unit.suffix {
                    connect(
                        engine,
                        &unit.population,
                        &other.population,
                        &params.suffix_lateral_inhibition,
                        len,
                    )?;
                }
            }
            for hypercol in &self.graphemes {
                for (_, target) in hypercol.iter() {
                    engine.connect(&unit.population, target, Synapse::Placeholder)?;
                }
            }
        }
        Ok(())
    }

    /// Graphemes sharing a letter inhibit each other across adjacent positions.
    fn wire_grapheme_inhibition<E: SimulationEngine>(
        &self,
        engine: &mut E,
        params: &ModelParams,
    ) -> Result<()> {
        for (pos, hypercol) in self.graphemes.iter().enumerate() {
            let neighbours = [
                pos.checked_sub(1).and_then(|p| self.graphemes.get(p)),
                self.graphemes.get(pos + 1),
            ];
            for (grapheme, col) in hypercol.iter() {
                for neighbour in neighbours.into_iter().flatten() {
                    for (other, other_col) in neighbour.iter() {
                        if shares_letter(grapheme, other) {
                            let len = other.chars().count();
                            connect(engine, col, other_col, &params.grapheme_lateral_inhibition, len)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// Weight family of the connection from `letter` at `pos` to `word`.
///
/// Roles are exclusive and tried in order: first letter, last letter (only
/// without suffix units), member, absent.
fn letter_role<'p>(
    word: &str,
    len: usize,
    pos: usize,
    letter: &str,
    with_suffixes: bool,
    params: &'p ModelParams,
) -> &'p WeightSpec {
    let matches_at = |i: usize| letter.chars().eq(word.chars().nth(i));
    if pos == 0 && matches_at(0) {
        &params.member_first_letter_excitation
    } else if !with_suffixes && pos + 1 == len && matches_at(len - 1) {
        &params.member_last_letter_excitation
    } else if word.contains(letter) {
        &params.member_letter_excitation
    } else {
        &params.absent_letter_inhibition
    }
}

fn connect<E: SimulationEngine>(
    engine: &mut E,
    source: &Population,
    target: &Population,
    spec: &WeightSpec,
    length: usize,
) -> Result<()> {
    let synapse = match spec {
        WeightSpec::Model(name) => Synapse::Model(
            engine
                .model_id(name)
                .ok_or_else(|| EngineError::UnknownModel(name.clone()))?,
        ),
        other => Synapse::Fixed(other.resolve(length).unwrap_or_default()),
    };
    engine.connect(source, target, synapse)?;
    Ok(())
}

fn shares_letter(a: &str, b: &str) -> bool {
    a.chars().any(|c| b.contains(c))
}

fn relative_frequencies<'a>(graphemes: impl Iterator<Item = &'a String>) -> HashMap<String, f64> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for g in graphemes {
        *counts.entry(g.clone()).or_default() += 1;
        total += 1;
    }
    counts
        .into_iter()
        .map(|(g, n)| (g, n as f64 / total as f64))
        .collect()
}

pub fn head_probe(grapheme: &str) -> String {
    format!("head-{grapheme}")
}

pub fn suffix_probe(suffix: &str) -> String {
    format!("suff_{suffix}")
}

pub fn grapheme_probe(pos: usize, grapheme: &str) -> String {
    format!("g{pos}-{grapheme}")
}
