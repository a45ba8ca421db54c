//! Model parameters.
//!
//! One immutable [`ModelParams`] value is built per run and handed by
//! reference to every component. `Default` is the tuned parameter set of the
//! reference reading experiment; presets can override any subset of fields
//! from JSON.

use std::collections::BTreeMap;
#[cfg(feature = "serde")]
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{PoissonParams, ShortTermPlasticity};
#[cfg(feature = "serde")]
use crate::error::{ReadError, Result};

pub const HEAD_GRAPHEME_MODEL: &str = "head_grapheme";
pub const LETTER_LEXICAL_MODEL: &str = "letter_lexical";

/// How a weight depends on the length of the word (or grapheme) it targets.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LengthRule {
    /// `base / (length * divisor)`
    Inverse { divisor: f64 },
    /// `base * length`
    Proportional,
}

impl LengthRule {
    pub fn apply(self, base: f64, length: usize) -> f64 {
        let length = length.max(1) as f64;
        match self {
            LengthRule::Inverse { divisor } => base / (length * divisor),
            LengthRule::Proportional => base * length,
        }
    }
}

/// Weight of a static connection family. Positive excites, negative inhibits.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WeightSpec {
    Fixed(f64),
    PerLength { base: f64, rule: LengthRule },
    /// Connect through a named synapse model; the weight is assigned later.
    Model(String),
}

impl WeightSpec {
    pub fn inverse(base: f64, divisor: f64) -> Self {
        WeightSpec::PerLength {
            base,
            rule: LengthRule::Inverse { divisor },
        }
    }

    pub fn proportional(base: f64) -> Self {
        WeightSpec::PerLength {
            base,
            rule: LengthRule::Proportional,
        }
    }

    /// Numeric weight for a target of `length`; `None` for model references.
    pub fn resolve(&self, length: usize) -> Option<f64> {
        match self {
            WeightSpec::Fixed(w) => Some(*w),
            WeightSpec::PerLength { base, rule } => Some(rule.apply(*base, length)),
            WeightSpec::Model(_) => None,
        }
    }
}

/// When decoding stops reading further positions.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "policy", rename_all = "snake_case"))]
pub enum StopPolicy {
    /// Stop at the first position whose winner has fewer events than `threshold`.
    Fixed { threshold: f64 },
    /// Stop at the first position whose winner drops below `ratio` times the
    /// previous position's winner.
    RelativeDrop { ratio: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ColumnSizes {
    pub letter: usize,
    pub head: usize,
    pub grapheme: usize,
    pub lexical: usize,
    pub lexical_pool: usize,
}

impl Default for ColumnSizes {
    fn default() -> Self {
        Self {
            letter: 4,
            head: 12,
            grapheme: 8,
            lexical: 1,
            lexical_pool: 10,
        }
    }
}

/// Poisson drive of the letter columns spelled by the input.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LetterDrive {
    pub source: PoissonParams,
    pub weight: f64,
}

impl Default for LetterDrive {
    fn default() -> Self {
        Self {
            source: PoissonParams::default(),
            weight: 1000.0,
        }
    }
}

/// Letter -> reading head attention sweep (skew normal over positions).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LetterHeadSweep {
    pub skew: f64,
    /// Added to the step index to get the distribution's location.
    pub loc_offset: f64,
    pub scale: f64,
    pub base_weight: f64,
    /// Weights into heads of length `l` are divided by `1 + (l - 1) * length_damping`.
    pub length_damping: f64,
}

impl Default for LetterHeadSweep {
    fn default() -> Self {
        Self {
            skew: 6.0,
            loc_offset: -0.7,
            scale: 0.67,
            base_weight: 3000.0,
            length_damping: 0.8,
        }
    }
}

/// Head -> grapheme position lock (normal over normalized elapsed time).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HeadGraphemeLock {
    pub scale: f64,
    pub base_weight: f64,
}

impl Default for HeadGraphemeLock {
    fn default() -> Self {
        Self {
            scale: 1.0,
            base_weight: 4500.0,
        }
    }
}

/// Suffix -> grapheme weighting around the estimated stem boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SuffixTracking {
    pub scale: f64,
    pub base_weight: f64,
    /// How many top-ranked stems the boundary estimate averages over.
    pub top_stems: usize,
}

impl Default for SuffixTracking {
    fn default() -> Self {
        Self {
            scale: 3.0,
            base_weight: 4000.0,
            top_stems: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModelParams {
    pub max_text_len: usize,
    /// Simulated ms per focus step.
    pub letter_focus_time: f64,
    pub stop_policy: StopPolicy,

    /// Vocabulary entries farther than this from the input are not built.
    pub prune_distance: usize,
    /// Candidates within this distance of each other inhibit each other.
    pub lexical_similarity_distance: usize,

    pub columns: ColumnSizes,
    pub letter_drive: LetterDrive,

    pub synapse_models: BTreeMap<String, ShortTermPlasticity>,
    /// Model used for every letter -> lexical connection, if any.
    pub letter_lexical_model: Option<String>,

    pub letter_col_lateral_inhibition: WeightSpec,
    pub letter_head_excitation: WeightSpec,
    pub member_first_letter_excitation: WeightSpec,
    pub member_last_letter_excitation: WeightSpec,
    pub member_letter_excitation: WeightSpec,
    pub absent_letter_inhibition: WeightSpec,
    pub member_letter_excitation_suffix: WeightSpec,
    pub absent_letter_inhibition_suffix: WeightSpec,
    pub shorter_word_inhibition: WeightSpec,
    /// Divided by the grapheme's relative frequency among the candidates.
    pub lexical_grapheme_base_excitation: f64,
    pub grapheme_lexical_feedback: Option<WeightSpec>,
    pub lexical_inhibiting_pop_excitation: WeightSpec,
    pub lexical_inhibiting_pop_feedback: WeightSpec,
    pub lexical_lateral_inhibition: WeightSpec,
    pub suffix_lateral_inhibition: WeightSpec,
    pub grapheme_lateral_inhibition: WeightSpec,
    pub head_grapheme_synapse: WeightSpec,

    pub letter_head_sweep: LetterHeadSweep,
    pub head_grapheme_lock: HeadGraphemeLock,
    pub suffix_tracking: SuffixTracking,
}

impl Default for ModelParams {
    fn default() -> Self {
        let mut synapse_models = BTreeMap::new();
        synapse_models.insert(
            HEAD_GRAPHEME_MODEL.to_string(),
            ShortTermPlasticity {
                u: 0.67,
                tau_rec: 50.0,
                tau_fac: 0.0,
            },
        );
        synapse_models.insert(
            LETTER_LEXICAL_MODEL.to_string(),
            ShortTermPlasticity {
                u: 0.67,
                tau_rec: 100.0,
                tau_fac: 1500.0,
            },
        );

        Self {
            max_text_len: 10,
            letter_focus_time: 50.0,
            stop_policy: StopPolicy::RelativeDrop { ratio: 0.56 },

            prune_distance: 4,
            lexical_similarity_distance: 4,

            columns: ColumnSizes::default(),
            letter_drive: LetterDrive::default(),

            synapse_models,
            letter_lexical_model: Some(LETTER_LEXICAL_MODEL.to_string()),

            letter_col_lateral_inhibition: WeightSpec::Fixed(-100.0),
            letter_head_excitation: WeightSpec::Fixed(300.0),
            member_first_letter_excitation: WeightSpec::Fixed(3500.0),
            member_last_letter_excitation: WeightSpec::Fixed(190.0),
            member_letter_excitation: WeightSpec::inverse(10_000.0, 6.0),
            absent_letter_inhibition: WeightSpec::inverse(-1140.0, 1.0),
            member_letter_excitation_suffix: WeightSpec::inverse(10_000.0, 30.0),
            absent_letter_inhibition_suffix: WeightSpec::inverse(-1140.0, 12.0),
            shorter_word_inhibition: WeightSpec::Fixed(-40.0),
            lexical_grapheme_base_excitation: 3600.0,
            grapheme_lexical_feedback: Some(WeightSpec::Fixed(5.0)),
            lexical_inhibiting_pop_excitation: WeightSpec::Fixed(9500.0),
            lexical_inhibiting_pop_feedback: WeightSpec::proportional(-900.0),
            lexical_lateral_inhibition: WeightSpec::Fixed(-50.0),
            suffix_lateral_inhibition: WeightSpec::Fixed(-1100.0),
            grapheme_lateral_inhibition: WeightSpec::proportional(-30.0),
            head_grapheme_synapse: WeightSpec::Model(HEAD_GRAPHEME_MODEL.to_string()),

            letter_head_sweep: LetterHeadSweep::default(),
            head_grapheme_lock: HeadGraphemeLock::default(),
            suffix_tracking: SuffixTracking::default(),
        }
    }
}

impl ModelParams {
    /// Simulated time of one full reading: a warm-up step plus one per position.
    pub fn reading_time(&self) -> f64 {
        (1 + self.max_text_len) as f64 * self.letter_focus_time
    }

    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ReadError::Params {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    #[cfg(feature = "serde")]
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
