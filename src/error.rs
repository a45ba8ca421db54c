use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Everything that can abort a reading run.
///
/// Vocabulary entries with unknown letters are not errors: the loader skips
/// and counts them.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("text input {input:?} is longer than max_text_len ({max})")]
    InputTooLong { input: String, max: usize },

    #[error("text input is empty")]
    EmptyInput,

    #[error("cannot decompose {remainder:?} in word {word:?}")]
    Decomposition { remainder: String, word: String },

    #[error("no simulation state for this window: engine at {now} ms, window ends at {required} ms")]
    NotSimulated { now: f64, required: f64 },

    #[error("probe name {0:?} already in use")]
    DuplicateProbe(String),

    #[error("no probe named {0:?}")]
    UnknownProbe(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("cannot read language data {path:?}: {source}")]
    Language {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot read parameter preset {path:?}: {source}")]
    Params {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid parameter preset: {0}")]
    Config(#[from] serde_json::Error),

    #[error("report directory {0:?} already exists")]
    ReportExists(PathBuf),

    #[error("cannot write report {path:?}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReadError>;
