//! Spiking reading model.
//!
//! A layered population network reads a short written input over simulated
//! time: letter hypercolumns drive position-independent reading heads, heads
//! drive per-position grapheme hypercolumns, and candidate lexical units
//! compete through lateral inhibition. The decoded word is read back from
//! grapheme spike counts.
//!
//! Simulation is behind [`engine::SimulationEngine`]; [`substrate::Substrate`]
//! is the bundled reference engine.

#[path = "core/engine.rs"]
pub mod engine;

#[path = "core/prng.rs"]
pub mod prng;

#[path = "core/recording.rs"]
pub mod recording;

#[path = "core/substrate.rs"]
pub mod substrate;

#[path = "experiments/cases.rs"]
pub mod cases;

pub mod automaton;
pub mod config;
pub mod decision;
pub mod density;
pub mod error;
pub mod language;
pub mod probes;
pub mod reader;
#[cfg(feature = "serde")]
pub mod report;
pub mod scheduler;
pub mod tokenizer;
pub mod topology;

pub use config::{ModelParams, StopPolicy, WeightSpec};
pub use error::{ReadError, Result};
pub use language::Language;
pub use reader::{Reader, Reading};
