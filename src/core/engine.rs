//! The simulation-engine seam.
//!
//! The reading model never integrates neurons itself. It creates populations,
//! wires them, retargets weights between focus steps and reads back spike
//! events through [`SimulationEngine`]. [`crate::substrate::Substrate`] is the
//! in-process reference implementation; [`crate::recording::RecordingEngine`]
//! is a dry-run double that only logs what it is asked to do.

use core::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type NeuronId = usize;

/// Errors raised by an engine implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("neuron {0} does not exist")]
    UnknownNeuron(NeuronId),
    #[error("synapse model {0:?} is not registered")]
    UnknownModel(String),
    #[error("recorder {0} does not exist")]
    UnknownRecorder(usize),
    #[error("driving source {0} does not exist")]
    UnknownSource(usize),
    #[error("connection {0} does not exist")]
    UnknownConnection(usize),
    #[error("cannot create an empty population")]
    EmptyPopulation,
    #[error("invalid simulation duration {0} ms")]
    InvalidDuration(f64),
}

/// A set of neurons, kept sorted and free of duplicates.
///
/// Populations are created by the engine and owned by whoever built the
/// network; unions are plain values and can be passed anywhere a source or
/// target set is expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Population {
    members: Vec<NeuronId>,
}

impl Population {
    pub fn from_range(range: Range<NeuronId>) -> Self {
        Self {
            members: range.collect(),
        }
    }

    pub fn from_members(mut members: Vec<NeuronId>) -> Self {
        members.sort_unstable();
        members.dedup();
        Self { members }
    }

    pub fn members(&self) -> &[NeuronId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: NeuronId) -> bool {
        self.members.binary_search(&id).is_ok()
    }

    /// True when every member of `other` is also a member of `self`.
    pub fn covers(&self, other: &Population) -> bool {
        !other.is_empty() && other.members.iter().all(|&id| self.contains(id))
    }

    pub fn union(&self, other: &Population) -> Population {
        // Both sides are sorted; merge without re-sorting.
        let mut out = Vec::with_capacity(self.len() + other.len());
        let (mut i, mut j) = (0, 0);
        while i < self.members.len() && j < other.members.len() {
            let (a, b) = (self.members[i], other.members[j]);
            if a < b {
                out.push(a);
                i += 1;
            } else if b < a {
                out.push(b);
                j += 1;
            } else {
                out.push(a);
                i += 1;
                j += 1;
            }
        }
        out.extend_from_slice(&self.members[i..]);
        out.extend_from_slice(&other.members[j..]);
        Self { members: out }
    }

    pub fn union_all<'a, I>(populations: I) -> Population
    where
        I: IntoIterator<Item = &'a Population>,
    {
        populations
            .into_iter()
            .fold(Population::default(), |acc, p| acc.union(p))
    }
}

/// Handle of a registered synapse model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelId(pub usize);

/// Handle of a driving source (e.g. a Poisson generator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub usize);

/// Handle of a spike recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecorderId(pub usize);

/// How a new connection gets its weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Synapse {
    /// Static synapse with a fixed weight.
    Fixed(f64),
    /// A registered synapse model; the weight starts at the model default
    /// and is usually overwritten right after connecting.
    Model(ModelId),
    /// Zero weight, to be assigned later.
    Placeholder,
}

/// Selection of existing connections, used to retarget weights.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSet(pub Vec<usize>);

impl ConnectionSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Current-based leaky integrate-and-fire parameters (mV, ms, pF, pA).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NeuronParams {
    pub e_l: f64,
    pub v_th: f64,
    pub v_reset: f64,
    pub tau_m: f64,
    pub c_m: f64,
    pub t_ref: f64,
    pub tau_syn: f64,
    /// Constant input current.
    pub i_e: f64,
}

impl Default for NeuronParams {
    fn default() -> Self {
        Self {
            e_l: -70.0,
            v_th: -55.0,
            v_reset: -70.0,
            tau_m: 10.0,
            c_m: 250.0,
            t_ref: 2.0,
            tau_syn: 2.0,
            i_e: 0.0,
        }
    }
}

/// Poisson spike source; each target neuron receives an independent train.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoissonParams {
    /// Hz.
    pub rate: f64,
    pub start: f64,
    pub stop: f64,
}

impl Default for PoissonParams {
    fn default() -> Self {
        Self {
            rate: 750.0,
            start: 0.0,
            stop: 99_999.0,
        }
    }
}

/// Short-term depression/facilitation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ShortTermPlasticity {
    /// Utilization increment (`U`).
    pub u: f64,
    pub tau_rec: f64,
    /// Zero disables facilitation.
    pub tau_fac: f64,
}

impl Default for ShortTermPlasticity {
    fn default() -> Self {
        Self {
            u: 0.5,
            tau_rec: 800.0,
            tau_fac: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SynapseModel {
    Static,
    ShortTerm(ShortTermPlasticity),
}

/// One recorded spike.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpikeEvent {
    pub time: f64,
    pub sender: NeuronId,
}

/// Operations the reading model needs from a simulator.
///
/// Calls are strictly sequential: `simulate` blocks until the requested
/// interval has been integrated, and no weight change is issued while it
/// runs. Any internal parallelism is the implementation's business.
pub trait SimulationEngine {
    /// Drop every population, connection, source and recorder; time goes back to zero.
    fn reset(&mut self);

    /// Current simulated time in ms.
    fn time(&self) -> f64;

    fn create_population(
        &mut self,
        size: usize,
        params: Option<NeuronParams>,
    ) -> Result<Population, EngineError>;

    fn register_model(&mut self, name: &str, model: SynapseModel) -> ModelId;

    fn model_id(&self, name: &str) -> Option<ModelId>;

    fn create_poisson_source(&mut self, params: PoissonParams) -> SourceId;

    /// All-to-all connection from every neuron of `source` to every neuron of `target`.
    fn connect(
        &mut self,
        source: &Population,
        target: &Population,
        synapse: Synapse,
    ) -> Result<(), EngineError>;

    fn drive(
        &mut self,
        source: SourceId,
        target: &Population,
        weight: f64,
    ) -> Result<(), EngineError>;

    /// Connections whose sources all lie in `source` and whose targets all lie in `target`.
    fn connections(&self, source: &Population, target: &Population) -> ConnectionSet;

    fn set_weight(&mut self, connections: &ConnectionSet, weight: f64) -> Result<(), EngineError>;

    /// Advance simulated time by `duration` ms.
    fn simulate(&mut self, duration: f64) -> Result<(), EngineError>;

    fn record(&mut self, population: &Population) -> Result<RecorderId, EngineError>;

    fn events(&self, recorder: RecorderId) -> Result<&[SpikeEvent], EngineError>;
}
