//! Dry-run engine.
//!
//! `RecordingEngine` builds the same graph bookkeeping as a real simulator
//! but never integrates anything: simulated time only advances the clock,
//! and spike events exist only if a caller injects them. Every call is
//! appended to a log so whole runs can be compared step by step.

use hashbrown::HashMap;

use crate::engine::{
    ConnectionSet, EngineError, ModelId, NeuronId, NeuronParams, PoissonParams, Population,
    RecorderId, SimulationEngine, SourceId, SpikeEvent, Synapse, SynapseModel,
};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Reset,
    CreatePopulation { size: usize },
    RegisterModel { name: String },
    CreateSource { params: PoissonParams },
    Connect { source: Population, target: Population, synapse: Synapse },
    Drive { source: SourceId, target: Population, weight: f64 },
    SetWeight { connections: ConnectionSet, weight: f64 },
    Simulate { duration: f64 },
    Record { population: Population },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedConnection {
    pub source: Population,
    pub target: Population,
    pub weight: f64,
    pub model: Option<ModelId>,
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    neurons: usize,
    time: f64,
    models: Vec<(String, SynapseModel)>,
    model_index: HashMap<String, ModelId>,
    sources: Vec<PoissonParams>,
    connections: Vec<RecordedConnection>,
    recorders: Vec<(Population, Vec<SpikeEvent>)>,
    log: Vec<EngineCall>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &[EngineCall] {
        &self.log
    }

    /// Only the `SetWeight` calls, in issue order.
    pub fn weight_assignments(&self) -> Vec<(ConnectionSet, f64)> {
        self.log
            .iter()
            .filter_map(|c| match c {
                EngineCall::SetWeight {
                    connections,
                    weight,
                } => Some((connections.clone(), *weight)),
                _ => None,
            })
            .collect()
    }

    pub fn recorded_connections(&self) -> &[RecordedConnection] {
        &self.connections
    }

    pub fn connection(&self, index: usize) -> Option<&RecordedConnection> {
        self.connections.get(index)
    }

    /// The weight shared by every connection in `set`, if they all agree.
    pub fn weight_of(&self, set: &ConnectionSet) -> Option<f64> {
        let mut weights = set.0.iter().map(|&i| self.connections[i].weight);
        let first = weights.next()?;
        weights.all(|w| w == first).then_some(first)
    }

    pub fn poisson_sources(&self) -> &[PoissonParams] {
        &self.sources
    }

    /// Pretend `neuron` fired at `time`; every recorder covering it sees the event.
    pub fn inject_spike(&mut self, neuron: NeuronId, time: f64) {
        for (population, events) in &mut self.recorders {
            if population.contains(neuron) {
                events.push(SpikeEvent {
                    time,
                    sender: neuron,
                });
            }
        }
    }

    /// Inject `count` spikes spread over the members of `population`, all at `time`.
    pub fn inject_spikes(&mut self, population: &Population, count: usize, time: f64) {
        let members = population.members();
        if members.is_empty() {
            return;
        }
        for k in 0..count {
            self.inject_spike(members[k % members.len()], time);
        }
    }

    fn check_population(&self, population: &Population) -> Result<(), EngineError> {
        match population.members().last() {
            Some(&last) if last >= self.neurons => Err(EngineError::UnknownNeuron(last)),
            _ => Ok(()),
        }
    }
}

impl SimulationEngine for RecordingEngine {
    fn reset(&mut self) {
        *self = Self::default();
        self.log.push(EngineCall::Reset);
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn create_population(
        &mut self,
        size: usize,
        _params: Option<NeuronParams>,
    ) -> Result<Population, EngineError> {
        if size == 0 {
            return Err(EngineError::EmptyPopulation);
        }
        let start = self.neurons;
        self.neurons += size;
        self.log.push(EngineCall::CreatePopulation { size });
        Ok(Population::from_range(start..start + size))
    }

    fn register_model(&mut self, name: &str, model: SynapseModel) -> ModelId {
        self.log.push(EngineCall::RegisterModel {
            name: name.to_string(),
        });
        if let Some(&id) = self.model_index.get(name) {
            self.models[id.0].1 = model;
            return id;
        }
        let id = ModelId(self.models.len());
        self.models.push((name.to_string(), model));
        self.model_index.insert(name.to_string(), id);
        id
    }

    fn model_id(&self, name: &str) -> Option<ModelId> {
        self.model_index.get(name).copied()
    }

    fn create_poisson_source(&mut self, params: PoissonParams) -> SourceId {
        self.sources.push(params);
        self.log.push(EngineCall::CreateSource { params });
        SourceId(self.sources.len() - 1)
    }

    fn connect(
        &mut self,
        source: &Population,
        target: &Population,
        synapse: Synapse,
    ) -> Result<(), EngineError> {
        self.check_population(source)?;
        self.check_population(target)?;
        let (weight, model) = match synapse {
            Synapse::Fixed(w) => (w, None),
            Synapse::Placeholder => (0.0, None),
            Synapse::Model(id) => {
                if id.0 >= self.models.len() {
                    return Err(EngineError::UnknownModel(format!("#{}", id.0)));
                }
                (1.0, Some(id))
            }
        };
        self.connections.push(RecordedConnection {
            source: source.clone(),
            target: target.clone(),
            weight,
            model,
        });
        self.log.push(EngineCall::Connect {
            source: source.clone(),
            target: target.clone(),
            synapse,
        });
        Ok(())
    }

    fn drive(
        &mut self,
        source: SourceId,
        target: &Population,
        weight: f64,
    ) -> Result<(), EngineError> {
        self.check_population(target)?;
        if source.0 >= self.sources.len() {
            return Err(EngineError::UnknownSource(source.0));
        }
        self.log.push(EngineCall::Drive {
            source,
            target: target.clone(),
            weight,
        });
        Ok(())
    }

    fn connections(&self, source: &Population, target: &Population) -> ConnectionSet {
        ConnectionSet(
            self.connections
                .iter()
                .enumerate()
                .filter(|(_, c)| source.covers(&c.source) && target.covers(&c.target))
                .map(|(i, _)| i)
                .collect(),
        )
    }

    fn set_weight(&mut self, connections: &ConnectionSet, weight: f64) -> Result<(), EngineError> {
        for &c in &connections.0 {
            self.connections
                .get_mut(c)
                .ok_or(EngineError::UnknownConnection(c))?
                .weight = weight;
        }
        self.log.push(EngineCall::SetWeight {
            connections: connections.clone(),
            weight,
        });
        Ok(())
    }

    fn simulate(&mut self, duration: f64) -> Result<(), EngineError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(EngineError::InvalidDuration(duration));
        }
        self.time += duration;
        self.log.push(EngineCall::Simulate { duration });
        Ok(())
    }

    fn record(&mut self, population: &Population) -> Result<RecorderId, EngineError> {
        self.check_population(population)?;
        self.recorders.push((population.clone(), Vec::new()));
        self.log.push(EngineCall::Record {
            population: population.clone(),
        });
        Ok(RecorderId(self.recorders.len() - 1))
    }

    fn events(&self, recorder: RecorderId) -> Result<&[SpikeEvent], EngineError> {
        self.recorders
            .get(recorder.0)
            .map(|(_, events)| events.as_slice())
            .ok_or(EngineError::UnknownRecorder(recorder.0))
    }
}
