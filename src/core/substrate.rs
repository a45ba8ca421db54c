use hashbrown::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::engine::{
    ConnectionSet, EngineError, ModelId, NeuronId, NeuronParams, PoissonParams, Population,
    RecorderId, ShortTermPlasticity, SimulationEngine, SourceId, SpikeEvent, Synapse,
    SynapseModel,
};
use crate::prng::Prng;

/// Execution tier for the membrane update.
///
/// - `Scalar`: single-threaded (default, works everywhere)
/// - `Parallel`: multi-threaded via rayon (requires `parallel` feature)
///
/// Both tiers produce identical spike trains: the random draws for driving
/// sources happen before integration and integration itself is deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ExecutionTier {
    #[default]
    Scalar,
    Parallel,
}

#[derive(Debug, Clone, Copy)]
pub struct SubstrateConfig {
    /// Integration step in ms. Spikes are delivered one step after emission.
    pub dt: f64,

    // If set, makes Poisson drive reproducible across runs.
    pub seed: Option<u64>,

    /// Parameters for populations created without explicit ones.
    pub neuron: NeuronParams,

    pub tier: ExecutionTier,
}

impl Default for SubstrateConfig {
    fn default() -> Self {
        Self {
            dt: 0.1,
            seed: None,
            neuron: NeuronParams::default(),
            tier: ExecutionTier::Scalar,
        }
    }
}

impl SubstrateConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_tier(mut self, tier: ExecutionTier) -> Self {
        self.tier = tier;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub neuron_count: usize,
    pub projection_count: usize,
    /// Individual neuron-to-neuron synapses across all projections.
    pub synapse_count: usize,
    pub recorded_spikes: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy)]
struct NeuronState {
    v: f64,
    // Alpha-shaped synaptic current: `i` is the current, `di` its derivative.
    i: f64,
    di: f64,
    refractory_steps: u32,
}

/// Per-presynaptic-neuron resources of a short-term-plasticity synapse.
#[derive(Debug, Clone, Copy)]
struct ShortTermState {
    u: f64,
    x: f64,
    last_spike: Option<f64>,
}

impl ShortTermState {
    fn new(p: &ShortTermPlasticity) -> Self {
        Self {
            u: p.u,
            x: 1.0,
            last_spike: None,
        }
    }

    /// Update resources for a presynaptic spike at `t` and return the
    /// fraction of the base weight that gets transmitted.
    fn transmit(&mut self, p: &ShortTermPlasticity, t: f64) -> f64 {
        let (x_decay, u_decay) = match self.last_spike {
            Some(last) => {
                let h = t - last;
                let u_decay = if p.tau_fac < 1e-10 {
                    0.0
                } else {
                    (-h / p.tau_fac).exp()
                };
                ((-h / p.tau_rec).exp(), u_decay)
            }
            None => (0.0, 0.0),
        };
        self.x = 1.0 + (self.x - self.x * self.u - 1.0) * x_decay;
        self.u = p.u + self.u * (1.0 - p.u) * u_decay;
        self.last_spike = Some(t);
        self.x * self.u
    }
}

#[derive(Debug, Clone)]
struct Projection {
    sources: Population,
    targets: Population,
    weight: f64,
    model: Option<ModelId>,
    // One entry per source neuron when the model is short-term plastic.
    plasticity: Vec<ShortTermState>,
}

#[derive(Debug, Clone)]
struct PoissonSource {
    params: PoissonParams,
    targets: Vec<(NeuronId, f64)>,
}

#[derive(Debug, Clone)]
struct Recorder {
    events: Vec<SpikeEvent>,
}

/// In-process reference engine: current-based leaky integrate-and-fire
/// neurons with alpha-shaped synaptic currents, all-to-all projections,
/// Poisson drive and spike recorders.
pub struct Substrate {
    cfg: SubstrateConfig,

    params: Vec<NeuronParams>,
    state: Vec<NeuronState>,

    // neuron -> (projection, slot of the neuron among the projection's sources)
    outgoing: Vec<Vec<(usize, usize)>>,
    projections: Vec<Projection>,

    models: Vec<SynapseModel>,
    model_index: HashMap<String, ModelId>,

    sources: Vec<PoissonSource>,

    recorders: Vec<Recorder>,
    recorders_of: Vec<Vec<usize>>,

    // Spikes emitted during the previous step, delivered during the next one.
    pending_spikes: Vec<NeuronId>,
    input: Vec<f64>,

    steps: u64,
    rng: Prng,
}

impl Substrate {
    pub fn new(cfg: SubstrateConfig) -> Self {
        Self {
            cfg,
            params: Vec::new(),
            state: Vec::new(),
            outgoing: Vec::new(),
            projections: Vec::new(),
            models: Vec::new(),
            model_index: HashMap::new(),
            sources: Vec::new(),
            recorders: Vec::new(),
            recorders_of: Vec::new(),
            pending_spikes: Vec::new(),
            input: Vec::new(),
            steps: 0,
            rng: Prng::new(cfg.seed.unwrap_or(1)),
        }
    }

    pub fn config(&self) -> &SubstrateConfig {
        &self.cfg
    }

    pub fn set_execution_tier(&mut self, tier: ExecutionTier) {
        self.cfg.tier = tier;
    }

    /// Returns the tier that will actually be used, accounting for the
    /// `parallel` compile-time feature.
    pub fn effective_execution_tier(&self) -> ExecutionTier {
        match self.cfg.tier {
            ExecutionTier::Scalar => ExecutionTier::Scalar,
            ExecutionTier::Parallel => {
                #[cfg(feature = "parallel")]
                {
                    ExecutionTier::Parallel
                }
                #[cfg(not(feature = "parallel"))]
                {
                    ExecutionTier::Scalar
                }
            }
        }
    }

    pub fn neuron_count(&self) -> usize {
        self.state.len()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            neuron_count: self.state.len(),
            projection_count: self.projections.len(),
            synapse_count: self
                .projections
                .iter()
                .map(|p| p.sources.len() * p.targets.len())
                .sum(),
            recorded_spikes: self.recorders.iter().map(|r| r.events.len()).sum(),
            time: self.time(),
        }
    }

    /// Base weight of a connection.
    pub fn weight(&self, connection: usize) -> Option<f64> {
        self.projections.get(connection).map(|p| p.weight)
    }

    fn check_population(&self, population: &Population) -> Result<(), EngineError> {
        match population.members().last() {
            Some(&last) if last >= self.state.len() => Err(EngineError::UnknownNeuron(last)),
            _ => Ok(()),
        }
    }

    fn step(&mut self) {
        let t = self.time();
        let dt = self.cfg.dt;

        for x in &mut self.input {
            *x = 0.0;
        }

        // Deliver last step's spikes.
        let spikes = core::mem::take(&mut self.pending_spikes);
        {
            let Self {
                outgoing,
                projections,
                models,
                input,
                ..
            } = self;
            for &sender in &spikes {
                for &(p, slot) in &outgoing[sender] {
                    let proj = &mut projections[p];
                    let efficacy = match proj.model.map(|m| models[m.0]) {
                        Some(SynapseModel::ShortTerm(stp)) => proj.plasticity[slot].transmit(&stp, t),
                        _ => 1.0,
                    };
                    let w = proj.weight * efficacy;
                    if w == 0.0 {
                        continue;
                    }
                    for &target in proj.targets.members() {
                        input[target] += w;
                    }
                }
            }
        }

        // Poisson drive.
        for src in &self.sources {
            if t < src.params.start || t >= src.params.stop {
                continue;
            }
            let lambda = src.params.rate * dt / 1000.0;
            for &(target, weight) in &src.targets {
                let k = self.rng.poisson(lambda);
                if k > 0 {
                    self.input[target] += weight * k as f64;
                }
            }
        }

        let fired = match self.effective_execution_tier() {
            ExecutionTier::Scalar => self.integrate_scalar(),
            ExecutionTier::Parallel => self.integrate_parallel(),
        };

        let spike_time = t + dt;
        let mut emitted = spikes;
        emitted.clear();
        for (n, &f) in fired.iter().enumerate() {
            if !f {
                continue;
            }
            emitted.push(n);
            for &r in &self.recorders_of[n] {
                self.recorders[r].events.push(SpikeEvent {
                    time: spike_time,
                    sender: n,
                });
            }
        }
        self.pending_spikes = emitted;
        self.steps += 1;
    }

    fn integrate_scalar(&mut self) -> Vec<bool> {
        let dt = self.cfg.dt;
        self.state
            .iter_mut()
            .zip(self.params.iter())
            .zip(self.input.iter())
            .map(|((s, p), &input)| integrate(s, p, input, dt))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn integrate_parallel(&mut self) -> Vec<bool> {
        let dt = self.cfg.dt;
        self.state
            .par_iter_mut()
            .zip(self.params.par_iter())
            .zip(self.input.par_iter())
            .map(|((s, p), &input)| integrate(s, p, input, dt))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn integrate_parallel(&mut self) -> Vec<bool> {
        self.integrate_scalar()
    }
}

impl SimulationEngine for Substrate {
    fn reset(&mut self) {
        *self = Substrate::new(self.cfg);
    }

    fn time(&self) -> f64 {
        self.steps as f64 * self.cfg.dt
    }

    fn create_population(
        &mut self,
        size: usize,
        params: Option<NeuronParams>,
    ) -> Result<Population, EngineError> {
        if size == 0 {
            return Err(EngineError::EmptyPopulation);
        }
        let params = params.unwrap_or(self.cfg.neuron);
        let start = self.state.len();
        for _ in 0..size {
            self.params.push(params);
            self.state.push(NeuronState {
                v: params.e_l,
                i: 0.0,
                di: 0.0,
                refractory_steps: 0,
            });
            self.outgoing.push(Vec::new());
            self.recorders_of.push(Vec::new());
            self.input.push(0.0);
        }
        Ok(Population::from_range(start..start + size))
    }

    fn register_model(&mut self, name: &str, model: SynapseModel) -> ModelId {
        if let Some(&id) = self.model_index.get(name) {
            self.models[id.0] = model;
            return id;
        }
        let id = ModelId(self.models.len());
        self.models.push(model);
        self.model_index.insert(name.to_string(), id);
        id
    }

    fn model_id(&self, name: &str) -> Option<ModelId> {
        self.model_index.get(name).copied()
    }

    fn create_poisson_source(&mut self, params: PoissonParams) -> SourceId {
        self.sources.push(PoissonSource {
            params,
            targets: Vec::new(),
        });
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
        let plasticity = match model.map(|m| self.models[m.0]) {
            Some(SynapseModel::ShortTerm(stp)) => vec![ShortTermState::new(&stp); source.len()],
            _ => Vec::new(),
        };

        let idx = self.projections.len();
        for (slot, &n) in source.members().iter().enumerate() {
            self.outgoing[n].push((idx, slot));
        }
        self.projections.push(Projection {
            sources: source.clone(),
            targets: target.clone(),
            weight,
            model,
            plasticity,
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
        let src = self
            .sources
            .get_mut(source.0)
            .ok_or(EngineError::UnknownSource(source.0))?;
        src.targets
            .extend(target.members().iter().map(|&n| (n, weight)));
        Ok(())
    }

    fn connections(&self, source: &Population, target: &Population) -> ConnectionSet {
        ConnectionSet(
            self.projections
                .iter()
                .enumerate()
                .filter(|(_, p)| source.covers(&p.sources) && target.covers(&p.targets))
                .map(|(i, _)| i)
                .collect(),
        )
    }

    fn set_weight(&mut self, connections: &ConnectionSet, weight: f64) -> Result<(), EngineError> {
        for &c in &connections.0 {
            let proj = self
                .projections
                .get_mut(c)
                .ok_or(EngineError::UnknownConnection(c))?;
            proj.weight = weight;
        }
        Ok(())
    }

    fn simulate(&mut self, duration: f64) -> Result<(), EngineError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(EngineError::InvalidDuration(duration));
        }
        let n = (duration / self.cfg.dt).round() as u64;
        for _ in 0..n {
            self.step();
        }
        Ok(())
    }

    fn record(&mut self, population: &Population) -> Result<RecorderId, EngineError> {
        self.check_population(population)?;
        let idx = self.recorders.len();
        self.recorders.push(Recorder { events: Vec::new() });
        for &n in population.members() {
            self.recorders_of[n].push(idx);
        }
        Ok(RecorderId(idx))
    }

    fn events(&self, recorder: RecorderId) -> Result<&[SpikeEvent], EngineError> {
        self.recorders
            .get(recorder.0)
            .map(|r| r.events.as_slice())
            .ok_or(EngineError::UnknownRecorder(recorder.0))
    }
}

/// One integration step of a single neuron; returns whether it fired.
#[inline]
fn integrate(s: &mut NeuronState, p: &NeuronParams, input: f64, dt: f64) -> bool {
    let decay = (-dt / p.tau_syn).exp();
    let current = s.i;
    s.i = decay * (dt * s.di + s.i);
    // A weight `w` arriving here peaks at `w` pA after `tau_syn`.
    s.di = decay * s.di + input * core::f64::consts::E / p.tau_syn;

    if s.refractory_steps > 0 {
        s.refractory_steps -= 1;
        return false;
    }

    s.v += dt * (-(s.v - p.e_l) / p.tau_m + (current + p.i_e) / p.c_m);
    if s.v >= p.v_th {
        s.v = p.v_reset;
        s.refractory_steps = (p.t_ref / dt).round() as u32;
        return true;
    }
    false
}
