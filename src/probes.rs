//! Per-run probe registry and decision groups.
//!
//! A [`RunContext`] is created for one reading run, filled while the network
//! is set up for reporting, and dropped (or [`RunContext::reset`]) before the
//! next run. Nothing here is global.

use hashbrown::HashMap;

use crate::engine::{Population, RecorderId, SimulationEngine, SpikeEvent};
use crate::error::{ReadError, Result};

/// Half-open simulated time interval `(start, end]` in ms.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start < t && t <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone)]
struct Probe {
    name: String,
    population: Population,
    recorder: RecorderId,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeRegistry {
    probes: Vec<Probe>,
    by_name: HashMap<String, usize>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a spike recorder to `population` under `name`.
    pub fn insert<E: SimulationEngine>(
        &mut self,
        engine: &mut E,
        name: impl Into<String>,
        population: &Population,
    ) -> Result<()> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ReadError::DuplicateProbe(name));
        }
        let recorder = engine.record(population)?;
        self.by_name.insert(name.clone(), self.probes.len());
        self.probes.push(Probe {
            name,
            population: population.clone(),
            recorder,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probe names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|p| p.name.as_str())
    }

    pub fn population(&self, name: &str) -> Result<&Population> {
        Ok(&self.probe(name)?.population)
    }

    pub fn events<'e, E: SimulationEngine>(
        &self,
        engine: &'e E,
        name: &str,
    ) -> Result<&'e [SpikeEvent]> {
        Ok(engine.events(self.probe(name)?.recorder)?)
    }

    pub fn spike_count<E: SimulationEngine>(
        &self,
        engine: &E,
        name: &str,
        window: TimeWindow,
    ) -> Result<usize> {
        Ok(self
            .events(engine, name)?
            .iter()
            .filter(|e| window.contains(e.time))
            .count())
    }

    pub fn spike_times<E: SimulationEngine>(&self, engine: &E, name: &str) -> Result<Vec<f64>> {
        Ok(self.events(engine, name)?.iter().map(|e| e.time).collect())
    }

    pub fn clear(&mut self) {
        self.probes.clear();
        self.by_name.clear();
    }

    fn probe(&self, name: &str) -> Result<&Probe> {
        self.by_name
            .get(name)
            .map(|&i| &self.probes[i])
            .ok_or_else(|| ReadError::UnknownProbe(name.to_string()))
    }
}

/// Named list of probe labels that are ranked against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeGroup {
    pub name: String,
    pub labels: Vec<String>,
}

impl ProbeGroup {
    pub fn new(name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            name: name.into(),
            labels,
        }
    }
}

/// Everything one reading run registers: probes, reporting groups and the
/// decision groups the scheduler and the decoder read from.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub probes: ProbeRegistry,
    /// Groups only written to reports (`Head`, `Words`, `Suffixes`).
    pub report_groups: Vec<ProbeGroup>,
    /// Stem candidates, present in stem/suffix mode.
    pub stems: Option<ProbeGroup>,
    /// One group per grapheme hypercolumn, in position order.
    pub reading: Vec<ProbeGroup>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.probes.clear();
        self.report_groups.clear();
        self.stems = None;
        self.reading.clear();
    }
}
