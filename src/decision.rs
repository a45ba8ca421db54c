//! Spike-count decisions.
//!
//! Rankings are recomputed from the engine's event log on every request;
//! nothing is cached between calls.

use crate::config::StopPolicy;
use crate::engine::SimulationEngine;
use crate::error::{ReadError, Result};
use crate::probes::{ProbeGroup, ProbeRegistry, TimeWindow};

/// A probe label with its spike count over the decision window.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ranked {
    pub label: String,
    pub count: usize,
}

pub struct DecisionEngine<'a, E> {
    engine: &'a E,
    probes: &'a ProbeRegistry,
    window: TimeWindow,
}

impl<'a, E: SimulationEngine> DecisionEngine<'a, E> {
    /// Fails with [`ReadError::NotSimulated`] unless the engine has advanced
    /// past time zero and up to the end of `window`.
    pub fn new(engine: &'a E, probes: &'a ProbeRegistry, window: TimeWindow) -> Result<Self> {
        let now = engine.time();
        if now <= 0.0 || now < window.end {
            return Err(ReadError::NotSimulated {
                now,
                required: window.end,
            });
        }
        Ok(Self {
            engine,
            probes,
            window,
        })
    }

    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// `labels` ranked by descending spike count; equal counts keep their
    /// input order.
    pub fn score(&self, labels: &[String]) -> Result<Vec<Ranked>> {
        let mut ranked = labels
            .iter()
            .map(|label| {
                Ok(Ranked {
                    label: label.clone(),
                    count: self.probes.spike_count(self.engine, label, self.window)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(ranked)
    }

    /// Winner of each group; `None` for an empty group.
    pub fn decide(&self, groups: &[ProbeGroup]) -> Result<Vec<Option<Ranked>>> {
        groups
            .iter()
            .map(|g| Ok(self.score(&g.labels)?.into_iter().next()))
            .collect()
    }

    /// Concatenate the per-position winners up to the first position the
    /// stop policy rejects.
    pub fn decode(&self, positions: &[ProbeGroup], policy: StopPolicy) -> Result<String> {
        let winners: Vec<Ranked> = self.decide(positions)?.into_iter().flatten().collect();
        Ok(decode_winners(&winners, policy))
    }
}

/// Label text after the group prefix (`g3-ea` -> `ea`).
pub fn strip_group_prefix(label: &str) -> &str {
    label.split_once('-').map_or(label, |(_, rest)| rest)
}

/// Decoding over already computed winners, one per position.
pub fn decode_winners(winners: &[Ranked], policy: StopPolicy) -> String {
    let stop = winners
        .iter()
        .enumerate()
        .position(|(i, w)| {
            let count = w.count as f64;
            match policy {
                StopPolicy::Fixed { threshold } => count < threshold,
                StopPolicy::RelativeDrop { ratio } => match i {
                    0 => w.count == 0,
                    _ => count < winners[i - 1].count as f64 * ratio,
                },
            }
        })
        .unwrap_or(winners.len());
    winners[..stop]
        .iter()
        .map(|w| strip_group_prefix(&w.label))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingEngine;

    fn ranked(label: &str, count: usize) -> Ranked {
        Ranked {
            label: label.to_string(),
            count,
        }
    }

    fn fixed(threshold: f64) -> StopPolicy {
        StopPolicy::Fixed { threshold }
    }

    #[test]
    fn prefix_is_stripped_at_the_first_dash() {
        assert_eq!(strip_group_prefix("g0-ea"), "ea");
        assert_eq!(strip_group_prefix("g12-a-b"), "a-b");
        assert_eq!(strip_group_prefix("lute"), "lute");
    }

    #[test]
    fn decode_truncates_at_first_weak_position() {
        let winners = [
            ranked("g0-l", 400),
            ranked("g1-u", 300),
            ranked("g2-t", 120),
            ranked("g3-e", 900),
        ];
        assert_eq!(decode_winners(&winners, fixed(150.0)), "lu");
        assert_eq!(decode_winners(&winners, fixed(100.0)), "lute");
        assert_eq!(decode_winners(&winners, fixed(1000.0)), "");
        assert_eq!(decode_winners(&[], fixed(150.0)), "");
    }

    #[test]
    fn relative_drop_compares_with_previous_winner() {
        let winners = [
            ranked("g0-t", 400),
            ranked("g1-e", 250),
            ranked("g2-ll", 100),
        ];
        let policy = StopPolicy::RelativeDrop { ratio: 0.56 };
        assert_eq!(decode_winners(&winners, policy), "te");
        let silent = [ranked("g0-t", 0), ranked("g1-e", 0)];
        assert_eq!(decode_winners(&silent, policy), "");
    }

    #[test]
    fn decode_before_simulation_is_refused() {
        let engine = RecordingEngine::new();
        let probes = ProbeRegistry::new();
        let err = DecisionEngine::new(&engine, &probes, TimeWindow::new(0.0, 550.0))
            .err()
            .unwrap();
        assert!(matches!(err, ReadError::NotSimulated { now, .. } if now == 0.0));
    }

    #[test]
    fn window_must_be_simulated() {
        let mut engine = RecordingEngine::new();
        engine.simulate(100.0).unwrap();
        let probes = ProbeRegistry::new();
        assert!(DecisionEngine::new(&engine, &probes, TimeWindow::new(0.0, 150.0)).is_err());
        assert!(DecisionEngine::new(&engine, &probes, TimeWindow::new(0.0, 100.0)).is_ok());
    }

    #[test]
    fn score_is_stable_and_descending() {
        let mut engine = RecordingEngine::new();
        let mut probes = ProbeRegistry::new();
        let labels: Vec<String> = ["tell", "tall", "sell", "set"].map(String::from).to_vec();
        for (label, count) in labels.iter().zip([3, 7, 3, 0]) {
            let pop = engine.create_population(2, None).unwrap();
            probes.insert(&mut engine, label.as_str(), &pop).unwrap();
            engine.inject_spikes(&pop, count, 20.0);
        }
        engine.simulate(50.0).unwrap();

        let decisions = DecisionEngine::new(&engine, &probes, TimeWindow::new(0.0, 50.0)).unwrap();
        let ranking = decisions.score(&labels).unwrap();
        let order: Vec<&str> = ranking.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(order, ["tall", "tell", "sell", "set"]);
        assert_eq!(ranking[0].count, 7);

        let groups = [
            ProbeGroup::new("Words", labels.clone()),
            ProbeGroup::new("Empty", Vec::new()),
        ];
        let winners = decisions.decide(&groups).unwrap();
        assert_eq!(winners[0], Some(ranked("tall", 7)));
        assert_eq!(winners[1], None);
    }

    #[test]
    fn decode_reads_position_groups() {
        let mut engine = RecordingEngine::new();
        let mut probes = ProbeRegistry::new();
        let mut positions = Vec::new();
        for (pos, spelled) in [[("l", 300), ("t", 10)], [("u", 200), ("e", 20)], [("t", 5), ("e", 90)]]
            .iter()
            .enumerate()
        {
            let mut labels = Vec::new();
            for (grapheme, count) in spelled {
                let label = format!("g{pos}-{grapheme}");
                let pop = engine.create_population(1, None).unwrap();
                probes.insert(&mut engine, label.as_str(), &pop).unwrap();
                engine.inject_spikes(&pop, *count, 10.0);
                labels.push(label);
            }
            positions.push(ProbeGroup::new(format!("Reading-{pos}"), labels));
        }
        engine.simulate(50.0).unwrap();
        let decisions = DecisionEngine::new(&engine, &probes, TimeWindow::new(0.0, 50.0)).unwrap();
        assert_eq!(decisions.decode(&positions, fixed(150.0)).unwrap(), "lu");
        assert_eq!(decisions.decode(&positions, fixed(50.0)).unwrap(), "lue");

        // Events before the window do not count.
        let late = DecisionEngine::new(&engine, &probes, TimeWindow::new(10.0, 50.0)).unwrap();
        assert_eq!(late.decode(&positions, fixed(1.0)).unwrap(), "");
    }
}
