//! Temporal weight scheduler.
//!
//! Reading is a warm-up advance followed by `max_text_len` focus steps. Before
//! each step's advance three weight families are recomputed from closed-form
//! densities:
//!
//! 1. letter -> head: a skew normal sweep moving one letter position per step;
//! 2. head -> grapheme: a normal over elapsed focus time, centred on each
//!    grapheme position's turn;
//! 3. suffix -> grapheme (stem/suffix mode): normals around the stem boundary
//!    estimated from the current stem ranking.
//!
//! Weight assignment and time advance strictly alternate.

use tracing::{debug, info};

use crate::config::{HeadGraphemeLock, LetterHeadSweep, ModelParams, SuffixTracking};
use crate::decision::{DecisionEngine, Ranked};
use crate::density::{Normal, SkewNormal};
use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::probes::{RunContext, TimeWindow};
use crate::topology::ReadingNetwork;

/// Letter -> head weight at `step` for letter `position` into heads of
/// graphemes `head_len` letters long.
pub fn letter_head_weight(sweep: &LetterHeadSweep, step: usize, position: usize, head_len: usize) -> f64 {
    let dist = SkewNormal::new(sweep.skew, step as f64 + sweep.loc_offset, sweep.scale);
    let damping = 1.0 + (head_len as f64 - 1.0) * sweep.length_damping;
    dist.pdf(position as f64) * sweep.base_weight / damping
}

/// Head -> grapheme weight for hypercolumn `position` after `elapsed_steps`
/// focus steps (the warm-up counts as one).
pub fn head_grapheme_weight(lock: &HeadGraphemeLock, position: usize, elapsed_steps: f64) -> f64 {
    Normal::new(position as f64 + 1.0, lock.scale).pdf(elapsed_steps) * lock.base_weight
}

/// Suffix -> grapheme weight at `position` for a grapheme occurring at
/// `occurrences` (indices into the suffix) given the stem boundary estimate.
pub fn suffix_grapheme_weight(
    shape: &SuffixTracking,
    stem_end: f64,
    occurrences: &[usize],
    position: usize,
) -> f64 {
    occurrences
        .iter()
        .map(|&i| Normal::new(stem_end + i as f64, shape.scale).pdf(position as f64))
        .sum::<f64>()
        * shape.base_weight
}

/// Mean length of the `top` best ranked stems; `None` if there are none.
pub fn estimate_stem_end(ranking: &[Ranked], top: usize) -> Option<f64> {
    let best = &ranking[..ranking.len().min(top)];
    if best.is_empty() {
        return None;
    }
    let total: usize = best.iter().map(|r| r.label.chars().count()).sum();
    Some(total as f64 / best.len() as f64)
}

pub struct FocusScheduler<'p> {
    params: &'p ModelParams,
}

impl<'p> FocusScheduler<'p> {
    pub fn new(params: &'p ModelParams) -> Self {
        Self { params }
    }

    /// Run a full reading and return its time window.
    pub fn run<E: SimulationEngine>(
        &self,
        engine: &mut E,
        network: &ReadingNetwork,
        context: &RunContext,
    ) -> Result<TimeWindow> {
        let focus = self.params.letter_focus_time;
        let start = engine.time();

        engine.simulate(focus)?;
        for step in 0..network.max_text_len() {
            self.assign_letter_head(engine, network, step)?;
            self.assign_head_grapheme(engine, network, start)?;
            self.assign_suffix_grapheme(engine, network, context, start, step)?;
            engine.simulate(focus)?;
        }

        let window = TimeWindow::new(start, engine.time());
        info!(start = window.start, end = window.end, "reading simulated");
        Ok(window)
    }

    fn assign_letter_head<E: SimulationEngine>(
        &self,
        engine: &mut E,
        network: &ReadingNetwork,
        step: usize,
    ) -> Result<()> {
        let heads: Vec<_> = network
            .heads_by_length()
            .iter()
            .map(|layer| layer.cells())
            .collect();
        for (position, hypercol) in network.letter_hypercolumns().iter().enumerate() {
            let letters = hypercol.cells();
            for (head_len, layer) in heads.iter().enumerate() {
                if layer.is_empty() {
                    continue;
                }
                let conns = engine.connections(&letters, layer);
                if conns.is_empty() {
                    continue;
                }
                let w = letter_head_weight(&self.params.letter_head_sweep, step, position, head_len);
                engine.set_weight(&conns, w)?;
            }
        }
        Ok(())
    }

    fn assign_head_grapheme<E: SimulationEngine>(
        &self,
        engine: &mut E,
        network: &ReadingNetwork,
        start: f64,
    ) -> Result<()> {
        let heads = network.head_cells();
        let elapsed = 1.0 + (engine.time() - start) / self.params.letter_focus_time;
        for (position, hypercol) in network.grapheme_hypercolumns().iter().enumerate() {
            let conns = engine.connections(&heads, &hypercol.cells());
            if conns.is_empty() {
                continue;
            }
            let w = head_grapheme_weight(&self.params.head_grapheme_lock, position, elapsed);
            engine.set_weight(&conns, w)?;
        }
        Ok(())
    }

    fn assign_suffix_grapheme<E: SimulationEngine>(
        &self,
        engine: &mut E,
        network: &ReadingNetwork,
        context: &RunContext,
        start: f64,
        step: usize,
    ) -> Result<()> {
        let (Some(suffixes), Some(stems)) = (network.suffixes(), context.stems.as_ref()) else {
            return Ok(());
        };
        let shape = &self.params.suffix_tracking;
        let window = TimeWindow::new(start, engine.time());
        let ranking = DecisionEngine::new(&*engine, &context.probes, window)?.score(&stems.labels)?;
        let Some(stem_end) = estimate_stem_end(&ranking, shape.top_stems) else {
            return Ok(());
        };
        debug!(step, stem_end, "stem boundary estimate");

        for unit in suffixes {
            let mut seen: Vec<&str> = Vec::new();
            for grapheme in &unit.graphemes {
                if seen.contains(&grapheme.as_str()) {
                    continue;
                }
                seen.push(grapheme);
                let occurrences: Vec<usize> = unit
                    .graphemes
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| *g == grapheme)
                    .map(|(i, _)| i)
                    .collect();
                for (position, hypercol) in network.grapheme_hypercolumns().iter().enumerate() {
                    let Some(target) = hypercol.get(grapheme) else {
                        continue;
                    };
                    let conns = engine.connections(&unit.population, target);
                    if conns.is_empty() {
                        continue;
                    }
                    let w = suffix_grapheme_weight(shape, stem_end, &occurrences, position);
                    engine.set_weight(&conns, w)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ConnectionSet;
    use crate::language::Language;
    use crate::recording::{EngineCall, RecordingEngine};
    use crate::tokenizer::GraphemeAlphabet;

    #[test]
    fn sweep_moves_right_with_the_step() {
        let sweep = LetterHeadSweep::default();
        let at = |step, pos| letter_head_weight(&sweep, step, pos, 1);
        assert!(at(0, 0) > at(0, 1));
        assert!(at(2, 2) > at(2, 1));
        assert!(at(2, 2) > at(2, 3));
        assert!(at(3, 0) < 1e-6);
        // Longer graphemes get weaker sweeps.
        assert!((letter_head_weight(&sweep, 1, 1, 2) * 1.8 - at(1, 1)).abs() < 1e-9);
    }

    #[test]
    fn head_lock_peaks_on_the_positions_turn() {
        let lock = HeadGraphemeLock::default();
        let peak = head_grapheme_weight(&lock, 2, 3.0);
        assert!((peak - 4500.0 * 0.398_942_280_4).abs() < 1e-6);
        assert!(head_grapheme_weight(&lock, 2, 2.0) < peak);
        assert!((head_grapheme_weight(&lock, 2, 2.0) - head_grapheme_weight(&lock, 2, 4.0)).abs() < 1e-9);
    }

    #[test]
    fn suffix_occurrences_add_up() {
        let shape = SuffixTracking::default();
        let single = suffix_grapheme_weight(&shape, 4.0, &[0], 5);
        let double = suffix_grapheme_weight(&shape, 4.0, &[0, 2], 5);
        let other = suffix_grapheme_weight(&shape, 4.0, &[2], 5);
        assert!((double - single - other).abs() < 1e-9);
        assert_eq!(suffix_grapheme_weight(&shape, 4.0, &[], 5), 0.0);
    }

    #[test]
    fn stem_end_averages_top_ranked_lengths() {
        let ranking: Vec<Ranked> = [("tell", 9), ("se", 5), ("zest", 1)]
            .iter()
            .map(|(l, c)| Ranked {
                label: l.to_string(),
                count: *c,
            })
            .collect();
        assert_eq!(estimate_stem_end(&ranking, 2), Some(3.0));
        assert_eq!(estimate_stem_end(&ranking, 15), Some(10.0 / 3.0));
        assert_eq!(estimate_stem_end(&[], 15), None);
    }

    fn toy_language(suffixes: Option<Vec<&str>>) -> Language {
        Language::new(
            "aelstuz".chars(),
            GraphemeAlphabet::new(["a", "e", "ea", "l", "ll", "s", "t", "u", "z"]),
            ["lute", "tell", "tall", "sell"],
            suffixes,
        )
    }

    fn short_params() -> ModelParams {
        ModelParams {
            max_text_len: 6,
            ..ModelParams::default()
        }
    }

    fn prepare(
        language: &Language,
        candidates: &[&str],
        input: &str,
        params: &ModelParams,
    ) -> (RecordingEngine, ReadingNetwork, RunContext) {
        let mut engine = RecordingEngine::new();
        let candidates: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
        let network = ReadingNetwork::build(&mut engine, language, &candidates, input, params).unwrap();
        let mut context = RunContext::new();
        network.setup_reporting(&mut engine, &mut context).unwrap();
        (engine, network, context)
    }

    fn run(suffixes: Option<Vec<&str>>, candidates: &[&str], input: &str) -> RecordingEngine {
        let params = short_params();
        let (mut engine, network, context) =
            prepare(&toy_language(suffixes), candidates, input, &params);
        let window = FocusScheduler::new(&params)
            .run(&mut engine, &network, &context)
            .unwrap();
        assert_eq!(window, TimeWindow::new(0.0, 350.0));
        engine
    }

    /// Weight assignments grouped by the focus step that issued them.
    fn assignments_per_step(engine: &RecordingEngine) -> Vec<Vec<(ConnectionSet, f64)>> {
        let mut steps: Vec<Vec<(ConnectionSet, f64)>> = Vec::new();
        for call in engine.log() {
            match call {
                EngineCall::Simulate { .. } => steps.push(Vec::new()),
                EngineCall::SetWeight {
                    connections,
                    weight,
                } => {
                    if let Some(step) = steps.last_mut() {
                        step.push((connections.clone(), *weight));
                    }
                }
                _ => {}
            }
        }
        // The last advance closes the run without another step.
        steps.pop();
        steps
    }

    fn assigned(step: &[(ConnectionSet, f64)], set: &ConnectionSet) -> Option<f64> {
        step.iter().find(|(s, _)| s == set).map(|(_, w)| *w)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn letter_head_sets_follow_the_sweep() {
        let params = short_params();
        let (mut engine, network, context) =
            prepare(&toy_language(None), &["lute", "tell"], "lute", &params);
        FocusScheduler::new(&params)
            .run(&mut engine, &network, &context)
            .unwrap();

        let steps = assignments_per_step(&engine);
        assert_eq!(steps.len(), 6);
        let sweep = &params.letter_head_sweep;
        let mut checked = 0;
        for (position, hypercol) in network.letter_hypercolumns().iter().enumerate() {
            for (head_len, layer) in network.heads_by_length().iter().enumerate() {
                if layer.is_empty() {
                    continue;
                }
                let set = engine.connections(&hypercol.cells(), &layer.cells());
                assert!(!set.is_empty());
                for (step, assignments) in steps.iter().enumerate() {
                    let expected = letter_head_weight(sweep, step, position, head_len);
                    let got = assigned(assignments, &set).unwrap();
                    assert!(close(got, expected), "step {step} pos {position} len {head_len}");
                }
                let last = letter_head_weight(sweep, 5, position, head_len);
                assert!(close(engine.weight_of(&set).unwrap(), last));
                checked += 1;
            }
        }
        // Six letter positions against the one- and two-letter head layers.
        assert_eq!(checked, 12);
    }

    #[test]
    fn head_grapheme_sets_lock_on_elapsed_time() {
        let params = short_params();
        let (mut engine, network, context) =
            prepare(&toy_language(None), &["lute"], "lute", &params);
        FocusScheduler::new(&params)
            .run(&mut engine, &network, &context)
            .unwrap();

        let steps = assignments_per_step(&engine);
        let lock = &params.head_grapheme_lock;
        let heads = network.head_cells();
        for (position, hypercol) in network.grapheme_hypercolumns().iter().enumerate() {
            let set = engine.connections(&heads, &hypercol.cells());
            assert!(!set.is_empty());
            for (step, assignments) in steps.iter().enumerate() {
                // Step k is assigned after the warm-up and k advances.
                let elapsed = step as f64 + 2.0;
                let expected = head_grapheme_weight(lock, position, elapsed);
                assert!(close(assigned(assignments, &set).unwrap(), expected));
            }
            let last = head_grapheme_weight(lock, position, 7.0);
            assert!(close(engine.weight_of(&set).unwrap(), last));
        }
    }

    #[test]
    fn suffix_grapheme_sets_track_the_leading_stem() {
        let language = Language::new(
            "aelstuz".chars(),
            GraphemeAlphabet::new(["a", "e", "l", "ll", "s", "t", "u", "z"]),
            ["tell", "set"],
            Some(vec!["s", "ll"]),
        );
        let params = ModelParams {
            suffix_tracking: SuffixTracking {
                top_stems: 1,
                ..SuffixTracking::default()
            },
            ..short_params()
        };
        let (mut engine, network, context) = prepare(&language, &["tell", "set"], "sets", &params);
        // One early event puts "set" ahead of "tell" for the whole run.
        let set_cell = network.lexical().get("set").unwrap().members()[0];
        engine.inject_spike(set_cell, 10.0);
        FocusScheduler::new(&params)
            .run(&mut engine, &network, &context)
            .unwrap();

        let shape = &params.suffix_tracking;
        let steps = assignments_per_step(&engine);
        let mut checked = 0;
        for unit in network.suffixes().unwrap() {
            assert_eq!(unit.graphemes.len(), 1);
            let grapheme = &unit.graphemes[0];
            for (position, hypercol) in network.grapheme_hypercolumns().iter().enumerate() {
                let target = hypercol.get(grapheme).unwrap();
                let set = engine.connections(&unit.population, target);
                let expected = suffix_grapheme_weight(shape, 3.0, &[0], position);
                for assignments in &steps {
                    assert!(close(assigned(assignments, &set).unwrap(), expected));
                }
                assert!(close(engine.weight_of(&set).unwrap(), expected));
                checked += 1;
            }
        }
        assert_eq!(checked, 12);
    }

    #[test]
    fn plain_mode_assigns_no_suffix_weights() {
        let plain = run(None, &["lute", "tell"], "lute").weight_assignments().len();
        let with_suffixes = run(Some(vec!["s"]), &["lute", "tell"], "lute")
            .weight_assignments()
            .len();
        // One "s" target per position, six positions, six steps.
        assert_eq!(with_suffixes - plain, 36);
    }

    #[test]
    fn empty_families_are_skipped() {
        let params = short_params();
        let (mut engine, network, context) =
            prepare(&toy_language(Some(vec!["s"])), &[], "sell", &params);
        assert!(network.lexical().is_empty());
        let window = FocusScheduler::new(&params)
            .run(&mut engine, &network, &context)
            .unwrap();
        assert_eq!(window, TimeWindow::new(0.0, 350.0));

        // No stems to rank, so the suffix -> grapheme placeholders stay at zero.
        let unit = &network.suffixes().unwrap()[0];
        for hypercol in network.grapheme_hypercolumns() {
            let set = engine.connections(&unit.population, &hypercol.cells());
            assert!(!set.is_empty());
            assert_eq!(engine.weight_of(&set), Some(0.0));
        }
        assert!(!engine.weight_assignments().is_empty());
    }

    #[test]
    fn steps_alternate_with_advances() {
        let engine = run(None, &["lute", "tell"], "lute");
        let advances: Vec<usize> = engine
            .log()
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, EngineCall::Simulate { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(advances.len(), 7);
        // Every gap between two advances holds weight assignments only.
        for pair in advances.windows(2) {
            let between = &engine.log()[pair[0] + 1..pair[1]];
            assert!(!between.is_empty());
            assert!(between
                .iter()
                .all(|c| matches!(c, EngineCall::SetWeight { .. })));
        }
    }

    #[test]
    fn identical_runs_assign_identical_weights() {
        let a = run(Some(vec!["s", "ll"]), &["tell", "tall", "sell"], "tells");
        let b = run(Some(vec!["s", "ll"]), &["tell", "tall", "sell"], "tells");
        let (wa, wb) = (a.weight_assignments(), b.weight_assignments());
        assert!(!wa.is_empty());
        assert_eq!(wa, wb);
    }
}
