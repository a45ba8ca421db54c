//! Criterion benchmarks for lexicon pruning and network simulation.
//!
//! Run with:
//!   cargo bench
//!   cargo bench --features parallel
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use readnet::automaton::bounded_distance;
use readnet::engine::SimulationEngine;
use readnet::probes::RunContext;
use readnet::substrate::{ExecutionTier, Substrate, SubstrateConfig};
use readnet::tokenizer::GraphemeAlphabet;
use readnet::topology::ReadingNetwork;
use readnet::{Language, ModelParams};

const WORDS: [&str; 13] = [
    "else", "lease", "least", "lute", "sell", "sells", "set", "stu", "tall", "tell", "tells",
    "zet", "zest",
];

fn alphabet() -> GraphemeAlphabet {
    GraphemeAlphabet::new(["a", "e", "ae", "ea", "ee", "l", "ll", "s", "t", "u", "x", "z"])
}

/// Synthetic lexicon: every toy word with one to three letters appended.
fn lexicon() -> Vec<String> {
    let tails = ["", "a", "es", "ull", "zet"];
    WORDS
        .iter()
        .flat_map(|w| tails.iter().map(move |t| format!("{w}{t}")))
        .collect()
}

/// Prune the synthetic lexicon against one input with growing edit budgets.
fn bench_pruning(c: &mut Criterion) {
    let mut group = c.benchmark_group("prune");
    let lexicon = lexicon();
    group.throughput(Throughput::Elements(lexicon.len() as u64));

    for max in [1usize, 2, 4].iter() {
        group.bench_with_input(BenchmarkId::new("bounded_distance", max), max, |b, &max| {
            b.iter(|| {
                lexicon
                    .iter()
                    .filter(|w| bounded_distance(w, black_box("ltue"), max).is_some())
                    .count()
            });
        });
    }

    group.finish();
}

fn bench_decompose(c: &mut Criterion) {
    let alphabet = alphabet();
    let lexicon = lexicon();
    c.bench_function("decompose_lexicon", |b| {
        b.iter(|| {
            lexicon
                .iter()
                .map(|w| alphabet.decompose(black_box(w)).map_or(0, |g| g.len()))
                .sum::<usize>()
        });
    });
}

/// One focus step of a built reading network, per execution tier.
fn bench_focus_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("focus_step");
    let language = Language::new(
        "aelstuxz".chars(),
        alphabet(),
        WORDS,
        None::<Vec<String>>,
    );
    let params = ModelParams::default();
    let candidates: Vec<String> = ["lute", "lease", "least"].map(String::from).to_vec();

    for tier in [ExecutionTier::Scalar, ExecutionTier::Parallel] {
        group.bench_function(format!("{tier:?}"), |b| {
            let mut engine = Substrate::new(SubstrateConfig::default().with_seed(42).with_tier(tier));
            let network = ReadingNetwork::build(&mut engine, &language, &candidates, "lute", &params)
                .expect("toy network builds");
            let mut context = RunContext::new();
            network
                .setup_reporting(&mut engine, &mut context)
                .expect("probes register");
            b.iter(|| {
                engine
                    .simulate(params.letter_focus_time)
                    .expect("simulation advances");
                black_box(engine.diagnostics().recorded_spikes)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pruning, bench_decompose, bench_focus_step);
criterion_main!(benches);
