//! `readnet`: read one word with the spiking reading model.
//!
//! Examples:
//!   readnet lute
//!   readnet ltue typo --report readings
//!   readnet tells --lang data/toy --suffixes
//!   readnet cases
//!
//! The toy language under `data/toy` is used unless `--lang DIR` is given.

use std::path::PathBuf;
use std::process;

use tracing::{error, info};

use readnet::cases;
use readnet::report::ReportWriter;
use readnet::substrate::{ExecutionTier, Substrate, SubstrateConfig};
use readnet::{Language, ModelParams, ReadError, Reader};

#[derive(Debug)]
struct Options {
    lang: PathBuf,
    params: Option<PathBuf>,
    suffixes: bool,
    report: Option<PathBuf>,
    seed: u64,
    positional: Vec<String>,
}

fn print_help() {
    println!("readnet: spiking reading model");
    println!("Usage: readnet [options] <TEXT> [EXPERIMENT]");
    println!("       readnet [options] cases");
    println!("       readnet help\n");
    println!("Options:");
    println!("  --lang DIR       language directory (default: data/toy)");
    println!("  --params FILE    JSON parameter preset");
    println!("  --suffixes       stem/suffix mode (reads `stems` and `suffixes`)");
    println!("  --report DIR     write a reading report under DIR");
    println!("  --seed N         seed for the Poisson drive (default: 1)");
}

fn usage_error(message: &str) -> ! {
    eprintln!("{message}");
    print_help();
    process::exit(2);
}

fn parse_args() -> Options {
    let mut opts = Options {
        lang: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/toy"),
        params: None,
        suffixes: false,
        report: None,
        seed: 1,
        positional: Vec::new(),
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .unwrap_or_else(|| usage_error(&format!("{name} needs a value")))
        };
        match arg.as_str() {
            "--lang" => opts.lang = PathBuf::from(value("--lang")),
            "--params" => opts.params = Some(PathBuf::from(value("--params"))),
            "--report" => opts.report = Some(PathBuf::from(value("--report"))),
            "--seed" => {
                let raw = value("--seed");
                opts.seed = raw
                    .parse()
                    .unwrap_or_else(|_| usage_error(&format!("invalid seed: {raw}")));
            }
            "--suffixes" => opts.suffixes = true,
            "--help" => {
                print_help();
                process::exit(0);
            }
            flag if flag.starts_with("--") => usage_error(&format!("Unknown option: {flag}")),
            _ => opts.positional.push(arg),
        }
    }
    opts
}

fn main() {
    tracing_subscriber::fmt::init();

    let opts = parse_args();
    match opts.positional.first().map(String::as_str) {
        None => usage_error("Missing text input"),
        Some("help" | "-h") => {
            print_help();
            return;
        }
        _ => {}
    }
    if opts.positional.len() > 2 {
        usage_error("Too many arguments");
    }

    if let Err(e) = run(&opts) {
        if let ReadError::InputTooLong { .. } | ReadError::EmptyInput = e {
            usage_error(&e.to_string());
        }
        error!("{e}");
        process::exit(1);
    }
}

fn run(opts: &Options) -> readnet::Result<()> {
    let params = match &opts.params {
        Some(path) => ModelParams::from_json_file(path)?,
        None => ModelParams::default(),
    };
    let language = Language::load(&opts.lang, opts.suffixes)?;
    let reader = Reader::new(language, params);

    let tier = if cfg!(feature = "parallel") {
        ExecutionTier::Parallel
    } else {
        ExecutionTier::Scalar
    };
    let mut engine = Substrate::new(SubstrateConfig::default().with_seed(opts.seed).with_tier(tier));

    if opts.positional[0] == "cases" {
        let report = cases::run(&reader, &mut engine, &cases::CASES)?;
        println!("=== Observations ===");
        for o in &report.observations {
            let mark = if o.is_correct() { "ok" } else { "MISS" };
            println!("{:<8} {:<8} {mark}", o.input, o.decoded);
        }
        println!(
            "accuracy: {}/{} ({:.1}%)",
            report.correct(),
            report.observations.len(),
            report.accuracy() * 100.0
        );
        return Ok(());
    }

    let input = &opts.positional[0];
    let experiment = opts.positional.get(1).map_or("experim", String::as_str);
    let reading = reader.read(&mut engine, input)?;
    println!("{}", reading.decoded);

    if let Some(base) = &opts.report {
        let name = format!("{experiment}_{input}");
        let dir = ReportWriter::new(base).write(&name, &engine, &reading, reader.params())?;
        info!("readings saved to {}", dir.display());
    }
    Ok(())
}
