//! Reading reports on disk.
//!
//! Layout of one report directory `<base>/<name>_<unix-seconds>/`:
//!
//! - `<group>_spike_scores.txt` for every reporting and decision group,
//!   lines `{count:>7} : {label}` ranked by count;
//! - `params.json`: the parameter set of the run;
//! - `probes.json`: spike times per probe;
//! - `reading.json`: input, decoded string, window and candidates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::info;

use crate::config::ModelParams;
use crate::decision::{DecisionEngine, Ranked};
use crate::engine::SimulationEngine;
use crate::error::{ReadError, Result};
use crate::probes::{ProbeGroup, TimeWindow};
use crate::reader::Reading;

#[derive(Serialize)]
struct ReadingSummary<'a> {
    input: &'a str,
    decoded: &'a str,
    window: TimeWindow,
    candidates: &'a [String],
}

pub fn format_spike_scores(ranking: &[Ranked]) -> String {
    ranking
        .iter()
        .map(|r| format!("{:>7} : {}\n", r.count, r.label))
        .collect()
}

pub struct ReportWriter {
    base: PathBuf,
}

impl ReportWriter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Write a report for `reading` under a fresh timestamped directory and
    /// return its path.
    pub fn write<E: SimulationEngine>(
        &self,
        name: &str,
        engine: &E,
        reading: &Reading,
        params: &ModelParams,
    ) -> Result<PathBuf> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let dir = self.base.join(format!("{name}_{secs}"));
        if dir.exists() {
            return Err(ReadError::ReportExists(dir));
        }
        std::fs::create_dir_all(&dir).map_err(|source| ReadError::Report {
            path: dir.clone(),
            source,
        })?;

        let context = &reading.context;
        let decisions = DecisionEngine::new(engine, &context.probes, reading.window)?;
        let groups = context
            .report_groups
            .iter()
            .chain(context.stems.iter())
            .chain(context.reading.iter());
        for group in groups {
            write_group(&dir, &decisions, group)?;
        }

        write_file(&dir.join("params.json"), &serde_json::to_string_pretty(params)?)?;

        let mut probes: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for name in context.probes.names() {
            probes.insert(name, context.probes.spike_times(engine, name)?);
        }
        write_file(&dir.join("probes.json"), &serde_json::to_string(&probes)?)?;

        let summary = ReadingSummary {
            input: &reading.input,
            decoded: &reading.decoded,
            window: reading.window,
            candidates: &reading.candidates,
        };
        write_file(&dir.join("reading.json"), &serde_json::to_string_pretty(&summary)?)?;

        info!(path = %dir.display(), "report written");
        Ok(dir)
    }
}

fn write_group<E: SimulationEngine>(
    dir: &Path,
    decisions: &DecisionEngine<'_, E>,
    group: &ProbeGroup,
) -> Result<()> {
    let ranking = decisions.score(&group.labels)?;
    write_file(
        &dir.join(format!("{}_spike_scores.txt", group.name)),
        &format_spike_scores(&ranking),
    )
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).map_err(|source| ReadError::Report {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_scores_are_right_aligned() {
        let ranking = [
            Ranked {
                label: "g0-l".into(),
                count: 1234,
            },
            Ranked {
                label: "g0-t".into(),
                count: 7,
            },
        ];
        assert_eq!(format_spike_scores(&ranking), "   1234 : g0-l\n      7 : g0-t\n");
        assert_eq!(format_spike_scores(&[]), "");
        let wide = [Ranked {
            label: "lute".into(),
            count: 12_345_678,
        }];
        assert_eq!(format_spike_scores(&wide), "12345678 : lute
");
    }
}
