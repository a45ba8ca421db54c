//! Acceptance case list over the toy language.

use crate::engine::SimulationEngine;
use crate::error::Result;
use crate::reader::Reader;

/// (input, expected reading)
pub const CASES: [(&str, &str); 13] = [
    ("else", "else"),
    ("lease", "lease"),
    ("least", "least"),
    ("lute", "lute"),
    ("sell", "sell"),
    ("sells", "sells"),
    ("set", "set"),
    ("stu", "stu"),
    ("tall", "tall"),
    ("tell", "tell"),
    ("tells", "tells"),
    ("zet", "zet"),
    ("zest", "zest"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub input: String,
    pub expected: String,
    pub decoded: String,
}

impl Observation {
    pub fn is_correct(&self) -> bool {
        self.decoded == self.expected
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaseReport {
    pub observations: Vec<Observation>,
}

impl CaseReport {
    pub fn correct(&self) -> usize {
        self.observations.iter().filter(|o| o.is_correct()).count()
    }

    /// Share of correctly decoded cases; 0 for an empty report.
    pub fn accuracy(&self) -> f64 {
        if self.observations.is_empty() {
            return 0.0;
        }
        self.correct() as f64 / self.observations.len() as f64
    }
}

/// Read every case in order on the same engine.
pub fn run<E: SimulationEngine>(
    reader: &Reader,
    engine: &mut E,
    cases: &[(&str, &str)],
) -> Result<CaseReport> {
    let mut report = CaseReport::default();
    for &(input, expected) in cases {
        let reading = reader.read(engine, input)?;
        report.observations.push(Observation {
            input: input.to_string(),
            expected: expected.to_string(),
            decoded: reading.decoded,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(input: &str, decoded: &str) -> Observation {
        Observation {
            input: input.into(),
            expected: input.into(),
            decoded: decoded.into(),
        }
    }

    #[test]
    fn accuracy_counts_exact_readings() {
        let report = CaseReport {
            observations: vec![obs("lute", "lute"), obs("tell", "tel"), obs("zet", "zet"), obs("set", "")],
        };
        assert_eq!(report.correct(), 2);
        assert_eq!(report.accuracy(), 0.5);
        assert_eq!(CaseReport::default().accuracy(), 0.0);
    }

    #[test]
    fn cases_fit_the_default_reading_length() {
        let max = crate::config::ModelParams::default().max_text_len;
        assert!(CASES.iter().all(|(input, _)| input.len() <= max));
    }
}
