use crate::engine::Engine;
use crate::state::History;
use crate::stats::{Accumulator, AccumulatorReport};
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Outcome of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub seed: u64,
    pub elapsed_days: usize,
    pub finished: bool,
    pub beginning_total: usize,
    pub history: History,
}

impl RunRecord {
    pub fn from_engine(engine: &Engine) -> Self {
        let state = engine.state();
        Self {
            seed: state.seed(),
            elapsed_days: state.history().elapsed_days(),
            finished: engine.is_finished(),
            beginning_total: state.beginning_total(),
            history: state.history().clone(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, self).context("failed to serialize record")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let record = decode::from_read(&mut reader).context("failed to deserialize record")?;
        Ok(record)
    }
}

type Extract = fn(&RunRecord) -> Option<f64>;

/// Per-run quantities aggregated across runs.
const OBSERVABLES: [(&str, Extract); 6] = [
    ("elapsed_days", |rec| Some(rec.elapsed_days as f64)),
    ("peak_infective", |rec| {
        Some(rec.history.peak_infective() as f64)
    }),
    ("final_dead", |rec| {
        rec.history.counts.last().map(|c| c.dead as f64)
    }),
    ("final_susceptible_share", |rec| {
        let last = rec.history.counts.last()?;
        (rec.beginning_total > 0)
            .then(|| last.susceptible as f64 / rec.beginning_total as f64)
    }),
    ("initial_r", |rec| rec.history.r_values.first().copied()),
    ("final_r_estimate", |rec| {
        rec.history.r_estimates.last().copied()
    }),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservableReport {
    pub name: String,
    pub report: AccumulatorReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Results {
    pub n_runs: usize,
    pub n_finished: usize,
    pub observables: Vec<ObservableReport>,
}

/// Aggregates run records into mean and standard deviation per observable.
pub struct Analyzer {
    n_runs: usize,
    n_finished: usize,
    acc_vec: Vec<Accumulator>,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(OBSERVABLES.len(), Accumulator::new);
        Self {
            n_runs: 0,
            n_finished: 0,
            acc_vec,
        }
    }

    /// Add one run. Missing and non-finite values are skipped.
    pub fn add_record(&mut self, record: &RunRecord) {
        self.n_runs += 1;
        if record.finished {
            self.n_finished += 1;
        }
        for ((_, extract), acc) in OBSERVABLES.iter().zip(&mut self.acc_vec) {
            if let Some(val) = extract(record).filter(|val| val.is_finite()) {
                acc.add(val);
            }
        }
    }

    pub fn results(&self) -> Results {
        let observables = OBSERVABLES
            .iter()
            .zip(&self.acc_vec)
            .map(|((name, _), acc)| ObservableReport {
                name: name.to_string(),
                report: acc.report(),
            })
            .collect();
        Results {
            n_runs: self.n_runs,
            n_finished: self.n_finished,
            observables,
        }
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self.results()).context("failed to serialize results")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }
}
