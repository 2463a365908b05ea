use crate::analysis::{Analyzer, RunRecord};
use crate::config::Config;
use crate::engine::Engine;
use crate::observer::LogObserver;
use anyhow::{Context, Result, bail};
use glob::glob;
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

/// Owns a simulation directory: its config, run directories and results.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
    stop: AtomicBool,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self {
            sim_dir,
            cfg,
            stop: AtomicBool::new(false),
        })
    }

    /// Create and simulate `n_runs` new runs in parallel.
    ///
    /// A failing run stops the others at their next day boundary.
    pub fn create_runs(&self, n_runs: usize) -> Result<()> {
        let first_idx = self.count_run_dirs().context("failed to count run dirs")?;

        (first_idx..first_idx + n_runs)
            .into_par_iter()
            .map(|run_idx| {
                self.create_run(run_idx).inspect_err(|_| {
                    self.stop.store(true, Ordering::Relaxed);
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(())
    }

    pub fn resume_run(&self, run_idx: usize) -> Result<()> {
        let checkpoint_file = self.checkpoint_file(run_idx);
        let engine = Engine::load_checkpoint(&checkpoint_file)
            .with_context(|| format!("failed to load {checkpoint_file:?}"))?;

        let mut expected = self.cfg.clone();
        expected.grid.seed = engine.cfg().grid.seed;
        if engine.cfg() != &expected {
            bail!("checkpoint config differs from the current config");
        }
        log::info!("loaded {checkpoint_file:?}");

        self.simulate(run_idx, engine)
            .with_context(|| format!("failed to simulate run {run_idx}"))
    }

    pub fn analyze_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;

        let mut analyzer = Analyzer::new();
        for run_idx in 0..n_runs {
            let record_file = self.record_file(run_idx);
            let record = RunRecord::load(&record_file)
                .with_context(|| format!("failed to load {record_file:?}"))?;
            analyzer.add_record(&record);
        }

        let results_file = self.results_file();
        analyzer
            .save_results(&results_file)
            .context("failed to save results")?;
        log::info!("analyzed {n_runs} runs into {results_file:?}");

        Ok(())
    }

    pub fn clean_sim(&self) -> Result<()> {
        for run_dir in self.run_dirs().context("failed to list run dirs")? {
            fs::remove_dir_all(&run_dir)
                .with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        let results_file = self.results_file();
        if results_file.exists() {
            fs::remove_file(&results_file)
                .with_context(|| format!("failed to remove {results_file:?}"))?;
            log::info!("removed {results_file:?}");
        }

        Ok(())
    }

    fn create_run(&self, run_idx: usize) -> Result<()> {
        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut cfg = self.cfg.clone();
        if let Some(seed) = cfg.grid.seed {
            cfg.grid.seed = Some(seed.wrapping_add(run_idx as u64));
        }
        let engine = Engine::new(cfg).context("failed to construct engine")?;

        self.simulate(run_idx, engine)
            .with_context(|| format!("failed to simulate run {run_idx}"))
    }

    fn simulate(&self, run_idx: usize, mut engine: Engine) -> Result<()> {
        engine
            .run(self.cfg.output.max_days, &self.stop, &mut LogObserver)
            .context("failed to run engine")?;

        RunRecord::from_engine(&engine)
            .save(self.record_file(run_idx))
            .context("failed to save record")?;

        engine
            .save_checkpoint(self.checkpoint_file(run_idx))
            .context("failed to save checkpoint")?;

        log::info!("saved run {run_idx}");

        Ok(())
    }

    fn run_dirs(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let dirs = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        Ok(dirs)
    }

    fn count_run_dirs(&self) -> Result<usize> {
        Ok(self.run_dirs()?.len())
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn checkpoint_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("checkpoint.msgpack")
    }

    fn record_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("record.msgpack")
    }

    fn results_file(&self) -> PathBuf {
        self.sim_dir.join("results.msgpack")
    }
}
