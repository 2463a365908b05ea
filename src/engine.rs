use crate::config::Config;
use crate::grid::Grid;
use crate::model::AgentId;
use crate::movement::MovementStrategy;
use crate::observer::{NoopObserver, Notifier, Observer};
use crate::reproduction::{
    calc_effective_reproduction_number, estimate_effective_reproduction_number,
};
use crate::state::SimState;
use crate::status::{ActiveRules, DayDists, RuleCtx};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

/// Simulation engine.
///
/// Holds the state, grid, random number generator and movement strategy,
/// and provides methods to reset, advance, save and load a simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    state: SimState,
    grid: Grid,
    rng: ChaCha12Rng,
    movement: MovementStrategy,
}

impl Engine {
    /// Create an engine for `cfg` and populate its grid.
    pub fn new(cfg: Config) -> Result<Self> {
        cfg.validate().context("failed to validate config")?;

        let state = SimState::new(cfg);
        let mut engine = Self {
            grid: Grid::new(state.cfg.grid.size),
            rng: ChaCha12Rng::seed_from_u64(state.seed),
            movement: MovementStrategy::from_config(&state.cfg.movement),
            state,
        };
        engine
            .reset(&mut NoopObserver)
            .context("failed to reset engine")?;

        Ok(engine)
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn cfg(&self) -> &Config {
        &self.state.cfg
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Whether no agent is infective, incubating or quarantined.
    pub fn is_finished(&self) -> bool {
        !self.state.counts.is_active()
    }

    /// Start over from day 0 with the recorded seed.
    pub fn reset(&mut self, observer: &mut dyn Observer) -> Result<()> {
        self.rng = ChaCha12Rng::seed_from_u64(self.state.seed);
        self.state.clear();
        observer.on_reset(self.grid.size());

        let grid_cfg = &self.state.cfg.grid;
        let mut notifier = Notifier::new(&mut self.state.counts, observer);
        self.grid
            .reset(
                grid_cfg.susceptible_share,
                grid_cfg.infected_share,
                &mut self.rng,
                &mut notifier,
            )
            .context("failed to populate grid")?;

        self.state.beginning_total = self.state.counts.population();
        self.record_day();

        log::info!(
            "reset grid with {} agents (seed {})",
            self.state.beginning_total,
            self.state.seed
        );

        Ok(())
    }

    /// Simulate one day: movement pass, then status pass.
    pub fn advance_one_day(&mut self, observer: &mut dyn Observer) -> Result<()> {
        let Self {
            state,
            grid,
            rng,
            movement,
        } = self;
        state.day += 1;

        let cfg = &state.cfg;
        let dists = DayDists::new(cfg).context("failed to build daily distributions")?;
        let rules = ActiveRules::for_day(cfg);
        let mut notifier = Notifier::new(&mut state.counts, observer);

        let start = Instant::now();
        for id in grid.agents_in_random_order(rng) {
            movement
                .move_agent(id, grid, &dists.movement, rng, &mut notifier)
                .context("failed to move agent")?;
        }
        let movement_time = start.elapsed();

        let order = grid.agents_in_random_order(rng);

        let start = Instant::now();
        let mut ctx = RuleCtx {
            cfg,
            day: state.day,
            dists: &dists,
            grid,
            rng,
            notifier,
        };
        for id in order {
            rules.apply(id, &mut ctx);
        }
        // Includes agents isolated during the walk above.
        let isolated: Vec<AgentId> = ctx.grid.quarantined().to_vec();
        for id in isolated {
            rules.apply(id, &mut ctx);
        }
        let status_time = start.elapsed();

        log::debug!(
            "day {}: movement {movement_time:?}, status {status_time:?}",
            state.day
        );

        self.record_day();
        observer.on_day_end(self.state.day, &self.state.counts);

        Ok(())
    }

    /// Advance until the epidemic is over, `max_days` days have passed or
    /// `stop` is set. Returns the number of days simulated.
    pub fn run(
        &mut self,
        max_days: usize,
        stop: &AtomicBool,
        observer: &mut dyn Observer,
    ) -> Result<usize> {
        let mut n_days = 0;
        while n_days < max_days && !self.is_finished() {
            if stop.load(Ordering::Relaxed) {
                log::info!("stop requested on day {}", self.state.day);
                break;
            }
            self.advance_one_day(observer)
                .with_context(|| format!("failed to advance day {}", self.state.day))?;
            n_days += 1;
        }

        log::info!(
            "simulated {n_days} days, now on day {} (finished: {})",
            self.state.day,
            self.is_finished()
        );

        Ok(n_days)
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        writer.flush().context("failed to flush writer stream")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    /// Append the current counts and reproduction numbers to the history.
    fn record_day(&mut self) {
        let cfg = &self.state.cfg;
        let counts = self.state.counts;

        // Day 0 is always computed since it anchors the estimate.
        let r_value = if self.state.day == 0 || cfg.output.exact_r {
            calc_effective_reproduction_number(
                &self.grid,
                cfg.infection.remove_prob,
                cfg.infection.prob,
                cfg.infection.radius,
                cfg.infection.metric,
            )
        } else {
            0.0
        };

        let history = &mut self.state.history;
        history.counts.push(counts);
        history.r_values.push(r_value);
        let r0 = history.r_values[0];
        history.r_estimates.push(estimate_effective_reproduction_number(
            counts.susceptible,
            self.state.beginning_total,
            r0,
        ));
    }
}
