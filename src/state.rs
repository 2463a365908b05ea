use crate::config::Config;
use crate::model::AgentState;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Population per epidemiological category.
///
/// The state categories count agents on the grid only; an agent in
/// quarantine is counted in `quarantined` and nowhere else.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub susceptible: usize,
    pub infective: usize,
    pub incubating: usize,
    pub removed: usize,
    pub immune: usize,
    pub dead: usize,
    pub quarantined: usize,
}

impl Counts {
    /// Move one agent from the `old` to the `new` category.
    pub fn apply(&mut self, old: AgentState, new: AgentState) {
        if old == new {
            return;
        }
        if let Some(count) = self.slot_mut(old) {
            *count -= 1;
        }
        if let Some(count) = self.slot_mut(new) {
            *count += 1;
        }
    }

    pub fn get(&self, state: AgentState) -> usize {
        match state {
            AgentState::Empty => 0,
            AgentState::Susceptible => self.susceptible,
            AgentState::Infective => self.infective,
            AgentState::Incubating => self.incubating,
            AgentState::Removed => self.removed,
            AgentState::Immune => self.immune,
            AgentState::Dead => self.dead,
        }
    }

    fn slot_mut(&mut self, state: AgentState) -> Option<&mut usize> {
        match state {
            AgentState::Empty => None,
            AgentState::Susceptible => Some(&mut self.susceptible),
            AgentState::Infective => Some(&mut self.infective),
            AgentState::Incubating => Some(&mut self.incubating),
            AgentState::Removed => Some(&mut self.removed),
            AgentState::Immune => Some(&mut self.immune),
            AgentState::Dead => Some(&mut self.dead),
        }
    }

    /// Agents currently on the grid.
    pub fn total(&self) -> usize {
        self.susceptible
            + self.infective
            + self.incubating
            + self.removed
            + self.immune
            + self.dead
    }

    /// Agents on the grid plus agents in quarantine.
    pub fn population(&self) -> usize {
        self.total() + self.quarantined
    }

    /// Whether the epidemic can still change anything.
    pub fn is_active(&self) -> bool {
        self.infective > 0 || self.incubating > 0 || self.quarantined > 0
    }
}

/// Per-day series, day 0 being the state right after a reset.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct History {
    pub counts: Vec<Counts>,
    pub r_values: Vec<f64>,
    pub r_estimates: Vec<f64>,
}

impl History {
    pub fn clear(&mut self) {
        self.counts.clear();
        self.r_values.clear();
        self.r_estimates.clear();
    }

    /// Number of simulated days recorded after day 0.
    pub fn elapsed_days(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }

    pub fn peak_infective(&self) -> usize {
        self.counts.iter().map(|c| c.infective).max().unwrap_or(0)
    }
}

/// Configuration, seed and everything that changes from day to day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimState {
    pub(crate) cfg: Config,
    pub(crate) seed: u64,
    pub(crate) day: usize,
    pub(crate) counts: Counts,
    pub(crate) beginning_total: usize,
    pub(crate) history: History,
}

impl SimState {
    /// Create a state for `cfg`, drawing a seed when none is configured.
    pub fn new(cfg: Config) -> Self {
        let seed = cfg.grid.seed.unwrap_or_else(|| rand::rng().random());
        Self {
            cfg,
            seed,
            day: 0,
            counts: Counts::default(),
            beginning_total: 0,
            history: History::default(),
        }
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Current day; 0 right after a reset.
    pub fn day(&self) -> usize {
        self.day
    }

    pub fn counts(&self) -> &Counts {
        &self.counts
    }

    /// Agents placed by the last reset.
    pub fn beginning_total(&self) -> usize {
        self.beginning_total
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn clear(&mut self) {
        self.day = 0;
        self.counts = Counts::default();
        self.beginning_total = 0;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_moves_one_agent_between_categories() {
        let mut counts = Counts::default();
        counts.apply(AgentState::Empty, AgentState::Susceptible);
        counts.apply(AgentState::Empty, AgentState::Susceptible);
        counts.apply(AgentState::Susceptible, AgentState::Infective);
        assert_eq!(counts.susceptible, 1);
        assert_eq!(counts.infective, 1);

        counts.apply(AgentState::Infective, AgentState::Empty);
        assert_eq!(counts.infective, 0);
        assert_eq!(counts.total(), 1);

        counts.apply(AgentState::Susceptible, AgentState::Susceptible);
        assert_eq!(counts.susceptible, 1);
    }

    #[test]
    fn population_includes_quarantine() {
        let counts = Counts {
            susceptible: 3,
            infective: 2,
            dead: 1,
            quarantined: 4,
            ..Counts::default()
        };
        assert_eq!(counts.total(), 6);
        assert_eq!(counts.population(), 10);
        assert!(counts.is_active());
        assert_eq!(counts.get(AgentState::Dead), 1);
    }

    #[test]
    fn configured_seed_is_kept() {
        let mut cfg = Config::default();
        cfg.grid.seed = Some(1234);
        assert_eq!(SimState::new(cfg).seed(), 1234);
    }
}
