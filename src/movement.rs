use crate::config::MovementConfig;
use crate::error::GridError;
use crate::grid::Grid;
use crate::model::{AgentId, AgentState};
use crate::neighborhood::Metric;
use crate::observer::Notifier;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::{Bernoulli, Normal};
use serde::{Deserialize, Serialize};

/// How agents relocate once a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MovementStrategy {
    /// Jump to any free cell on the grid.
    Default,
    /// Jump to a free cell in the neighborhood of the current one.
    Limited {
        radius: usize,
        metric: Metric,
        long_moves_uncommon: bool,
    },
}

impl MovementStrategy {
    pub fn from_config(cfg: &MovementConfig) -> Self {
        if cfg.limited {
            MovementStrategy::Limited {
                radius: cfg.radius,
                metric: cfg.metric,
                long_moves_uncommon: cfg.long_moves_uncommon,
            }
        } else {
            MovementStrategy::Default
        }
    }

    /// Possibly move one agent.
    ///
    /// `trigger` decides whether the agent tries to move today. Dead and
    /// quarantined agents never move; a move with no free destination is
    /// skipped.
    pub fn move_agent<R: Rng>(
        &self,
        id: AgentId,
        grid: &mut Grid,
        trigger: &Bernoulli,
        rng: &mut R,
        notifier: &mut Notifier,
    ) -> Result<()> {
        if grid.is_fully_occupied() {
            return Ok(());
        }
        let agent = grid.agent(id);
        if agent.state() == AgentState::Dead {
            return Ok(());
        }
        let Some(from) = agent.pos() else {
            return Ok(());
        };
        if !trigger.sample(rng) {
            return Ok(());
        }

        let target = match *self {
            MovementStrategy::Default => grid.random_free_pos(rng),
            MovementStrategy::Limited {
                radius,
                metric,
                long_moves_uncommon,
            } => {
                let radius = if long_moves_uncommon {
                    draw_radius(radius, rng)?
                } else {
                    radius
                };
                grid.free_pos_within(from, radius, metric, rng)
            }
        };

        let res = target.and_then(|to| grid.move_agent(from, to, notifier));
        match res {
            Ok(()) => {}
            Err(GridError::Full | GridError::NoEligibleTarget) => {
                log::trace!("agent {} has nowhere to go from {from}", id.0);
            }
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }
}

/// Half-normal radius with standard deviation `max_radius / 3`,
/// rounded and clamped to `[1, max_radius]`.
fn draw_radius<R: Rng>(max_radius: usize, rng: &mut R) -> Result<usize> {
    let dist = Normal::new(0.0, max_radius as f64 / 3.0)?;
    Ok(clamp_radius(dist.sample(rng), max_radius))
}

/// Halves round to even.
fn clamp_radius(raw: f64, max_radius: usize) -> usize {
    let radius = raw.abs().round_ties_even() as usize;
    radius.clamp(1, max_radius)
}
