//! Effective reproduction number estimates.

use crate::grid::Grid;
use crate::model::{AgentState, GridPos};
use crate::neighborhood::{Metric, neighborhood};

/// Mean over all infective agents on the grid of the infections each one
/// has caused so far plus those it is still expected to cause.
///
/// The expected remainder is `remaining_days * infectable * infection_prob`,
/// where `infectable` counts susceptible cells in the infection
/// neighborhood and `remaining_days = max(round(1 / remove_prob - sick_days), 1)`.
/// With `remove_prob == 0` agents never recover and the estimate is
/// infinite as soon as one of them can still infect someone.
/// Returns 0 when no agent is infective.
pub fn calc_effective_reproduction_number(
    grid: &Grid,
    remove_prob: f64,
    infection_prob: f64,
    radius: usize,
    metric: Metric,
) -> f64 {
    let mean_duration = 1.0 / remove_prob;
    let size = grid.size();

    let mut sum = 0.0;
    let mut n_infective = 0;
    for row in 0..size {
        for col in 0..size {
            let pos = GridPos::new(row, col);
            let Some(agent) = grid.get(pos) else {
                continue;
            };
            if agent.state() != AgentState::Infective {
                continue;
            }

            let infectable = neighborhood(pos, radius, metric, size)
                .into_iter()
                .filter(|&near| {
                    grid.get(near)
                        .is_some_and(|other| other.state() == AgentState::Susceptible)
                })
                .count();

            let expected_per_day = infectable as f64 * infection_prob;
            let remaining = if expected_per_day > 0.0 {
                let days = (mean_duration - agent.sick_days() as f64)
                    .round_ties_even()
                    .max(1.0);
                days * expected_per_day
            } else {
                0.0
            };

            sum += agent.infected_count() as f64 + remaining;
            n_infective += 1;
        }
    }

    if n_infective == 0 {
        return 0.0;
    }
    sum / n_infective as f64
}

/// Scale `r0` by the susceptible fraction of the population.
pub fn estimate_effective_reproduction_number(
    susceptible_count: usize,
    total_count: usize,
    r0: f64,
) -> f64 {
    if total_count == 0 {
        return 0.0;
    }
    r0 * susceptible_count as f64 / total_count as f64
}
