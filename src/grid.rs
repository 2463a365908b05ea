use crate::error::GridError;
use crate::model::{Agent, AgentId, AgentState, GridPos};
use crate::neighborhood::{Metric, neighborhood};
use crate::observer::Notifier;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Square lattice holding at most one agent per cell.
///
/// Agents live in `agents` for the whole run and are addressed by
/// [`AgentId`]. A cell refers to the agent standing on it; quarantined
/// agents are referenced from `quarantined` instead and occupy no cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    size: usize,
    cells: Vec<Option<AgentId>>,
    agents: Vec<Agent>,
    quarantined: Vec<AgentId>,
    n_occupied: usize,
}

impl Grid {
    /// Create an empty `size x size` grid.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
            agents: Vec::new(),
            quarantined: Vec::new(),
            n_occupied: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn contains(&self, pos: GridPos) -> bool {
        pos.row() < self.size && pos.col() < self.size
    }

    fn cell(&self, pos: GridPos) -> Result<usize, GridError> {
        if !self.contains(pos) {
            return Err(GridError::OutOfBounds(pos));
        }
        Ok(pos.row() * self.size + pos.col())
    }

    fn pos_of(&self, i_cell: usize) -> GridPos {
        GridPos::new(i_cell / self.size, i_cell % self.size)
    }

    pub fn agent_id(&self, pos: GridPos) -> Option<AgentId> {
        self.cell(pos).ok().and_then(|i_cell| self.cells[i_cell])
    }

    pub fn get(&self, pos: GridPos) -> Option<&Agent> {
        self.agent_id(pos).map(|id| self.agent(id))
    }

    pub fn agent(&self, id: AgentId) -> &Agent {
        &self.agents[id.index()]
    }

    pub(crate) fn agent_mut(&mut self, id: AgentId) -> &mut Agent {
        &mut self.agents[id.index()]
    }

    /// Number of agents placed by the last reset, quarantined ones included.
    pub fn n_agents(&self) -> usize {
        self.agents.len()
    }

    pub fn is_occupied(&self, pos: GridPos) -> bool {
        self.get(pos)
            .is_some_and(|agent| agent.state() != AgentState::Empty)
    }

    pub fn is_fully_occupied(&self) -> bool {
        self.n_occupied == self.cells.len()
    }

    /// Agents currently isolated, in order of admission.
    pub fn quarantined(&self) -> &[AgentId] {
        &self.quarantined
    }

    /// Row-major snapshot of the state shown in every cell.
    pub fn cell_states(&self) -> Vec<AgentState> {
        self.cells
            .iter()
            .map(|cell| cell.map_or(AgentState::Empty, |id| self.agent(id).state()))
            .collect()
    }

    /// Place a new agent in `state` on a free cell.
    pub fn spawn(
        &mut self,
        pos: GridPos,
        state: AgentState,
        notifier: &mut Notifier,
    ) -> Result<AgentId, GridError> {
        if state == AgentState::Empty {
            return Err(GridError::EmptySpawn);
        }
        let i_cell = self.cell(pos)?;
        if self.is_occupied(pos) {
            return Err(GridError::Occupied(pos));
        }

        let id = AgentId(self.agents.len() as u32);
        self.agents.push(Agent::new(pos, state));
        self.cells[i_cell] = Some(id);
        self.n_occupied += 1;
        notifier.cell_changed(pos, AgentState::Empty, state);

        Ok(id)
    }

    /// Move the agent standing on `from` to the free cell `to`.
    pub fn move_agent(
        &mut self,
        from: GridPos,
        to: GridPos,
        notifier: &mut Notifier,
    ) -> Result<(), GridError> {
        let i_from = self.cell(from)?;
        let i_to = self.cell(to)?;
        if self.is_fully_occupied() {
            return Err(GridError::Full);
        }
        if self.is_occupied(to) {
            return Err(GridError::Occupied(to));
        }
        let id = self.cells[i_from].ok_or(GridError::Vacant(from))?;

        self.cells.swap(i_from, i_to);
        let agent = self.agent_mut(id);
        agent.set_pos(Some(to));
        let state = agent.state();

        notifier.cell_changed(from, state, AgentState::Empty);
        notifier.cell_changed(to, AgentState::Empty, state);

        Ok(())
    }

    /// Change the state of an agent, on the grid or in quarantine.
    pub fn set_state(&mut self, id: AgentId, state: AgentState, notifier: &mut Notifier) {
        let agent = self.agent_mut(id);
        let old = agent.state();
        agent.set_state(state);
        log::trace!("agent {} changed from {old:?} to {state:?}", id.0);
        if let Some(pos) = agent.pos() {
            notifier.cell_changed(pos, old, state);
        }
    }

    /// Take an agent off the grid into the quarantine list.
    ///
    /// Returns `false` if the agent is already quarantined.
    pub fn quarantine(&mut self, id: AgentId, notifier: &mut Notifier) -> bool {
        let agent = &self.agents[id.index()];
        let Some(pos) = agent.pos() else {
            return false;
        };
        let state = agent.state();
        let i_cell = pos.row() * self.size + pos.col();

        self.cells[i_cell] = None;
        self.n_occupied -= 1;
        self.agent_mut(id).set_pos(None);
        self.quarantined.push(id);
        notifier.quarantined(pos, state);

        true
    }

    /// Put a quarantined agent back on the first free cell in row-major order.
    ///
    /// Returns `false` if the agent is not quarantined or the grid is full.
    pub fn release(&mut self, id: AgentId, notifier: &mut Notifier) -> bool {
        if !self.agent(id).is_quarantined() {
            return false;
        }
        let Some(i_cell) = self.cells.iter().position(Option::is_none) else {
            return false;
        };
        let pos = self.pos_of(i_cell);

        self.cells[i_cell] = Some(id);
        self.n_occupied += 1;
        self.quarantined.retain(|&q_id| q_id != id);
        let agent = self.agent_mut(id);
        agent.set_pos(Some(pos));
        let state = agent.state();
        notifier.released(pos, state);

        true
    }

    /// All agents on the grid in a fresh uniformly random order.
    pub fn agents_in_random_order<R: Rng>(&self, rng: &mut R) -> Vec<AgentId> {
        let mut ids: Vec<_> = self.cells.iter().flatten().copied().collect();
        ids.shuffle(rng);
        ids
    }

    /// Clear the grid and seed it with susceptible and infective agents.
    ///
    /// One sample of distinct cells is drawn for both groups; its first
    /// `round(susceptible_share * N)` cells become susceptible and the rest
    /// infective, so the groups never overlap.
    pub fn reset<R: Rng>(
        &mut self,
        susceptible_share: f64,
        infected_share: f64,
        rng: &mut R,
        notifier: &mut Notifier,
    ) -> Result<(), GridError> {
        *self = Grid::new(self.size);

        let n_cells = self.cells.len();
        let n_seeded = share_of(susceptible_share + infected_share, n_cells);
        let n_susceptible = share_of(susceptible_share, n_cells).min(n_seeded);

        let chosen = rand::seq::index::sample(rng, n_cells, n_seeded);
        for (i_chosen, i_cell) in chosen.iter().enumerate() {
            let state = if i_chosen < n_susceptible {
                AgentState::Susceptible
            } else {
                AgentState::Infective
            };
            self.spawn(self.pos_of(i_cell), state, notifier)?;
        }

        Ok(())
    }

    /// A uniformly random free cell anywhere on the grid.
    pub fn random_free_pos<R: Rng>(&self, rng: &mut R) -> Result<GridPos, GridError> {
        if self.is_fully_occupied() {
            return Err(GridError::Full);
        }
        loop {
            let pos = GridPos::new(rng.random_range(0..self.size), rng.random_range(0..self.size));
            if !self.is_occupied(pos) {
                return Ok(pos);
            }
        }
    }

    /// A uniformly random free cell in the neighborhood of `pos`.
    pub fn free_pos_within<R: Rng>(
        &self,
        pos: GridPos,
        radius: usize,
        metric: Metric,
        rng: &mut R,
    ) -> Result<GridPos, GridError> {
        let free: Vec<_> = neighborhood(pos, radius, metric, self.size)
            .into_iter()
            .filter(|&cand| !self.is_occupied(cand))
            .collect();
        free.choose(rng).copied().ok_or(GridError::NoEligibleTarget)
    }
}

fn share_of(share: f64, n_cells: usize) -> usize {
    ((share * n_cells as f64).round_ties_even() as usize).min(n_cells)
}
