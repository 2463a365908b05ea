use serde::{Deserialize, Serialize};
use std::fmt;

/// Cell address on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    row: usize,
    col: usize,
}

impl GridPos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Epidemiological state of an agent, or of a cell with no agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    Empty,
    Susceptible,
    Infective,
    Incubating,
    Removed,
    Immune,
    Dead,
}

impl AgentState {
    pub const COUNT: usize = 7;

    pub fn index(self) -> usize {
        self as usize
    }

    /// States no epidemiological rule moves an agent out of.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AgentState::Removed | AgentState::Immune | AgentState::Dead
        )
    }
}

/// Index of an agent in the grid's agent storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub u32);

impl AgentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Simulated individual.
///
/// `pos` is `None` exactly while the agent is in quarantine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    state: AgentState,
    pos: Option<GridPos>,
    infected_count: usize,
    sick_days: usize,
    incubation_days: usize,
}

impl Agent {
    pub fn new(pos: GridPos, state: AgentState) -> Self {
        Self {
            state,
            pos: Some(pos),
            infected_count: 0,
            sick_days: 0,
            incubation_days: 0,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn pos(&self) -> Option<GridPos> {
        self.pos
    }

    pub fn is_quarantined(&self) -> bool {
        self.pos.is_none()
    }

    /// Number of agents this one has infected directly.
    pub fn infected_count(&self) -> usize {
        self.infected_count
    }

    pub fn sick_days(&self) -> usize {
        self.sick_days
    }

    pub fn incubation_days(&self) -> usize {
        self.incubation_days
    }

    pub(crate) fn set_state(&mut self, state: AgentState) {
        self.state = state;
    }

    pub(crate) fn set_pos(&mut self, pos: Option<GridPos>) {
        self.pos = pos;
    }

    pub(crate) fn add_infection(&mut self) {
        self.infected_count += 1;
    }

    pub(crate) fn add_sick_day(&mut self) {
        self.sick_days += 1;
    }

    pub(crate) fn add_incubation_day(&mut self) {
        self.incubation_days += 1;
    }
}
