//! Driver-facing notifications.

use crate::model::{AgentState, GridPos};
use crate::state::Counts;

/// Callbacks invoked synchronously by the engine.
///
/// Every method defaults to a no-op so a driver only overrides what it
/// needs. They are called from inside a reset or a day's step and must not
/// block.
pub trait Observer {
    /// The grid is about to be repopulated; all `size * size` cells are empty.
    fn on_reset(&mut self, _size: usize) {}

    /// A cell changed: an agent spawned, moved in or out, changed state,
    /// entered or left quarantine. `Empty` means the cell is now free.
    fn on_agent_change(&mut self, _pos: GridPos, _state: AgentState) {}

    /// All phases of `day` have completed; `counts` are final for that day.
    fn on_day_end(&mut self, _day: usize, _counts: &Counts) {}
}

/// An [`Observer`] that ignores everything.
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Logs the daily counts at debug level.
pub struct LogObserver;

impl Observer for LogObserver {
    fn on_day_end(&mut self, day: usize, counts: &Counts) {
        log::debug!("day {day}: {counts:?}");
    }
}

/// Routes every cell change to the running counts and the observer.
///
/// All grid mutations go through here, which keeps the counts an exact
/// delta-maintained view of the grid.
pub struct Notifier<'a> {
    counts: &'a mut Counts,
    observer: &'a mut dyn Observer,
}

impl<'a> Notifier<'a> {
    pub fn new(counts: &'a mut Counts, observer: &'a mut dyn Observer) -> Self {
        Self { counts, observer }
    }

    pub fn counts(&self) -> &Counts {
        self.counts
    }

    pub fn cell_changed(&mut self, pos: GridPos, old: AgentState, new: AgentState) {
        self.counts.apply(old, new);
        self.observer.on_agent_change(pos, new);
    }

    pub fn quarantined(&mut self, pos: GridPos, old: AgentState) {
        self.cell_changed(pos, old, AgentState::Empty);
        self.counts.quarantined += 1;
    }

    pub fn released(&mut self, pos: GridPos, new: AgentState) {
        self.counts.quarantined -= 1;
        self.cell_changed(pos, AgentState::Empty, new);
    }
}
