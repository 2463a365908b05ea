//! Daily epidemiological transitions.
//!
//! Each agent state maps to an ordered list of rules, every rule gated by a
//! predicate over the configuration. The active rules are worked out once
//! per day by [`ActiveRules::for_day`] and then applied agent by agent.

use crate::config::Config;
use crate::grid::Grid;
use crate::model::{AgentId, AgentState};
use crate::neighborhood::neighborhood;
use crate::observer::Notifier;
use anyhow::Result;
use rand::prelude::*;
use rand_distr::Bernoulli;

/// A single status transition rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Infect susceptible neighbors.
    Spread,
    /// Infective to removed.
    Remove,
    /// Infective to dead or immune.
    Lethality,
    /// Susceptible to immune on the vaccination day.
    Vaccinate,
    /// Incubating to infective after the incubation period.
    Incubate,
    /// Isolate infective agents and release recovered ones.
    Quarantine,
}

type Predicate = fn(&Config) -> bool;

fn always(_: &Config) -> bool {
    true
}

fn vaccine_on(cfg: &Config) -> bool {
    cfg.vaccine.enabled
}

fn incubation_on(cfg: &Config) -> bool {
    cfg.incubation.enabled
}

fn lethality_on(cfg: &Config) -> bool {
    cfg.lethality.enabled
}

fn lethality_off(cfg: &Config) -> bool {
    !cfg.lethality.enabled
}

fn quarantine_on(cfg: &Config) -> bool {
    cfg.quarantine.enabled
}

/// Rules per agent state, indexed by [`AgentState::index`].
const RULE_TABLE: [&[(Rule, Predicate)]; AgentState::COUNT] = [
    // Empty
    &[],
    // Susceptible
    &[(Rule::Vaccinate, vaccine_on)],
    // Infective
    &[
        (Rule::Quarantine, quarantine_on),
        (Rule::Spread, always),
        (Rule::Lethality, lethality_on),
        (Rule::Remove, lethality_off),
    ],
    // Incubating
    &[(Rule::Spread, always), (Rule::Incubate, incubation_on)],
    // Removed
    &[(Rule::Quarantine, quarantine_on)],
    // Immune
    &[(Rule::Quarantine, quarantine_on)],
    // Dead
    &[(Rule::Quarantine, quarantine_on)],
];

/// The rules whose predicates hold today, per agent state.
#[derive(Debug, Clone)]
pub struct ActiveRules {
    rules: [Vec<Rule>; AgentState::COUNT],
}

impl ActiveRules {
    pub fn for_day(cfg: &Config) -> Self {
        let rules = RULE_TABLE.map(|entries| {
            entries
                .iter()
                .filter(|(_, active)| active(cfg))
                .map(|&(rule, _)| rule)
                .collect()
        });
        Self { rules }
    }

    pub fn get(&self, state: AgentState) -> &[Rule] {
        &self.rules[state.index()]
    }

    /// Apply every active rule for the agent's current state.
    pub fn apply<R: Rng>(&self, id: AgentId, ctx: &mut RuleCtx<'_, R>) {
        let state = ctx.grid.agent(id).state();
        for &rule in self.get(state) {
            rule.apply(id, ctx);
        }
    }
}

/// Bernoulli trials used by the rules, built once per day.
#[derive(Debug, Clone)]
pub struct DayDists {
    pub movement: Bernoulli,
    pub infection: Bernoulli,
    pub removal: Bernoulli,
    pub lethality: Bernoulli,
    pub vaccine: Bernoulli,
}

impl DayDists {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            movement: Bernoulli::new(cfg.movement.mixing)?,
            infection: Bernoulli::new(cfg.infection.prob)?,
            removal: Bernoulli::new(cfg.infection.remove_prob)?,
            lethality: Bernoulli::new(cfg.lethality.prob)?,
            vaccine: Bernoulli::new(cfg.vaccine.share)?,
        })
    }
}

/// Everything a rule may read or change.
pub struct RuleCtx<'a, R: Rng> {
    pub cfg: &'a Config,
    /// Days since the last reset, counting the current one.
    pub day: usize,
    pub dists: &'a DayDists,
    pub grid: &'a mut Grid,
    pub rng: &'a mut R,
    pub notifier: Notifier<'a>,
}

impl Rule {
    pub fn apply<R: Rng>(self, id: AgentId, ctx: &mut RuleCtx<'_, R>) {
        match self {
            Rule::Spread => spread(id, ctx),
            Rule::Remove => remove(id, ctx),
            Rule::Lethality => remove_lethal(id, ctx),
            Rule::Vaccinate => vaccinate(id, ctx),
            Rule::Incubate => incubate(id, ctx),
            Rule::Quarantine => quarantine(id, ctx),
        }
    }
}

fn spread<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    let agent = ctx.grid.agent(id);
    if !matches!(
        agent.state(),
        AgentState::Infective | AgentState::Incubating
    ) {
        return;
    }
    let Some(pos) = agent.pos() else {
        return;
    };

    let infected_state = if ctx.cfg.incubation.enabled {
        AgentState::Incubating
    } else {
        AgentState::Infective
    };
    let radius = ctx.cfg.infection.radius;
    let metric = ctx.cfg.infection.metric;

    for near in neighborhood(pos, radius, metric, ctx.grid.size()) {
        let Some(other) = ctx.grid.agent_id(near) else {
            continue;
        };
        if ctx.grid.agent(other).state() != AgentState::Susceptible {
            continue;
        }
        if ctx.dists.infection.sample(ctx.rng) {
            ctx.grid.set_state(other, infected_state, &mut ctx.notifier);
            ctx.grid.agent_mut(id).add_infection();
        }
    }
}

fn remove<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    if ctx.grid.agent(id).state() != AgentState::Infective {
        return;
    }
    if ctx.dists.removal.sample(ctx.rng) {
        ctx.grid.set_state(id, AgentState::Removed, &mut ctx.notifier);
    } else {
        ctx.grid.agent_mut(id).add_sick_day();
    }
}

fn remove_lethal<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    if ctx.grid.agent(id).state() != AgentState::Infective {
        return;
    }
    if ctx.dists.removal.sample(ctx.rng) {
        let state = if ctx.dists.lethality.sample(ctx.rng) {
            AgentState::Dead
        } else {
            AgentState::Immune
        };
        ctx.grid.set_state(id, state, &mut ctx.notifier);
    } else {
        ctx.grid.agent_mut(id).add_sick_day();
    }
}

fn vaccinate<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    if ctx.grid.agent(id).state() != AgentState::Susceptible {
        return;
    }
    if ctx.day == ctx.cfg.vaccine.day && ctx.dists.vaccine.sample(ctx.rng) {
        ctx.grid.set_state(id, AgentState::Immune, &mut ctx.notifier);
    }
}

fn incubate<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    let agent = ctx.grid.agent(id);
    if agent.state() != AgentState::Incubating {
        return;
    }
    if agent.incubation_days() >= ctx.cfg.incubation.period {
        ctx.grid.set_state(id, AgentState::Infective, &mut ctx.notifier);
    } else {
        ctx.grid.agent_mut(id).add_incubation_day();
    }
}

fn quarantine<R: Rng>(id: AgentId, ctx: &mut RuleCtx<'_, R>) {
    let agent = ctx.grid.agent(id);
    if agent.is_quarantined() {
        if agent.state().is_terminal() {
            ctx.grid.release(id, &mut ctx.notifier);
        }
        return;
    }
    if agent.state() != AgentState::Infective {
        return;
    }

    let counts = ctx.notifier.counts();
    let isolated = counts.quarantined as f64;
    let infected = (counts.infective + counts.quarantined) as f64;
    if isolated + 1.0 <= ctx.cfg.quarantine.share * infected {
        ctx.grid.quarantine(id, &mut ctx.notifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GridPos;
    use crate::observer::NoopObserver;
    use crate::state::Counts;
    use rand_chacha::ChaCha12Rng;

    struct Fixture {
        cfg: Config,
        grid: Grid,
        counts: Counts,
        rng: ChaCha12Rng,
    }

    impl Fixture {
        fn new(size: usize, cfg: Config) -> Self {
            Self {
                cfg,
                grid: Grid::new(size),
                counts: Counts::default(),
                rng: ChaCha12Rng::seed_from_u64(17),
            }
        }

        fn spawn(&mut self, row: usize, col: usize, state: AgentState) -> AgentId {
            let mut obs = NoopObserver;
            let mut notifier = Notifier::new(&mut self.counts, &mut obs);
            self.grid
                .spawn(GridPos::new(row, col), state, &mut notifier)
                .expect("free cell")
        }

        fn run(&mut self, day: usize, ids: &[AgentId]) {
            let dists = DayDists::new(&self.cfg).expect("valid probabilities");
            let rules = ActiveRules::for_day(&self.cfg);
            let mut obs = NoopObserver;
            let mut ctx = RuleCtx {
                cfg: &self.cfg,
                day,
                dists: &dists,
                grid: &mut self.grid,
                rng: &mut self.rng,
                notifier: Notifier::new(&mut self.counts, &mut obs),
            };
            for &id in ids {
                rules.apply(id, &mut ctx);
            }
        }

        fn state(&self, id: AgentId) -> AgentState {
            self.grid.agent(id).state()
        }
    }

    #[test]
    fn table_follows_toggles() {
        let mut cfg = Config::default();
        let rules = ActiveRules::for_day(&cfg);
        assert_eq!(
            rules.get(AgentState::Infective),
            &[Rule::Spread, Rule::Remove]
        );
        assert!(rules.get(AgentState::Susceptible).is_empty());
        assert_eq!(rules.get(AgentState::Incubating), &[Rule::Spread]);

        cfg.lethality.enabled = true;
        cfg.quarantine.enabled = true;
        cfg.vaccine.enabled = true;
        cfg.incubation.enabled = true;
        let rules = ActiveRules::for_day(&cfg);
        assert_eq!(
            rules.get(AgentState::Infective),
            &[Rule::Quarantine, Rule::Spread, Rule::Lethality]
        );
        assert_eq!(rules.get(AgentState::Susceptible), &[Rule::Vaccinate]);
        assert_eq!(
            rules.get(AgentState::Incubating),
            &[Rule::Spread, Rule::Incubate]
        );
        assert_eq!(rules.get(AgentState::Dead), &[Rule::Quarantine]);
        assert!(rules.get(AgentState::Empty).is_empty());
    }

    #[test]
    fn certain_infection_reaches_all_neighbors() {
        let mut cfg = Config::default();
        cfg.infection.prob = 1.0;
        cfg.infection.remove_prob = 0.0;
        let mut fx = Fixture::new(5, cfg);
        let source = fx.spawn(2, 2, AgentState::Infective);
        let near: Vec<_> = [(1, 2), (3, 2), (2, 1), (2, 3)]
            .into_iter()
            .map(|(r, c)| fx.spawn(r, c, AgentState::Susceptible))
            .collect();
        let diagonal = fx.spawn(1, 1, AgentState::Susceptible);

        fx.run(1, &[source]);

        assert!(near.iter().all(|&id| fx.state(id) == AgentState::Infective));
        assert_eq!(fx.state(diagonal), AgentState::Susceptible);
        assert_eq!(fx.grid.agent(source).infected_count(), 4);
        assert_eq!(fx.grid.agent(source).sick_days(), 1);
        assert_eq!(fx.counts.infective, 5);
        assert_eq!(fx.counts.susceptible, 1);
    }

    #[test]
    fn infection_goes_through_incubation() {
        let mut cfg = Config::default();
        cfg.infection.prob = 1.0;
        cfg.infection.remove_prob = 0.0;
        cfg.incubation.enabled = true;
        cfg.incubation.period = 2;
        let mut fx = Fixture::new(3, cfg);
        let source = fx.spawn(0, 0, AgentState::Infective);
        let target = fx.spawn(0, 1, AgentState::Susceptible);

        fx.run(1, &[source]);
        assert_eq!(fx.state(target), AgentState::Incubating);
        assert_eq!(fx.counts.incubating, 1);

        fx.run(2, &[target]);
        fx.run(3, &[target]);
        assert_eq!(fx.grid.agent(target).incubation_days(), 2);
        assert_eq!(fx.state(target), AgentState::Incubating);

        fx.run(4, &[target]);
        assert_eq!(fx.state(target), AgentState::Infective);
        assert_eq!(fx.counts.incubating, 0);
        assert_eq!(fx.counts.infective, 2);
    }

    #[test]
    fn incubating_agents_spread() {
        let mut cfg = Config::default();
        cfg.infection.prob = 1.0;
        cfg.incubation.enabled = true;
        let mut fx = Fixture::new(3, cfg);
        let carrier = fx.spawn(1, 1, AgentState::Incubating);
        let target = fx.spawn(1, 2, AgentState::Susceptible);

        fx.run(1, &[carrier]);
        assert_eq!(fx.state(target), AgentState::Incubating);
        assert_eq!(fx.grid.agent(carrier).infected_count(), 1);
    }

    #[test]
    fn certain_removal() {
        let mut cfg = Config::default();
        cfg.infection.remove_prob = 1.0;
        let mut fx = Fixture::new(2, cfg);
        let id = fx.spawn(0, 0, AgentState::Infective);
        fx.run(1, &[id]);
        assert_eq!(fx.state(id), AgentState::Removed);
        assert_eq!(fx.counts.removed, 1);
        assert_eq!(fx.counts.infective, 0);
    }

    #[test]
    fn lethality_splits_dead_and_immune() {
        let mut cfg = Config::default();
        cfg.infection.remove_prob = 1.0;
        cfg.lethality.enabled = true;
        cfg.lethality.prob = 1.0;
        let mut fx = Fixture::new(2, cfg.clone());
        let id = fx.spawn(0, 0, AgentState::Infective);
        fx.run(1, &[id]);
        assert_eq!(fx.state(id), AgentState::Dead);

        cfg.lethality.prob = 0.0;
        let mut fx = Fixture::new(2, cfg);
        let id = fx.spawn(0, 0, AgentState::Infective);
        fx.run(1, &[id]);
        assert_eq!(fx.state(id), AgentState::Immune);
        assert_eq!(fx.counts.removed, 0);
    }

    #[test]
    fn vaccine_is_a_single_pulse() {
        let mut cfg = Config::default();
        cfg.vaccine.enabled = true;
        cfg.vaccine.day = 3;
        cfg.vaccine.share = 1.0;
        let mut fx = Fixture::new(2, cfg);
        let id = fx.spawn(0, 0, AgentState::Susceptible);

        fx.run(1, &[id]);
        fx.run(2, &[id]);
        assert_eq!(fx.state(id), AgentState::Susceptible);
        fx.run(3, &[id]);
        assert_eq!(fx.state(id), AgentState::Immune);
        assert_eq!(fx.counts.immune, 1);
    }

    #[test]
    fn quarantine_admission_and_release() {
        let mut cfg = Config::default();
        cfg.quarantine.enabled = true;
        cfg.quarantine.share = 0.5;
        cfg.infection.prob = 0.0;
        cfg.infection.remove_prob = 0.0;
        let mut fx = Fixture::new(4, cfg);
        let ids: Vec<_> = (0..4)
            .map(|col| fx.spawn(0, col, AgentState::Infective))
            .collect();

        fx.run(1, &ids);
        assert_eq!(fx.counts.quarantined, 2);
        assert_eq!(fx.counts.infective, 2);
        assert_eq!(fx.grid.quarantined().len(), 2);

        let isolated = fx.grid.quarantined()[0];
        fx.grid.agent_mut(isolated).set_state(AgentState::Removed);
        fx.run(2, &[isolated]);
        assert!(!fx.grid.agent(isolated).is_quarantined());
        assert_eq!(fx.grid.agent(isolated).pos(), Some(GridPos::new(0, 0)));
        assert_eq!(fx.counts.quarantined, 1);
        assert_eq!(fx.counts.removed, 1);
    }

    #[test]
    fn quarantined_agents_do_not_spread() {
        let mut cfg = Config::default();
        cfg.quarantine.enabled = true;
        cfg.quarantine.share = 1.0;
        cfg.infection.prob = 1.0;
        cfg.infection.remove_prob = 0.0;
        let mut fx = Fixture::new(3, cfg);
        let source = fx.spawn(1, 1, AgentState::Infective);
        let target = fx.spawn(1, 2, AgentState::Susceptible);

        fx.run(1, &[source]);
        assert!(fx.grid.agent(source).is_quarantined());
        assert_eq!(fx.state(target), AgentState::Susceptible);
        assert_eq!(fx.counts.population(), 2);
    }
}
