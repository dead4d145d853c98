use std::collections::BTreeSet;

use contracts::{
    AgentConfig, Distance, Door, InboundMessage, Location, Phase, RescueMode, TickOutput,
    TrustBelief,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::belief::{BeliefEngine, BeliefPolicy};
use crate::controller::TickContext;
use crate::ledger::Ledger;
use crate::message::Outbox;
use crate::negotiation::Negotiation;
use crate::store::{BeliefKeeper, BeliefStore};
use crate::world::{Router, WorldView};

/// Everything the controller remembers between ticks.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    pub phase: Phase,
    pub ledger: Ledger,
    pub negotiation: Option<Negotiation>,
    pub goal_victim: Option<String>,
    pub goal_drop: Option<Location>,
    /// Entrance of the room currently targeted.
    pub door: Option<Door>,
    /// Entrance of the last room travelled to; origin for picking the next one.
    pub last_door: Option<Location>,
    pub rescue: Option<RescueMode>,
    pub room_victims: BTreeSet<String>,
    /// Travelling to help the teammate clear an entrance they asked about.
    pub helping_remove: bool,
    pub carrying: bool,
    pub carrying_together: bool,
    pub moving: bool,
    pub joint_wait_since: Option<u64>,
    pub teammate_area: Option<u32>,
    pub agent_area: Option<u32>,
    pub distance: Distance,
    pub all_searched_flagged: bool,
}

impl Default for AgentState {
    fn default() -> Self {
        Self {
            phase: Phase::Intro,
            ledger: Ledger::new(),
            negotiation: None,
            goal_victim: None,
            goal_drop: None,
            door: None,
            last_door: None,
            rescue: None,
            room_victims: BTreeSet::new(),
            helping_remove: false,
            carrying: false,
            carrying_together: false,
            moving: false,
            joint_wait_since: None,
            teammate_area: None,
            agent_area: None,
            distance: Distance::Medium,
            all_searched_flagged: false,
        }
    }
}

/// The rescue teammate. Call [`RescueAgent::decide`] once per host tick.
pub struct RescueAgent {
    pub(crate) config: AgentConfig,
    pub(crate) state: AgentState,
    pub(crate) beliefs: BeliefEngine,
    pub(crate) keeper: BeliefKeeper,
    pub(crate) outbox: Outbox,
}

impl RescueAgent {
    pub fn new(config: AgentConfig, store: Box<dyn BeliefStore>) -> Self {
        let policy = BeliefPolicy::from_mode(config.trust_mode, config.seed);
        let mut keeper = BeliefKeeper::new(store, config.teammate_name.clone());
        let initial = keeper.load(&policy);
        info!(
            agent = %config.agent_name,
            teammate = %config.teammate_name,
            mode = ?config.trust_mode,
            competence = initial.competence,
            willingness = initial.willingness,
            "rescue agent ready"
        );
        Self {
            outbox: Outbox::new(config.agent_name.clone()),
            beliefs: BeliefEngine::new(policy, initial),
            state: AgentState::default(),
            keeper,
            config,
        }
    }

    /// Run one decision cycle: fold in the teammate's messages, revise the
    /// belief, then drive the phase controller until it yields.
    pub fn decide(
        &mut self,
        world: &dyn WorldView,
        router: &mut dyn Router,
        inbox: &[InboundMessage],
    ) -> TickOutput {
        let tick = world.tick();
        self.ingest(world, tick, inbox);
        self.check_global_consistency(world);
        self.refresh_distance(world);

        let action = if self.observe_joint_carry(world, tick) {
            debug!(tick, "carrying together, teammate leads");
            None
        } else {
            let mut ctx = TickContext {
                world,
                router,
                tick,
            };
            self.drive(&mut ctx)
        };

        let belief = self.beliefs.belief();
        if self.beliefs.policy().is_learned() {
            self.keeper.persist_if_changed(&belief, tick);
        }
        self.keeper.record_history(&belief, tick);

        TickOutput {
            tick,
            phase: self.state.phase,
            action,
            messages: self.outbox.drain_tick(world.score()),
            belief,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn belief(&self) -> TrustBelief {
        self.beliefs.belief()
    }

    pub fn policy(&self) -> BeliefPolicy {
        self.beliefs.policy()
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.keeper.last_error()
    }
}

impl std::fmt::Debug for RescueAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescueAgent")
            .field("config", &self.config)
            .field("phase", &self.state.phase)
            .field("belief", &self.beliefs.belief())
            .finish()
    }
}
