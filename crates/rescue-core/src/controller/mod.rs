//! Phase controller. Each phase handler inspects ledger, belief and snapshot
//! and returns a [`Step`]; the driver applies steps until one yields control
//! back to the host.

mod goal;
mod inbox;
mod obstacle;
mod rescue;
mod search;
mod travel;

use contracts::{AgentAction, BeliefField, Phase};
use tracing::{debug, warn};

use crate::agent::RescueAgent;
use crate::negotiation::PromptFeatures;
use crate::world::{Router, WorldView};

/// Competence penalty whenever the teammate lets a wait run out.
const TIMEOUT_PENALTY: f64 = -0.2;

pub(crate) struct TickContext<'a> {
    pub world: &'a dyn WorldView,
    pub router: &'a mut dyn Router,
    pub tick: u64,
}

/// One transition of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Step {
    /// Move to another phase and keep going this tick.
    Goto(Phase),
    /// Remain in the current phase and return to the host.
    Stay(Option<AgentAction>),
    /// Move to another phase and return to the host.
    Yield {
        next: Phase,
        action: Option<AgentAction>,
    },
}

impl RescueAgent {
    pub(crate) fn drive(&mut self, ctx: &mut TickContext<'_>) -> Option<AgentAction> {
        let rounds = self.config.max_phase_rounds.max(1);
        for _ in 0..rounds {
            match self.step(self.state.phase, ctx) {
                Step::Goto(next) => self.enter(next),
                Step::Stay(action) => return action,
                Step::Yield { next, action } => {
                    self.enter(next);
                    return action;
                }
            }
        }
        warn!(
            tick = ctx.tick,
            phase = %self.state.phase,
            rounds,
            "phase round limit reached, idling this tick"
        );
        None
    }

    fn step(&mut self, phase: Phase, ctx: &mut TickContext<'_>) -> Step {
        match phase {
            Phase::Intro => self.intro(ctx),
            Phase::FindNextGoal => self.find_next_goal(ctx),
            Phase::PickUnsearchedRoom => self.pick_unsearched_room(ctx),
            Phase::PlanPathToRoom => self.plan_path_to_room(ctx),
            Phase::FollowPathToRoom => self.follow_path_to_room(ctx),
            Phase::RemoveObstacleIfNeeded => self.remove_obstacle_if_needed(ctx),
            Phase::EnterRoom => self.enter_room(ctx),
            Phase::PlanRoomSearchPath => self.plan_room_search_path(ctx),
            Phase::FollowRoomSearchPath => self.follow_room_search_path(ctx),
            Phase::PlanPathToVictim => self.plan_path_to_victim(ctx),
            Phase::FollowPathToVictim => self.follow_path_to_victim(ctx),
            Phase::TakeVictim => self.take_victim(ctx),
            Phase::PlanPathToDropPoint => self.plan_path_to_drop_point(ctx),
            Phase::FollowPathToDropPoint => self.follow_path_to_drop_point(ctx),
            Phase::DropVictim => self.drop_victim(),
        }
    }

    pub(crate) fn enter(&mut self, next: Phase) {
        if next != self.state.phase {
            debug!(from = %self.state.phase, to = %next, "phase transition");
        }
        self.state.phase = next;
    }

    /// The teammate has acted since the current room was targeted: the goal
    /// victim was collected or reported elsewhere, or the room was searched
    /// without the goal turning up.
    fn plan_invalidated(&self) -> bool {
        let Some(door) = &self.state.door else {
            return true;
        };
        let ledger = &self.state.ledger;
        let goal = self.state.goal_victim.as_deref();
        if let Some(goal) = goal {
            if ledger.is_collected(goal) {
                return true;
            }
            if ledger.victim(goal).is_some_and(|record| record.room != door.room) {
                return true;
            }
        }
        let goal_known = goal.is_some_and(|goal| ledger.is_discovered(goal));
        !self.state.helping_remove && ledger.is_searched(&door.room) && !goal_known
    }

    fn idle(&self) -> AgentAction {
        AgentAction::Idle {
            duration_ticks: self.config.idle_ticks,
        }
    }

    fn say(&mut self, content: impl Into<String>) {
        self.outbox.compose(content);
    }

    fn nudge(&mut self, field: BeliefField, raw_delta: f64, reason: &str) {
        self.beliefs.nudge(field, raw_delta, reason);
    }

    fn penalize_timeout(&mut self, reason: &str) {
        self.nudge(BeliefField::Competence, TIMEOUT_PENALTY, reason);
    }

    fn prompt_features(&self) -> PromptFeatures<'_> {
        PromptFeatures {
            rescued: self
                .state
                .ledger
                .collected()
                .iter()
                .map(String::as_str)
                .collect(),
            searched: self
                .state
                .ledger
                .searched_rooms()
                .iter()
                .map(String::as_str)
                .collect(),
            distance: self.state.distance,
        }
    }
}
