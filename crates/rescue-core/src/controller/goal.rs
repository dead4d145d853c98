use contracts::{DropZone, RescueMode, Severity};

use super::*;

impl RescueAgent {
    /// Announce the mission and wait until the teammate starts moving.
    pub(super) fn intro(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let victims = ctx.world.drop_zones().len();
        let name = self.config.agent_name.clone();
        self.say(format!(
            "Hello! My name is {name}. Together we will collaborate and try to search and rescue \
             the {victims} victims on our right as quickly as possible. Each critical victim adds \
             6 points to our score, each mild victim 3 points. If you are ready to begin our \
             mission, you can simply start moving."
        ));
        if ctx.world.teammate_in_view() {
            Step::Stay(None)
        } else {
            Step::Goto(Phase::FindNextGoal)
        }
    }

    /// Prefer a victim either of us already found over blind exploration.
    pub(super) fn find_next_goal(&mut self, ctx: &mut TickContext<'_>) -> Step {
        self.state.negotiation = None;
        self.state.goal_victim = None;
        self.state.goal_drop = None;
        self.state.rescue = None;
        self.state.moving = true;

        let mut remaining: Vec<DropZone> = ctx
            .world
            .drop_zones()
            .into_iter()
            .filter(|zone| !self.state.ledger.is_collected(&zone.victim))
            .collect();
        if remaining.is_empty() {
            return Step::Stay(None);
        }
        remaining.sort_by_key(|zone| zone.location.y);

        // Deferred victims come back into play once a global re-search starts.
        let re_searching = self.state.ledger.searched_rooms().is_empty();
        for zone in remaining {
            let Some(record) = self.state.ledger.victim(&zone.victim).cloned() else {
                continue;
            };
            let deferred = self.state.ledger.is_deferred(&record.id);
            if deferred && !re_searching {
                continue;
            }

            let rescue = if deferred {
                self.say(format!(
                    "Moving to {room} to pick up {victim}. Please come there as well to help me \
                     carry {victim} to the drop zone.",
                    room = record.room,
                    victim = record.id
                ));
                RescueMode::Together
            } else {
                self.rescue_mode_for(record.severity)
            };
            debug!(victim = %record.id, ?rescue, located = record.is_located(), "goal victim selected");
            self.state.goal_victim = Some(record.id.clone());
            self.state.goal_drop = Some(zone.location);
            self.state.rescue = Some(rescue);

            let next = if record.is_located() {
                Phase::PlanPathToVictim
            } else {
                Phase::PlanPathToRoom
            };
            return Step::Yield {
                next,
                action: Some(self.idle()),
            };
        }
        Step::Goto(Phase::PickUnsearchedRoom)
    }

    fn rescue_mode_for(&self, severity: Severity) -> RescueMode {
        match severity {
            Severity::Critical => RescueMode::Together,
            Severity::Mild if self.beliefs.willingness() < self.config.willingness_threshold => {
                RescueMode::Alone
            }
            Severity::Mild if self.config.condition.is_weak() => RescueMode::Together,
            Severity::Mild => RescueMode::Alone,
        }
    }

    /// Nearest unsearched room by straight-line distance from the last door,
    /// or from the agent before any room was visited.
    pub(super) fn pick_unsearched_room(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let doors = ctx.world.doors();
        if doors.is_empty() {
            return Step::Stay(None);
        }
        let origin = self
            .state
            .last_door
            .unwrap_or_else(|| ctx.world.agent_location());
        let ledger = &self.state.ledger;
        let closest = doors
            .into_iter()
            .filter(|door| !ledger.is_searched(&door.room) && !ledger.is_skipped(&door.room))
            .min_by(|a, b| {
                origin
                    .distance(&a.location)
                    .total_cmp(&origin.distance(&b.location))
                    .then_with(|| a.room.cmp(&b.room))
            });

        let Some(door) = closest else {
            self.state.ledger.reset_search();
            self.outbox.forget_history();
            self.say("Going to re-search all areas.");
            self.nudge(BeliefField::Willingness, -0.4, "every area needs searching again");
            return Step::Goto(Phase::FindNextGoal);
        };
        debug!(room = %door.room, "next room picked");
        self.state.door = Some(door);
        Step::Goto(Phase::PlanPathToRoom)
    }
}
