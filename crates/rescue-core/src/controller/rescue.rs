use contracts::{ObjectiveKind, RescueMode, Severity};

use super::*;

impl RescueAgent {
    pub(super) fn plan_path_to_victim(&mut self, ctx: &mut TickContext<'_>) -> Step {
        ctx.router.reset();
        let target = self
            .state
            .goal_victim
            .as_deref()
            .and_then(|goal| self.state.ledger.victim(goal))
            .and_then(|record| record.exact_location);
        let Some(target) = target else {
            return Step::Goto(Phase::FindNextGoal);
        };
        ctx.router.add_waypoints(&[target]);
        Step::Goto(Phase::FollowPathToVictim)
    }

    pub(super) fn follow_path_to_victim(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let collected = self
            .state
            .goal_victim
            .as_deref()
            .is_some_and(|goal| self.state.ledger.is_collected(goal));
        if collected {
            return Step::Goto(Phase::FindNextGoal);
        }
        match ctx.router.next_move(ctx.world) {
            Some(direction) => Step::Stay(Some(AgentAction::Move { direction })),
            None => Step::Goto(Phase::TakeVictim),
        }
    }

    /// Standing on the victim. A joint carry waits for the teammate to pick it
    /// up; waiting too long either falls back to carrying alone or defers.
    pub(super) fn take_victim(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let Some(record) = self
            .state
            .goal_victim
            .as_deref()
            .and_then(|goal| self.state.ledger.victim(goal))
            .cloned()
        else {
            return Step::Goto(Phase::FindNextGoal);
        };
        let victim = record.id.as_str();

        let joint = record.severity == Severity::Critical
            || self.state.rescue == Some(RescueMode::Together);
        if joint {
            let still_here = ctx
                .world
                .visible_victims()
                .iter()
                .any(|sighting| sighting.name == victim);
            if !still_here {
                debug!(victim, "teammate picked up the victim");
                self.state.ledger.mark_collected(victim);
                self.state.carrying_together = true;
                self.state.joint_wait_since = None;
                return Step::Yield {
                    next: Phase::FindNextGoal,
                    action: None,
                };
            }

            self.state.moving = false;
            let since = *self.state.joint_wait_since.get_or_insert(ctx.tick);
            let timeout = self.beliefs.timeout(0, Some(self.state.distance));
            if (ctx.tick.saturating_sub(since) as f64) <= timeout {
                return Step::Stay(None);
            }

            self.penalize_timeout("did not come to carry a victim together");
            let abandoned = self
                .state
                .ledger
                .close_open_for(ObjectiveKind::Rescue, victim, ctx.tick);
            debug!(victim, abandoned = abandoned.len(), "joint rescue abandoned");
            self.state.joint_wait_since = None;
            self.state.moving = true;
            if record.severity == Severity::Critical {
                self.say("Timeout exceeded, I will continue searching.");
                self.state.ledger.defer(victim);
                self.state.goal_victim = None;
                return Step::Yield {
                    next: Phase::FindNextGoal,
                    action: Some(self.idle()),
                };
            }
            self.say(format!("Timeout exceeded, I will carry {victim} myself."));
            self.state.rescue = Some(RescueMode::Alone);
        }

        // Collected at pickup, not at delivery: a later teammate claim for
        // the same victim must not count it a second time.
        self.state.ledger.mark_collected(victim);
        self.state.carrying = true;
        Step::Yield {
            next: Phase::PlanPathToDropPoint,
            action: Some(AgentAction::CarryObject {
                object_id: record.object_handle.clone().unwrap_or_else(|| record.id.clone()),
                human_name: self.config.teammate_name.clone(),
            }),
        }
    }

    pub(super) fn plan_path_to_drop_point(&mut self, ctx: &mut TickContext<'_>) -> Step {
        ctx.router.reset();
        let drop = self.state.goal_drop.or_else(|| {
            let goal = self.state.goal_victim.as_deref()?;
            ctx.world
                .drop_zones()
                .into_iter()
                .find(|zone| zone.victim == goal)
                .map(|zone| zone.location)
        });
        match drop {
            Some(location) => {
                self.state.goal_drop = Some(location);
                ctx.router.add_waypoints(&[location]);
                Step::Goto(Phase::FollowPathToDropPoint)
            }
            None => {
                warn!(victim = ?self.state.goal_victim, "no drop zone for carried victim");
                Step::Goto(Phase::DropVictim)
            }
        }
    }

    pub(super) fn follow_path_to_drop_point(&mut self, ctx: &mut TickContext<'_>) -> Step {
        if let Some(goal) = self.carried_alone() {
            self.say(format!("Transporting {goal} to the drop zone."));
        }
        match ctx.router.next_move(ctx.world) {
            Some(direction) => Step::Stay(Some(AgentAction::Move { direction })),
            None => Step::Goto(Phase::DropVictim),
        }
    }

    pub(super) fn drop_victim(&mut self) -> Step {
        if let Some(goal) = self.carried_alone() {
            self.say(format!("Delivered {goal} at the drop zone."));
        }
        self.state.rescue = None;
        self.state.door = None;
        self.state.last_door = None;
        self.state.carrying = false;
        Step::Yield {
            next: Phase::FindNextGoal,
            action: Some(AgentAction::Drop {
                human_name: self.config.teammate_name.clone(),
            }),
        }
    }

    /// The goal victim when it is a mild one the agent carries on its own.
    fn carried_alone(&self) -> Option<String> {
        let goal = self.state.goal_victim.as_deref()?;
        let mild = Severity::from_victim_name(goal) == Some(Severity::Mild);
        (mild && self.state.rescue == Some(RescueMode::Alone)).then(|| goal.to_string())
    }
}
