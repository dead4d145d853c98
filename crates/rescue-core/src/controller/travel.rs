use contracts::{Obstacle, ObstacleKind};

use super::*;

impl RescueAgent {
    pub(super) fn plan_path_to_room(&mut self, ctx: &mut TickContext<'_>) -> Step {
        ctx.router.reset();

        // A victim the teammate reported is only known by room; head there.
        if let Some(goal) = self.state.goal_victim.clone() {
            if let Some(record) = self.state.ledger.victim(&goal).filter(|r| !r.is_located()) {
                let room = record.room.clone();
                match ctx.world.door_of(&room) {
                    Some(door) => self.state.door = Some(door),
                    None => {
                        debug!(victim = %goal, room = %room, "reported room has no entrance, deferring");
                        self.state.ledger.defer(&goal);
                        self.state.goal_victim = None;
                        return Step::Goto(Phase::FindNextGoal);
                    }
                }
            }
        }

        let Some(door) = &self.state.door else {
            return Step::Goto(Phase::FindNextGoal);
        };
        ctx.router.add_waypoints(&[door.doormat]);
        Step::Goto(Phase::FollowPathToRoom)
    }

    pub(super) fn follow_path_to_room(&mut self, ctx: &mut TickContext<'_>) -> Step {
        if self.plan_invalidated() {
            self.state.last_door = None;
            return Step::Goto(Phase::FindNextGoal);
        }
        let Some(door) = self.state.door.clone() else {
            return Step::Goto(Phase::FindNextGoal);
        };
        self.announce_trip(&door.room);
        self.state.last_door = Some(door.location);

        let Some(direction) = ctx.router.next_move(ctx.world) else {
            return Step::Goto(Phase::RemoveObstacleIfNeeded);
        };
        if let Some(stones) = stones_in_path(ctx.world) {
            self.say(format!(
                "Reaching {} will take a bit longer because I found stones blocking my path.",
                door.room
            ));
            return Step::Stay(Some(AgentAction::RemoveObject {
                object_id: stones.object_id,
            }));
        }
        Step::Stay(Some(AgentAction::Move { direction }))
    }

    fn announce_trip(&mut self, room: &str) {
        if self.state.helping_remove {
            return;
        }
        let goal = self
            .state
            .goal_victim
            .clone()
            .filter(|goal| self.state.ledger.is_discovered(goal));
        match goal {
            Some(goal) if self.state.ledger.victim(&goal).is_some_and(|r| r.room == room) => {
                if self.config.condition.is_weak() {
                    self.say(format!("Moving to {room} to pick up {goal} together with you."));
                } else {
                    self.say(format!("Moving to {room} to pick up {goal}."));
                }
            }
            Some(_) => {}
            None => self.say(format!(
                "Moving to {room} because it is the closest unsearched area."
            )),
        }
    }

    pub(super) fn enter_room(&mut self, ctx: &mut TickContext<'_>) -> Step {
        self.state.negotiation = None;
        if self.plan_invalidated() {
            self.state.last_door = None;
            return Step::Goto(Phase::FindNextGoal);
        }
        match ctx.router.next_move(ctx.world) {
            Some(direction) => Step::Stay(Some(AgentAction::Move { direction })),
            None => Step::Goto(Phase::PlanRoomSearchPath),
        }
    }
}

/// Stones next to the agent that are not sitting in a doorway.
fn stones_in_path(world: &dyn WorldView) -> Option<Obstacle> {
    let here = world.agent_location();
    let doors = world.doors();
    world.visible_obstacles().into_iter().find(|obstacle| {
        obstacle.kind == ObstacleKind::Stones
            && obstacle.location.is_adjacent(&here)
            && !doors.iter().any(|door| {
                door.location == obstacle.location || door.doormat == obstacle.location
            })
    })
}
