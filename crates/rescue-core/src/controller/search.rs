use contracts::{Location, RescueMode, Severity};
use tracing::info;

use super::*;
use crate::ledger::Observation;
use crate::message::{area_index, ReplyToken};
use crate::negotiation::{Negotiation, Poll, Resolution, Topic};

impl RescueAgent {
    pub(super) fn plan_room_search_path(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let Some(room) = self.state.door.as_ref().map(|door| door.room.clone()) else {
            return Step::Goto(Phase::FindNextGoal);
        };
        self.state.agent_area = area_index(&room);
        let tiles = ctx.world.room_tiles(&room);
        let sweep = efficient_search(&tiles);
        debug!(room = %room, tiles = tiles.len(), waypoints = sweep.len(), "room sweep planned");
        ctx.router.reset();
        ctx.router.add_waypoints(&sweep);
        self.state.room_victims.clear();
        Step::Goto(Phase::FollowRoomSearchPath)
    }

    pub(super) fn follow_room_search_path(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let Some(room) = self.state.door.as_ref().map(|door| door.room.clone()) else {
            return Step::Goto(Phase::FindNextGoal);
        };
        match ctx.router.next_move(ctx.world) {
            Some(direction) => {
                let action = Some(AgentAction::Move { direction });
                match self.scan_room(ctx, &room) {
                    Some(next) => Step::Yield { next, action },
                    None => Step::Stay(action),
                }
            }
            None => self.finish_sweep(ctx, &room),
        }
    }

    /// Fold every visible victim into the ledger. Returns a phase to switch to
    /// when the goal victim has been located.
    fn scan_room(&mut self, ctx: &mut TickContext<'_>, room: &str) -> Option<Phase> {
        for sighting in ctx.world.visible_victims() {
            if sighting.is_healthy() {
                continue;
            }
            self.state.room_victims.insert(sighting.name.clone());
            let outcome = self.state.ledger.observe_victim(
                &sighting.name,
                room,
                sighting.location,
                &sighting.object_id,
            );
            if matches!(outcome, Observation::New | Observation::Promoted) {
                if self.state.ledger.retract_collected(&sighting.name) {
                    self.nudge(
                        BeliefField::Willingness,
                        -0.5,
                        "victim reported collected is still in an area",
                    );
                }
            }
            match outcome {
                Observation::Promoted
                    if self.state.goal_victim.as_deref() == Some(sighting.name.as_str()) =>
                {
                    let victim = &sighting.name;
                    self.say(format!(
                        "Found {victim} in {room} because you told me {victim} was located here."
                    ));
                    self.state.ledger.mark_searched(room);
                    return Some(Phase::FindNextGoal);
                }
                Observation::New if self.state.negotiation.is_none() => {
                    self.ask_about_victim(ctx.tick, &sighting.name, room);
                }
                _ => {}
            }
        }
        None
    }

    fn ask_about_victim(&mut self, tick: u64, victim: &str, room: &str) {
        let Some(severity) = Severity::from_victim_name(victim) else {
            return;
        };
        let mut negotiation = Negotiation::open(Topic::Victim {
            victim: victim.to_string(),
            severity,
            room: room.to_string(),
        });
        if severity == Severity::Mild && !self.beliefs.should_ask() {
            info!(victim, "not asking an unwilling teammate, rescuing alone");
            negotiation.resolve(Resolution::Autonomous);
        } else {
            let prompt = negotiation.topic().prompt(&self.prompt_features());
            self.say(prompt);
            negotiation.mark_asked(tick);
        }
        self.state.negotiation = Some(negotiation);
    }

    fn finish_sweep(&mut self, ctx: &mut TickContext<'_>, room: &str) -> Step {
        if let Some(goal) = self.state.goal_victim.clone() {
            let claimed_here = self
                .state
                .ledger
                .victim(&goal)
                .is_some_and(|record| record.room == room);
            if claimed_here && !self.state.room_victims.contains(&goal) {
                self.say(format!(
                    "{goal} not present in {room} because I searched the whole area without finding {goal}."
                ));
                self.nudge(
                    BeliefField::Willingness,
                    -0.15,
                    "claimed victim absent from a searched area",
                );
                self.state.ledger.purge_victim(&goal);
                self.state.room_victims.clear();
                self.state.goal_victim = None;
            }
        }
        self.state.ledger.mark_searched(room);

        let topic = match self.state.negotiation.as_ref().map(Negotiation::topic) {
            Some(topic @ Topic::Victim { .. }) => topic.clone(),
            _ => {
                self.state.negotiation = None;
                return Step::Yield {
                    next: Phase::FindNextGoal,
                    action: Some(self.idle()),
                };
            }
        };
        let timeout = self
            .beliefs
            .timeout(topic.timeout_offset(), Some(self.state.distance));
        let poll = match self.state.negotiation.as_mut() {
            Some(negotiation) => negotiation.poll(ctx.tick, timeout),
            None => Poll::Waiting,
        };
        match poll {
            Poll::AskNeeded => {
                let prompt = topic.prompt(&self.prompt_features());
                self.say(prompt);
                if let Some(negotiation) = self.state.negotiation.as_mut() {
                    negotiation.mark_asked(ctx.tick);
                }
                Step::Stay(None)
            }
            Poll::Waiting => Step::Stay(None),
            Poll::Resolved(resolution) => self.resolve_victim(ctx, &topic, resolution),
        }
    }

    fn resolve_victim(
        &mut self,
        ctx: &mut TickContext<'_>,
        topic: &Topic,
        resolution: Resolution,
    ) -> Step {
        let Topic::Victim {
            victim,
            severity,
            room,
        } = topic
        else {
            return Step::Goto(Phase::FindNextGoal);
        };
        self.state.negotiation = None;
        if resolution == Resolution::TimedOut {
            self.penalize_timeout("no answer about a found victim");
        }

        let mode = match (*severity, resolution) {
            (_, Resolution::Reply(ReplyToken::Continue)) => None,
            (Severity::Critical, Resolution::Reply(ReplyToken::Rescue))
            | (Severity::Mild, Resolution::Reply(ReplyToken::RescueTogether)) => {
                Some(RescueMode::Together)
            }
            // A critical victim cannot be carried alone; come back to it later.
            (Severity::Critical, _) => None,
            (Severity::Mild, _) => Some(RescueMode::Alone),
        };
        let Some(mode) = mode else {
            self.state.ledger.defer(victim);
            return Step::Yield {
                next: Phase::FindNextGoal,
                action: Some(self.idle()),
            };
        };

        match mode {
            RescueMode::Together if ctx.world.teammate_in_view() => self.say(format!(
                "Lets carry {victim} together! Please wait until I moved on top of {victim}."
            )),
            RescueMode::Together => {
                self.say(format!("Please come to {room} to carry {victim} together."))
            }
            RescueMode::Alone => self.say(format!("Picking up {victim} in {room}.")),
        }
        self.state.rescue = Some(mode);
        self.state.goal_victim = Some(victim.clone());
        self.state.goal_drop = ctx
            .world
            .drop_zones()
            .into_iter()
            .find(|zone| &zone.victim == victim)
            .map(|zone| zone.location);
        Step::Goto(Phase::PlanPathToVictim)
    }
}

/// Boustrophedon sweep: one waypoint per tile column, alternating between the
/// top and bottom rows, so the sensors cover the room without visiting every
/// tile.
pub(crate) fn efficient_search(tiles: &[Location]) -> Vec<Location> {
    let mut columns: Vec<i64> = Vec::new();
    for tile in tiles {
        if !columns.contains(&tile.x) {
            columns.push(tile.x);
        }
    }
    let (Some(top), Some(bottom)) = (
        tiles.iter().map(|tile| tile.y).min(),
        tiles.iter().map(|tile| tile.y).max(),
    ) else {
        return Vec::new();
    };
    columns
        .into_iter()
        .enumerate()
        .map(|(index, x)| {
            if index % 2 == 0 {
                Location::new(x, top)
            } else {
                Location::new(x, bottom)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_alternates_rows_per_column() {
        let tiles: Vec<Location> = (3..6)
            .flat_map(|x| (10..13).map(move |y| Location::new(x, y)))
            .collect();
        assert_eq!(
            efficient_search(&tiles),
            vec![
                Location::new(3, 10),
                Location::new(4, 12),
                Location::new(5, 10)
            ]
        );
    }

    #[test]
    fn empty_room_has_no_sweep() {
        assert!(efficient_search(&[]).is_empty());
    }
}
