//! Blocked entrances. Rocks need both teammates, stones can go either way,
//! trees are the agent's job; the teammate is asked unless the belief says
//! asking is pointless.

use contracts::{Door, ObjectiveKind, Obstacle, ObstacleKind};
use tracing::info;

use super::*;
use crate::belief::JointTask;
use crate::message::ReplyToken;
use crate::negotiation::{Negotiation, Poll, Resolution, Topic};

impl RescueAgent {
    pub(super) fn remove_obstacle_if_needed(&mut self, ctx: &mut TickContext<'_>) -> Step {
        let Some(door) = self.state.door.clone() else {
            return Step::Goto(Phase::FindNextGoal);
        };
        let blocking = ctx
            .world
            .visible_obstacles()
            .into_iter()
            .find(|obstacle| obstacle.location.is_adjacent(&door.location));

        let Some(obstacle) = blocking else {
            self.settle_remove_objectives(ctx.tick);
            self.state.negotiation = None;
            self.state.helping_remove = false;
            self.state.joint_wait_since = None;
            return Step::Goto(Phase::EnterRoom);
        };

        let topic = Topic::Obstacle {
            kind: obstacle.kind,
            room: door.room.clone(),
        };
        let current = self.state.negotiation.as_ref().map(Negotiation::topic);
        if current != Some(&topic) {
            self.state.negotiation = Some(self.open_obstacle_negotiation(topic.clone()));
            self.state.joint_wait_since = None;
        }

        let timeout = self
            .beliefs
            .timeout(topic.timeout_offset(), Some(self.state.distance));
        let poll = match self.state.negotiation.as_mut() {
            Some(negotiation) => negotiation.poll(ctx.tick, timeout),
            None => return Step::Goto(Phase::FindNextGoal),
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
            Poll::Resolved(resolution) => {
                self.resolve_obstacle(ctx, &obstacle, &door, resolution, timeout)
            }
        }
    }

    fn open_obstacle_negotiation(&self, topic: Topic) -> Negotiation {
        let kind = match &topic {
            Topic::Obstacle { kind, .. } => *kind,
            Topic::Victim { .. } => return Negotiation::open(topic),
        };
        let mut negotiation = Negotiation::open(topic);
        if self.state.helping_remove {
            // The teammate asked for help here, so the joint answer is given.
            let token = match kind {
                ObstacleKind::Stones => ReplyToken::RemoveTogether,
                ObstacleKind::Rock | ObstacleKind::Tree => ReplyToken::Remove,
            };
            negotiation.resolve(Resolution::Reply(token));
        } else if kind != ObstacleKind::Rock && !self.beliefs.should_ask() {
            negotiation.resolve(Resolution::Autonomous);
        }
        negotiation
    }

    fn resolve_obstacle(
        &mut self,
        ctx: &mut TickContext<'_>,
        obstacle: &Obstacle,
        door: &Door,
        resolution: Resolution,
        timeout: f64,
    ) -> Step {
        let room = door.room.as_str();
        if resolution == Resolution::TimedOut {
            self.penalize_timeout("no answer about a blocked entrance");
        }
        match (obstacle.kind, resolution) {
            (_, Resolution::Reply(ReplyToken::Continue)) => self.skip_blocked_room(room, ctx.tick),
            (ObstacleKind::Rock, Resolution::Reply(ReplyToken::Remove))
            | (ObstacleKind::Stones, Resolution::Reply(ReplyToken::RemoveTogether)) => {
                self.await_joint_removal(ctx, obstacle, room, timeout)
            }
            (ObstacleKind::Rock, _) => self.skip_blocked_room(room, ctx.tick),
            (ObstacleKind::Tree, _) => {
                if self.state.helping_remove {
                    self.say(format!("Removing tree blocking {room} because you asked me to."));
                } else {
                    self.say(format!("Removing tree blocking {room}."));
                }
                self.remove_now(obstacle, ctx.tick)
            }
            (ObstacleKind::Stones, _) => {
                self.say(format!("Removing stones blocking {room}."));
                self.remove_now(obstacle, ctx.tick)
            }
        }
    }

    /// Idle at the entrance until the teammate shows up to clear it with us.
    fn await_joint_removal(
        &mut self,
        ctx: &mut TickContext<'_>,
        obstacle: &Obstacle,
        room: &str,
        timeout: f64,
    ) -> Step {
        let kind = obstacle.kind.as_str();
        // The timeout only counts ticks with the teammate out of view; while
        // they stand at the entrance the wait has no upper bound.
        if ctx.world.teammate_in_view() {
            self.state.joint_wait_since = None;
            self.say(format!("Lets remove {kind} blocking {room}!"));
            return Step::Stay(None);
        }

        let since = *self.state.joint_wait_since.get_or_insert(ctx.tick);
        if ctx.tick.saturating_sub(since) as f64 > timeout {
            self.penalize_timeout("did not come to remove an obstacle together");
            if obstacle.kind == ObstacleKind::Stones {
                self.say(format!(
                    "Removing stones blocking {room} because you took too long to come."
                ));
                return self.remove_now(obstacle, ctx.tick);
            }
            return self.skip_blocked_room(room, ctx.tick);
        }

        match obstacle.kind {
            ObstacleKind::Stones => {
                self.say(format!("Please come to {room} to remove stones together."))
            }
            _ => self.say(format!("Please come to {room} to remove {kind}.")),
        }
        Step::Stay(None)
    }

    fn skip_blocked_room(&mut self, room: &str, tick: u64) -> Step {
        info!(room, "leaving blocked area for later");
        self.state.ledger.skip_room(room);
        self.clear_obstacle_state(tick);
        Step::Goto(Phase::FindNextGoal)
    }

    fn remove_now(&mut self, obstacle: &Obstacle, tick: u64) -> Step {
        self.clear_obstacle_state(tick);
        Step::Yield {
            next: Phase::EnterRoom,
            action: Some(AgentAction::RemoveObject {
                object_id: obstacle.object_id.clone(),
            }),
        }
    }

    /// Joint removals that never happened are closed without judging them;
    /// the missed wait was already penalized.
    fn clear_obstacle_state(&mut self, tick: u64) {
        let abandoned = self.state.ledger.close_open(ObjectiveKind::Remove, tick);
        if !abandoned.is_empty() {
            debug!(count = abandoned.len(), "joint removal abandoned");
        }
        self.state.negotiation = None;
        self.state.helping_remove = false;
        self.state.joint_wait_since = None;
    }

    /// The entrance is clear: judge how long the agreed joint removal took.
    fn settle_remove_objectives(&mut self, tick: u64) {
        let threshold = self
            .beliefs
            .threshold(JointTask::Remove, Some(self.state.distance));
        for objective in self.state.ledger.close_open(ObjectiveKind::Remove, tick) {
            if objective.elapsed().unwrap_or_default() < threshold {
                self.nudge(BeliefField::Competence, 0.05, "joint removal within threshold");
            } else {
                self.nudge(BeliefField::Competence, -0.075, "joint removal beyond threshold");
            }
        }
    }
}
