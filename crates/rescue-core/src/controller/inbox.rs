//! Per-tick bookkeeping that runs before the phase controller: decoding the
//! teammate's messages into ledger and belief updates, distance estimation,
//! joint-carry detection and the global consistency check.

use contracts::{
    BeliefField, Distance, InboundMessage, ObjectiveKind, ObstacleKind, Phase, RescueMode,
    Severity,
};
use tracing::{debug, info};

use super::*;
use crate::belief::JointTask;
use crate::message::{area_index, ReplyToken, TeammateMessage};
use crate::negotiation::Topic;
use crate::rng::SplitMix64;

const HELP_COMPETENCE_FLOOR: f64 = 0.2;
const HELP_DRAW_FLOOR: f64 = 0.6;

impl RescueAgent {
    pub(crate) fn ingest(&mut self, world: &dyn WorldView, tick: u64, inbox: &[InboundMessage]) {
        let teammate = self.config.teammate_name.clone();
        for message in inbox.iter().filter(|message| message.from_id == teammate) {
            let decoded = TeammateMessage::decode(&message.content);
            debug!(tick, content = %message.content, ?decoded, "teammate message");
            match decoded {
                TeammateMessage::SearchReported { area } => {
                    self.state.ledger.mark_searched(&area);
                    self.state
                        .ledger
                        .open_objective(ObjectiveKind::Search, tick, Some(area.as_str()), None);
                    self.nudge(BeliefField::Willingness, 0.05, "announced an area search");
                }
                TeammateMessage::VictimFound { victim, area } => {
                    self.victim_reported(tick, &victim, &area);
                }
                TeammateMessage::VictimCollected { victim, area } => {
                    self.collection_reported(tick, &victim, &area);
                }
                TeammateMessage::ObstacleHelpRequested { area } => {
                    self.nudge(BeliefField::Willingness, 0.02, "asked for help with an obstacle");
                    self.answer_help_request(world, tick, &area);
                }
                TeammateMessage::Reply(token) => {
                    if token == ReplyToken::Continue {
                        self.nudge(BeliefField::Willingness, -0.04, "asked to postpone a task");
                    }
                    self.accept_reply(tick, token);
                }
                TeammateMessage::Unrecognized => {}
            }
            if let Some(area) = area_index(&message.content) {
                self.state.teammate_area = Some(area);
            }
        }
    }

    fn victim_reported(&mut self, tick: u64, victim: &str, area: &str) {
        let credible = self.state.ledger.has_objective(ObjectiveKind::Search, area);
        self.state.ledger.mark_searched(area);
        if !self.state.ledger.record_victim(victim, area) {
            debug!(victim, "reported victim has no severity, ignoring");
            return;
        }
        self.state
            .ledger
            .open_objective(ObjectiveKind::Found, tick, Some(area), Some(victim));
        if credible {
            self.nudge(BeliefField::Willingness, 0.02, "found a victim in an announced area");
        } else {
            self.nudge(BeliefField::Willingness, -0.08, "found a victim in an unannounced area");
        }
        // A teammate who is not weak is expected to carry mild victims alone.
        let mild = Severity::from_victim_name(victim) == Some(Severity::Mild);
        if mild && !self.config.condition.is_weak() {
            self.state.ledger.defer(victim);
        }
    }

    fn collection_reported(&mut self, tick: u64, victim: &str, area: &str) {
        if !self.state.ledger.has_objective(ObjectiveKind::Search, area) {
            self.nudge(BeliefField::Willingness, -0.05, "collected in an unannounced area");
        }
        if !self.state.ledger.has_objective(ObjectiveKind::Found, area) {
            self.nudge(BeliefField::Willingness, -0.05, "collected a victim never reported found");
        }
        self.state.ledger.mark_searched(area);
        if self.state.ledger.is_discovered(victim) {
            self.state.ledger.record_victim(victim, area);
        }
        if !self.config.condition.is_weak() {
            self.state.ledger.mark_collected(victim);
        }
        self.state
            .ledger
            .open_objective(ObjectiveKind::Collect, tick, Some(area), Some(victim));
    }

    fn answer_help_request(&mut self, world: &dyn WorldView, tick: u64, area: &str) {
        let trusted = self.beliefs.competence() > HELP_COMPETENCE_FLOOR
            || SplitMix64::for_tick(self.config.seed, tick).next_unit() > HELP_DRAW_FLOOR;

        if !self.state.carrying && trusted {
            let Some(door) = world.door_of(area) else {
                debug!(area, "help requested at an unknown area");
                return;
            };
            if let Some(negotiation) = self.state.negotiation.take() {
                if let Topic::Victim { victim, .. } = negotiation.topic() {
                    if negotiation.is_waiting() {
                        self.state.ledger.defer(victim);
                    }
                }
            }
            info!(tick, area, "coming over to help remove an obstacle");
            self.say(format!("Moving to {area} to help you remove an obstacle."));
            self.state.door = Some(door);
            self.state.goal_victim = None;
            self.state.rescue = None;
            self.state.joint_wait_since = None;
            self.state.helping_remove = true;
            self.state.moving = true;
            self.enter(Phase::PlanPathToRoom);
        } else if self.state.carrying {
            let goal = self.state.goal_victim.clone().unwrap_or_default();
            self.say(format!("Will come to {area} after dropping {goal}."));
        }
    }

    fn accept_reply(&mut self, tick: u64, token: ReplyToken) {
        let Some(negotiation) = self.state.negotiation.as_mut() else {
            debug!(token = token.as_str(), "reply without an open question");
            return;
        };
        if !negotiation.offer_reply(token) {
            debug!(token = token.as_str(), "reply does not answer the open question");
            return;
        }
        let topic = negotiation.topic().clone();
        info!(tick, token = token.as_str(), room = topic.room(), "negotiation answered");

        match (token, &topic) {
            (
                ReplyToken::Remove | ReplyToken::RemoveTogether,
                Topic::Obstacle { kind, room },
            ) if *kind != ObstacleKind::Tree => {
                self.state
                    .ledger
                    .open_objective(ObjectiveKind::Remove, tick, Some(room.as_str()), None);
            }
            (
                ReplyToken::Rescue | ReplyToken::RescueTogether,
                Topic::Victim {
                    victim,
                    severity,
                    room,
                },
            ) => {
                self.state.ledger.open_objective(
                    ObjectiveKind::Rescue,
                    tick,
                    Some(room.as_str()),
                    Some(victim.as_str()),
                );
                if token == ReplyToken::RescueTogether && *severity == Severity::Mild {
                    self.nudge(BeliefField::Willingness, 0.05, "chose to rescue together");
                    self.nudge(BeliefField::Competence, 0.05, "chose to rescue together");
                }
            }
            _ => {}
        }
    }

    pub(crate) fn refresh_distance(&mut self, world: &dyn WorldView) {
        let split = self.config.area_split;
        let distance = if world.teammate_in_view() {
            Distance::Close
        } else {
            match (self.state.agent_area, self.state.teammate_area) {
                (Some(agent), Some(teammate)) if (agent <= split) == (teammate <= split) => {
                    Distance::Close
                }
                (Some(_), Some(_)) => Distance::Far,
                _ => Distance::Medium,
            }
        };
        if distance != self.state.distance {
            debug!(
                from = self.state.distance.as_str(),
                to = distance.as_str(),
                "teammate distance changed"
            );
        }
        self.state.distance = distance;
    }

    /// Returns whether the teammate is carrying a victim jointly with the
    /// agent, in which case the agent stays idle this tick.
    pub(crate) fn observe_joint_carry(&mut self, world: &dyn WorldView, tick: u64) -> bool {
        let Some(victim) = world.teammate_carrying() else {
            self.state.carrying_together = false;
            return false;
        };
        let joint = match Severity::from_victim_name(&victim) {
            Some(Severity::Critical) => true,
            Some(Severity::Mild) => {
                self.state.rescue == Some(RescueMode::Together) && !self.state.moving
            }
            None => false,
        };
        if joint {
            self.state.ledger.mark_collected(&victim);
            self.state.carrying_together = true;
            self.settle_rescue_objectives(&victim, tick);
        }
        self.state.carrying_together
    }

    /// Judges only the rescues agreed for `victim`; abandoned ones were
    /// closed when the wait for them timed out.
    fn settle_rescue_objectives(&mut self, victim: &str, tick: u64) {
        let threshold = self.beliefs.threshold(JointTask::Rescue, None);
        for objective in self
            .state
            .ledger
            .close_open_for(ObjectiveKind::Rescue, victim, tick)
        {
            let elapsed = objective.elapsed().unwrap_or_default();
            let critical = objective
                .person
                .as_deref()
                .and_then(Severity::from_victim_name)
                == Some(Severity::Critical);
            if elapsed < threshold {
                self.nudge(BeliefField::Competence, 0.05, "joint rescue within threshold");
                let willingness = if critical { 0.025 } else { 0.05 };
                self.nudge(BeliefField::Willingness, willingness, "joint rescue within threshold");
            } else {
                let penalty = if critical { -0.1 } else { -0.05 };
                self.nudge(BeliefField::Competence, penalty, "joint rescue beyond threshold");
            }
        }
    }

    /// Every area searched while victims are still unaccounted for means some
    /// claim was false. Fires once each time the condition becomes true.
    pub(crate) fn check_global_consistency(&mut self, world: &dyn WorldView) {
        let rooms = world.room_names();
        let expected = world.drop_zones().len();
        let ledger = &self.state.ledger;
        let violated = !rooms.is_empty()
            && rooms.iter().all(|room| ledger.is_searched(room))
            && ledger.found_count() < expected;
        if violated && !self.state.all_searched_flagged {
            self.nudge(
                BeliefField::Willingness,
                -0.3,
                "every area searched but victims are missing",
            );
        }
        self.state.all_searched_flagged = violated;
    }
}
