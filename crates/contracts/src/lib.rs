//! v1 cross-boundary contracts for the rescue agent core, session API, and CLI.

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod ledger;
pub mod serde_u64_string;
pub mod trust;
pub mod world;

pub use ledger::{Objective, ObjectiveKind, RescueMode, Severity, VictimRecord};
pub use trust::{BeliefField, Distance, TrustBelief, TrustHistoryRecord, TrustMode};
pub use world::{Direction, Door, DropZone, Location, Obstacle, ObstacleKind, VictimSighting};

pub const SCHEMA_VERSION_V1: &str = "1.0";
pub const SCORE_MESSAGE_PREFIX: &str = "Our score is";

/// Physical condition of the human teammate, fixed per session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum HumanCondition {
    #[default]
    Normal,
    Weak,
    Strong,
}

impl HumanCondition {
    pub fn is_weak(self) -> bool {
        matches!(self, Self::Weak)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub schema_version: String,
    pub agent_name: String,
    pub teammate_name: String,
    #[serde(default)]
    pub condition: HumanCondition,
    #[serde(default)]
    pub trust_mode: TrustMode,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    /// Upper bound on phase re-entries within a single tick.
    pub max_phase_rounds: u16,
    /// Duration of the informational idle actions emitted between phases.
    pub idle_ticks: u64,
    /// Below this willingness a mild victim is rescued without the teammate.
    pub willingness_threshold: f64,
    /// Areas `1..=area_split` form one wing of the building, the rest the other.
    pub area_split: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            agent_name: "RescueBot".to_string(),
            teammate_name: "human".to_string(),
            condition: HumanCondition::Normal,
            trust_mode: TrustMode::Learned,
            seed: 1337,
            max_phase_rounds: 32,
            idle_ticks: 25,
            willingness_threshold: -0.1,
            area_split: 7,
        }
    }
}

/// Controller step labels. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Intro,
    FindNextGoal,
    PickUnsearchedRoom,
    PlanPathToRoom,
    FollowPathToRoom,
    RemoveObstacleIfNeeded,
    EnterRoom,
    PlanRoomSearchPath,
    FollowRoomSearchPath,
    PlanPathToVictim,
    FollowPathToVictim,
    TakeVictim,
    PlanPathToDropPoint,
    FollowPathToDropPoint,
    DropVictim,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Intro => "intro",
            Self::FindNextGoal => "find_next_goal",
            Self::PickUnsearchedRoom => "pick_unsearched_room",
            Self::PlanPathToRoom => "plan_path_to_room",
            Self::FollowPathToRoom => "follow_path_to_room",
            Self::RemoveObstacleIfNeeded => "remove_obstacle_if_needed",
            Self::EnterRoom => "enter_room",
            Self::PlanRoomSearchPath => "plan_room_search_path",
            Self::FollowRoomSearchPath => "follow_room_search_path",
            Self::PlanPathToVictim => "plan_path_to_victim",
            Self::FollowPathToVictim => "follow_path_to_victim",
            Self::TakeVictim => "take_victim",
            Self::PlanPathToDropPoint => "plan_path_to_drop_point",
            Self::FollowPathToDropPoint => "follow_path_to_drop_point",
            Self::DropVictim => "drop_victim",
        };
        f.write_str(label)
    }
}

/// The single command handed to the external executor for one tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentAction {
    Move {
        direction: Direction,
    },
    RemoveObject {
        object_id: String,
    },
    CarryObject {
        object_id: String,
        human_name: String,
    },
    Drop {
        human_name: String,
    },
    Idle {
        duration_ticks: u64,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundMessage {
    pub from_id: String,
    pub content: String,
}

impl InboundMessage {
    pub fn new(from_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from_id: from_id.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutboundMessage {
    pub from_id: String,
    pub content: String,
}

impl OutboundMessage {
    pub fn is_score(&self) -> bool {
        self.content.starts_with(SCORE_MESSAGE_PREFIX)
    }
}

/// Everything the agent produces for one invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickOutput {
    pub tick: u64,
    pub phase: Phase,
    pub action: Option<AgentAction>,
    pub messages: Vec<OutboundMessage>,
    pub belief: TrustBelief,
}

impl TickOutput {
    /// Status and question messages, excluding the score broadcast.
    pub fn status_messages(&self) -> impl Iterator<Item = &str> {
        self.messages
            .iter()
            .filter(|message| !message.is_score())
            .map(|message| message.content.as_str())
    }
}

impl fmt::Display for TickOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={} phase={} action={:?} competence={:.3} willingness={:.3}",
            self.tick,
            self.phase,
            self.action,
            self.belief.competence,
            self.belief.willingness
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_action_uses_tagged_representation() {
        let action = AgentAction::RemoveObject {
            object_id: "stone_12".to_string(),
        };
        let value = serde_json::to_value(&action).expect("serialize");
        assert_eq!(value["type"], "remove_object");
        assert_eq!(value["object_id"], "stone_12");
    }

    #[test]
    fn config_defaults_fill_optional_fields() {
        let parsed: AgentConfig = serde_json::from_str(
            r#"{
                "schema_version": "1.0",
                "agent_name": "RescueBot",
                "teammate_name": "alice",
                "seed": "42",
                "max_phase_rounds": 16,
                "idle_ticks": 25,
                "willingness_threshold": -0.1,
                "area_split": 7
            }"#,
        )
        .expect("config parses");
        assert_eq!(parsed.condition, HumanCondition::Normal);
        assert_eq!(parsed.trust_mode, TrustMode::Learned);
        assert_eq!(parsed.seed, 42);
    }

    #[test]
    fn score_messages_are_excluded_from_status_view() {
        let output = TickOutput {
            tick: 3,
            phase: Phase::FindNextGoal,
            action: None,
            messages: vec![
                OutboundMessage {
                    from_id: "RescueBot".to_string(),
                    content: "Our score is 0.".to_string(),
                },
                OutboundMessage {
                    from_id: "RescueBot".to_string(),
                    content: "Going to re-search all areas.".to_string(),
                },
            ],
            belief: TrustBelief::default(),
        };
        let status: Vec<&str> = output.status_messages().collect();
        assert_eq!(status, vec!["Going to re-search all areas."]);
    }
}
