//! Scripted grid world for exercising the agent end to end. A scenario file
//! lays out rooms, victims, obstacles and drop zones, and scripts what the
//! teammate says and does at given ticks.

use std::collections::BTreeSet;
use std::path::Path;

use contracts::{
    AgentAction, AgentConfig, Direction, Door, DropZone, InboundMessage, Location, Obstacle,
    ObstacleKind, Severity, VictimSighting,
};
use rescue_core::{Router, WorldView};
use serde::{Deserialize, Serialize};
use tracing::debug;

const CRITICAL_POINTS: i64 = 6;
const MILD_POINTS: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scenario json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid scenario: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomSpec {
    pub name: String,
    /// Top-left tile.
    pub origin: Location,
    pub width: i64,
    pub height: i64,
    pub door: Location,
    pub doormat: Location,
}

impl RoomSpec {
    fn tiles(&self) -> Vec<Location> {
        (self.origin.x..self.origin.x + self.width)
            .flat_map(|x| {
                (self.origin.y..self.origin.y + self.height).map(move |y| Location::new(x, y))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictimSpec {
    pub name: String,
    pub location: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObstacleSpec {
    pub kind: ObstacleKind,
    pub location: Location,
}

/// Something the scripted teammate does at the start of a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TeammateAction {
    Say { content: String },
    MoveTo { location: Location },
    Leave,
    PickUp { victim: String },
    DropOff,
    RemoveObstacle { location: Location },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptedAction {
    pub tick: u64,
    #[serde(flatten)]
    pub action: TeammateAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    /// Field overrides applied on top of [`AgentConfig::default`].
    #[serde(default)]
    pub agent: Option<serde_json::Value>,
    pub start: Location,
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_sense_radius")]
    pub sense_radius: i64,
    pub rooms: Vec<RoomSpec>,
    #[serde(default)]
    pub victims: Vec<VictimSpec>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpec>,
    pub drop_zones: Vec<DropZone>,
    #[serde(default)]
    pub teammate: Vec<ScriptedAction>,
}

fn default_ticks() -> u64 {
    600
}

fn default_sense_radius() -> i64 {
    2
}

impl Scenario {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    fn validate(&self) -> Result<(), ScenarioError> {
        let mut names = BTreeSet::new();
        for room in &self.rooms {
            if room.width <= 0 || room.height <= 0 {
                return Err(ScenarioError::Invalid(format!("{} has no tiles", room.name)));
            }
            if !names.insert(room.name.as_str()) {
                return Err(ScenarioError::Invalid(format!("duplicate room {}", room.name)));
            }
        }
        for zone in &self.drop_zones {
            if Severity::from_victim_name(&zone.victim).is_none() {
                return Err(ScenarioError::Invalid(format!(
                    "drop zone victim {} has no severity",
                    zone.victim
                )));
            }
        }
        if self.sense_radius < 0 {
            return Err(ScenarioError::Invalid("sense_radius must not be negative".into()));
        }
        Ok(())
    }

    /// Default agent config with the scenario's `agent` overrides merged in.
    pub fn agent_config(&self) -> Result<AgentConfig, ScenarioError> {
        let mut merged = serde_json::to_value(AgentConfig::default())?;
        if let Some(overrides) = &self.agent {
            let serde_json::Value::Object(overrides) = overrides else {
                return Err(ScenarioError::Invalid("agent overrides must be an object".into()));
            };
            if let serde_json::Value::Object(base) = &mut merged {
                for (key, value) in overrides {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(serde_json::from_value(merged)?)
    }
}

// ---------------------------------------------------------------------------
// ScenarioWorld
// ---------------------------------------------------------------------------

/// Live state of a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioWorld {
    scenario: Scenario,
    teammate_name: String,
    tick: u64,
    score: i64,
    agent: Location,
    agent_carrying: Option<String>,
    teammate: Option<Location>,
    teammate_carrying: Option<String>,
    victims: Vec<VictimSighting>,
    obstacles: Vec<Obstacle>,
    delivered: Vec<String>,
    inbox: Vec<InboundMessage>,
}

impl ScenarioWorld {
    pub fn new(scenario: Scenario, teammate_name: impl Into<String>) -> Self {
        let victims = scenario
            .victims
            .iter()
            .enumerate()
            .map(|(index, victim)| VictimSighting {
                name: victim.name.clone(),
                object_id: format!("victim_{index}"),
                location: victim.location,
            })
            .collect();
        let obstacles = scenario
            .obstacles
            .iter()
            .enumerate()
            .map(|(index, obstacle)| Obstacle {
                object_id: format!("{}_{index}", obstacle.kind.as_str()),
                kind: obstacle.kind,
                location: obstacle.location,
            })
            .collect();
        let mut world = Self {
            agent: scenario.start,
            scenario,
            teammate_name: teammate_name.into(),
            tick: 0,
            score: 0,
            agent_carrying: None,
            teammate: None,
            teammate_carrying: None,
            victims,
            obstacles,
            delivered: Vec::new(),
            inbox: Vec::new(),
        };
        world.play_teammate();
        world
    }

    /// Messages the teammate sent at the start of the current tick.
    pub fn inbox(&self) -> &[InboundMessage] {
        &self.inbox
    }

    pub fn delivered(&self) -> &[String] {
        &self.delivered
    }

    /// Every drop zone has received its victim.
    pub fn is_complete(&self) -> bool {
        self.scenario
            .drop_zones
            .iter()
            .all(|zone| self.delivered.contains(&zone.victim))
    }

    /// Carry out the agent's action, then advance to the next tick and play the
    /// teammate's script for it.
    pub fn apply(&mut self, action: Option<&AgentAction>) {
        match action {
            Some(AgentAction::Move { direction }) => self.agent = self.agent.step(*direction),
            Some(AgentAction::RemoveObject { object_id }) => {
                let here = self.agent;
                self.obstacles.retain(|obstacle| {
                    !(obstacle.object_id == *object_id && obstacle.location.is_adjacent(&here))
                });
            }
            Some(AgentAction::CarryObject { object_id, .. }) => {
                if let Some(index) = self
                    .victims
                    .iter()
                    .position(|victim| victim.object_id == *object_id)
                {
                    let victim = self.victims.remove(index);
                    self.agent_carrying = Some(victim.name);
                }
            }
            Some(AgentAction::Drop { .. }) => {
                if let Some(victim) = self.agent_carrying.take() {
                    self.deliver(victim);
                }
            }
            Some(AgentAction::Idle { .. }) | None => {}
        }
        self.tick += 1;
        self.play_teammate();
    }

    fn deliver(&mut self, victim: String) {
        self.score += match Severity::from_victim_name(&victim) {
            Some(Severity::Critical) => CRITICAL_POINTS,
            Some(Severity::Mild) => MILD_POINTS,
            None => 0,
        };
        debug!(tick = self.tick, victim = %victim, score = self.score, "victim delivered");
        self.delivered.push(victim);
    }

    fn play_teammate(&mut self) {
        self.inbox.clear();
        let due: Vec<TeammateAction> = self
            .scenario
            .teammate
            .iter()
            .filter(|scripted| scripted.tick == self.tick)
            .map(|scripted| scripted.action.clone())
            .collect();
        for action in due {
            match action {
                TeammateAction::Say { content } => {
                    self.inbox
                        .push(InboundMessage::new(self.teammate_name.clone(), content));
                }
                TeammateAction::MoveTo { location } => self.teammate = Some(location),
                TeammateAction::Leave => self.teammate = None,
                TeammateAction::PickUp { victim } => {
                    self.victims.retain(|sighting| sighting.name != victim);
                    self.teammate_carrying = Some(victim);
                }
                TeammateAction::DropOff => {
                    if let Some(victim) = self.teammate_carrying.take() {
                        self.deliver(victim);
                    }
                }
                TeammateAction::RemoveObstacle { location } => {
                    self.obstacles.retain(|obstacle| obstacle.location != location);
                }
            }
        }
    }

    fn in_range(&self, at: &Location) -> bool {
        let radius = self.scenario.sense_radius;
        (self.agent.x - at.x).abs() <= radius && (self.agent.y - at.y).abs() <= radius
    }
}

impl WorldView for ScenarioWorld {
    fn tick(&self) -> u64 {
        self.tick
    }

    fn score(&self) -> i64 {
        self.score
    }

    fn agent_location(&self) -> Location {
        self.agent
    }

    fn teammate_location(&self) -> Option<Location> {
        self.teammate.filter(|location| self.in_range(location))
    }

    fn teammate_carrying(&self) -> Option<String> {
        self.teammate_carrying.clone()
    }

    fn doors(&self) -> Vec<Door> {
        self.scenario
            .rooms
            .iter()
            .map(|room| Door {
                room: room.name.clone(),
                location: room.door,
                doormat: room.doormat,
            })
            .collect()
    }

    fn room_tiles(&self, room: &str) -> Vec<Location> {
        self.scenario
            .rooms
            .iter()
            .find(|spec| spec.name == room)
            .map(RoomSpec::tiles)
            .unwrap_or_default()
    }

    fn visible_victims(&self) -> Vec<VictimSighting> {
        self.victims
            .iter()
            .filter(|victim| self.in_range(&victim.location))
            .cloned()
            .collect()
    }

    fn visible_obstacles(&self) -> Vec<Obstacle> {
        self.obstacles
            .iter()
            .filter(|obstacle| self.in_range(&obstacle.location))
            .cloned()
            .collect()
    }

    fn drop_zones(&self) -> Vec<DropZone> {
        let mut zones = self.scenario.drop_zones.clone();
        zones.sort_by_key(|zone| zone.location.y);
        zones
    }
}

// ---------------------------------------------------------------------------
// StraightRouter
// ---------------------------------------------------------------------------

/// Axis-aligned walk toward each waypoint in turn, horizontal leg first.
/// Walls are not modelled.
#[derive(Debug, Clone, Default)]
pub struct StraightRouter {
    waypoints: Vec<Location>,
    next: usize,
}

impl Router for StraightRouter {
    fn reset(&mut self) {
        self.waypoints.clear();
        self.next = 0;
    }

    fn add_waypoints(&mut self, waypoints: &[Location]) {
        self.waypoints.extend_from_slice(waypoints);
    }

    fn next_move(&mut self, world: &dyn WorldView) -> Option<Direction> {
        let here = world.agent_location();
        while self.waypoints.get(self.next) == Some(&here) {
            self.next += 1;
        }
        let target = self.waypoints.get(self.next)?;
        let direction = if target.x > here.x {
            Direction::East
        } else if target.x < here.x {
            Direction::West
        } else if target.y > here.y {
            Direction::South
        } else {
            Direction::North
        };
        Some(direction)
    }
}
