#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};

use contracts::{
    AgentAction, AgentConfig, Direction, Door, DropZone, InboundMessage, Location, Obstacle,
    ObstacleKind, TickOutput, TrustBelief, VictimSighting,
};
use rescue_core::{MemoryBeliefStore, RescueAgent, Router, WorldView};

pub const TEAMMATE: &str = "human";

/// Hand-built grid world: rooms are 3x3 blocks with a door on their south
/// side, the agent sees everything within `sense_radius` tiles.
#[derive(Debug, Clone)]
pub struct FakeWorld {
    pub tick: u64,
    pub score: i64,
    pub agent: Location,
    pub teammate: Option<Location>,
    pub teammate_carrying: Option<String>,
    pub doors: Vec<Door>,
    pub rooms: BTreeMap<String, Vec<Location>>,
    pub victims: Vec<VictimSighting>,
    pub obstacles: Vec<Obstacle>,
    pub drop_zones: Vec<DropZone>,
    pub sense_radius: i64,
}

impl FakeWorld {
    pub fn new(agent: Location) -> Self {
        Self {
            tick: 0,
            score: 0,
            agent,
            teammate: None,
            teammate_carrying: None,
            doors: Vec::new(),
            rooms: BTreeMap::new(),
            victims: Vec::new(),
            obstacles: Vec::new(),
            drop_zones: Vec::new(),
            sense_radius: 2,
        }
    }

    /// Adds `area n` with its top-left tile at (`x`, `y`).
    pub fn with_room(mut self, index: u32, x: i64, y: i64) -> Self {
        let room = format!("area {index}");
        let tiles = (x..x + 3)
            .flat_map(|tx| (y..y + 3).map(move |ty| Location::new(tx, ty)))
            .collect();
        self.rooms.insert(room.clone(), tiles);
        self.doors.push(Door {
            room,
            location: Location::new(x + 1, y + 3),
            doormat: Location::new(x + 1, y + 4),
        });
        self
    }

    pub fn with_victim(mut self, name: &str, at: Location) -> Self {
        self.victims.push(VictimSighting {
            name: name.to_string(),
            object_id: format!("{name}_obj"),
            location: at,
        });
        self
    }

    pub fn with_drop_zone(mut self, victim: &str, at: Location) -> Self {
        self.drop_zones.push(DropZone {
            victim: victim.to_string(),
            location: at,
        });
        self
    }

    /// Places an obstacle in the doorway of `area n`.
    pub fn block_door(mut self, index: u32, kind: ObstacleKind) -> Self {
        let room = format!("area {index}");
        let door = self
            .doors
            .iter()
            .find(|door| door.room == room)
            .cloned()
            .expect("room exists");
        self.obstacles.push(Obstacle {
            object_id: format!("{}_{index}", kind.as_str()),
            kind,
            location: door.location,
        });
        self
    }

    fn in_range(&self, at: &Location) -> bool {
        (self.agent.x - at.x).abs() <= self.sense_radius
            && (self.agent.y - at.y).abs() <= self.sense_radius
    }

    /// Carry out the agent's action and advance the clock.
    pub fn apply(&mut self, action: Option<&AgentAction>) {
        match action {
            Some(AgentAction::Move { direction }) => self.agent = self.agent.step(*direction),
            Some(AgentAction::RemoveObject { object_id }) => {
                self.obstacles.retain(|obstacle| &obstacle.object_id != object_id);
            }
            Some(AgentAction::CarryObject { object_id, .. }) => {
                self.victims.retain(|victim| &victim.object_id != object_id);
            }
            Some(AgentAction::Drop { .. }) => self.score += 3,
            Some(AgentAction::Idle { .. }) | None => {}
        }
        self.tick += 1;
    }
}

impl WorldView for FakeWorld {
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
        self.teammate
    }

    fn teammate_carrying(&self) -> Option<String> {
        self.teammate_carrying.clone()
    }

    fn doors(&self) -> Vec<Door> {
        self.doors.clone()
    }

    fn room_tiles(&self, room: &str) -> Vec<Location> {
        self.rooms.get(room).cloned().unwrap_or_default()
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
        self.drop_zones.clone()
    }
}

/// Walks straight toward each waypoint, x first, ignoring walls.
#[derive(Debug, Default)]
pub struct StepRouter {
    waypoints: VecDeque<Location>,
}

impl Router for StepRouter {
    fn reset(&mut self) {
        self.waypoints.clear();
    }

    fn add_waypoints(&mut self, waypoints: &[Location]) {
        self.waypoints.extend(waypoints.iter().copied());
    }

    fn next_move(&mut self, world: &dyn WorldView) -> Option<Direction> {
        let here = world.agent_location();
        while self.waypoints.front() == Some(&here) {
            self.waypoints.pop_front();
        }
        let target = self.waypoints.front()?;
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

pub fn agent_with(config: AgentConfig, belief: TrustBelief) -> RescueAgent {
    let store = MemoryBeliefStore::with_belief(&config.teammate_name, belief);
    RescueAgent::new(config, Box::new(store))
}

pub fn neutral_agent() -> RescueAgent {
    agent_with(AgentConfig::default(), TrustBelief::default())
}

pub fn say(content: &str) -> InboundMessage {
    InboundMessage::new(TEAMMATE, content)
}

/// One host tick: decide, then let the world carry out the action.
pub fn tick(
    agent: &mut RescueAgent,
    world: &mut FakeWorld,
    router: &mut StepRouter,
    inbox: &[InboundMessage],
) -> TickOutput {
    let output = agent.decide(&*world, router, inbox);
    world.apply(output.action.as_ref());
    output
}

pub fn said(output: &TickOutput, needle: &str) -> bool {
    output.status_messages().any(|content| content.contains(needle))
}
