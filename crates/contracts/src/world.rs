//! Point-in-time world records handed to the agent by the host simulation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub x: i64,
    pub y: i64,
}

impl Location {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Location) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Chebyshev adjacency, including the tile itself.
    pub fn is_adjacent(&self, other: &Location) -> bool {
        (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    pub fn step(&self, direction: Direction) -> Location {
        match direction {
            Direction::North => Location::new(self.x, self.y - 1),
            Direction::East => Location::new(self.x + 1, self.y),
            Direction::South => Location::new(self.x, self.y + 1),
            Direction::West => Location::new(self.x - 1, self.y),
        }
    }
}

impl From<(i64, i64)> for Location {
    fn from((x, y): (i64, i64)) -> Self {
        Self::new(x, y)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    North,
    East,
    South,
    West,
}

/// Entrance of a room. `doormat` is the tile just outside the door.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Door {
    pub room: String,
    pub location: Location,
    pub doormat: Location,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictimSighting {
    pub name: String,
    pub object_id: String,
    pub location: Location,
}

impl VictimSighting {
    pub fn is_healthy(&self) -> bool {
        self.name.contains("healthy")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    Rock,
    Tree,
    Stones,
}

impl ObstacleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rock => "rock",
            Self::Tree => "tree",
            Self::Stones => "stones",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Obstacle {
    pub object_id: String,
    pub kind: ObstacleKind,
    pub location: Location,
}

/// Drop-zone slot reserved for one victim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DropZone {
    pub victim: String,
    pub location: Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacency_includes_diagonals_and_self() {
        let origin = Location::new(4, 4);
        assert!(origin.is_adjacent(&Location::new(5, 5)));
        assert!(origin.is_adjacent(&origin));
        assert!(!origin.is_adjacent(&Location::new(6, 4)));
    }

    #[test]
    fn step_moves_one_tile() {
        let origin = Location::new(2, 2);
        assert_eq!(origin.step(Direction::North), Location::new(2, 1));
        assert_eq!(origin.step(Direction::West), Location::new(1, 2));
    }
}
