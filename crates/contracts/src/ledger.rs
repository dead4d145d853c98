//! Victim and objective records kept in the agent's ledger.

use serde::{Deserialize, Serialize};

use crate::world::Location;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Mild,
}

impl Severity {
    /// Severity is encoded in the victim's display name ("critically injured man").
    pub fn from_victim_name(name: &str) -> Option<Self> {
        if name.contains("critical") {
            Some(Self::Critical)
        } else if name.contains("mild") {
            Some(Self::Mild)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictimRecord {
    pub id: String,
    pub severity: Severity,
    pub room: String,
    pub exact_location: Option<Location>,
    pub object_handle: Option<String>,
}

impl VictimRecord {
    pub fn is_located(&self) -> bool {
        self.exact_location.is_some()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    Search,
    Found,
    Collect,
    Remove,
    Rescue,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub start_tick: u64,
    pub area: Option<String>,
    pub person: Option<String>,
    pub end_tick: Option<u64>,
}

impl Objective {
    pub fn is_open(&self) -> bool {
        self.end_tick.is_none()
    }

    pub fn elapsed(&self) -> Option<u64> {
        self.end_tick.map(|end| end.saturating_sub(self.start_tick))
    }
}

/// How the goal victim is carried to the drop zone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RescueMode {
    Together,
    Alone,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_read_from_display_name() {
        assert_eq!(
            Severity::from_victim_name("critically injured elderly woman"),
            Some(Severity::Critical)
        );
        assert_eq!(
            Severity::from_victim_name("mildly injured cat"),
            Some(Severity::Mild)
        );
        assert_eq!(Severity::from_victim_name("healthy girl"), None);
    }
}
