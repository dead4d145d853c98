//! Memory of what has been discovered and decided: victims, searched rooms,
//! collected and deferred victims, and the objective log used to judge the
//! credibility and timing of teammate claims.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{Location, Objective, ObjectiveKind, Severity, VictimRecord};
use serde::Serialize;
use tracing::debug;

/// Result of folding a direct observation into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First time this victim is known at all.
    New,
    /// Previously reported by the teammate; now exactly located.
    Promoted,
    /// Already located.
    Known,
    /// Not an injured victim.
    Ignored,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledger {
    victims: BTreeMap<String, VictimRecord>,
    searched_rooms: BTreeSet<String>,
    skipped_rooms: BTreeSet<String>,
    collected: BTreeSet<String>,
    deferred: Vec<String>,
    objectives: BTreeMap<ObjectiveKind, Vec<Objective>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    // -- victims ------------------------------------------------------------

    /// Record a victim reported in `room` without an exact location. A
    /// teammate correcting the room of an unlocated victim moves the record;
    /// a located record is left alone. Returns false when the name carries no
    /// severity.
    pub fn record_victim(&mut self, id: &str, room: &str) -> bool {
        let Some(severity) = Severity::from_victim_name(id) else {
            return false;
        };
        match self.victims.get_mut(id) {
            Some(record) if record.is_located() => {}
            Some(record) => {
                if record.room != room {
                    debug!(victim = id, from = %record.room, to = room, "victim room corrected");
                    record.room = room.to_string();
                }
            }
            None => {
                self.victims.insert(
                    id.to_string(),
                    VictimRecord {
                        id: id.to_string(),
                        severity,
                        room: room.to_string(),
                        exact_location: None,
                        object_handle: None,
                    },
                );
            }
        }
        true
    }

    /// Fold in a direct sighting. Location and handle only ever go from absent
    /// to present; severity never changes.
    pub fn observe_victim(
        &mut self,
        id: &str,
        room: &str,
        location: Location,
        handle: &str,
    ) -> Observation {
        let Some(severity) = Severity::from_victim_name(id) else {
            return Observation::Ignored;
        };
        match self.victims.get_mut(id) {
            Some(record) if record.is_located() => Observation::Known,
            Some(record) => {
                record.room = room.to_string();
                record.exact_location = Some(location);
                record.object_handle = Some(handle.to_string());
                Observation::Promoted
            }
            None => {
                self.victims.insert(
                    id.to_string(),
                    VictimRecord {
                        id: id.to_string(),
                        severity,
                        room: room.to_string(),
                        exact_location: Some(location),
                        object_handle: Some(handle.to_string()),
                    },
                );
                Observation::New
            }
        }
    }

    pub fn purge_victim(&mut self, id: &str) -> Option<VictimRecord> {
        self.victims.remove(id)
    }

    pub fn victim(&self, id: &str) -> Option<&VictimRecord> {
        self.victims.get(id)
    }

    pub fn is_discovered(&self, id: &str) -> bool {
        self.victims.contains_key(id)
    }

    pub fn victims(&self) -> impl Iterator<Item = &VictimRecord> {
        self.victims.values()
    }

    /// Victims known to exist: currently discovered plus already collected.
    pub fn found_count(&self) -> usize {
        self.victims
            .keys()
            .filter(|id| !self.collected.contains(*id))
            .count()
            + self.collected.len()
    }

    // -- rooms --------------------------------------------------------------

    pub fn mark_searched(&mut self, room: &str) -> bool {
        self.searched_rooms.insert(room.to_string())
    }

    pub fn is_searched(&self, room: &str) -> bool {
        self.searched_rooms.contains(room)
    }

    pub fn searched_rooms(&self) -> &BTreeSet<String> {
        &self.searched_rooms
    }

    /// Remember a room to come back to later (blocked entrance).
    pub fn skip_room(&mut self, room: &str) {
        self.skipped_rooms.insert(room.to_string());
    }

    pub fn is_skipped(&self, room: &str) -> bool {
        self.skipped_rooms.contains(room)
    }

    /// Global re-search: forget every searched and skipped room.
    pub fn reset_search(&mut self) {
        self.searched_rooms.clear();
        self.skipped_rooms.clear();
    }

    // -- collection and deferral ---------------------------------------------

    pub fn mark_collected(&mut self, id: &str) -> bool {
        self.collected.insert(id.to_string())
    }

    pub fn is_collected(&self, id: &str) -> bool {
        self.collected.contains(id)
    }

    /// Withdraw a delivery claim that the agent has seen to be false.
    pub fn retract_collected(&mut self, id: &str) -> bool {
        self.collected.remove(id)
    }

    pub fn collected(&self) -> &BTreeSet<String> {
        &self.collected
    }

    pub fn defer(&mut self, id: &str) {
        if !self.deferred.iter().any(|known| known == id) {
            self.deferred.push(id.to_string());
        }
    }

    pub fn is_deferred(&self, id: &str) -> bool {
        self.deferred.iter().any(|known| known == id)
    }

    // -- objectives -----------------------------------------------------------

    pub fn open_objective(
        &mut self,
        kind: ObjectiveKind,
        tick: u64,
        area: Option<&str>,
        person: Option<&str>,
    ) {
        self.objectives.entry(kind).or_default().push(Objective {
            kind,
            start_tick: tick,
            area: area.map(str::to_string),
            person: person.map(str::to_string),
            end_tick: None,
        });
    }

    pub fn has_objective(&self, kind: ObjectiveKind, area: &str) -> bool {
        self.objectives
            .get(&kind)
            .is_some_and(|log| log.iter().any(|entry| entry.area.as_deref() == Some(area)))
    }

    /// Close every open objective of `kind` at `tick`. Each entry closes once;
    /// the closed entries are returned for timing checks.
    pub fn close_open(&mut self, kind: ObjectiveKind, tick: u64) -> Vec<Objective> {
        let Some(log) = self.objectives.get_mut(&kind) else {
            return Vec::new();
        };
        log.iter_mut()
            .filter(|entry| entry.is_open())
            .map(|entry| {
                entry.end_tick = Some(tick.max(entry.start_tick));
                entry.clone()
            })
            .collect()
    }

    /// Like [`Ledger::close_open`], restricted to objectives about `person`.
    pub fn close_open_for(
        &mut self,
        kind: ObjectiveKind,
        person: &str,
        tick: u64,
    ) -> Vec<Objective> {
        let Some(log) = self.objectives.get_mut(&kind) else {
            return Vec::new();
        };
        log.iter_mut()
            .filter(|entry| entry.is_open() && entry.person.as_deref() == Some(person))
            .map(|entry| {
                entry.end_tick = Some(tick.max(entry.start_tick));
                entry.clone()
            })
            .collect()
    }

    pub fn objectives(&self, kind: ObjectiveKind) -> &[Objective] {
        self.objectives.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}
