//! Read-only seams onto the host simulation: the per-tick world snapshot and
//! the routing service. Both are implemented outside the core.

use contracts::{Direction, Door, DropZone, Location, Obstacle, VictimSighting};

/// Point-in-time view of the world, re-fetched every tick.
pub trait WorldView {
    fn tick(&self) -> u64;

    fn score(&self) -> i64;

    fn agent_location(&self) -> Location;

    /// `None` while the teammate is outside the agent's sensing range.
    fn teammate_location(&self) -> Option<Location>;

    /// Victim the teammate is currently carrying, if any.
    fn teammate_carrying(&self) -> Option<String>;

    fn doors(&self) -> Vec<Door>;

    fn room_tiles(&self, room: &str) -> Vec<Location>;

    /// Victims within sensing range.
    fn visible_victims(&self) -> Vec<VictimSighting>;

    /// Obstacles within sensing range.
    fn visible_obstacles(&self) -> Vec<Obstacle>;

    /// Drop-zone slots, one per victim to deliver, in delivery order.
    fn drop_zones(&self) -> Vec<DropZone>;

    fn teammate_in_view(&self) -> bool {
        self.teammate_location().is_some()
    }

    fn door_of(&self, room: &str) -> Option<Door> {
        self.doors().into_iter().find(|door| door.room == room)
    }

    fn room_names(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.doors().into_iter().map(|door| door.room).collect();
        rooms.sort();
        rooms.dedup();
        rooms
    }
}

/// Opaque routing service: waypoints in, one move per tick out.
pub trait Router {
    fn reset(&mut self);

    fn add_waypoints(&mut self, waypoints: &[Location]);

    /// Next move toward the pending waypoints, or `None` once all are reached.
    fn next_move(&mut self, world: &dyn WorldView) -> Option<Direction>;
}
