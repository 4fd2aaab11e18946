//! Per-client authoritative game state.
//!
//! One `GameState` exists per client session. Only handlers running
//! against that client's own subscriptions mutate it; other processes see
//! it exclusively through snapshots carried in messages.

use crate::data::{Location, Player, PlayingState, Unit};

/// A single player's live state: their army plus the pause flag.
///
/// Every method is total over its typed inputs; none can fail.
#[derive(Debug)]
pub struct GameState {
    player: Player,
    paused: bool,
    next_unit_id: u32,
}

impl GameState {
    /// Fresh session state: empty army, unpaused.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            player: Player::new(username),
            paused: false,
            next_unit_id: 1,
        }
    }

    pub fn username(&self) -> &str {
        &self.player.username
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_game(&mut self) {
        self.paused = true;
    }

    pub fn resume_game(&mut self) {
        self.paused = false;
    }

    /// Flip the pause flag to match a broadcast control signal and narrate
    /// the transition. No other gating happens here.
    pub fn apply_playing_state(&mut self, ps: PlayingState) {
        println!();
        if ps.is_paused {
            println!("==== Pause Detected ====");
            self.pause_game();
        } else {
            println!("==== Resume Detected ====");
            self.resume_game();
        }
        println!("------------------------");
    }

    /// Next unused unit id. Monotonic, so ids freed by war casualties are
    /// never handed out again.
    pub fn next_unit_id(&mut self) -> u32 {
        let id = self.next_unit_id;
        self.next_unit_id += 1;
        id
    }

    /// Insert or replace a unit, keyed by its id.
    pub fn add_unit(&mut self, unit: Unit) {
        self.player.units.insert(unit.id, unit);
    }

    /// Insert or replace a unit, keyed by its id.
    pub fn update_unit(&mut self, unit: Unit) {
        self.player.units.insert(unit.id, unit);
    }

    pub fn get_unit(&self, id: u32) -> Option<&Unit> {
        self.player.units.get(&id)
    }

    /// Delete every unit stationed at `location`. War casualties.
    pub fn remove_units_in_location(&mut self, location: Location) {
        self.player.units.retain(|_, unit| unit.location != location);
    }

    /// All live units, in id order.
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.player.units.values()
    }

    /// Deep, independent copy of the player for transmission. The returned
    /// value shares no storage with live state, so messages built from it
    /// cannot be retroactively altered by later local mutation.
    pub fn player_snapshot(&self) -> Player {
        self.player.clone()
    }
}
