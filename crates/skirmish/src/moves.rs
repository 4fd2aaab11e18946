//! Move classification: what an incoming army move means for this client.

use crate::data::{ArmyMove, Location, Player};
use crate::state::GameState;

/// Classification of an incoming move against local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No conflict with local units.
    Safe,
    /// The move was authored by this client's own player.
    SamePlayer,
    /// Moved units landed where the local player holds units; war must be
    /// declared with the mover as attacker and this player as defender.
    MakeWar,
}

/// First location where both players hold at least one unit.
pub fn overlapping_location(a: &Player, b: &Player) -> Option<Location> {
    a.units
        .values()
        .find(|unit| !b.units_at(unit.location).is_empty())
        .map(|unit| unit.location)
}

/// Classify `mv` against the local player's state.
pub fn resolve_move(gs: &GameState, mv: &ArmyMove) -> MoveOutcome {
    println!();
    println!("==== Move Detected ====");
    println!(
        "{} is moving {} unit(s) to {}",
        mv.player.username,
        mv.units.len(),
        mv.to_location,
    );

    if mv.player.username == gs.username() {
        println!("You moved your units.");
        println!("------------------------");
        return MoveOutcome::SamePlayer;
    }

    let contested = mv
        .units
        .iter()
        .any(|moved| gs.units().any(|mine| mine.location == moved.location));
    if contested {
        println!(
            "{} has moved into your territory. You must fight!",
            mv.player.username,
        );
        println!("------------------------");
        return MoveOutcome::MakeWar;
    }

    println!("You are safe from this move.");
    println!("------------------------");
    MoveOutcome::Safe
}
