//! Client terminal commands.
//!
//! Validation is purely local: a bad argument produces a
//! [`ValidationError`], nothing is published, and the input loop
//! continues.

use crate::data::{ArmyMove, Location, Rank, Unit};
use crate::error::ValidationError;
use crate::state::GameState;

/// `spawn <location> <rank>` — create a unit. Returns the new unit's id.
pub fn command_spawn(gs: &mut GameState, args: &[&str]) -> Result<u32, ValidationError> {
    let [location, rank] = args else {
        return Err(ValidationError::Usage("spawn <location> <rank>"));
    };
    let location: Location = location
        .parse()
        .map_err(|_| ValidationError::InvalidLocation((*location).to_owned()))?;
    let rank: Rank = rank
        .parse()
        .map_err(|_| ValidationError::InvalidRank((*rank).to_owned()))?;

    let id = gs.next_unit_id();
    gs.add_unit(Unit { id, rank, location });
    println!("Spawned a(n) {rank} in {location} with id {id}");
    Ok(id)
}

/// `move <location> <id...>` — relocate units and build the move event to
/// publish. The returned [`ArmyMove`] carries a post-move snapshot of the
/// player.
pub fn command_move(gs: &mut GameState, args: &[&str]) -> Result<ArmyMove, ValidationError> {
    let [location, ids @ ..] = args else {
        return Err(ValidationError::Usage("move <location> <id...>"));
    };
    if ids.is_empty() {
        return Err(ValidationError::Usage("move <location> <id...>"));
    }
    let to_location: Location = location
        .parse()
        .map_err(|_| ValidationError::InvalidLocation((*location).to_owned()))?;

    // Validate every id before touching state.
    let mut unit_ids = Vec::with_capacity(ids.len());
    for raw in ids {
        let id: u32 = raw
            .parse()
            .map_err(|_| ValidationError::InvalidUnitId((*raw).to_owned()))?;
        if gs.get_unit(id).is_none() {
            return Err(ValidationError::NoSuchUnit(id));
        }
        unit_ids.push(id);
    }

    let mut moved = Vec::with_capacity(unit_ids.len());
    for id in unit_ids {
        // Presence checked above.
        if let Some(unit) = gs.get_unit(id) {
            let mut unit = unit.clone();
            unit.location = to_location;
            gs.update_unit(unit.clone());
            moved.push(unit);
        }
    }
    println!("Moved {} unit(s) to {to_location}", moved.len());

    Ok(ArmyMove {
        player: gs.player_snapshot(),
        to_location,
        units: moved,
    })
}

/// `status` — narrate the player's current army and pause flag.
pub fn command_status(gs: &GameState) {
    if gs.is_paused() {
        println!("The game is paused.");
    } else {
        println!("The game is not paused.");
    }
    println!("You are {}", gs.username());
    let count = gs.units().count();
    println!("You have {count} unit(s):");
    for unit in gs.units() {
        println!("  * id {}: {} in {}", unit.id, unit.rank, unit.location);
    }
}

const SPAM_MESSAGES: [&str; 5] = [
    "my army is unbeatable",
    "free units at americas, no catch",
    "this war was rigged",
    "artillery is overpowered, nerf it",
    "lost my cavalry behind the couch",
];

/// One junk log line for the `spam` command.
pub fn malicious_log() -> String {
    let idx = fastrand::usize(..SPAM_MESSAGES.len());
    SPAM_MESSAGES[idx].to_owned()
}
