//! War resolution.
//!
//! A `RecognitionOfWar` is broadcast by the defender and resolved by the
//! attacker's client. Resolution is a deterministic decision tree over the
//! snapshots carried in the message; the only state mutation is casualty
//! removal on the losing (or drawing) client's own army.

use crate::data::{power_level, RecognitionOfWar, Unit};
use crate::moves::overlapping_location;
use crate::state::GameState;

/// Exactly one variant is produced per resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarResolution {
    /// This client is not a combatant, or is the defender re-consuming its
    /// own broadcast.
    NotInvolved,
    /// The combatants share no location; the war dissolves with no
    /// casualties.
    NoUnits,
    YouWon { winner: String, loser: String },
    OpponentWon { winner: String, loser: String },
    Draw { attacker: String, defender: String },
}

fn narrate_units(username: &str, units: &[&Unit]) {
    println!("{username}'s units:");
    for unit in units {
        println!("  * {}", unit.rank);
    }
}

/// Resolve a war declaration against local state.
///
/// Casualties are applied only to the local army: the loser of an uneven
/// war removes its units at the overlap location, and a draw removes them
/// on both participants symmetrically (each client runs this same
/// function on its own copy).
pub fn resolve_war(gs: &mut GameState, row: &RecognitionOfWar) -> WarResolution {
    println!();
    println!("==== War Declared ====");
    println!(
        "{} has declared war on {}!",
        row.attacker.username, row.defender.username,
    );

    let local = gs.username().to_owned();

    if local == row.defender.username {
        println!("{local}, you published the war.");
        println!("------------------------");
        return WarResolution::NotInvolved;
    }
    if local != row.attacker.username {
        println!("{local}, you are not involved in this war.");
        println!("------------------------");
        return WarResolution::NotInvolved;
    }

    let Some(overlap) = overlapping_location(&row.attacker, &row.defender) else {
        println!("Error! No units are in the same location. No war will be fought.");
        println!("------------------------");
        return WarResolution::NoUnits;
    };

    let attacker_units = row.attacker.units_at(overlap);
    let defender_units = row.defender.units_at(overlap);
    narrate_units(&row.attacker.username, &attacker_units);
    narrate_units(&row.defender.username, &defender_units);

    let attacker_power = power_level(attacker_units.iter().copied());
    let defender_power = power_level(defender_units.iter().copied());
    println!("Attacker has a power level of {attacker_power}");
    println!("Defender has a power level of {defender_power}");

    if attacker_power != defender_power {
        let (winner, loser) = if attacker_power > defender_power {
            (&row.attacker.username, &row.defender.username)
        } else {
            (&row.defender.username, &row.attacker.username)
        };
        println!("{winner} has won the war!");

        if local == *loser {
            println!("You have lost the war!");
            gs.remove_units_in_location(overlap);
            println!("Your units in {overlap} have been killed.");
            println!("------------------------");
            return WarResolution::OpponentWon {
                winner: winner.clone(),
                loser: loser.clone(),
            };
        }
        println!("------------------------");
        return WarResolution::YouWon {
            winner: winner.clone(),
            loser: loser.clone(),
        };
    }

    println!("The war ended in a draw!");
    println!("Your units in {overlap} have been killed.");
    gs.remove_units_in_location(overlap);
    println!("------------------------");
    WarResolution::Draw {
        attacker: row.attacker.username.clone(),
        defender: row.defender.username.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Location, Player, Rank};

    fn army(username: &str, units: &[(u32, Rank, Location)]) -> Player {
        let mut player = Player::new(username);
        for &(id, rank, location) in units {
            player.units.insert(id, Unit { id, rank, location });
        }
        player
    }

    fn state_of(player: &Player) -> GameState {
        let mut gs = GameState::new(player.username.clone());
        for unit in player.units.values() {
            gs.add_unit(unit.clone());
        }
        gs
    }

    #[test]
    fn defender_reconsuming_own_broadcast_is_not_involved() {
        let attacker = army("ada", &[(1, Rank::Infantry, Location::Asia)]);
        let defender = army("bruno", &[(1, Rank::Infantry, Location::Asia)]);
        let mut gs = state_of(&defender);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(resolve_war(&mut gs, &row), WarResolution::NotInvolved);
        assert_eq!(gs.units().count(), 1, "state must be untouched");
    }

    #[test]
    fn bystander_is_not_involved() {
        let attacker = army("ada", &[(1, Rank::Infantry, Location::Asia)]);
        let defender = army("bruno", &[(1, Rank::Infantry, Location::Asia)]);
        let mut gs = GameState::new("cleo");

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(resolve_war(&mut gs, &row), WarResolution::NotInvolved);
    }

    #[test]
    fn disjoint_armies_dissolve_the_war() {
        let attacker = army("ada", &[(1, Rank::Artillery, Location::Europe)]);
        let defender = army("bruno", &[(1, Rank::Artillery, Location::Asia)]);
        let mut gs = state_of(&attacker);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(resolve_war(&mut gs, &row), WarResolution::NoUnits);
        assert_eq!(gs.units().count(), 1);
    }

    #[test]
    fn stronger_attacker_wins_without_touching_own_state() {
        let attacker = army("ada", &[(1, Rank::Artillery, Location::Asia)]);
        let defender = army("bruno", &[(1, Rank::Infantry, Location::Asia)]);
        let mut gs = state_of(&attacker);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(
            resolve_war(&mut gs, &row),
            WarResolution::YouWon {
                winner: "ada".into(),
                loser: "bruno".into(),
            }
        );
        assert_eq!(gs.units().count(), 1, "winner suffers no casualties");
    }

    #[test]
    fn weaker_attacker_loses_units_at_the_overlap() {
        let attacker = army(
            "ada",
            &[
                (1, Rank::Infantry, Location::Asia),
                (2, Rank::Cavalry, Location::Europe),
            ],
        );
        let defender = army("bruno", &[(1, Rank::Artillery, Location::Asia)]);
        let mut gs = state_of(&attacker);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(
            resolve_war(&mut gs, &row),
            WarResolution::OpponentWon {
                winner: "bruno".into(),
                loser: "ada".into(),
            }
        );
        let survivors: Vec<u32> = gs.units().map(|u| u.id).collect();
        assert_eq!(survivors, vec![2], "only units outside the overlap survive");
    }

    #[test]
    fn equal_power_draws_and_removes_overlap_units() {
        let attacker = army("ada", &[(1, Rank::Cavalry, Location::Asia)]);
        let defender = army(
            "bruno",
            &[
                (1, Rank::Infantry, Location::Asia),
                (2, Rank::Infantry, Location::Asia),
                (3, Rank::Infantry, Location::Asia),
                (4, Rank::Infantry, Location::Asia),
                (5, Rank::Infantry, Location::Asia),
            ],
        );
        let mut gs = state_of(&attacker);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(
            resolve_war(&mut gs, &row),
            WarResolution::Draw {
                attacker: "ada".into(),
                defender: "bruno".into(),
            }
        );
        assert_eq!(gs.units().count(), 0, "draw kills units on both sides");
    }

    // The concrete scenario from the design review: one artillery (10)
    // against one cavalry plus one infantry (6) at the same location.
    #[test]
    fn artillery_beats_cavalry_and_infantry_on_the_attacker_client() {
        let attacker = army("ada", &[(1, Rank::Artillery, Location::Europe)]);
        let defender = army(
            "bruno",
            &[
                (1, Rank::Cavalry, Location::Europe),
                (2, Rank::Infantry, Location::Europe),
            ],
        );
        let mut gs = state_of(&attacker);

        let row = RecognitionOfWar { attacker, defender };
        assert_eq!(
            resolve_war(&mut gs, &row),
            WarResolution::YouWon {
                winner: "ada".into(),
                loser: "bruno".into(),
            }
        );
    }
}
