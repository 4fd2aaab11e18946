//! Wire-level game data: players, units, and the event payloads exchanged
//! over the broker.
//!
//! Every type here crosses a process boundary, so everything is owned and
//! serde-derived. `Player` values inside messages are snapshots taken at
//! publish time, never live references into a running `GameState`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Combat rank of a unit. The power weighting is fixed and total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Infantry,
    Cavalry,
    Artillery,
}

impl Rank {
    /// Combat weight of one unit of this rank.
    pub fn power(self) -> u32 {
        match self {
            Rank::Infantry => 1,
            Rank::Cavalry => 5,
            Rank::Artillery => 10,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rank::Infantry => "infantry",
            Rank::Cavalry => "cavalry",
            Rank::Artillery => "artillery",
        };
        f.write_str(name)
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infantry" => Ok(Rank::Infantry),
            "cavalry" => Ok(Rank::Cavalry),
            "artillery" => Ok(Rank::Artillery),
            other => Err(format!("{other} is not a valid unit rank")),
        }
    }
}

/// One of the fixed set of board locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Americas,
    Europe,
    Africa,
    Asia,
    Antarctica,
    Australia,
}

impl Location {
    /// All valid locations, for help text and validation messages.
    pub const ALL: [Location; 6] = [
        Location::Americas,
        Location::Europe,
        Location::Africa,
        Location::Asia,
        Location::Antarctica,
        Location::Australia,
    ];
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Location::Americas => "americas",
            Location::Europe => "europe",
            Location::Africa => "africa",
            Location::Asia => "asia",
            Location::Antarctica => "antarctica",
            Location::Australia => "australia",
        };
        f.write_str(name)
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "americas" => Ok(Location::Americas),
            "europe" => Ok(Location::Europe),
            "africa" => Ok(Location::Africa),
            "asia" => Ok(Location::Asia),
            "antarctica" => Ok(Location::Antarctica),
            "australia" => Ok(Location::Australia),
            other => Err(format!("{other} is not a valid location")),
        }
    }
}

/// A single army unit. Ids are unique within one player's army.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub rank: Rank,
    pub location: Location,
}

/// A player's army as carried on the wire: a snapshot, not live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub units: BTreeMap<u32, Unit>,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            units: BTreeMap::new(),
        }
    }

    /// Units currently stationed at `location`.
    pub fn units_at(&self, location: Location) -> Vec<&Unit> {
        self.units
            .values()
            .filter(|u| u.location == location)
            .collect()
    }
}

/// A move event: the mover's snapshot plus the units being relocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmyMove {
    pub player: Player,
    pub to_location: Location,
    pub units: Vec<Unit>,
}

/// A war declaration naming attacker and defender with their armies as
/// they stood at declaration time. Deep copies by construction: the
/// payload owns its players, so later mutation of either client's live
/// state cannot alter an already-sent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOfWar {
    pub attacker: Player,
    pub defender: Player,
}

/// Broadcast control signal flipping every client's pause flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayingState {
    pub is_paused: bool,
}

/// One append-only entry in the shared game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLog {
    pub current_time: DateTime<Utc>,
    pub username: String,
    pub message: String,
}

impl GameLog {
    pub fn new(username: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            current_time: Utc::now(),
            username: username.into(),
            message: message.into(),
        }
    }
}

/// Total combat strength of a set of units.
pub fn power_level<'a, I>(units: I) -> u32
where
    I: IntoIterator<Item = &'a Unit>,
{
    units.into_iter().map(|u| u.rank.power()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: u32, rank: Rank, location: Location) -> Unit {
        Unit { id, rank, location }
    }

    #[test]
    fn power_weights_are_fixed() {
        assert_eq!(Rank::Infantry.power(), 1);
        assert_eq!(Rank::Cavalry.power(), 5);
        assert_eq!(Rank::Artillery.power(), 10);
    }

    #[test]
    fn power_level_sums_per_rank_weights() {
        let units = [
            unit(1, Rank::Infantry, Location::Asia),
            unit(2, Rank::Cavalry, Location::Asia),
            unit(3, Rank::Artillery, Location::Asia),
        ];
        assert_eq!(power_level(units.iter()), 16);
    }

    #[test]
    fn power_level_of_nothing_is_zero() {
        assert_eq!(power_level(std::iter::empty()), 0);
    }

    #[test]
    fn rank_and_location_parse_their_display_forms() {
        for rank in [Rank::Infantry, Rank::Cavalry, Rank::Artillery] {
            assert_eq!(rank.to_string().parse::<Rank>().unwrap(), rank);
        }
        for location in Location::ALL {
            assert_eq!(location.to_string().parse::<Location>().unwrap(), location);
        }
        assert!("dragoon".parse::<Rank>().is_err());
        assert!("atlantis".parse::<Location>().is_err());
    }

    #[test]
    fn units_at_filters_by_location() {
        let mut player = Player::new("kara");
        player
            .units
            .insert(1, unit(1, Rank::Infantry, Location::Europe));
        player
            .units
            .insert(2, unit(2, Rank::Cavalry, Location::Asia));

        let at_europe = player.units_at(Location::Europe);
        assert_eq!(at_europe.len(), 1);
        assert_eq!(at_europe[0].id, 1);
        assert!(player.units_at(Location::Africa).is_empty());
    }
}
