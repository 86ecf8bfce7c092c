//! Player numbering.
//!
//! The server identifies a player by its uniform number (unum, 1 to 11). The trainer uses
//! role-ordered internal indices instead: index 0 is always the goalie, then players follow the
//! team's preference order for the side it plays. [`RosterMap`] converts between the two.

use std::fmt::Display;

use crate::error::{Result, TrainerError};

/// Maximum number of players per team.
pub const TEAM_SIZE: usize = 11;

/// Unum of the goalie.
pub const GOALIE_UNUM: u8 = 1;

/// Which role a team plays in half field offense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Attacks the goal
    Offense,
    /// Defends the goal
    Defense,
}

impl Side {
    /// Index usable for per-side tables
    pub fn index(self) -> usize {
        match self {
            Side::Offense => 0,
            Side::Defense => 1,
        }
    }
}

impl Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Offense => write!(f, "offense"),
            Side::Defense => write!(f, "defense"),
        }
    }
}

/// Non-goalie unums of a team ordered by how much each player prefers `side`.
///
/// Known teams have hand-made orders; any other name gets the default order.
pub fn preference_order(team_name: &str, side: Side) -> [u8; TEAM_SIZE - 1] {
    match (team_name, side) {
        ("Borregos", Side::Offense) => [2, 4, 6, 5, 3, 7, 9, 10, 8, 11],
        ("Borregos", Side::Defense) => [9, 10, 8, 11, 7, 4, 6, 2, 3, 5],
        ("WrightEagle", Side::Offense) => [11, 4, 7, 3, 6, 10, 8, 9, 2, 5],
        ("WrightEagle", Side::Defense) => [5, 2, 8, 9, 10, 6, 3, 11, 4, 7],
        (_, Side::Offense) => [11, 7, 8, 9, 10, 6, 3, 2, 4, 5],
        (_, Side::Defense) => [2, 3, 4, 5, 6, 7, 8, 11, 9, 10],
    }
}

/// A team taking part in the match. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    name: String,
    side: Side,
    order: Vec<u8>,
}

impl Team {
    /// Creates the team with roster `[goalie] ++ preference_order(name, side)`.
    pub fn new(name: &str, side: Side) -> Team {
        let mut order = Vec::with_capacity(TEAM_SIZE);
        order.push(GOALIE_UNUM);
        order.extend(preference_order(name, side));
        debug_assert!(
            (1..=TEAM_SIZE as u8).all(|u| order.contains(&u)),
            "roster of {name} is not a permutation of 1..=11"
        );
        Team {
            name: name.to_string(),
            side,
            order,
        }
    }

    /// Team name as known by the server
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role of the team
    pub fn side(&self) -> Side {
        self.side
    }

    /// Unums ordered by internal index
    pub fn order(&self) -> &[u8] {
        &self.order
    }
}

/// A player seen through both numbering schemes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlayerRef {
    /// Team name
    pub team: String,
    /// Role of the team
    pub side: Side,
    /// Internal, role-ordered index
    pub index: usize,
    /// Uniform number
    pub unum: u8,
}

/// Bidirectional mapping between internal indices and unums for both teams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterMap {
    offense: Team,
    defense: Team,
}

impl RosterMap {
    /// Builds both rosters from the team names.
    pub fn build(offense_team: &str, defense_team: &str) -> RosterMap {
        RosterMap {
            offense: Team::new(offense_team, Side::Offense),
            defense: Team::new(defense_team, Side::Defense),
        }
    }

    /// Team playing `side`
    pub fn team(&self, side: Side) -> &Team {
        match side {
            Side::Offense => &self.offense,
            Side::Defense => &self.defense,
        }
    }

    /// Side played by the team called `name`
    pub fn side_of(&self, name: &str) -> Option<Side> {
        if name == self.offense.name {
            Some(Side::Offense)
        } else if name == self.defense.name {
            Some(Side::Defense)
        } else {
            None
        }
    }

    fn team_named(&self, name: &str) -> Result<&Team> {
        self.side_of(name).map(|side| self.team(side)).ok_or_else(|| {
            TrainerError::unknown_player(
                name,
                format_args!(
                    "team is neither '{}' nor '{}'",
                    self.offense.name, self.defense.name
                ),
            )
        })
    }

    /// Unum of the player at `index` on team `team`.
    ///
    /// # Errors
    /// [`TrainerError::UnknownPlayer`] for an unknown team or an index outside the roster.
    pub fn to_external(&self, team: &str, index: usize) -> Result<u8> {
        self.team_named(team)?
            .order
            .get(index)
            .copied()
            .ok_or_else(|| TrainerError::unknown_player(team, format_args!("no index {index}")))
    }

    /// Internal index of the player wearing `unum` on team `team`.
    ///
    /// # Errors
    /// [`TrainerError::UnknownPlayer`] for an unknown team or unum.
    pub fn to_internal(&self, team: &str, unum: u8) -> Result<usize> {
        self.team_named(team)?
            .order
            .iter()
            .position(|&u| u == unum)
            .ok_or_else(|| TrainerError::unknown_player(team, format_args!("no unum {unum}")))
    }

    /// Full reference to the player at `index` of the team playing `side`.
    pub fn player(&self, side: Side, index: usize) -> Result<PlayerRef> {
        let team = self.team(side);
        let unum = self.to_external(&team.name, index)?;
        Ok(PlayerRef {
            team: team.name.clone(),
            side,
            index,
            unum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_zero_is_goalie() {
        let roster = RosterMap::build("WrightEagle", "Borregos");
        assert_eq!(roster.to_external("WrightEagle", 0).unwrap(), 1);
        assert_eq!(roster.to_external("Borregos", 0).unwrap(), 1);
        assert_eq!(roster.to_external("WrightEagle", 1).unwrap(), 11);
        assert_eq!(roster.to_external("Borregos", 1).unwrap(), 9);
    }

    #[test]
    fn conversions_are_inverse() {
        for (off, def) in [
            ("base_left", "base_right"),
            ("Borregos", "WrightEagle"),
            ("WrightEagle", "Borregos"),
        ] {
            let roster = RosterMap::build(off, def);
            for team in [off, def] {
                for i in 0..TEAM_SIZE {
                    let unum = roster.to_external(team, i).unwrap();
                    assert_eq!(roster.to_internal(team, unum).unwrap(), i);
                }
            }
        }
    }

    #[test]
    fn every_roster_is_a_permutation() {
        for name in ["Borregos", "WrightEagle", "anything"] {
            for side in [Side::Offense, Side::Defense] {
                let mut order = Team::new(name, side).order().to_vec();
                order.sort_unstable();
                assert_eq!(order, (1..=11).collect::<Vec<u8>>());
            }
        }
    }

    #[test]
    fn unknown_players_are_errors() {
        let roster = RosterMap::build("base_left", "base_right");
        assert!(matches!(
            roster.to_external("nobody", 0),
            Err(TrainerError::UnknownPlayer { .. })
        ));
        assert!(matches!(
            roster.to_external("base_left", TEAM_SIZE),
            Err(TrainerError::UnknownPlayer { .. })
        ));
        assert!(matches!(
            roster.to_internal("base_right", 12),
            Err(TrainerError::UnknownPlayer { .. })
        ));
    }

    #[test]
    fn player_ref_carries_both_numbers() {
        let roster = RosterMap::build("base_left", "base_right");
        let p = roster.player(Side::Defense, 2).unwrap();
        assert_eq!(p.team, "base_right");
        assert_eq!(p.unum, 3);
        assert_eq!(roster.side_of("base_right"), Some(Side::Defense));
    }
}
