//! Ball possession from position snapshots.
//!
//! A player is close to the ball when it lies within `HOLD_FACTOR` times the kickable distance
//! (`kickable_margin + player_size + ball_size`). Being close for [`NUM_FRAMES_TO_HOLD`]
//! consecutive observations makes a player the holder. When several players are close at once
//! nobody is credited and every counter starts over.

use tracing::{trace, warn};

use crate::error::{Result, TrainerError};
use crate::geometry::Vector2;
use crate::roster::{Side, TEAM_SIZE};
use crate::server_params::ServerParams;

/// Consecutive close observations needed to hold the ball.
pub const NUM_FRAMES_TO_HOLD: u32 = 2;

/// Gain applied to the kickable distance.
pub const HOLD_FACTOR: f64 = 1.5;

const DEFAULT_KICKABLE_MARGIN: f64 = 0.7;
const DEFAULT_PLAYER_SIZE: f64 = 0.3;
const DEFAULT_BALL_SIZE: f64 = 0.085;

/// The player currently controlling the ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holder {
    /// Side of the holder's team
    pub side: Side,
    /// Internal index of the holder
    pub index: usize,
}

/// Last ball position and the per-player hold counters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BallState {
    /// Ball position of the last observation
    pub position: Vector2,
    held: [[u32; 2]; TEAM_SIZE],
}

impl BallState {
    /// Counter of one player
    pub fn held(&self, side: Side, index: usize) -> u32 {
        self.held
            .get(index)
            .map_or(0, |cell| cell[side.index()])
    }
}

/// Derives the ball holder, one observation per simulation frame.
#[derive(Debug, Clone)]
pub struct PossessionTracker {
    threshold: f64,
    ball: BallState,
}

impl PossessionTracker {
    /// Tracker with an explicit distance threshold (already multiplied by the gain).
    pub fn new(threshold: f64) -> Self {
        PossessionTracker {
            threshold,
            ball: BallState::default(),
        }
    }

    /// Tracker whose threshold comes from the server parameters.
    ///
    /// Missing parameters fall back to the simulator's defaults.
    pub fn from_params(params: &ServerParams) -> Self {
        let get = |name: &str, default: f64| {
            params.number(name).unwrap_or_else(|| {
                warn!(name, default, "server parameter missing, using default");
                default
            })
        };
        let kickable = get("kickable_margin", DEFAULT_KICKABLE_MARGIN)
            + get("player_size", DEFAULT_PLAYER_SIZE)
            + get("ball_size", DEFAULT_BALL_SIZE);
        Self::new(kickable * HOLD_FACTOR)
    }

    /// Distance under which a player counts as close
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Read-only view of the ball state
    pub fn ball(&self) -> &BallState {
        &self.ball
    }

    /// Forgets every counter, e.g. when the field is reset.
    pub fn clear(&mut self) {
        self.ball.held = Default::default();
    }

    /// Feeds one snapshot and returns the holder, if any.
    ///
    /// Players missing from `players` count as far from the ball.
    ///
    /// # Errors
    /// [`TrainerError::InternalConsistency`] if two players reach the hold count together,
    /// [`TrainerError::UnknownPlayer`] for an index outside the team.
    pub fn observe(
        &mut self,
        ball: Vector2,
        players: impl IntoIterator<Item = (Side, usize, Vector2)>,
    ) -> Result<Option<Holder>> {
        self.ball.position = ball;
        let mut close = [[false; 2]; TEAM_SIZE];
        let mut num_close = 0;
        for (side, index, pos) in players {
            let Some(cell) = close.get_mut(index) else {
                return Err(TrainerError::unknown_player(
                    &side.to_string(),
                    format_args!("no index {index}"),
                ));
            };
            if pos.distance(ball) < self.threshold && !cell[side.index()] {
                cell[side.index()] = true;
                num_close += 1;
            }
        }

        for (counters, close) in self.ball.held.iter_mut().zip(close) {
            for (counter, close) in counters.iter_mut().zip(close) {
                *counter = if close { *counter + 1 } else { 0 };
            }
        }
        if num_close > 1 {
            trace!(num_close, "ambiguous contact, nobody holds the ball");
            self.clear();
        }

        let mut holders = self.ball.held.iter().enumerate().flat_map(|(index, cell)| {
            [Side::Offense, Side::Defense]
                .into_iter()
                .filter(move |side| cell[side.index()] >= NUM_FRAMES_TO_HOLD)
                .map(move |side| Holder { side, index })
        });
        let holder = holders.next();
        if let Some(other) = holders.next() {
            return Err(TrainerError::InternalConsistency(format!(
                "two ball holders at once: {holder:?} and {other:?}"
            )));
        }
        Ok(holder)
    }
}
