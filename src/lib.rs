//! # HFO Trainer
//!
//! The coach-side referee of Half Field Offense (HFO) training runs on a 2D soccer simulator.
//!
//! It provides:
//! - A datagram session with the simulator's coach port ([`link`]) and a parser for its
//!   parenthesised messages ([`message`])
//! - Launch, connection check and teardown of the player processes ([`supervisor`])
//! - Possession tracking and the trial state machine that decides how every attack ends
//!   ([`possession`], [`trial`])
//! - The service gluing it all together ([`Trainer`](crate::trainer::Trainer))
//!
//! A run launches the attacking team, then the defending team, waits for every learning agent
//! to announce it is ready, then plays trials until a budget is reached, a player sends `DONE`
//! or the embedding program stops it. Each trial ends with a goal, the ball leaving the half
//! field, the defense capturing the ball, or the ball staying untouched for too long.
//!
//! # Documentation Overview
//!
//! - For the run phases and the main loop, see the [`trainer`] module.
//! - For tuning squads, budgets, binaries and timeouts, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the outcome rules and the reported statistics, see [`trial`].
//!
//! # Usage Example
//!
//! ```no_run
//! use hfo_trainer::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Two scripted attackers against a goalie, for 50 trials
//!     let config = Configuration::new()
//!         .with_offense(0, 2)
//!         .with_defense(0, 1)
//!         .with_max_trials(50)
//!         .with_seed(42);
//!     config.validate()?;
//!
//!     let mut trainer = Trainer::connect(config)?;
//!     let stop = trainer.stop_handle();
//!     // `stop.stop()` from another thread ends the run after the current message
//!     # let _ = stop;
//!
//!     let stats = trainer.run()?;
//!     println!("{} goals in {} trials", stats.goals, stats.trials);
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use anyhow;
pub mod configuration;
pub mod error;
pub mod geometry;
pub mod handlers;
pub mod link;
mod logger;
pub mod message;
pub mod possession;
pub mod process;
pub mod roster;
pub mod server_params;
pub mod supervisor;
pub mod trainer;
pub mod trial;

pub use logger::init_logger;

/// Commonly used types and traits for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use hfo_trainer::prelude::*;
/// ```
///
/// Includes:
/// - [`Configuration`](crate::configuration::Configuration)
/// - [`Trainer`](crate::trainer::Trainer), its [`StopHandle`](crate::trainer::StopHandle) and
///   [`LoopStep`](crate::trainer::LoopStep)
/// - the [`Channel`](crate::link::Channel) seam and its UDP implementation
/// - the error and result types
pub mod prelude {
    pub use crate::configuration::Configuration;
    pub use crate::error::{DoneReason, TrainerError};
    pub use crate::link::{Channel, RetryBudget, ServerLink};
    pub use crate::trainer::{LoopStep, StopHandle, Trainer};
    pub use crate::trial::{TrialOutcome, TrialStats};
}
