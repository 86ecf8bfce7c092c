//! Error taxonomy of the trainer.
//!
//! Every failure that can stop a run is a [`TrainerError`]. Reaching the end of the
//! configured budget is not an error: it is reported as a [`DoneReason`].

use std::fmt::Display;

use thiserror::Error;

/// Errors raised by the trainer components.
#[derive(Error, Debug)]
pub enum TrainerError {
    /// A server message that does not follow the parenthesised grammar.
    #[error("malformed message ({reason}): '{message}'")]
    MalformedMessage {
        /// The offending text
        message: String,
        /// What went wrong
        reason: &'static str,
    },

    /// The server did not acknowledge the coach handshake.
    #[error("handshake failed: expected '{expected}', received '{received}'")]
    Handshake {
        /// Reply the trainer waited for
        expected: String,
        /// Reply the server actually sent
        received: String,
    },

    /// Nothing arrived from the server within the retry budget.
    #[error("lost contact with server (no message after {retries} retries)")]
    Timeout {
        /// Number of retries spent before giving up
        retries: u32,
    },

    /// A launched player never appeared in the server's look replies.
    #[error("player {unum} of '{team}' did not show up after {looks} looks")]
    ConnectionTimeout {
        /// Team the player was launched for
        team: String,
        /// Awaited unum
        unum: u8,
        /// Look rounds sent before giving up
        looks: u32,
    },

    /// A required supervised process exited.
    #[error("necessary process '{name}' exited ({status})")]
    ProcessFailure {
        /// Name of the supervised process
        name: String,
        /// Exit status as reported by the OS
        status: String,
    },

    /// A team or player number that the roster does not know about.
    #[error("unknown player on team '{team}': {detail}")]
    UnknownPlayer {
        /// Team name used in the lookup
        team: String,
        /// Index or unum that failed
        detail: String,
    },

    /// State that correct operation never produces.
    #[error("internal consistency error: {0}")]
    InternalConsistency(String),

    /// Settings that cannot describe a match.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A player process could not be spawned.
    #[error("could not launch '{name}'")]
    Launch {
        /// Name of the process
        name: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Socket level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainerError {
    /// Protocol errors are fatal to the current connection.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            TrainerError::MalformedMessage { .. } | TrainerError::Handshake { .. }
        )
    }

    pub(crate) fn malformed(message: impl Into<String>, reason: &'static str) -> Self {
        TrainerError::MalformedMessage {
            message: message.into(),
            reason,
        }
    }

    pub(crate) fn unknown_player(team: &str, detail: impl Display) -> Self {
        TrainerError::UnknownPlayer {
            team: team.to_string(),
            detail: detail.to_string(),
        }
    }
}

/// Why a run finished normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// The configured number of trials was played
    TrialBudget,
    /// The configured number of frames was played
    FrameBudget,
    /// A supervised player sent `DONE`
    DoneMessage,
    /// The embedding program tripped the stop handle
    Interrupted,
}

impl Display for DoneReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DoneReason::TrialBudget => "trial budget reached",
            DoneReason::FrameBudget => "frame budget reached",
            DoneReason::DoneMessage => "DONE message received",
            DoneReason::Interrupted => "interrupted",
        };
        write!(f, "{s}")
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = TrainerError> = std::result::Result<T, E>;
