//! Conversation session control
//!
//! The [`SessionController`] owns a session's mode, acting speaker and log,
//! and is the only thing that mutates them. It:
//! 1. Resets the session on every mode switch
//! 2. Calls the backend for opening lines, replies and whole transcripts
//! 3. Turns backend failures into a single System notice
//! 4. Replays generated transcripts through the [`PlaybackScheduler`]

mod controller;
mod playback;
mod sink;
mod state;

#[cfg(test)]
pub(crate) mod testing;

use thiserror::Error;

pub use controller::{SessionController, SessionOptions};
pub use playback::{
    DelayPolicy, Delivery, PlaybackGate, PlaybackHandle, PlaybackOutcome, PlaybackReport,
    PlaybackScheduler, PlaybackToken, RolePacing,
};
pub use sink::{SinkError, TerminalSink, TurnSink};
pub use state::{Mode, SessionState};

/// Requests the controller declines without touching the log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("message cannot be empty")]
    EmptyInput,

    #[error("only available in interactive mode")]
    NotInteractive,
}
