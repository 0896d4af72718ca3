//! Persona Chat - conversation simulations against a persona backend
//!
//! A session alternates between an operator and a persona. Interactive mode
//! relays one message at a time to the generation backend; auto mode fetches
//! a whole conversation and reveals it turn by turn. Turns the backend
//! grounded in retrieved material carry that evidence for inspection.

pub mod config;
pub mod conversation;
pub mod remote;
pub mod session;

pub use config::Config;
pub use conversation::{EvidenceRecord, Turn, Utterance};
pub use remote::{HttpRemote, RemoteError, RemoteService};
pub use session::{Mode, SessionController, SessionError, SessionOptions, TerminalSink};
