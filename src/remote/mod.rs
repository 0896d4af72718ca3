//! Generation backend integration

mod http;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::conversation::EvidenceRecord;

pub use http::HttpRemote;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Backend returned an unusable response: {0}")]
    Logical(String),
}

impl RemoteError {
    /// Transport-level failures, as opposed to a bad payload
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_) | RemoteError::Timeout(_))
    }
}

/// Request mode understood by the `/chat` endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    Interactive,
    InteractiveStart,
    Auto,
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub town_person: String,
    pub user_input: String,
    pub mode: ChatMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl ChatRequest {
    pub fn interactive_start(persona: &str) -> Self {
        Self {
            town_person: persona.to_string(),
            user_input: String::new(),
            mode: ChatMode::InteractiveStart,
            speaker: None,
        }
    }

    pub fn interactive(persona: &str, text: &str, speaker: &str) -> Self {
        Self {
            town_person: persona.to_string(),
            user_input: text.to_string(),
            mode: ChatMode::Interactive,
            speaker: Some(speaker.to_string()),
        }
    }

    pub fn auto(persona: &str) -> Self {
        Self {
            town_person: persona.to_string(),
            user_input: String::new(),
            mode: ChatMode::Auto,
            speaker: None,
        }
    }
}

/// A single generated turn
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub evidence: Option<EvidenceRecord>,
}

/// A complete generated conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub raw: String,
    pub evidence: Option<Vec<Option<EvidenceRecord>>>,
}

/// The remote generation service as seen by a session.
///
/// The service is stateless from the caller's side: each call carries only
/// the persona and the current input.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Opening operator line for an interactive conversation
    async fn start_conversation(&self, persona: &str) -> Result<Reply, RemoteError>;

    /// Answer to `text` spoken by `speaker`
    async fn reply(&self, persona: &str, text: &str, speaker: &str)
        -> Result<Reply, RemoteError>;

    /// Whole conversation in one response
    async fn generate_transcript(&self, persona: &str) -> Result<Transcript, RemoteError>;

    /// Persona descriptor, in the same shape as evidence
    async fn persona(&self, name: &str) -> Result<Value, RemoteError>;
}
