//! Conversation types and transcript normalization

mod correlate;
mod log;
mod parser;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use correlate::correlate;
pub use log::ConversationLog;
pub use parser::{ParsedLine, SpeakerFallback, TurnParser};

/// Speaker label for the dispatcher side of every conversation.
pub const OPERATOR: &str = "Operator";

/// Speaker label for notices generated by the controller itself.
pub const SYSTEM: &str = "System";

/// Grounding data the backend used when generating a turn.
///
/// Deserialization is attempted in declaration order, so any object with a
/// `context` string is a [`EvidenceRecord::Context`], any object with an
/// `examples` list is an [`EvidenceRecord::Exemplars`], and everything else is
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EvidenceRecord {
    /// Free-text grounding passage
    Context { context: String },

    /// Categorized set of example responses
    Exemplars {
        #[serde(default)]
        category: Option<String>,
        #[serde(default)]
        speaker: Option<String>,
        examples: Vec<String>,
    },

    /// Anything else the backend chose to send
    Opaque(Value),
}

impl EvidenceRecord {
    /// Human-readable text shown when a turn's evidence is inspected
    pub fn render(&self) -> String {
        match self {
            EvidenceRecord::Context { context } => context.clone(),
            EvidenceRecord::Exemplars {
                category,
                speaker,
                examples,
            } => {
                let examples = examples
                    .iter()
                    .map(|ex| format!("- {}", ex))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Category: {}\nSpeaker: {}\n\nExample responses:\n{}",
                    category.as_deref().unwrap_or("Unknown"),
                    speaker.as_deref().unwrap_or("Unknown"),
                    examples
                )
            }
            EvidenceRecord::Opaque(Value::String(s)) => s.clone(),
            EvidenceRecord::Opaque(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }
}

/// One utterance before it is placed in a log.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub speaker: String,
    pub text: String,
    pub evidence: Option<Arc<EvidenceRecord>>,
}

impl Utterance {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            evidence: None,
        }
    }

    pub fn with_evidence(mut self, evidence: Option<EvidenceRecord>) -> Self {
        self.evidence = evidence.map(Arc::new);
        self
    }

    /// A notice authored by the controller rather than a participant
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM, text)
    }
}

/// An utterance placed in a [`ConversationLog`].
///
/// Fields are read-only; evidence is shared, never mutated after attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    sequence: u64,
    speaker: String,
    text: String,
    evidence: Option<Arc<EvidenceRecord>>,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub(crate) fn new(sequence: u64, utterance: Utterance) -> Self {
        Self {
            sequence,
            speaker: utterance.speaker,
            text: utterance.text,
            evidence: utterance.evidence,
            created_at: Utc::now(),
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn evidence(&self) -> Option<&EvidenceRecord> {
        self.evidence.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_system(&self) -> bool {
        self.speaker == SYSTEM
    }
}
