//! Working state of one session

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationLog;

use super::playback::{PlaybackGate, PlaybackToken};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// User and backend alternate turns live
    Interactive,
    /// Backend generates the whole conversation, replayed with pacing
    Auto,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Interactive => write!(f, "interactive"),
            Mode::Auto => write!(f, "auto"),
        }
    }
}

/// Everything a session owns. Only the controller mutates it.
#[derive(Debug)]
pub struct SessionState {
    id: Uuid,
    persona: String,
    operator: String,
    mode: Mode,
    acting_speaker: String,
    pub(crate) log: ConversationLog,
    selected: Option<u64>,
    playback: PlaybackGate,
}

impl SessionState {
    pub fn new(persona: impl Into<String>, operator: impl Into<String>) -> Self {
        let operator = operator.into();
        Self {
            id: Uuid::new_v4(),
            persona: persona.into(),
            acting_speaker: operator.clone(),
            operator,
            mode: Mode::Interactive,
            log: ConversationLog::new(),
            selected: None,
            playback: PlaybackGate::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn acting_speaker(&self) -> &str {
        &self.acting_speaker
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn selected(&self) -> Option<u64> {
        self.selected
    }

    /// The other participant
    pub fn counterpart(&self, speaker: &str) -> &str {
        if speaker == self.operator {
            &self.persona
        } else {
            &self.operator
        }
    }

    /// Token for work started under the current generation
    pub fn playback_token(&self) -> PlaybackToken {
        self.playback.token()
    }

    /// Clear the log and selection, switch mode, and invalidate every
    /// outstanding playback token. Persona and acting speaker survive.
    pub fn reset(&mut self, mode: Mode) -> PlaybackToken {
        self.mode = mode;
        self.log.clear();
        self.selected = None;
        self.playback.invalidate();
        self.playback.token()
    }

    pub fn toggle_speaker(&mut self) -> &str {
        self.acting_speaker = self.counterpart(&self.acting_speaker).to_string();
        &self.acting_speaker
    }

    /// Exclusive selection; `None` clears it
    pub fn select(&mut self, sequence: Option<u64>) {
        self.selected = sequence;
    }
}
