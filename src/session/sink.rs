//! Rendering surface the session writes to

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

use crate::conversation::{EvidenceRecord, Turn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Sink closed")]
    Closed,
}

/// Receives turns in log order. Never mutates the session.
pub trait TurnSink: Send + Sync {
    /// Called exactly once per turn, in sequence order
    fn emit(&self, turn: &Turn) -> Result<(), SinkError>;

    /// Show (or clear, with `None`) the evidence panel
    fn set_retrieved_info(&self, evidence: Option<&EvidenceRecord>);

    /// The log was cleared
    fn reset(&self) {}
}

/// Plain-text transcript writer
pub struct TerminalSink<W> {
    out: Mutex<W>,
}

impl TerminalSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_block(&self, text: &str) -> io::Result<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(out, "{}", text)?;
        out.flush()
    }
}

impl<W: Write + Send> TurnSink for TerminalSink<W> {
    fn emit(&self, turn: &Turn) -> Result<(), SinkError> {
        let marker = if turn.evidence().is_some() { "  [+]" } else { "" };
        let line = format!(
            "[{}] {}: {}{}",
            turn.sequence(),
            turn.speaker(),
            turn.text(),
            marker
        );
        self.write_block(&line)?;
        Ok(())
    }

    fn set_retrieved_info(&self, evidence: Option<&EvidenceRecord>) {
        let block = match evidence {
            Some(record) => format!(
                "---- Retrieved information ----\n{}\n-------------------------------",
                record.render()
            ),
            None => "(no retrieved information)".to_string(),
        };

        if let Err(e) = self.write_block(&block) {
            tracing::warn!(error = %e, "failed to render retrieved information");
        }
    }

    fn reset(&self) {
        if let Err(e) = self.write_block("") {
            tracing::warn!(error = %e, "failed to clear transcript");
        }
    }
}
