//! Splits a generated transcript into speaker-labeled lines

use super::OPERATOR;

/// One retained transcript line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub speaker: String,
    pub text: String,
}

impl ParsedLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// How to attribute a line that carries no `Speaker:` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerFallback {
    /// Even lines go to the operator, odd lines to the persona.
    ///
    /// This is a convenience for older backends that returned bare lines,
    /// not a protocol guarantee.
    Alternate,

    /// Every unlabeled line is attributed to the operator
    Operator,
}

/// Transcript parser bound to one session's participants
#[derive(Debug, Clone)]
pub struct TurnParser {
    operator: String,
    persona: String,
    fallback: SpeakerFallback,
}

impl TurnParser {
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            operator: OPERATOR.to_string(),
            persona: persona.into(),
            fallback: SpeakerFallback::Alternate,
        }
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn with_fallback(mut self, fallback: SpeakerFallback) -> Self {
        self.fallback = fallback;
        self
    }

    /// Parse a raw transcript.
    ///
    /// Blank lines are dropped; every other line yields exactly one entry, in
    /// input order. The label is everything before the first colon.
    pub fn parse(&self, raw: &str) -> Vec<ParsedLine> {
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(index, line)| self.parse_line(index, line))
            .collect()
    }

    fn parse_line(&self, index: usize, line: &str) -> ParsedLine {
        if let Some((label, text)) = line.split_once(':') {
            let label = label.trim();
            if !label.is_empty() {
                return ParsedLine::new(label, text.trim());
            }
            return ParsedLine::new(self.positional_speaker(index), text.trim());
        }

        ParsedLine::new(self.positional_speaker(index), line.trim())
    }

    fn positional_speaker(&self, index: usize) -> &str {
        match self.fallback {
            SpeakerFallback::Alternate if index % 2 == 1 => &self.persona,
            _ => &self.operator,
        }
    }
}
