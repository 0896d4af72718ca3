//! Ordered record of emitted turns

use super::{Turn, Utterance};

/// Append-only transcript with contiguous sequence numbers starting at 1.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Sequence number the next appended turn will carry
    pub fn next_sequence(&self) -> u64 {
        self.turns.len() as u64 + 1
    }

    /// Build the next turn without committing it.
    ///
    /// The caller delivers it to a sink and then hands it back to
    /// [`ConversationLog::commit`].
    pub fn stage(&self, utterance: Utterance) -> Turn {
        Turn::new(self.next_sequence(), utterance)
    }

    /// Commit a turn produced by [`ConversationLog::stage`].
    ///
    /// A turn staged before another commit or a clear is re-sequenced so the
    /// log never holds gaps or duplicates.
    pub fn commit(&mut self, mut turn: Turn) -> &Turn {
        let expected = self.next_sequence();
        if turn.sequence != expected {
            tracing::debug!(
                staged = turn.sequence,
                expected,
                "re-sequencing stale staged turn"
            );
            turn.sequence = expected;
        }
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    /// Stage and commit in one step
    pub fn append(&mut self, utterance: Utterance) -> &Turn {
        let turn = self.stage(utterance);
        self.commit(turn)
    }

    /// Drop every turn; the next append starts again at sequence 1
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn get(&self, sequence: u64) -> Option<&Turn> {
        let index = usize::try_from(sequence).ok()?.checked_sub(1)?;
        self.turns.get(index)
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}
