//! Paced replay of a generated transcript
//!
//! A [`PlaybackGate`] holds the session's generation counter. Every task that
//! may emit later captures a [`PlaybackToken`]; bumping the gate invalidates
//! all of them at once and wakes any playback that is sleeping between turns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{PlaybackConfig, SessionConfig};
use crate::conversation::{Utterance, OPERATOR};

use super::sink::SinkError;

/// Generation counter shared by a session and its in-flight work
#[derive(Debug)]
pub struct PlaybackGate {
    generation: watch::Sender<u64>,
}

impl PlaybackGate {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    pub fn token(&self) -> PlaybackToken {
        PlaybackToken {
            generation: self.generation(),
            watch: self.generation.subscribe(),
        }
    }

    /// Invalidate every token handed out so far
    pub fn invalidate(&self) -> u64 {
        self.generation.send_modify(|g| *g += 1);
        self.generation()
    }
}

impl Default for PlaybackGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Captured generation; stale once the gate moves on
#[derive(Debug, Clone)]
pub struct PlaybackToken {
    generation: u64,
    watch: watch::Receiver<u64>,
}

impl PlaybackToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        *self.watch.borrow() == self.generation
    }

    /// Resolves once the token has been invalidated (or its session dropped)
    pub async fn invalidated(&mut self) {
        loop {
            if *self.watch.borrow_and_update() != self.generation {
                return;
            }
            if self.watch.changed().await.is_err() {
                return;
            }
        }
    }
}

/// How long to pause before revealing a line from `speaker`
pub trait DelayPolicy: Send + Sync {
    fn delay_for(&self, speaker: &str) -> Duration;
}

/// Longer pause around operator lines (the listener taking in information),
/// shorter around persona lines (a quick reply).
#[derive(Debug, Clone)]
pub struct RolePacing {
    operator: String,
    operator_delay: Duration,
    persona_delay: Duration,
}

impl RolePacing {
    pub fn new(operator: impl Into<String>, operator_delay: Duration, persona_delay: Duration) -> Self {
        Self {
            operator: operator.into(),
            operator_delay,
            persona_delay,
        }
    }

    pub fn from_config(session: &SessionConfig, playback: &PlaybackConfig) -> Self {
        Self::new(
            session.operator_label.clone(),
            Duration::from_millis(playback.operator_delay_ms),
            Duration::from_millis(playback.persona_delay_ms),
        )
    }

    /// Same pause for everyone
    pub fn uniform(delay: Duration) -> Self {
        Self::new(OPERATOR, delay, delay)
    }
}

impl Default for RolePacing {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default(), &PlaybackConfig::default())
    }
}

impl DelayPolicy for RolePacing {
    fn delay_for(&self, speaker: &str) -> Duration {
        if speaker == self.operator {
            self.operator_delay
        } else {
            self.persona_delay
        }
    }
}

/// Result of handing one turn to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The session moved on before the turn could be applied
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Completed,
    Cancelled,
    SinkFailed(String),
    /// The playback task panicked or was aborted by the runtime
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub generation: u64,
    pub total: usize,
    pub emitted: usize,
    pub outcome: PlaybackOutcome,
}

/// A running playback task
#[derive(Debug)]
pub struct PlaybackHandle {
    generation: u64,
    total: usize,
    task: JoinHandle<PlaybackReport>,
}

impl PlaybackHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to stop, however it stops
    pub async fn join(self) -> PlaybackReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => PlaybackReport {
                generation: self.generation,
                total: self.total,
                emitted: 0,
                outcome: PlaybackOutcome::Aborted(e.to_string()),
            },
        }
    }
}

/// Emits turns one at a time with speaker-dependent pauses
#[derive(Clone)]
pub struct PlaybackScheduler {
    delay: Arc<dyn DelayPolicy>,
}

impl PlaybackScheduler {
    pub fn new(delay: Arc<dyn DelayPolicy>) -> Self {
        Self { delay }
    }

    /// Spawn the playback.
    ///
    /// Before every emission the token is checked; once it is stale the
    /// remaining turns are dropped. A sink error also ends the run. `emit`
    /// must re-check the token under whatever lock guards the log.
    pub fn play<F>(&self, turns: Vec<Utterance>, token: PlaybackToken, emit: F) -> PlaybackHandle
    where
        F: FnMut(Utterance) -> Result<Delivery, SinkError> + Send + 'static,
    {
        let generation = token.generation();
        let total = turns.len();
        let task = tokio::spawn(run(turns, Arc::clone(&self.delay), token, emit));

        PlaybackHandle {
            generation,
            total,
            task,
        }
    }
}

async fn run<F>(
    turns: Vec<Utterance>,
    delay: Arc<dyn DelayPolicy>,
    mut token: PlaybackToken,
    mut emit: F,
) -> PlaybackReport
where
    F: FnMut(Utterance) -> Result<Delivery, SinkError>,
{
    let total = turns.len();
    let mut emitted = 0;

    let report = |emitted: usize, outcome: PlaybackOutcome, generation: u64| PlaybackReport {
        generation,
        total,
        emitted,
        outcome,
    };
    let generation = token.generation();

    for utterance in turns {
        let pause = delay.delay_for(&utterance.speaker);
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = token.invalidated() => {}
        }

        if !token.is_current() {
            tracing::debug!(generation, emitted, total, "playback cancelled");
            return report(emitted, PlaybackOutcome::Cancelled, generation);
        }

        match emit(utterance) {
            Ok(Delivery::Delivered) => emitted += 1,
            Ok(Delivery::Stale) => {
                tracing::debug!(generation, emitted, total, "playback cancelled at emission");
                return report(emitted, PlaybackOutcome::Cancelled, generation);
            }
            Err(e) => {
                tracing::warn!(generation, emitted, total, error = %e, "sink failed, aborting playback");
                return report(emitted, PlaybackOutcome::SinkFailed(e.to_string()), generation);
            }
        }
    }

    tracing::debug!(generation, emitted, "playback finished");
    report(emitted, PlaybackOutcome::Completed, generation)
}
