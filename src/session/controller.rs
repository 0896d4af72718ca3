//! Session state machine
//!
//! All mutation happens under one short-lived lock that is never held across
//! an `.await`. Anything that resolves after an `.await` re-checks its
//! [`PlaybackToken`] under that lock and is dropped if the session has moved
//! on in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

use crate::config::Config;
use crate::conversation::{correlate, EvidenceRecord, SpeakerFallback, Turn, TurnParser, Utterance};
use crate::remote::RemoteService;

use super::playback::{
    DelayPolicy, Delivery, PlaybackHandle, PlaybackScheduler, PlaybackToken, RolePacing,
};
use super::sink::{SinkError, TurnSink};
use super::state::{Mode, SessionState};
use super::SessionError;

const START_FAILED: &str = "Sorry, there was an error starting the conversation.";
const SEND_FAILED: &str = "Sorry, there was an error processing your message.";
const AUTO_FAILED: &str = "Sorry, there was an error generating the conversation.";
const PLAYBACK_FAILED: &str = "Sorry, the conversation playback was interrupted.";

/// Knobs fixed for the lifetime of a session
#[derive(Clone)]
pub struct SessionOptions {
    pub operator_label: String,
    pub speaker_fallback: SpeakerFallback,
    pub pacing: Arc<dyn DelayPolicy>,
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operator_label: config.session.operator_label.clone(),
            speaker_fallback: config.session.speaker_fallback(),
            pacing: Arc::new(RolePacing::from_config(&config.session, &config.playback)),
        }
    }

    pub fn with_pacing(mut self, pacing: impl DelayPolicy + 'static) -> Self {
        self.pacing = Arc::new(pacing);
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct Inner {
    state: Mutex<SessionState>,
    remote: Arc<dyn RemoteService>,
    sink: Arc<dyn TurnSink>,
    parser: TurnParser,
    scheduler: PlaybackScheduler,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit, then commit. If the sink refuses the turn it is dropped and a
    /// System notice takes its sequence number instead.
    fn deliver(
        &self,
        state: &mut SessionState,
        utterance: Utterance,
        on_failure: &str,
    ) -> Result<(), SinkError> {
        let turn = state.log.stage(utterance);
        let sequence = turn.sequence();

        match self.sink.emit(&turn) {
            Ok(()) => {
                state.log.commit(turn);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(session = %state.id(), sequence, error = %e, "sink rejected turn");
                self.notice(state, on_failure);
                Err(e)
            }
        }
    }

    /// Append a System turn; it is kept even if the sink cannot show it
    fn notice(&self, state: &mut SessionState, text: &str) {
        let turn = state.log.stage(Utterance::system(text));
        if let Err(e) = self.sink.emit(&turn) {
            tracing::warn!(session = %state.id(), error = %e, "sink rejected system notice");
        }
        state.log.commit(turn);
    }
}

/// Drives one persona conversation.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl SessionController {
    pub fn new(
        persona: impl Into<String>,
        remote: Arc<dyn RemoteService>,
        sink: Arc<dyn TurnSink>,
    ) -> Self {
        Self::with_options(persona, remote, sink, SessionOptions::default())
    }

    pub fn with_options(
        persona: impl Into<String>,
        remote: Arc<dyn RemoteService>,
        sink: Arc<dyn TurnSink>,
        options: SessionOptions,
    ) -> Self {
        let persona = persona.into();
        let parser = TurnParser::new(persona.clone())
            .with_operator(options.operator_label.clone())
            .with_fallback(options.speaker_fallback);
        let state = SessionState::new(persona, options.operator_label);

        tracing::info!(session = %state.id(), persona = %state.persona(), "session created");

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                remote,
                sink,
                parser,
                scheduler: PlaybackScheduler::new(options.pacing),
            }),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.inner.lock().id()
    }

    pub fn persona(&self) -> String {
        self.inner.lock().persona().to_string()
    }

    pub fn mode(&self) -> Mode {
        self.inner.lock().mode()
    }

    pub fn acting_speaker(&self) -> String {
        self.inner.lock().acting_speaker().to_string()
    }

    /// Currently selected turn, if its evidence is on display
    pub fn selected(&self) -> Option<u64> {
        self.inner.lock().selected()
    }

    /// Snapshot of the log
    pub fn transcript(&self) -> Vec<Turn> {
        self.inner.lock().log().turns().to_vec()
    }

    /// Reset the session into `mode` and kick it off.
    ///
    /// Interactive mode fetches the operator's opening line. Auto mode fetches
    /// a whole transcript and returns the playback revealing it.
    pub async fn select_mode(&self, mode: Mode) -> Option<PlaybackHandle> {
        let (token, persona) = {
            let mut state = self.inner.lock();
            let token = state.reset(mode);
            self.inner.sink.reset();
            self.inner.sink.set_retrieved_info(None);

            tracing::info!(
                session = %state.id(),
                %mode,
                generation = token.generation(),
                "mode selected"
            );
            (token, state.persona().to_string())
        };

        match mode {
            Mode::Interactive => {
                self.start_interactive(token, &persona).await;
                None
            }
            Mode::Auto => self.start_auto(token, &persona).await,
        }
    }

    async fn start_interactive(&self, token: PlaybackToken, persona: &str) {
        let result = self.inner.remote.start_conversation(persona).await;

        let mut state = self.inner.lock();
        if !token.is_current() {
            tracing::debug!(session = %state.id(), "discarding stale opening line");
            return;
        }

        match result {
            Ok(reply) => {
                let opening = Utterance::new(state.operator(), reply.text)
                    .with_evidence(reply.evidence);
                let _ = self.inner.deliver(&mut state, opening, START_FAILED);
            }
            Err(e) => {
                tracing::warn!(session = %state.id(), error = %e, "failed to start conversation");
                self.inner.notice(&mut state, START_FAILED);
            }
        }
    }

    async fn start_auto(&self, token: PlaybackToken, persona: &str) -> Option<PlaybackHandle> {
        let result = self.inner.remote.generate_transcript(persona).await;

        let mut state = self.inner.lock();
        if !token.is_current() {
            tracing::debug!(session = %state.id(), "discarding stale transcript");
            return None;
        }

        let transcript = match result {
            Ok(transcript) => transcript,
            Err(e) => {
                tracing::warn!(session = %state.id(), error = %e, "failed to generate conversation");
                self.inner.notice(&mut state, AUTO_FAILED);
                return None;
            }
        };

        let turns = correlate(self.inner.parser.parse(&transcript.raw), transcript.evidence);
        tracing::info!(
            session = %state.id(),
            turns = turns.len(),
            generation = token.generation(),
            "starting playback"
        );
        drop(state);

        let inner = Arc::clone(&self.inner);
        let emit_token = token.clone();
        let handle = self.inner.scheduler.play(turns, token, move |utterance| {
            let mut state = inner.lock();
            if !emit_token.is_current() {
                return Ok(Delivery::Stale);
            }
            inner
                .deliver(&mut state, utterance, PLAYBACK_FAILED)
                .map(|()| Delivery::Delivered)
        });

        Some(handle)
    }

    /// Speak `text` as the acting speaker and append the other side's answer.
    ///
    /// Blank input is refused before anything is logged or sent.
    pub async fn send_interactive_turn(&self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        let (token, persona, speaker) = {
            let mut state = self.inner.lock();
            if state.mode() != Mode::Interactive {
                return Err(SessionError::NotInteractive);
            }

            let speaker = state.acting_speaker().to_string();
            let authored = Utterance::new(speaker.clone(), text);
            if self.inner.deliver(&mut state, authored, SEND_FAILED).is_err() {
                return Ok(());
            }
            (state.playback_token(), state.persona().to_string(), speaker)
        };

        let result = self.inner.remote.reply(&persona, text, &speaker).await;

        let mut state = self.inner.lock();
        if !token.is_current() {
            tracing::debug!(session = %state.id(), "discarding stale reply");
            return Ok(());
        }

        match result {
            Ok(reply) => {
                let responder = state.counterpart(&speaker).to_string();
                let answer = Utterance::new(responder, reply.text).with_evidence(reply.evidence);
                let _ = self.inner.deliver(&mut state, answer, SEND_FAILED);
            }
            Err(e) => {
                tracing::warn!(session = %state.id(), error = %e, "failed to get reply");
                self.inner.notice(&mut state, SEND_FAILED);
            }
        }
        Ok(())
    }

    /// Swap who the next interactive message is spoken by
    pub fn toggle_speaker(&self) -> Result<String, SessionError> {
        let mut state = self.inner.lock();
        if state.mode() != Mode::Interactive {
            return Err(SessionError::NotInteractive);
        }
        let speaker = state.toggle_speaker().to_string();
        tracing::debug!(session = %state.id(), %speaker, "acting speaker changed");
        Ok(speaker)
    }

    /// Show the evidence behind turn `sequence`.
    ///
    /// Selecting a turn deselects any other. A missing turn or a turn without
    /// evidence clears the panel.
    pub fn inspect(&self, sequence: u64) -> Option<EvidenceRecord> {
        let mut state = self.inner.lock();
        let evidence = state
            .log()
            .get(sequence)
            .and_then(|turn| turn.evidence().cloned());

        state.select(evidence.as_ref().map(|_| sequence));
        self.inner.sink.set_retrieved_info(evidence.as_ref());
        evidence
    }
}
