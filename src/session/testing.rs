//! In-memory backend and sink for session tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::conversation::{EvidenceRecord, Turn};
use crate::remote::{ChatRequest, RemoteError, RemoteService, Reply, Transcript};

use super::sink::{SinkError, TurnSink};

pub(crate) struct FakeRemote {
    opening: Option<String>,
    transcript: Option<Transcript>,
    reply_evidence: Option<EvidenceRecord>,
    fail_replies: bool,
    transcript_gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<ChatRequest>>,
}

impl FakeRemote {
    pub const OPENING: &'static str = "Fire department, what's your emergency?";

    pub fn new() -> Self {
        Self {
            opening: Some(Self::OPENING.to_string()),
            transcript: Some(Transcript {
                raw: "Operator: What's your address?\n\
                      Bob: 12 Elm Street\n\
                      \n\
                      Operator: Is anyone else inside?\n\
                      Bob: Just my cat"
                    .to_string(),
                evidence: Some(vec![
                    None,
                    Some(EvidenceRecord::Context {
                        context: "Bob lives alone at 12 Elm Street".to_string(),
                    }),
                ]),
            }),
            reply_evidence: None,
            fail_replies: false,
            transcript_gate: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_opening(mut self) -> Self {
        self.opening = None;
        self
    }

    pub fn failing_transcript(mut self) -> Self {
        self.transcript = None;
        self
    }

    pub fn failing_replies(mut self) -> Self {
        self.fail_replies = true;
        self
    }

    pub fn with_reply_evidence(mut self, evidence: EvidenceRecord) -> Self {
        self.reply_evidence = Some(evidence);
        self
    }

    /// Hold `generate_transcript` until the gate is notified
    pub fn gated_transcript(mut self, gate: Arc<Notify>) -> Self {
        self.transcript_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<ChatRequest> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, request: ChatRequest) {
        self.calls.lock().unwrap().push(request);
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn start_conversation(&self, persona: &str) -> Result<Reply, RemoteError> {
        self.record(ChatRequest::interactive_start(persona));
        self.opening
            .clone()
            .map(|text| Reply {
                text,
                evidence: None,
            })
            .ok_or_else(|| RemoteError::Unreachable("connection refused".into()))
    }

    async fn reply(
        &self,
        persona: &str,
        text: &str,
        speaker: &str,
    ) -> Result<Reply, RemoteError> {
        self.record(ChatRequest::interactive(persona, text, speaker));
        if self.fail_replies {
            return Err(RemoteError::Logical("model offline".into()));
        }
        Ok(Reply {
            text: format!("re: {}", text),
            evidence: self.reply_evidence.clone(),
        })
    }

    async fn generate_transcript(&self, persona: &str) -> Result<Transcript, RemoteError> {
        self.record(ChatRequest::auto(persona));
        if let Some(gate) = &self.transcript_gate {
            gate.notified().await;
        }
        self.transcript
            .clone()
            .ok_or_else(|| RemoteError::Unreachable("connection refused".into()))
    }

    async fn persona(&self, name: &str) -> Result<Value, RemoteError> {
        Ok(json!({ "name": name }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SinkEvent {
    Turn(u64, String, String),
    Info(Option<String>),
    Reset,
}

pub(crate) struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
    emits: AtomicUsize,
    fail_on: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            emits: AtomicUsize::new(0),
            fail_on: None,
        }
    }

    /// Refuse the `n`th call to `emit` (1-based)
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::new()
        }
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn turn_events(&self) -> Vec<(u64, String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Turn(seq, speaker, text) => Some((seq, speaker, text)),
                _ => None,
            })
            .collect()
    }
}

impl TurnSink for RecordingSink {
    fn emit(&self, turn: &Turn) -> Result<(), SinkError> {
        let n = self.emits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(n) {
            return Err(SinkError::Closed);
        }
        self.events.lock().unwrap().push(SinkEvent::Turn(
            turn.sequence(),
            turn.speaker().to_string(),
            turn.text().to_string(),
        ));
        Ok(())
    }

    fn set_retrieved_info(&self, evidence: Option<&EvidenceRecord>) {
        self.events
            .lock()
            .unwrap()
            .push(SinkEvent::Info(evidence.map(EvidenceRecord::render)));
    }

    fn reset(&self) {
        self.events.lock().unwrap().push(SinkEvent::Reset);
    }
}
