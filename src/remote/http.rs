//! HTTP backend implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::conversation::EvidenceRecord;

use super::{ChatRequest, RemoteError, RemoteService, Reply, Transcript};

/// Talks to the generation backend over JSON/HTTP
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct InteractiveResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    retrieved_info: Option<EvidenceRecord>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AutoResponse {
    #[serde(default)]
    transcript: Option<String>,
    /// Older backends put the transcript here
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    retrieved_info: Option<Vec<Option<EvidenceRecord>>>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpRemote {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                RemoteError::Unreachable(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn classify(&self, err: reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else if err.is_decode() {
            RemoteError::Logical(err.to_string())
        } else {
            RemoteError::Unreachable(err.to_string())
        }
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Unreachable(format!("{}: {}", status, body)));
        }

        response.json().await.map_err(|e| self.classify(e))
    }

    async fn post_chat<T: DeserializeOwned>(&self, request: &ChatRequest) -> Result<T, RemoteError> {
        let url = self.endpoint(&["chat"])?;
        tracing::debug!(%url, mode = ?request.mode, persona = %request.town_person, "posting chat request");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        self.read_json(response).await
    }

    async fn interactive(&self, request: ChatRequest) -> Result<Reply, RemoteError> {
        let body: InteractiveResponse = self.post_chat(&request).await?;

        if let Some(error) = body.error {
            return Err(RemoteError::Logical(error));
        }

        match body.response {
            Some(text) if !text.trim().is_empty() => Ok(Reply {
                text,
                evidence: body.retrieved_info,
            }),
            _ => Err(RemoteError::Logical("response field missing".into())),
        }
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn start_conversation(&self, persona: &str) -> Result<Reply, RemoteError> {
        self.interactive(ChatRequest::interactive_start(persona)).await
    }

    async fn reply(
        &self,
        persona: &str,
        text: &str,
        speaker: &str,
    ) -> Result<Reply, RemoteError> {
        self.interactive(ChatRequest::interactive(persona, text, speaker))
            .await
    }

    async fn generate_transcript(&self, persona: &str) -> Result<Transcript, RemoteError> {
        let body: AutoResponse = self.post_chat(&ChatRequest::auto(persona)).await?;

        if let Some(error) = body.error {
            return Err(RemoteError::Logical(error));
        }

        match body.transcript.or(body.response) {
            Some(raw) if !raw.trim().is_empty() => Ok(Transcript {
                raw,
                evidence: body.retrieved_info,
            }),
            _ => Err(RemoteError::Logical("no transcript received".into())),
        }
    }

    async fn persona(&self, name: &str) -> Result<Value, RemoteError> {
        let url = self.endpoint(&["persona", name])?;
        tracing::debug!(%url, "fetching persona");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        self.read_json(response).await
    }
}
