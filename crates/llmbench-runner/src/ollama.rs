use std::collections::VecDeque;
use std::fmt::Display;

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use llmbench_core::{BenchError, GenerationOptions, Result};
use serde::{Deserialize, Serialize};

use crate::backend::{InferenceBackend, TextStream};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationOptions,
}

/// Body of a non-streaming reply, and each line of a streaming one.
#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let url = format!("{}/api/tags", self.host);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BenchError::Ollama(format!(
                "Failed to list models: {}",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        Ok(tags.models)
    }

    async fn post_generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/generate", self.host);
        let request = GenerateRequest {
            model,
            prompt,
            stream,
            options,
        };

        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        // Ollama explains failures (including "loading model") in the body
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BenchError::Ollama(format!("{} - {}", status, body)));
        }

        Ok(resp)
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let resp = self.post_generate(model, prompt, options, false).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| BenchError::Http(e.to_string()))?;

        let chunk: GenerateChunk = serde_json::from_str(&body).map_err(|e| {
            BenchError::Http(format!(
                "Failed to parse response: {} - Body: {}",
                e,
                body.chars().take(500).collect::<String>()
            ))
        })?;

        if let Some(error) = chunk.error {
            return Err(BenchError::Ollama(error));
        }

        Ok(chunk.response)
    }

    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TextStream> {
        let resp = self.post_generate(model, prompt, options, true).await?;
        Ok(ndjson_text_stream(resp.bytes_stream()))
    }
}

struct NdjsonState<S> {
    bytes: S,
    buf: Vec<u8>,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl<S> NdjsonState<S> {
    fn drain_lines(&mut self) {
        while !self.finished {
            let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
                return;
            };
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            self.handle_line(&line);
        }
    }

    fn handle_line(&mut self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let chunk: GenerateChunk = match serde_json::from_str(text) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.fail(BenchError::Http(format!("Invalid stream line: {}", e)));
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.fail(BenchError::Ollama(error));
            return;
        }
        if !chunk.response.is_empty() {
            self.pending.push_back(Ok(chunk.response));
        }
        if chunk.done {
            self.finished = true;
        }
    }

    fn fail(&mut self, err: BenchError) {
        self.pending.push_back(Err(err));
        self.finished = true;
    }
}

/// Turns an Ollama NDJSON byte stream into response fragments.
///
/// Lines may be split across network chunks. The stream ends at the first
/// `"done": true` line, or after an error item. A body that ends before the
/// done line yields an error, so a cut-off reply is never taken as complete.
pub fn ndjson_text_stream<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = NdjsonState {
        bytes: bytes.boxed(),
        buf: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    st.buf.extend_from_slice(chunk.as_ref());
                    st.drain_lines();
                }
                Some(Err(e)) => st.fail(BenchError::Http(e.to_string())),
                None => {
                    let tail = std::mem::take(&mut st.buf);
                    st.handle_line(&tail);
                    if !st.finished {
                        st.fail(BenchError::Http(
                            "stream closed before done marker".to_string(),
                        ));
                    }
                }
            }
        }
    })
    .boxed()
}
