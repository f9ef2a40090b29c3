use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use llmbench_core::{BenchError, GenerationOptions, Result};

use crate::backend::{InferenceBackend, TextStream};

#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str, Duration),
    Fail(&'static str, Duration),
    Chunks(Vec<std::result::Result<&'static str, &'static str>>),
    /// Yields one chunk, then never produces another.
    Stall(&'static str),
    Hang,
}

/// Plays back a fixed script, one step per call. Once the script runs out
/// every further call repeats `fallback`.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>, fallback: Step) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(Vec::new(), step)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> Step {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        script.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn generate(&self, _: &str, _: &str, _: &GenerationOptions) -> Result<String> {
        match self.next_step() {
            Step::Reply(text, delay) => {
                tokio::time::sleep(delay).await;
                Ok(text.to_string())
            }
            Step::Fail(message, delay) => {
                tokio::time::sleep(delay).await;
                Err(BenchError::Ollama(message.to_string()))
            }
            Step::Chunks(chunks) => {
                let mut text = String::new();
                for chunk in chunks {
                    text.push_str(chunk.map_err(|e| BenchError::Ollama(e.to_string()))?);
                }
                Ok(text)
            }
            Step::Stall(_) | Step::Hang => std::future::pending().await,
        }
    }

    async fn generate_stream(&self, _: &str, _: &str, _: &GenerationOptions) -> Result<TextStream> {
        match self.next_step() {
            Step::Chunks(chunks) => Ok(stream::iter(chunks.into_iter().map(|c| {
                c.map(str::to_string)
                    .map_err(|e| BenchError::Ollama(e.to_string()))
            }))
            .boxed()),
            Step::Reply(text, delay) => {
                tokio::time::sleep(delay).await;
                Ok(stream::once(async move { Ok(text.to_string()) }).boxed())
            }
            Step::Fail(message, delay) => {
                tokio::time::sleep(delay).await;
                Err(BenchError::Ollama(message.to_string()))
            }
            Step::Stall(first) => Ok(stream::once(async move { Ok(first.to_string()) })
                .chain(stream::pending())
                .boxed()),
            Step::Hang => std::future::pending().await,
        }
    }
}
