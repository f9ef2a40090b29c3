use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use llmbench_core::{BenchConfig, BenchError, GenerationOptions, InvokeError, Result};
use tracing::{debug, info, instrument, warn};

use crate::backend::{InferenceBackend, TextStream};

#[derive(Debug, Clone)]
pub struct InvokeSettings {
    /// Sleep before every attempt, the retry included.
    pub pacing: Duration,
    /// Wait before the single retry after a "model loading" failure.
    pub load_retry_backoff: Duration,
    pub streaming: bool,
    pub options: GenerationOptions,
}

impl InvokeSettings {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            pacing: config.benchmark.pacing(),
            load_retry_backoff: config.benchmark.load_retry_backoff(),
            streaming: config.benchmark.streaming,
            options: config.generation.clone(),
        }
    }
}

impl Default for InvokeSettings {
    fn default() -> Self {
        Self::from_config(&BenchConfig::default())
    }
}

enum Attempt {
    Completed(String),
    TimedOut,
    Failed(BenchError),
}

/// Runs one inference call under a wall-clock deadline.
///
/// The call is spawned onto its own task and raced against a timer, so a
/// backend that never yields (or a [`crate::Blocking`] backend stuck in a
/// syscall) cannot hold the benchmark past the deadline. A "model loading"
/// failure is retried once after `load_retry_backoff`; the retry gets a
/// fresh deadline of the same length rather than what is left of the first.
/// Any failure of the retry, a timeout included, is reported as `Failed`.
pub struct BoundedInvoker<B> {
    backend: Arc<B>,
    settings: InvokeSettings,
}

impl<B: InferenceBackend> BoundedInvoker<B> {
    pub fn new(backend: Arc<B>, settings: InvokeSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &InvokeSettings {
        &self.settings
    }

    #[instrument(skip(self, prompt, model), fields(model = %model))]
    pub async fn invoke(
        &self,
        prompt: &str,
        model: &str,
        deadline: Duration,
    ) -> std::result::Result<String, InvokeError> {
        let err = match self.attempt(prompt, model, deadline).await {
            Attempt::Completed(text) => return Ok(text),
            Attempt::TimedOut => {
                warn!("Inference timed out after {:.0} seconds", deadline.as_secs_f64());
                return Err(InvokeError::TimedOut(deadline));
            }
            Attempt::Failed(err) => err,
        };

        warn!(error = %err, "Error during inference");
        if !err.is_model_loading() {
            return Err(InvokeError::Failed(err.to_string()));
        }

        info!(
            backoff_secs = self.settings.load_retry_backoff.as_secs_f64(),
            "Waiting for model to load"
        );
        tokio::time::sleep(self.settings.load_retry_backoff).await;

        match self.attempt(prompt, model, deadline).await {
            Attempt::Completed(text) => Ok(text),
            Attempt::TimedOut => {
                warn!("Retry timed out after {:.0} seconds", deadline.as_secs_f64());
                Err(InvokeError::Failed(format!(
                    "retry timed out after {}s",
                    deadline.as_secs()
                )))
            }
            Attempt::Failed(retry_err) => {
                warn!(error = %retry_err, "Retry failed");
                Err(InvokeError::Failed(retry_err.to_string()))
            }
        }
    }

    async fn attempt(&self, prompt: &str, model: &str, deadline: Duration) -> Attempt {
        if !self.settings.pacing.is_zero() {
            debug!(pacing_ms = self.settings.pacing.as_millis() as u64, "Pacing before request");
            tokio::time::sleep(self.settings.pacing).await;
        }

        let backend = Arc::clone(&self.backend);
        let model = model.to_string();
        let prompt = prompt.to_string();
        let options = self.settings.options.clone();
        let streaming = self.settings.streaming;

        let mut handle = tokio::spawn(async move {
            if streaming {
                let chunks = backend.generate_stream(&model, &prompt, &options).await?;
                collect_stream(chunks).await
            } else {
                backend.generate(&model, &prompt, &options).await
            }
        });

        let outcome = match tokio::time::timeout(deadline, &mut handle).await {
            Ok(Ok(Ok(text))) => Attempt::Completed(text),
            Ok(Ok(Err(err))) => Attempt::Failed(err),
            Ok(Err(join_err)) => Attempt::Failed(BenchError::Backend(format!(
                "inference task failed: {}",
                join_err
            ))),
            Err(_elapsed) => Attempt::TimedOut,
        };

        // Finished tasks ignore the abort; abandoned ones are dropped along
        // with any buffers or connections they still hold.
        handle.abort();
        drop(handle);
        debug!("Released inference attempt");

        outcome
    }
}

/// Concatenates chunks in arrival order. Any chunk error fails the whole call.
async fn collect_stream(mut chunks: TextStream) -> Result<String> {
    let mut text = String::new();
    while let Some(chunk) = chunks.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}
