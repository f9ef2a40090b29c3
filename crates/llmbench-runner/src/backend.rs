use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use llmbench_core::{BenchError, GenerationOptions, Result};
use tokio::sync::oneshot;

/// Ordered, non-restartable sequence of response fragments.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait InferenceBackend: Send + Sync + 'static {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;

    /// Backends without native streaming yield the whole response as one chunk.
    async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<TextStream> {
        let text = self.generate(model, prompt, options).await?;
        Ok(stream::once(async move { Ok(text) }).boxed())
    }
}

/// A synchronous backend call that may block its thread for an unbounded time.
pub trait BlockingBackend: Send + Sync + 'static {
    fn generate_blocking(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String>;
}

impl<F> BlockingBackend for F
where
    F: Fn(&str, &str, &GenerationOptions) -> Result<String> + Send + Sync + 'static,
{
    fn generate_blocking(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        self(model, prompt, options)
    }
}

/// Adapts a [`BlockingBackend`] so it can be raced against a deadline.
///
/// Each call runs on its own detached OS thread and reports back over a
/// oneshot channel. If the awaiting task is abandoned the receiver is dropped
/// and whatever the thread eventually produces is discarded.
pub struct Blocking<B> {
    inner: Arc<B>,
}

impl<B: BlockingBackend> Blocking<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[async_trait]
impl<B: BlockingBackend> InferenceBackend for Blocking<B> {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let model = model.to_string();
        let prompt = prompt.to_string();
        let options = options.clone();

        thread::Builder::new()
            .name("llmbench-blocking-call".to_string())
            .spawn(move || {
                let _ = tx.send(inner.generate_blocking(&model, &prompt, &options));
            })?;

        rx.await.map_err(|_| {
            BenchError::Backend("blocking call exited without a result".to_string())
        })?
    }
}
