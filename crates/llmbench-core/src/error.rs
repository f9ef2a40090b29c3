use std::time::Duration;

use thiserror::Error;

/// Substring Ollama puts in its error body while a model is still being
/// paged into memory.
const MODEL_LOADING_MARKER: &str = "loading model";

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("Ollama error: {0}")]
    Ollama(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Memory inspector unavailable: {0}")]
    MemoryInspector(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl BenchError {
    /// True when the backend reported that the model is still loading.
    pub fn is_model_loading(&self) -> bool {
        self.to_string().to_lowercase().contains(MODEL_LOADING_MARKER)
    }
}

pub type Result<T> = std::result::Result<T, BenchError>;

/// Terminal outcome of a single bounded invocation that produced no text.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("inference timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    #[error("inference failed: {0}")]
    Failed(String),
}
