use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BenchError, ModelTierTable, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub generation: GenerationOptions,
    #[serde(default)]
    pub model_tiers: ModelTierTable,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            ollama: OllamaConfig::default(),
            benchmark: BenchmarkConfig::default(),
            generation: GenerationOptions::default(),
            model_tiers: ModelTierTable::default(),
            output_dir: default_output_dir(),
        }
    }
}

impl BenchConfig {
    /// Read a JSON config file. Absent sections fall back to their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.benchmark.runs_per_prompt == 0 {
            return Err(BenchError::Config(
                "runs_per_prompt must be at least 1".to_string(),
            ));
        }
        if self.benchmark.invoke_timeout_secs == 0 {
            return Err(BenchError::Config(
                "invoke_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    pub runs_per_prompt: u32,
    pub warmup_runs: u32,
    pub invoke_timeout_secs: u64,
    pub warmup_timeout_secs: u64,
    pub pacing_ms: u64,
    pub load_retry_backoff_secs: u64,
    pub streaming: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            runs_per_prompt: 2,
            warmup_runs: 0,
            invoke_timeout_secs: 30,
            warmup_timeout_secs: 10,
            pacing_ms: 2000,
            load_retry_backoff_secs: 5,
            streaming: false,
        }
    }
}

impl BenchmarkConfig {
    pub fn invoke_timeout(&self) -> Duration {
        Duration::from_secs(self.invoke_timeout_secs)
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_secs(self.warmup_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn load_retry_backoff(&self) -> Duration {
        Duration::from_secs(self.load_retry_backoff_secs)
    }
}

/// Sampling options forwarded verbatim to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub num_ctx: u32,
    pub repeat_penalty: f32,
    pub num_predict: u32,
    pub top_k: u32,
    pub top_p: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            num_ctx: 2048,
            repeat_penalty: 1.1,
            num_predict: 256,
            top_k: 40,
            top_p: 0.9,
        }
    }
}
