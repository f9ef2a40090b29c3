pub mod config;
pub mod error;
pub mod model;
pub mod prompts;
pub mod system;
pub mod text;

pub use config::{BenchConfig, BenchmarkConfig, GenerationOptions, OllamaConfig};
pub use error::{BenchError, InvokeError, Result};
pub use model::{ModelTier, ModelTierTable};
pub use prompts::{default_prompts, DEFAULT_PROMPTS, WARMUP_PROMPT};
pub use system::{FixedMemory, MemoryInspector, SysinfoMemory};
pub use text::{
    count_tokens, throughput, BenchmarkReport, PromptAggregate, ReportSummary, RunResult,
};
