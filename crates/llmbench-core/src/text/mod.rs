mod types;

pub use types::{count_tokens, throughput, BenchmarkReport, PromptAggregate, ReportSummary, RunResult};
