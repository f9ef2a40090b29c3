use serde::{Deserialize, Serialize};

/// Word count used as the token estimate for a response.
pub fn count_tokens(response: &str) -> u32 {
    response.split_whitespace().count() as u32
}

/// Tokens per second, or 0 when no measurable time elapsed.
pub fn throughput(tokens: u32, duration_secs: f64) -> f64 {
    if duration_secs <= 0.0 {
        return 0.0;
    }
    tokens as f64 / duration_secs
}

/// One completed inference run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub prompt: String,
    pub response: String,
    pub duration: f64,
    pub tokens: u32,
    pub tokens_per_second: f64,
}

impl RunResult {
    pub fn new(prompt: impl Into<String>, response: impl Into<String>, duration_secs: f64) -> Self {
        let response = response.into();
        let duration = duration_secs.max(0.0);
        let tokens = count_tokens(&response);

        Self {
            prompt: prompt.into(),
            response,
            duration,
            tokens,
            tokens_per_second: throughput(tokens, duration),
        }
    }
}

/// Per-prompt averages over the runs that actually completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptAggregate {
    pub prompt: String,
    pub avg_duration: f64,
    pub avg_tokens: f64,
    pub avg_tokens_per_second: f64,
    pub runs: Vec<RunResult>,
}

impl PromptAggregate {
    /// Returns `None` when no run completed; such prompts are left out of
    /// the report entirely.
    pub fn from_runs(prompt: impl Into<String>, runs: Vec<RunResult>) -> Option<Self> {
        if runs.is_empty() {
            return None;
        }

        let n = runs.len() as f64;
        let avg_duration = runs.iter().map(|r| r.duration).sum::<f64>() / n;
        let avg_tokens = runs.iter().map(|r| r.tokens as f64).sum::<f64>() / n;
        let avg_tokens_per_second = runs.iter().map(|r| r.tokens_per_second).sum::<f64>() / n;

        Some(Self {
            prompt: prompt.into(),
            avg_duration,
            avg_tokens,
            avg_tokens_per_second,
            runs,
        })
    }
}

/// Aggregates for every prompt with at least one completed run, in prompt
/// order. Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BenchmarkReport {
    pub results: Vec<PromptAggregate>,
}

impl BenchmarkReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, aggregate: PromptAggregate) {
        self.results.push(aggregate);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn summary(&self) -> ReportSummary {
        let runs: Vec<&RunResult> = self.results.iter().flat_map(|a| a.runs.iter()).collect();
        let n = runs.len();

        let (avg_duration, avg_tokens_per_second) = if n == 0 {
            (0.0, 0.0)
        } else {
            (
                runs.iter().map(|r| r.duration).sum::<f64>() / n as f64,
                runs.iter().map(|r| r.tokens_per_second).sum::<f64>() / n as f64,
            )
        };

        ReportSummary {
            prompts: self.results.len(),
            runs: n,
            avg_duration,
            avg_tokens_per_second,
        }
    }
}

/// Whole-report figures for console output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub prompts: usize,
    pub runs: usize,
    pub avg_duration: f64,
    pub avg_tokens_per_second: f64,
}
