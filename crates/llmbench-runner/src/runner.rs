use std::sync::Arc;
use std::time::Duration;

use llmbench_core::{
    BenchConfig, BenchError, BenchmarkReport, PromptAggregate, ReportSummary, Result, RunResult,
    WARMUP_PROMPT,
};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::backend::InferenceBackend;
use crate::invoker::{BoundedInvoker, InvokeSettings};

#[derive(Debug, Clone)]
pub enum BenchmarkEvent {
    Warmup { current: u32, total: u32 },
    PromptStarted { index: usize, total: usize, prompt: String },
    RunStarted { run: u32, total: u32 },
    RunCompleted { result: RunResult },
    RunSkipped { run: u32, reason: String },
    PromptCompleted { aggregate: PromptAggregate },
    PromptDropped { prompt: String },
    Done { summary: ReportSummary },
}

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub invoke_timeout: Duration,
    pub warmup_timeout: Duration,
    pub warmup_runs: u32,
}

impl RunnerSettings {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            invoke_timeout: config.benchmark.invoke_timeout(),
            warmup_timeout: config.benchmark.warmup_timeout(),
            warmup_runs: config.benchmark.warmup_runs,
        }
    }
}

struct Events(Option<UnboundedSender<BenchmarkEvent>>);

impl Events {
    // A closed receiver never stops the benchmark
    fn emit(&self, event: BenchmarkEvent) {
        if let Some(tx) = &self.0 {
            let _ = tx.send(event);
        }
    }
}

/// Drives the prompt battery through a [`BoundedInvoker`], one call at a time.
pub struct BenchmarkRunner<B> {
    invoker: BoundedInvoker<B>,
    settings: RunnerSettings,
}

impl<B: InferenceBackend> BenchmarkRunner<B> {
    pub fn new(backend: Arc<B>, config: &BenchConfig) -> Self {
        Self::with_settings(
            BoundedInvoker::new(backend, InvokeSettings::from_config(config)),
            RunnerSettings::from_config(config),
        )
    }

    pub fn with_settings(invoker: BoundedInvoker<B>, settings: RunnerSettings) -> Self {
        Self { invoker, settings }
    }

    pub async fn run(
        &self,
        model: &str,
        prompts: &[String],
        runs_per_prompt: u32,
    ) -> Result<BenchmarkReport> {
        self.run_with_events(model, prompts, runs_per_prompt, None)
            .await
    }

    /// Runs every prompt `runs_per_prompt` times and averages the runs that
    /// completed. Timeouts and backend errors skip the run; they never fail
    /// the benchmark.
    #[instrument(skip(self, model, prompts, events), fields(model = %model, prompts = prompts.len()))]
    pub async fn run_with_events(
        &self,
        model: &str,
        prompts: &[String],
        runs_per_prompt: u32,
        events: Option<UnboundedSender<BenchmarkEvent>>,
    ) -> Result<BenchmarkReport> {
        if runs_per_prompt == 0 {
            return Err(BenchError::Config(
                "runs_per_prompt must be at least 1".to_string(),
            ));
        }

        let events = Events(events);
        info!("Starting benchmark for model: {}", model);

        self.warmup(model, &events).await;

        let mut report = BenchmarkReport::new();
        for (i, prompt) in prompts.iter().enumerate() {
            info!("Test {}/{}: {}", i + 1, prompts.len(), prompt);
            events.emit(BenchmarkEvent::PromptStarted {
                index: i + 1,
                total: prompts.len(),
                prompt: prompt.clone(),
            });

            let runs = self.run_prompt(model, prompt, runs_per_prompt, &events).await;

            match PromptAggregate::from_runs(prompt.as_str(), runs) {
                Some(aggregate) => {
                    info!(
                        avg_duration = aggregate.avg_duration,
                        avg_tps = aggregate.avg_tokens_per_second,
                        "Prompt complete"
                    );
                    events.emit(BenchmarkEvent::PromptCompleted {
                        aggregate: aggregate.clone(),
                    });
                    report.push(aggregate);
                }
                None => {
                    warn!("No successful runs, dropping prompt from report: {}", prompt);
                    events.emit(BenchmarkEvent::PromptDropped {
                        prompt: prompt.clone(),
                    });
                }
            }
        }

        let summary = report.summary();
        info!(
            prompts = summary.prompts,
            runs = summary.runs,
            "Benchmark complete"
        );
        events.emit(BenchmarkEvent::Done { summary });

        Ok(report)
    }

    /// Throwaway calls so the backend reaches steady state. Nothing they
    /// return is recorded.
    async fn warmup(&self, model: &str, events: &Events) {
        let total = self.settings.warmup_runs;
        for i in 0..total {
            tracing::debug!("Warmup run {}/{}", i + 1, total);
            events.emit(BenchmarkEvent::Warmup {
                current: i + 1,
                total,
            });

            if let Err(e) = self
                .invoker
                .invoke(WARMUP_PROMPT, model, self.settings.warmup_timeout)
                .await
            {
                warn!("Warmup run {}/{} failed: {}", i + 1, total, e);
            }
        }
    }

    async fn run_prompt(
        &self,
        model: &str,
        prompt: &str,
        runs_per_prompt: u32,
        events: &Events,
    ) -> Vec<RunResult> {
        let mut runs = Vec::with_capacity(runs_per_prompt as usize);

        for run in 1..=runs_per_prompt {
            info!("Run {}/{}", run, runs_per_prompt);
            events.emit(BenchmarkEvent::RunStarted {
                run,
                total: runs_per_prompt,
            });

            let start = Instant::now();
            match self
                .invoker
                .invoke(prompt, model, self.settings.invoke_timeout)
                .await
            {
                Ok(response) => {
                    let result = RunResult::new(prompt, response, start.elapsed().as_secs_f64());
                    info!(
                        duration_secs = result.duration,
                        tokens = result.tokens,
                        tps = result.tokens_per_second,
                        "Run complete"
                    );
                    events.emit(BenchmarkEvent::RunCompleted {
                        result: result.clone(),
                    });
                    runs.push(result);
                }
                Err(e) => {
                    warn!("Skipping run {}/{}: {}", run, runs_per_prompt, e);
                    events.emit(BenchmarkEvent::RunSkipped {
                        run,
                        reason: e.to_string(),
                    });
                }
            }
        }

        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, Step};
    use llmbench_core::GenerationOptions;
    use tokio::sync::mpsc;

    fn runner(
        backend: Arc<ScriptedBackend>,
        warmup_runs: u32,
    ) -> BenchmarkRunner<ScriptedBackend> {
        let invoker = BoundedInvoker::new(
            backend,
            InvokeSettings {
                pacing: Duration::ZERO,
                load_retry_backoff: Duration::from_secs(5),
                streaming: false,
                options: GenerationOptions::default(),
            },
        );
        BenchmarkRunner::with_settings(
            invoker,
            RunnerSettings {
                invoke_timeout: Duration::from_secs(30),
                warmup_timeout: Duration::from_secs(10),
                warmup_runs,
            },
        )
    }

    fn prompts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 0.01,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_prompts_two_runs() {
        let backend = Arc::new(ScriptedBackend::always(Step::Reply(
            "a b c",
            Duration::from_secs(1),
        )));
        let runner = runner(Arc::clone(&backend), 0);

        let report = runner
            .run("m", &prompts(&["first", "second"]), 2)
            .await
            .unwrap();

        assert_eq!(report.len(), 2);
        assert_eq!(report.results[0].prompt, "first");
        assert_eq!(report.results[1].prompt, "second");
        for aggregate in &report.results {
            assert_eq!(aggregate.runs.len(), 2);
            assert_close(aggregate.avg_duration, 1.0);
            assert_close(aggregate.avg_tokens, 3.0);
            assert_close(aggregate.avg_tokens_per_second, 3.0);
        }
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_average_excludes_failed_runs() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![
                Step::Reply("one two", Duration::from_secs(2)),
                Step::Fail("model not found", Duration::ZERO),
                Step::Hang,
                Step::Reply("one two three four", Duration::from_secs(4)),
            ],
            Step::Hang,
        ));
        let runner = runner(backend, 0);

        let report = runner.run("m", &prompts(&["p"]), 4).await.unwrap();

        let aggregate = &report.results[0];
        assert_eq!(aggregate.runs.len(), 2);
        assert_close(aggregate.avg_duration, 3.0);
        assert_close(aggregate.avg_tokens, 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_without_successes_is_dropped() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![
                Step::Reply("ok", Duration::from_secs(1)),
                Step::Fail("boom", Duration::ZERO),
            ],
            Step::Reply("ok", Duration::from_secs(1)),
        ));
        let runner = runner(backend, 0);

        let report = runner
            .run("m", &prompts(&["a", "b", "c"]), 1)
            .await
            .unwrap();

        let kept: Vec<&str> = report.results.iter().map(|a| a.prompt.as_str()).collect();
        assert_eq!(kept, vec!["a", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_then_success_is_recorded() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Step::Fail("loading model", Duration::ZERO)],
            Step::Reply("x y", Duration::from_secs(1)),
        ));
        let runner = runner(Arc::clone(&backend), 0);

        let report = runner.run("m", &prompts(&["p"]), 1).await.unwrap();

        assert_eq!(report.results[0].runs.len(), 1);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_transient_failure_skips_run() {
        let backend = Arc::new(ScriptedBackend::always(Step::Fail(
            "loading model",
            Duration::ZERO,
        )));
        let runner = runner(Arc::clone(&backend), 0);

        let report = runner.run("m", &prompts(&["p"]), 1).await.unwrap();

        assert!(report.is_empty());
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_results_are_discarded() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![
                Step::Reply("warm warm warm warm", Duration::from_secs(7)),
                Step::Hang,
            ],
            Step::Reply("a b", Duration::from_secs(1)),
        ));
        let runner = runner(Arc::clone(&backend), 2);

        let report = runner.run("m", &prompts(&["p"]), 1).await.unwrap();

        assert_eq!(backend.calls(), 3);
        let aggregate = &report.results[0];
        assert_eq!(aggregate.runs.len(), 1);
        assert_eq!(aggregate.runs[0].response, "a b");
        assert_close(aggregate.avg_duration, 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_runs_rejected() {
        let backend = Arc::new(ScriptedBackend::always(Step::Hang));
        let runner = runner(Arc::clone(&backend), 0);

        let err = runner.run("m", &prompts(&["p"]), 0).await.unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_follow_progress() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Step::Fail("boom", Duration::ZERO)],
            Step::Reply("a", Duration::from_secs(1)),
        ));
        let runner = runner(backend, 1);
        let (tx, mut rx) = mpsc::unbounded_channel();

        runner
            .run_with_events("m", &prompts(&["p"]), 2, Some(tx))
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event {
                BenchmarkEvent::Warmup { .. } => "warmup",
                BenchmarkEvent::PromptStarted { .. } => "prompt",
                BenchmarkEvent::RunStarted { .. } => "run",
                BenchmarkEvent::RunCompleted { .. } => "completed",
                BenchmarkEvent::RunSkipped { .. } => "skipped",
                BenchmarkEvent::PromptCompleted { .. } => "aggregate",
                BenchmarkEvent::PromptDropped { .. } => "dropped",
                BenchmarkEvent::Done { .. } => "done",
            });
        }

        // The warmup call consumes the scripted failure
        assert_eq!(
            names,
            vec!["warmup", "prompt", "run", "completed", "run", "completed", "aggregate", "done"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_does_not_abort() {
        let backend = Arc::new(ScriptedBackend::always(Step::Reply("a", Duration::ZERO)));
        let runner = runner(backend, 0);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let report = runner
            .run_with_events("m", &prompts(&["p", "q"]), 1, Some(tx))
            .await
            .unwrap();
        assert_eq!(report.len(), 2);
    }
}
