use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use llmbench_core::{default_prompts, BenchConfig, FixedMemory, MemoryInspector, SysinfoMemory};
use llmbench_runner::{BenchmarkEvent, BenchmarkRunner, JsonReportSink, OllamaClient, ReportSink};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

#[derive(Parser)]
#[command(name = "llmbench")]
#[command(about = "llmbench - latency and throughput benchmark for a local Ollama server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    bench: BenchArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// List models installed on the Ollama server
    Models,

    /// Show host memory, the model it selects, and Ollama connectivity
    Status,
}

#[derive(Args)]
struct BenchArgs {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model to benchmark (default: picked from host memory)
    #[arg(short, long)]
    model: Option<String>,

    /// Runs per prompt
    #[arg(short, long)]
    runs: Option<u32>,

    /// Number of throwaway warmup calls
    #[arg(short, long)]
    warmup: Option<u32>,

    /// Per-call deadline in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Stream responses instead of waiting for the full reply
    #[arg(long)]
    stream: bool,

    /// Directory for the results file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Ollama host URL (default: $OLLAMA_HOST or http://localhost:11434)
    #[arg(long)]
    ollama_host: Option<String>,

    /// Pick the model as if the host had this much memory
    #[arg(long)]
    memory_gb: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.bench)?;

    match cli.command {
        Some(Commands::Models) => cmd_models(&config).await?,
        Some(Commands::Status) => cmd_status(&config, &cli.bench).await?,
        None => cmd_benchmark(&config, &cli.bench).await?,
    }

    Ok(())
}

fn load_config(args: &BenchArgs) -> Result<BenchConfig> {
    let mut config = match &args.config {
        Some(path) => BenchConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => BenchConfig::default(),
    };

    if let Ok(host) = std::env::var("OLLAMA_HOST") {
        config.ollama.host = normalize_host(&host);
    }
    if let Some(host) = &args.ollama_host {
        config.ollama.host = normalize_host(host);
    }
    if let Some(runs) = args.runs {
        config.benchmark.runs_per_prompt = runs;
    }
    if let Some(warmup) = args.warmup {
        config.benchmark.warmup_runs = warmup;
    }
    if let Some(timeout) = args.timeout {
        config.benchmark.invoke_timeout_secs = timeout;
    }
    if args.stream {
        config.benchmark.streaming = true;
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    config.validate()?;
    Ok(config)
}

/// OLLAMA_HOST is often set as a bare `host:port`
fn normalize_host(host: &str) -> String {
    if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    }
}

fn memory_inspector(args: &BenchArgs) -> Box<dyn MemoryInspector> {
    match args.memory_gb {
        Some(gb) => Box::new(FixedMemory((gb * BYTES_PER_GB) as u64)),
        None => Box::new(SysinfoMemory),
    }
}

fn select_model(config: &BenchConfig, args: &BenchArgs) -> Result<String> {
    if let Some(model) = &args.model {
        return Ok(model.clone());
    }

    let total = memory_inspector(args)
        .total_memory_bytes()
        .context("Failed to read host memory")?;
    let model = config.model_tiers.select(total).to_string();
    info!(
        total_gb = total as f64 / BYTES_PER_GB,
        model = %model,
        "Selected model from host memory"
    );
    Ok(model)
}

async fn cmd_benchmark(config: &BenchConfig, args: &BenchArgs) -> Result<()> {
    let model = select_model(config, args)?;
    let client = Arc::new(OllamaClient::new(&config.ollama.host));

    if let Err(e) = client.list_models().await {
        warn!("Ollama not reachable at {}: {}", client.host(), e);
    }

    let prompts = default_prompts();
    println!();
    println!("🔄 Benchmarking {}...", model);
    println!(
        "  Prompts: {}  Runs: {}  Warmup: {}  Timeout: {}s",
        prompts.len(),
        config.benchmark.runs_per_prompt,
        config.benchmark.warmup_runs,
        config.benchmark.invoke_timeout_secs
    );

    let runner = BenchmarkRunner::new(client, config);
    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(rx));

    let report = runner
        .run_with_events(&model, &prompts, config.benchmark.runs_per_prompt, Some(tx))
        .await?;
    printer.await?;

    let sink = JsonReportSink::new(&config.output_dir);
    let path = sink
        .write(&report, &model, Local::now())
        .context("Failed to write benchmark results")?;

    println!();
    println!("💾 Results saved to {}", path.display());
    Ok(())
}

async fn print_events(mut rx: UnboundedReceiver<BenchmarkEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            BenchmarkEvent::Warmup { current, total } => {
                println!("Warmup {}/{}", current, total);
            }
            BenchmarkEvent::PromptStarted {
                index,
                total,
                prompt,
            } => {
                println!();
                println!("📝 Test {}/{}: {}", index, total, prompt);
            }
            BenchmarkEvent::RunStarted { run, total } => {
                println!();
                println!("🔄 Run {}/{}", run, total);
                println!("Starting inference...");
            }
            BenchmarkEvent::RunCompleted { result } => {
                println!("✓ Response: {}", result.response);
                println!("⏱️ Time: {:.2}s", result.duration);
                println!("📊 Tokens/sec: {:.2}", result.tokens_per_second);
            }
            BenchmarkEvent::RunSkipped { reason, .. } => {
                println!("⚠️ {}", reason);
                println!("Skipping this run due to error");
            }
            BenchmarkEvent::PromptCompleted { aggregate } => {
                println!();
                println!("📊 Average for prompt:");
                println!("⏱️ Time: {:.2}s", aggregate.avg_duration);
                println!("📊 Tokens/sec: {:.2}", aggregate.avg_tokens_per_second);
            }
            BenchmarkEvent::PromptDropped { prompt } => {
                println!();
                println!("⚠️ No successful runs for: {}", prompt);
            }
            BenchmarkEvent::Done { summary } => {
                println!();
                println!("Results:");
                println!("{:-<40}", "");
                println!("  Prompts:       {}", summary.prompts);
                println!("  Runs:          {}", summary.runs);
                println!("  Avg Time:      {:.2} s", summary.avg_duration);
                println!("  Avg TPS:       {:.2} tokens/sec", summary.avg_tokens_per_second);
            }
        }
    }
}

async fn cmd_models(config: &BenchConfig) -> Result<()> {
    let client = OllamaClient::new(&config.ollama.host);
    let models = client.list_models().await?;

    println!();
    println!("Available Models:");
    println!("{:-<60}", "");
    println!("  {:<4} {:<40} {}", "#", "ID", "Size (GB)");
    println!("{:-<60}", "");
    for (i, m) in models.iter().enumerate() {
        println!(
            "  {:<4} {:<40} {:.1}",
            i + 1,
            m.name,
            m.size as f64 / BYTES_PER_GB
        );
    }
    println!();

    Ok(())
}

async fn cmd_status(config: &BenchConfig, args: &BenchArgs) -> Result<()> {
    println!("System Status:");
    println!("{:-<40}", "");

    let total = memory_inspector(args)
        .total_memory_bytes()
        .context("Failed to read host memory")?;
    println!("  Memory: {:.1} GB", total as f64 / BYTES_PER_GB);
    println!("  Model: {}", select_model(config, args)?);
    println!("  Ollama Host: {}", config.ollama.host);

    let client = OllamaClient::new(&config.ollama.host);
    match client.list_models().await {
        Ok(models) => {
            println!("  Ollama: connected ({} models available)", models.len());
        }
        Err(e) => {
            println!("  Ollama: disconnected ({})", e);
        }
    }

    Ok(())
}
