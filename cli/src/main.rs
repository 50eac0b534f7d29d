//! The `nlq` binary turns raw model output into a structured audit-log query.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use nlq_cli::logging::{init_tracing, LogFormat};
use nlq_cli::{build_orchestrator, AppConfig, CliError, Overrides};
use nlq_resilience::acquisition::{synthesize_fallback, CallContext, RawResponse};
use tokio::io::AsyncReadExt;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file with `retry`, `circuit_breaker` and `options` sections
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log line format (logs go to stderr; filter with RUST_LOG)
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse model output into a structured query
    Parse {
        /// File holding the raw model output (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        /// The user's original natural-language question
        #[arg(long)]
        query: String,
        /// Model that produced the output
        #[arg(long, default_value = "gpt-4")]
        model: String,
        /// Conversation session id (random when omitted)
        #[arg(long)]
        session: Option<String>,
        /// Abort the call after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the telemetry snapshot alongside the query
        #[arg(long)]
        metrics: bool,
        #[command(flatten)]
        overrides: OverrideArgs,
    },
    /// Run only the fallback synthesizer
    Fallback {
        /// Raw model output
        #[arg(long, default_value = "")]
        raw: String,
        /// The user's original natural-language question
        #[arg(long)]
        query: String,
    },
    /// Print the effective configuration
    Config {
        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

#[derive(clap::Args, Default)]
struct OverrideArgs {
    /// Override `retry.max_retries`
    #[arg(long)]
    max_retries: Option<u32>,
    /// Override `retry.retry_delay_ms`
    #[arg(long)]
    retry_delay_ms: Option<u64>,
    /// Override `retry.confidence_threshold`
    #[arg(long)]
    threshold: Option<f64>,
    /// Enable re-prompting with the built-in template
    #[arg(long)]
    reprompt: bool,
    /// Override `options.max_raw_length` (0 disables truncation)
    #[arg(long)]
    max_raw_length: Option<usize>,
    /// Disable the fallback synthesizer
    #[arg(long)]
    no_fallback: bool,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            max_retries: args.max_retries,
            retry_delay_ms: args.retry_delay_ms,
            confidence_threshold: args.threshold,
            reprompt: args.reprompt,
            max_raw_length: args.max_raw_length,
            no_fallback: args.no_fallback,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Parse {
            input,
            query,
            model,
            session,
            timeout_ms,
            metrics,
            overrides,
        } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            let raw = read_input(input.as_deref()).await?;
            let session = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            run_parse(&config, raw, &model, &query, &session, timeout_ms, metrics).await?;
        }
        Commands::Fallback { raw, query } => {
            let fallback = synthesize_fallback(&raw, &query);
            println!("{}", serde_json::to_string_pretty(&fallback)?);
        }
        Commands::Config { overrides } => {
            let config = load_config(cli.config.as_deref(), overrides)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>, overrides: OverrideArgs) -> Result<AppConfig, CliError> {
    let config = AppConfig::load(path)?.with_overrides(&overrides.into());
    config.validate()?;
    Ok(config)
}

async fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    if let Some(path) = path {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Could not read input file {}", path.display()));
    }
    let mut content = String::new();
    tokio::io::stdin()
        .read_to_string(&mut content)
        .await
        .context("Could not read model output from stdin")?;
    Ok(content)
}

async fn run_parse(
    config: &AppConfig,
    raw: String,
    model: &str,
    query: &str,
    session: &str,
    timeout_ms: Option<u64>,
    with_metrics: bool,
) -> Result<(), CliError> {
    let orchestrator = build_orchestrator(config)?;
    let ctx = timeout_ms.map_or_else(CallContext::new, |ms| {
        CallContext::new().timeout(Duration::from_millis(ms))
    });

    let cancellation = ctx.cancellation().clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling acquisition");
            cancellation.cancel();
        }
    });

    let response = RawResponse::new(raw, model);
    let outcome = orchestrator
        .acquire(&ctx, Some(&response), model, query, session)
        .await;
    interrupt.abort();
    let acquisition = outcome?;

    tracing::info!(
        tier = ?acquisition.tier,
        confidence = acquisition.confidence,
        elapsed_ms = u64::try_from(acquisition.elapsed.as_millis()).unwrap_or(u64::MAX),
        "Acquired query"
    );

    let output = if with_metrics {
        serde_json::json!({
            "query": acquisition.query,
            "tier": acquisition.tier,
            "strategy": acquisition.strategy,
            "confidence": acquisition.confidence,
            "telemetry": orchestrator.snapshot().to_json(),
        })
    } else {
        serde_json::to_value(&acquisition.query)?
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
