//! Script predictor CLI - try a predictor script against an input line
//!
//! Usage:
//!   script-predictor -c '[item + " -la"]' ls          Inline predictor body
//!   script-predictor -f predictor.rhai git ch         Predictor body from a file
//!   script-predictor -f predictor.rhai --json git     Print the package as JSON

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::Parser;
use script_predictor::{
    ClientKind, CommandPredictor, PredictionClient, PredictionContext, PredictorConfig,
    ScriptPredictor,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Evaluate a predictor script against one input line and print the suggestions
#[derive(Parser, Debug)]
#[command(name = "script-predictor")]
struct Args {
    /// Predictor body given inline
    #[arg(short = 'c', long = "command", conflicts_with = "file")]
    command: Option<String>,

    /// File containing the predictor body
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Input line to complete
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    line: Vec<String>,

    /// JSON file with predictor configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the latency warning threshold, in milliseconds
    #[arg(long)]
    slow_threshold_ms: Option<u64>,

    /// Override the context pool capacity
    #[arg(long)]
    pool_capacity: Option<usize>,

    /// Command history entries visible to the script (repeatable)
    #[arg(long = "history")]
    history: Vec<String>,

    /// Print the suggestion package as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn script_source(&self) -> Result<String> {
        match (&self.command, &self.file) {
            (Some(command), _) => Ok(command.clone()),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display())),
            (None, None) => bail!("a predictor body is required: pass -f <file> or -c <body>"),
        }
    }

    fn predictor_config(&self) -> Result<PredictorConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid configuration in {}", path.display()))?
            }
            None => PredictorConfig::default(),
        };
        if let Some(ms) = self.slow_threshold_ms {
            config.slow_threshold = Duration::from_millis(ms);
        }
        if let Some(capacity) = self.pool_capacity {
            config.pool_capacity = capacity;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stdout, so keep tracing on stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .init();

    let args = Args::parse();

    let predictor = ScriptPredictor::builder(args.script_source()?)
        .name("cli")
        .description("Predictor loaded from the command line")
        .config(args.predictor_config()?)
        .build()?;

    let context = PredictionContext::new(args.line.join(" ")).with_history(args.history.clone());
    let client = PredictionClient::new("script-predictor-cli", ClientKind::Terminal);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let package = predictor.get_suggestion(&client, &context, &cancel).await?;
    ctrl_c.abort();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&package)?);
    } else {
        for suggestion in &package.suggestions {
            match &suggestion.tooltip {
                Some(tooltip) => println!("{}\t{}", suggestion.text, tooltip),
                None => println!("{}", suggestion.text),
            }
        }
    }

    Ok(())
}
