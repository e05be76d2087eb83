//! Command-line entry point: argument validation, credential loading, and
//! input-source selection around the streaming pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use secrecy::SecretString;
use tokio::fs::File;
use tokio::io::BufReader;

use address_validator::error::AppError;
use address_validator::logging;
use address_validator::pipeline::Pipeline;
use address_validator::provider::{Byteplant, Provider};

#[derive(Parser)]
#[command(
    name = "address-validator",
    version,
    about = "Streams postal address records through an address verification service"
)]
struct Cli {
    /// Input source
    #[arg(short, long, value_enum, default_value = "stdin")]
    input: InputSource,

    /// Input file. Required when --input=csv
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "byteplant")]
    provider: ProviderKind,

    /// Environment variable holding the provider's API key
    #[arg(short = 'k', long)]
    api_key_env_var: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum InputSource {
    Stdin,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Byteplant,
}

/// Input source with cross-flag constraints already checked.
#[derive(Debug, PartialEq, Eq)]
enum ResolvedInput {
    Stdin,
    Csv(PathBuf),
}

impl Cli {
    /// Checks the flag combinations clap cannot express on its own.
    fn resolve_input(&self) -> Result<ResolvedInput, AppError> {
        match (self.input, &self.file) {
            (InputSource::Csv, Some(path)) => Ok(ResolvedInput::Csv(path.clone())),
            (InputSource::Csv, None) => Err(AppError::FileArgMissing),
            (InputSource::Stdin, Some(_)) => Err(AppError::FileArgForbidden),
            (InputSource::Stdin, None) => Ok(ResolvedInput::Stdin),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    let input = cli.resolve_input()?;

    let api_key = std::env::var(&cli.api_key_env_var)
        .map(SecretString::from)
        .map_err(|_| AppError::ApiKeyEnvVarNotSet(cli.api_key_env_var.clone()))?;

    let provider: Arc<dyn Provider> = match cli.provider {
        ProviderKind::Byteplant => Arc::new(Byteplant::new(api_key)?),
    };

    let pipeline = Pipeline::new(provider);
    let stdout = tokio::io::stdout();

    match input {
        ResolvedInput::Stdin => {
            pipeline
                .run(BufReader::new(tokio::io::stdin()), stdout)
                .await?;
        }
        ResolvedInput::Csv(path) => {
            let file = File::open(&path)
                .await
                .with_context(|| format!("Failed to open input file {}", path.display()))?;
            pipeline.run(BufReader::new(file), stdout).await?;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
