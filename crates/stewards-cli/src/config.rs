//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use stewards_ai::retry::DEFAULT_MAX_ATTEMPTS;
use stewards_ai::{Extractor, GeminiExtractor, OllamaExtractor, RetryPolicy, gemini, ollama};

use crate::pipeline::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "stewards", version, about = "Extract incident records from stewards documents")]
pub struct Cli {
    /// CSV file that recorded annotations are appended to.
    #[arg(
        long,
        global = true,
        env = "STEWARDS_STORE",
        default_value = "annotations.csv"
    )]
    pub store: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Annotate every pending `.txt` document in a directory.
    Annotate(AnnotateArgs),
    /// Show recorded and pending documents without calling a model.
    Status(InputArgs),
    /// Summarise the incidents recorded so far.
    Report,
}

#[derive(Args, Debug)]
pub struct InputArgs {
    /// Directory of plain-text documents.
    #[arg(long, short, env = "STEWARDS_INPUT")]
    pub input: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Ollama,
    Gemini,
}

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, value_enum, env = "STEWARDS_BACKEND", default_value_t = Backend::Ollama)]
    pub backend: Backend,

    /// Model name; defaults depend on the backend.
    #[arg(long, env = "STEWARDS_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "OLLAMA_URL", default_value = ollama::DEFAULT_URL)]
    pub ollama_url: String,

    /// Falls back to GOOGLE_API_KEY.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    #[arg(long, default_value_t = 0.0)]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    pub request_timeout: u64,

    /// Attempts per document before it is deferred to a later run.
    #[arg(long, env = "STEWARDS_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Seconds to wait between attempts on the same document.
    #[arg(long, value_name = "SECS", env = "STEWARDS_RETRY_COOLDOWN", default_value_t = 10)]
    pub retry_cooldown: u64,

    /// Seconds to wait between documents, to stay under backend rate limits.
    #[arg(
        long,
        value_name = "SECS",
        env = "STEWARDS_INTER_DOCUMENT_COOLDOWN",
        default_value_t = 20
    )]
    pub inter_document_cooldown: u64,
}

impl AnnotateArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_secs(self.retry_cooldown))
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            inter_document_cooldown: Duration::from_secs(self.inter_document_cooldown),
        }
    }

    pub fn build_extractor(&self) -> anyhow::Result<Box<dyn Extractor>> {
        let timeout = Duration::from_secs(self.request_timeout);
        match self.backend {
            Backend::Ollama => {
                let model = self.model.as_deref().unwrap_or(ollama::DEFAULT_MODEL);
                let extractor = OllamaExtractor::new(&self.ollama_url, model, timeout)
                    .context("building Ollama client")?
                    .with_temperature(self.temperature);
                Ok(Box::new(extractor))
            }
            Backend::Gemini => {
                let api_key = self
                    .gemini_api_key
                    .clone()
                    .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
                    .context("the gemini backend needs --gemini-api-key, GEMINI_API_KEY or GOOGLE_API_KEY")?;
                let model = self.model.as_deref().unwrap_or(gemini::DEFAULT_MODEL);
                let extractor = GeminiExtractor::new(&api_key, model, timeout)
                    .context("building Gemini client")?
                    .with_temperature(self.temperature);
                Ok(Box::new(extractor))
            }
        }
    }
}
