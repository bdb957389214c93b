//! Command-line flags, the config file, and how they combine.
//!
//! Config file lives at `~/.config/devcrew/config.toml` unless `--config`
//! points elsewhere. Precedence: CLI flags > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use devcrew_core::{CoreConfig, PresentationPolicy, TargetNaming};

use crate::llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};

pub const DEFAULT_REQUIREMENTS: &str = "req.txt";
pub const DEFAULT_OUTPUT: &str = "output";
pub const DEFAULT_DB: &str = "devcrew.db";

/// Where generated artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Files under the output directory.
    Dir,
    /// Rows in a SQLite archive.
    Sqlite,
}

#[derive(Parser, Debug, Default)]
#[command(name = "devcrew", about = "Turn a requirements document into a tested multi-module project")]
pub struct Cli {
    /// Requirements document
    #[arg(default_value = DEFAULT_REQUIREMENTS)]
    pub requirements: PathBuf,

    /// Type the requirements instead; finish with a line containing END
    #[arg(short, long)]
    pub interactive: bool,

    /// Output directory for the generated project
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (default: ~/.config/devcrew/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Claude model to use
    #[arg(long)]
    pub model: Option<String>,

    /// Max tokens per reply
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Messages API endpoint (proxies, gateways)
    #[arg(long)]
    pub api_url: Option<String>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Artifact sink
    #[arg(long, value_enum)]
    pub sink: Option<SinkKind>,

    /// SQLite archive path (default: <output>/devcrew.db)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Retries after the first attempt per module
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Retries after the first attempt per assembly step
    #[arg(long)]
    pub assembly_max_retries: Option<u32>,

    /// Continue from a previous run_log.json
    #[arg(long)]
    pub resume: Option<PathBuf>,

    /// Emit JSON logs
    #[arg(long)]
    pub log_json: bool,
}

/// User configuration (config.toml). Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileSettings {
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub output: Option<PathBuf>,
    pub sink: Option<SinkKind>,
    pub db: Option<PathBuf>,
    pub max_retries: Option<u32>,
    pub assembly_max_retries: Option<u32>,
    pub requirements_char_limit: Option<usize>,
    pub log_json: Option<bool>,
    pub presentation: Option<PresentationPolicy>,
    pub naming: Option<TargetNaming>,
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("devcrew")
        .join("config.toml")
}

impl FileSettings {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    /// An explicit path must exist; the default path is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(p) => (p.to_path_buf(), true),
            None => (default_config_path(), false),
        };
        if !path.exists() {
            if required {
                anyhow::bail!("Config file {} not found", path.display());
            }
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path).with_context(|| format!("Can't read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("In {}", path.display()))
    }
}

/// Effective settings after merging.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub requirements: PathBuf,
    pub interactive: bool,
    pub resume: Option<PathBuf>,
    pub output: PathBuf,
    pub sink: SinkKind,
    pub db: PathBuf,
    pub model: String,
    pub max_tokens: u32,
    pub api_key: Option<String>,
    /// `None` keeps the client's default endpoint.
    pub api_url: Option<String>,
    pub log_json: bool,
    pub core: CoreConfig,
}

impl Resolved {
    /// Merge: CLI overrides > config file > defaults.
    pub fn merge(cli: &Cli, file: &FileSettings) -> Self {
        let output = cli
            .output
            .clone()
            .or_else(|| file.output.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
        let db = cli
            .db
            .clone()
            .or_else(|| file.db.clone())
            .unwrap_or_else(|| output.join(DEFAULT_DB));

        let defaults = CoreConfig::default();
        let core = CoreConfig {
            max_retries: cli.max_retries.or(file.max_retries).unwrap_or(defaults.max_retries),
            assembly_max_retries: cli
                .assembly_max_retries
                .or(file.assembly_max_retries)
                .unwrap_or(defaults.assembly_max_retries),
            requirements_char_limit: file.requirements_char_limit.unwrap_or(defaults.requirements_char_limit),
            presentation: file.presentation.clone().unwrap_or(defaults.presentation),
            naming: file.naming.clone().unwrap_or(defaults.naming),
        };

        Self {
            requirements: cli.requirements.clone(),
            interactive: cli.interactive,
            resume: cli.resume.clone(),
            output,
            sink: cli.sink.or(file.sink).unwrap_or(SinkKind::Dir),
            db,
            model: cli
                .model
                .clone()
                .or_else(|| file.model.clone())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: cli.max_tokens.or(file.max_tokens).unwrap_or(DEFAULT_MAX_TOKENS),
            api_key: cli.api_key.clone().or_else(|| file.api_key.clone()),
            api_url: cli.api_url.clone().or_else(|| file.api_url.clone()),
            log_json: cli.log_json || file.log_json.unwrap_or(false),
            core,
        }
    }
}
