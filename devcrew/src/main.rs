//! devcrew: requirements document in, tested multi-module project out.
//!
//!   devcrew req.txt                  Plan, build and assemble into ./output
//!   devcrew -i                       Type the requirements, end with END
//!   devcrew --resume output/run_log.json
//!
//! Requires ANTHROPIC_API_KEY (or --api-key / api_key in the config file).

use std::io::BufRead;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use devcrew::llm::LlmClient;
use devcrew::manifest::{self, ENV_TEMPLATE_FILE, REQUIREMENTS_FILE};
use devcrew::settings::{Cli, FileSettings, Resolved, SinkKind};
use devcrew::store::SqliteSink;
use devcrew::summary;
use devcrew::workspace::DirectorySink;
use devcrew_core::{ArtifactKind, ArtifactSink, Pipeline, PythonAnalyzer, RunLog};

/// The sink chosen for this run.
enum Output {
    Dir(DirectorySink),
    Sqlite(SqliteSink),
}

impl Output {
    fn open(settings: &Resolved) -> Result<Self> {
        match settings.sink {
            SinkKind::Dir => Ok(Output::Dir(DirectorySink::create(&settings.output)?)),
            SinkKind::Sqlite => {
                if let Some(parent) = settings.db.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                let project = settings
                    .output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "devcrew".to_string());
                Ok(Output::Sqlite(SqliteSink::open(&settings.db, &project)?))
            }
        }
    }

    fn sink(&self) -> &dyn ArtifactSink {
        match self {
            Output::Dir(dir) => dir as &dyn ArtifactSink,
            Output::Sqlite(db) => db,
        }
    }

    fn files(&self) -> Result<Vec<String>> {
        match self {
            Output::Dir(dir) => Ok(dir.list_files()),
            Output::Sqlite(db) => Ok(db.list(None)?.into_iter().map(|a| format!("{} ({})", a.name, a.kind)).collect()),
        }
    }
}

fn init_logging(json: bool) {
    let json = json || std::env::var("DEVCREW_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "devcrew=info,devcrew_core=info".into());
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Read requirements from stdin until a line containing only `END`.
fn read_interactive() -> Result<String> {
    println!("Enter the requirements. Finish with a line containing END.");
    let mut lines = Vec::new();
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim() == "END" {
            break;
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn read_requirements(settings: &Resolved) -> Result<String> {
    let text = if settings.interactive {
        read_interactive()?
    } else {
        std::fs::read_to_string(&settings.requirements)
            .with_context(|| format!("Can't read requirements from {}", settings.requirements.display()))?
    };
    if text.trim().is_empty() {
        anyhow::bail!("Requirements are empty");
    }
    Ok(text)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let file = FileSettings::load(cli.config.as_deref())?;
    let settings = Resolved::merge(&cli, &file);
    init_logging(settings.log_json);

    let api_key = settings
        .api_key
        .clone()
        .context("No API key: pass --api-key or set ANTHROPIC_API_KEY")?;
    let mut llm = LlmClient::new(api_key)
        .with_model(&settings.model)
        .with_max_tokens(settings.max_tokens);
    if let Some(url) = &settings.api_url {
        llm = llm.with_endpoint(url);
    }
    let analyzer = PythonAnalyzer::new();
    let output = Output::open(&settings)?;

    let mut pipeline = Pipeline::new(&llm, &analyzer, output.sink(), &settings.core);
    let log = match &settings.resume {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("Can't read {}", path.display()))?;
            let log = RunLog::from_json(&text).with_context(|| format!("Invalid run log {}", path.display()))?;
            tracing::info!(system = %log.architecture.system_name, "Resuming run");
            pipeline.resume(log).await?
        }
        None => {
            let requirements = read_requirements(&settings)?;
            tracing::info!(model = %llm.model(), chars = requirements.len(), "Starting run");
            pipeline.run(&requirements).await?
        }
    };

    let sources = manifest::generated_sources(&log);
    if let Some(env) = manifest::env_template(&sources) {
        output.sink().put(ENV_TEMPLATE_FILE, ArtifactKind::Manifest, &env)?;
    }
    if let Some(requirements) = manifest::requirements_txt(&analyzer, &sources) {
        output.sink().put(REQUIREMENTS_FILE, ArtifactKind::Manifest, &requirements)?;
    }

    print!("{}", summary::render(&log, &output.files()?));
    Ok(if log.succeeded() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
