//! End-to-end run: Planning → Creating → Assembling → Complete.

use std::fmt;

use tracing::{error, info, warn};

use crate::analyzer::InterfaceAnalyzer;
use crate::assembler::SystemAssembler;
use crate::config::CoreConfig;
use crate::creator::ModuleCreator;
use crate::error::{AssemblyError, CreationError, PlanningError};
use crate::model::{ArtifactSet, Outcome};
use crate::oracle::CodeSynthesisOracle;
use crate::planner::{ARCHITECTURE_TARGET, ArchitecturePlanner};
use crate::runlog::{RUN_LOG_FILE, RunLog};
use crate::sink::{ArtifactKind, ArtifactSink, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Planning,
    Creating,
    Assembling,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Planning => write!(f, "Planning"),
            Phase::Creating => write!(f, "Creating"),
            Phase::Assembling => write!(f, "Assembling"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Planning(#[from] PlanningError),
    #[error(transparent)]
    Creation(#[from] CreationError),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("serialization error: {0}")]
    Serialize(String),
}

pub struct Pipeline<'a, O, A> {
    oracle: &'a O,
    analyzer: &'a A,
    sink: &'a dyn ArtifactSink,
    config: &'a CoreConfig,
    phase: Phase,
}

impl<'a, O, A> Pipeline<'a, O, A>
where
    O: CodeSynthesisOracle,
    A: InterfaceAnalyzer,
{
    pub fn new(oracle: &'a O, analyzer: &'a A, sink: &'a dyn ArtifactSink, config: &'a CoreConfig) -> Self {
        Self { oracle, analyzer, sink, config, phase: Phase::Idle }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        info!(phase = %phase, "Phase started");
        self.phase = phase;
    }

    /// Plan, create and assemble from scratch.
    pub async fn run(&mut self, requirements: &str) -> Result<RunLog, PipelineError> {
        self.enter(Phase::Planning);
        let planner = ArchitecturePlanner::new(self.oracle, self.config);
        let architecture = planner.plan(requirements).await?;
        let json = serde_json::to_string_pretty(&architecture).map_err(|e| PipelineError::Serialize(e.to_string()))?;
        self.sink.put(ARCHITECTURE_TARGET, ArtifactKind::Architecture, &json)?;

        let state = planner.create_module_state(&architecture);
        let log = RunLog::new(requirements, architecture, state);
        self.execute(log).await
    }

    /// Continue a run from its log. Completed modules are kept as they are;
    /// modules interrupted mid-attempt are retried.
    pub async fn resume(&mut self, mut log: RunLog) -> Result<RunLog, PipelineError> {
        let requeued = log.state.requeue_interrupted();
        if !requeued.is_empty() {
            info!(modules = ?requeued, "Requeued interrupted modules");
        }
        log.blocked = None;
        log.assembly = None;
        log.assembly_error = None;
        self.execute(log).await
    }

    async fn execute(&mut self, mut log: RunLog) -> Result<RunLog, PipelineError> {
        self.enter(Phase::Creating);
        let architecture = log.architecture.clone();
        let mut state = log.state.clone();
        let mut creator =
            ModuleCreator::new(self.oracle, self.analyzer, self.config).with_results(std::mem::take(&mut log.modules));

        match creator.create_modules(&architecture, &mut state).await {
            Ok(_) => {}
            Err(CreationError::Blocked(blocked)) => {
                warn!(%blocked, "Failing stuck modules and continuing");
                creator.fail_blocked(&mut state, &blocked);
                log.blocked = Some(blocked);
            }
            Err(err) => {
                error!(error = %err, "Module creation aborted");
                log.state = state;
                log.modules = creator.results().clone();
                self.write_log(&log)?;
                return Err(err.into());
            }
        }
        log.state = state;
        log.modules = creator.results().clone();

        for (name, outcome) in &log.modules {
            if let Outcome::Completed(result) = outcome {
                self.sink.put(name, ArtifactKind::Module, &result.source)?;
            }
        }

        self.enter(Phase::Assembling);
        let assembler = SystemAssembler::new(self.oracle, self.analyzer, self.config);
        match assembler.assemble(&architecture, &log.modules).await {
            Ok(set) => {
                self.write_artifacts(&set)?;
                log.assembly = Some(set);
            }
            Err(AssemblyError::NoCompletedModules) => {
                error!("No completed modules, skipping assembly");
                log.assembly_error = Some(AssemblyError::NoCompletedModules.to_string());
            }
            Err(err) => {
                error!(error = %err, "Assembly aborted");
                log.assembly_error = Some(err.to_string());
                self.write_log(&log)?;
                return Err(err.into());
            }
        }

        self.write_log(&log)?;
        self.enter(Phase::Complete);
        Ok(log)
    }

    fn write_artifacts(&self, set: &ArtifactSet) -> Result<(), SinkError> {
        if let Outcome::Completed(integration) = &set.integration {
            self.sink.put(&integration.file_name, ArtifactKind::Integration, &integration.source)?;
        }
        for test in set.tests.values().filter_map(Outcome::completed) {
            self.sink.put(&test.file_name, ArtifactKind::Test, &test.source)?;
        }
        if let Outcome::Completed(demo) = &set.demo {
            self.sink.put(&demo.file_name, ArtifactKind::Demo, &demo.source)?;
        }
        if let Outcome::Completed(docs) = &set.docs {
            self.sink.put(&docs.file_name, ArtifactKind::Docs, &docs.content)?;
        }
        Ok(())
    }

    fn write_log(&self, log: &RunLog) -> Result<(), PipelineError> {
        let json = log.to_json().map_err(|e| PipelineError::Serialize(e.to_string()))?;
        self.sink.put(RUN_LOG_FILE, ArtifactKind::RunLog, &json)?;
        Ok(())
    }
}
