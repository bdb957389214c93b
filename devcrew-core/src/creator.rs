//! Dependency-ordered module creation with validation and bounded retries.
//!
//! Modules are generated one at a time. A module is only scheduled once all
//! of its dependencies are Completed, and its prompt carries the interfaces
//! extracted from those dependencies' accepted source, never the planned ones.

use tracing::{error, info, warn};

use crate::analyzer::InterfaceAnalyzer;
use crate::attempt::AttemptLoop;
use crate::config::CoreConfig;
use crate::error::{BlockedPipelineError, CreationError, PresentationContentViolation, StateError, ValidationError, Violation};
use crate::model::{
    ModuleCreationState, ModuleInterface, ModuleOutcomes, ModuleResult, ModuleSpec, Outcome, SystemArchitecture,
    UnitStatus, ValidationReport,
};
use crate::oracle::{CodeSynthesisOracle, DependencyInterface, OracleRequest, Role};
use crate::validate::{CallTarget, conformance, interface_error, into_result, unanalyzable, unknown_calls};

pub struct ModuleCreator<'a, O, A> {
    oracle: &'a O,
    analyzer: &'a A,
    config: &'a CoreConfig,
    results: ModuleOutcomes,
}

impl<'a, O, A> ModuleCreator<'a, O, A>
where
    O: CodeSynthesisOracle,
    A: InterfaceAnalyzer,
{
    pub fn new(oracle: &'a O, analyzer: &'a A, config: &'a CoreConfig) -> Self {
        Self { oracle, analyzer, config, results: ModuleOutcomes::new() }
    }

    /// Seed with outcomes from an earlier run.
    pub fn with_results(mut self, results: ModuleOutcomes) -> Self {
        self.results = results;
        self
    }

    pub fn results(&self) -> &ModuleOutcomes {
        &self.results
    }

    /// Create every Pending module in dependency order.
    ///
    /// Already Completed modules are left alone and cost no oracle calls, so
    /// calling this again on the same state is a no-op. A module that fails
    /// all attempts is marked Failed and scheduling continues. Returns
    /// `Blocked` when Pending modules remain but none are eligible.
    pub async fn create_modules(
        &mut self,
        architecture: &SystemArchitecture,
        state: &mut ModuleCreationState,
    ) -> Result<ModuleOutcomes, CreationError> {
        let pending = state.modules_with(UnitStatus::Pending).len();
        info!(system = %architecture.system_name, pending, "Creating modules");

        while let Some(name) = state.next_eligible() {
            let spec = architecture
                .module(&name)
                .ok_or_else(|| StateError::UnknownModule(name.clone()))?;
            state.transition(&name, UnitStatus::InProgress)?;
            info!(module = %name, step = state.cursor(), "Module in progress");

            let outcome = self
                .create_one(architecture, spec, state)
                .await
                .map_err(|message| CreationError::Oracle { module: name.clone(), message })?;

            match &outcome {
                Outcome::Completed(result) => {
                    state.complete(&name, result.interface.clone())?;
                    info!(module = %name, retry_count = result.retry_count, "Module completed");
                }
                Outcome::Failed { diagnostics, .. } => {
                    state.transition(&name, UnitStatus::Failed)?;
                    error!(module = %name, problems = diagnostics.len(), "Module failed");
                }
            }
            self.results.insert(name, outcome);
        }

        if state.has_pending() {
            let blocked = state.blocked();
            warn!(%blocked, "No eligible module left");
            return Err(blocked.into());
        }
        Ok(self.results.clone())
    }

    /// Mark the modules named by `blocked` Failed, recording their unmet
    /// dependencies as diagnostics.
    pub fn fail_blocked(&mut self, state: &mut ModuleCreationState, blocked: &BlockedPipelineError) {
        state.fail_blocked(blocked);
        for stuck in &blocked.stuck {
            let diagnostics = stuck
                .unmet
                .iter()
                .map(|dep| match dep.status {
                    Some(status) => format!("dependency {} is {status}", dep.name),
                    None => format!("dependency {} does not exist", dep.name),
                })
                .collect();
            self.results.insert(stuck.module.clone(), Outcome::failed(diagnostics));
        }
    }

    async fn create_one(
        &self,
        architecture: &SystemArchitecture,
        spec: &ModuleSpec,
        state: &ModuleCreationState,
    ) -> Result<Outcome<ModuleResult>, String> {
        let dependencies: Vec<DependencyInterface> = spec
            .dependencies
            .iter()
            .filter_map(|dep| {
                let interface = state.published_interface(dep)?;
                let class_name = architecture.module(dep).map(|m| m.class_name.clone()).unwrap_or_default();
                Some(DependencyInterface { module: dep.clone(), class_name, interface: interface.clone() })
            })
            .collect();

        let request = self.module_request(architecture, spec).with_dependencies(dependencies.clone());
        let attempts = AttemptLoop {
            oracle: self.oracle,
            max_retries: self.config.max_retries,
            language: &self.config.naming.language,
            required: spec.interfaces.iter().map(|s| s.to_string()).collect(),
        };
        let outcome = attempts
            .run(request, |source| self.check_module(spec, &dependencies, source))
            .await?;

        let history = outcome.history;
        Ok(match outcome.result {
            Ok(interface) => Outcome::Completed(ModuleResult {
                name: spec.name.clone(),
                source: outcome.source,
                interface,
                report: ValidationReport { error: None, history },
                retry_count: outcome.retry_count,
            }),
            Err(err) => {
                let interface = self.analyzer.extract(&outcome.source).unwrap_or_default();
                Outcome::Failed {
                    diagnostics: err.problems(),
                    last_attempt: Some(ModuleResult {
                        name: spec.name.clone(),
                        source: outcome.source,
                        interface,
                        report: ValidationReport { error: Some(err), history },
                        retry_count: outcome.retry_count,
                    }),
                }
            }
        })
    }

    /// Validate one candidate: it must be analyzable, free of presentation
    /// content, conform to the planned interface, and call dependencies only
    /// through their published interfaces.
    fn check_module(
        &self,
        spec: &ModuleSpec,
        dependencies: &[DependencyInterface],
        source: &str,
    ) -> Result<ModuleInterface, ValidationError> {
        if source.trim().is_empty() {
            return Err(interface_error(&spec.name, vec![Violation::EmptySource]));
        }
        let analysis = self
            .analyzer
            .analyze(source)
            .map_err(|e| interface_error(&spec.name, vec![unanalyzable(&e)]))?;

        let markers = self.config.presentation.source_markers(&analysis.imports, &analysis.interface);
        if !markers.is_empty() {
            return Err(ValidationError::Presentation(PresentationContentViolation {
                unit: spec.name.clone(),
                markers,
            }));
        }

        let mut violations = conformance(spec, &analysis.interface);
        let targets: Vec<CallTarget<'_>> = dependencies
            .iter()
            .map(|dep| CallTarget {
                label: format!("dependency {} (class {})", dep.module, dep.class_name),
                class_name: &dep.class_name,
                interface: &dep.interface,
            })
            .collect();
        violations.extend(unknown_calls(&analysis, &targets));
        into_result(&spec.name, violations)?;
        Ok(analysis.interface)
    }

    fn module_request(&self, architecture: &SystemArchitecture, spec: &ModuleSpec) -> OracleRequest {
        let naming = &self.config.naming;
        let mut prompt = format!(
            "Write the {language} module `{name}` for the system \"{system}\".\n\n\
             System description: {description}\n\n\
             Module purpose: {purpose}\n\
             Main class: {class}\n",
            language = naming.language,
            name = spec.name,
            system = architecture.system_name,
            description = architecture.description,
            purpose = spec.purpose,
            class = spec.class_name,
        );
        if spec.interfaces.is_empty() {
            prompt.push_str("\nDesign a small, clear public interface for the class.\n");
        } else {
            prompt.push_str("\nThe class MUST expose exactly these methods:\n");
            for sig in &spec.interfaces {
                prompt.push_str(&format!("- {sig}\n"));
            }
        }
        if !spec.dependencies.is_empty() {
            prompt.push_str("\nImport dependencies like this:\n");
            for dep in &spec.dependencies {
                let class = architecture.module(dep).map(|m| m.class_name.as_str()).unwrap_or("");
                prompt.push_str(&format!("from {} import {class}\n", naming.import_name(dep)));
            }
        }
        if !architecture.assembly_instructions.is_empty() {
            prompt.push_str(&format!("\nAssembly notes: {}\n", architecture.assembly_instructions));
        }
        prompt.push_str(
            "\nRules:\n\
             - Business logic only. No user-interface, web or GUI code and no UI framework imports.\n\
             - Annotate parameter and return types.\n\
             - Return the complete module in a single code block.\n",
        );
        OracleRequest::new(Role::ModuleEngineer, spec.name.clone(), prompt)
    }
}
