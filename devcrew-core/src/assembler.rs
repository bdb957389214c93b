//! System assembly: integration, per-module tests, demo and documentation
//! over the Completed modules.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::analyzer::{InterfaceAnalyzer, SourceAnalysis};
use crate::attempt::{AttemptLoop, AttemptOutcome};
use crate::config::CoreConfig;
use crate::error::{AssemblyError, PresentationContentViolation, ValidationError, Violation};
use crate::model::{
    ArtifactSet, DemoArtifact, DependencyGraph, DocArtifact, IntegrationArtifact, ModuleOutcomes,
    ModuleResult, Omission, Outcome, SystemArchitecture, TestArtifact, ValidationReport,
};
use crate::oracle::{CodeSynthesisOracle, DependencyInterface, OracleRequest, Role};
use crate::validate::{CallResolver, CallTarget, interface_error, into_result, unanalyzable, unknown_calls};

/// Completed modules that take part in assembly, with the reason every
/// other module was left out.
#[derive(Debug)]
struct Selection<'m> {
    included: Vec<(&'m str, &'m ModuleResult)>,
    omitted: Vec<Omission>,
}

pub struct SystemAssembler<'a, O, A> {
    oracle: &'a O,
    analyzer: &'a A,
    config: &'a CoreConfig,
}

impl<'a, O, A> SystemAssembler<'a, O, A>
where
    O: CodeSynthesisOracle,
    A: InterfaceAnalyzer,
{
    pub fn new(oracle: &'a O, analyzer: &'a A, config: &'a CoreConfig) -> Self {
        Self { oracle, analyzer, config }
    }

    /// Assemble the Completed modules. Failed modules, and Completed modules
    /// that depend on them, are omitted and recorded rather than raised.
    pub async fn assemble(
        &self,
        architecture: &SystemArchitecture,
        modules: &ModuleOutcomes,
    ) -> Result<ArtifactSet, AssemblyError> {
        let selection = select(architecture, modules);
        if selection.included.is_empty() {
            return Err(AssemblyError::NoCompletedModules);
        }
        for omission in &selection.omitted {
            warn!(module = %omission.module, reason = %omission.reason, "Module omitted from assembly");
        }
        info!(
            system = %architecture.system_name,
            included = selection.included.len(),
            omitted = selection.omitted.len(),
            "Assembling system"
        );

        let integration = self.integration(architecture, &selection).await?;

        let mut tests = BTreeMap::new();
        for (name, result) in &selection.included {
            let outcome = self.tests_for(architecture, name, result).await?;
            tests.insert(name.to_string(), outcome);
        }

        let demo = match &integration {
            Outcome::Completed(artifact) => self.demo(architecture, artifact).await?,
            Outcome::Failed { .. } => {
                warn!("Skipping demo, integration failed");
                Outcome::failed(vec!["skipped: integration failed".to_string()])
            }
        };

        let docs = self.docs(architecture, &selection).await?;

        Ok(ArtifactSet {
            included: selection.included.iter().map(|(n, _)| n.to_string()).collect(),
            omitted: selection.omitted,
            integration,
            tests,
            demo,
            docs,
        })
    }

    fn attempts(&self, required: Vec<String>) -> AttemptLoop<'a, O> {
        AttemptLoop {
            oracle: self.oracle,
            max_retries: self.config.assembly_max_retries,
            language: &self.config.naming.language,
            required,
        }
    }

    fn analyze(&self, unit: &str, source: &str) -> Result<SourceAnalysis, ValidationError> {
        if source.trim().is_empty() {
            return Err(interface_error(unit, vec![Violation::EmptySource]));
        }
        self.analyzer
            .analyze(source)
            .map_err(|e| interface_error(unit, vec![unanalyzable(&e)]))
    }

    async fn integration(
        &self,
        architecture: &SystemArchitecture,
        selection: &Selection<'_>,
    ) -> Result<Outcome<IntegrationArtifact>, AssemblyError> {
        let naming = &self.config.naming;
        let file_name = naming.integration_file.clone();
        let class_name = architecture.integration_class_name();
        info!(unit = %file_name, class = %class_name, "Generating integration");

        let dependencies: Vec<DependencyInterface> = selection
            .included
            .iter()
            .map(|(name, result)| DependencyInterface {
                module: name.to_string(),
                class_name: class_of(architecture, name),
                interface: result.interface.clone(),
            })
            .collect();

        let mut prompt = format!(
            "Write `{file_name}` for the {language} system \"{system}\".\n\n\
             It must define the class `{class_name}` that wires the modules below together, \
             in this dependency order, and exposes public methods for every user-facing operation.\n\n",
            language = naming.language,
            system = architecture.system_name,
        );
        for dep in &dependencies {
            prompt.push_str(&format!("from {} import {}\n", naming.import_name(&dep.module), dep.class_name));
        }
        if !architecture.assembly_instructions.is_empty() {
            prompt.push_str(&format!("\nAssembly notes: {}\n", architecture.assembly_instructions));
        }
        if !selection.omitted.is_empty() {
            let names: Vec<&str> = selection.omitted.iter().map(|o| o.module.as_str()).collect();
            prompt.push_str(&format!("\nThese modules are NOT available, do not import them: {}\n", names.join(", ")));
        }
        prompt.push_str(
            "\nCall modules only through the methods listed below. \
             No user-interface code. Return the complete file in a single code block.\n",
        );
        let request =
            OracleRequest::new(Role::Integrator, file_name.clone(), prompt).with_dependencies(dependencies.clone());

        let targets: Vec<CallTarget<'_>> = dependencies
            .iter()
            .map(|dep| CallTarget {
                label: format!("module {} (class {})", dep.module, dep.class_name),
                class_name: &dep.class_name,
                interface: &dep.interface,
            })
            .collect();
        let omitted: Vec<&str> = selection.omitted.iter().map(|o| naming.import_name(&o.module)).collect();

        let outcome = self
            .attempts(vec![format!("class {class_name}")])
            .run(request, |source| {
                let analysis = self.analyze(&file_name, source)?;
                let markers = self.config.presentation.source_markers(&analysis.imports, &analysis.interface);
                if !markers.is_empty() {
                    return Err(ValidationError::Presentation(PresentationContentViolation {
                        unit: file_name.clone(),
                        markers,
                    }));
                }
                let mut violations = Vec::new();
                if !analysis.interface.has_class(&class_name) {
                    violations.push(Violation::MissingClass { class: class_name.clone() });
                }
                for import in &analysis.imports {
                    let root = import.split('.').next().unwrap_or(import);
                    if omitted.contains(&root) {
                        violations.push(Violation::Requirement {
                            detail: format!("imports omitted module `{root}`"),
                        });
                    }
                }
                violations.extend(unknown_calls(&analysis, &targets));
                into_result(&file_name, violations)?;
                Ok(analysis.interface)
            })
            .await
            .map_err(|message| AssemblyError::Oracle { step: "integration".into(), message })?;

        let modules: Vec<String> = selection.included.iter().map(|(n, _)| n.to_string()).collect();
        Ok(finish(&file_name, outcome, |source, interface, report, retry_count| {
            let interface = interface.unwrap_or_else(|| self.analyzer.extract(&source).unwrap_or_default());
            IntegrationArtifact {
                file_name: file_name.clone(),
                class_name: class_name.clone(),
                source,
                interface,
                modules,
                report,
                retry_count,
            }
        }))
    }

    async fn tests_for(
        &self,
        architecture: &SystemArchitecture,
        module: &str,
        result: &ModuleResult,
    ) -> Result<Outcome<TestArtifact>, AssemblyError> {
        let naming = &self.config.naming;
        let file_name = naming.test_file(module);
        let class_name = class_of(architecture, module);
        info!(unit = %file_name, module, "Generating tests");

        let dependency = DependencyInterface {
            module: module.to_string(),
            class_name: class_name.clone(),
            interface: result.interface.clone(),
        };
        let prompt = format!(
            "Write a unittest suite `{file_name}` for the {language} module `{module}`.\n\
             Import it with `from {import} import {class_name}`.\n\
             Cover each public method, including edge cases. Test functions or methods must be named test_*.\n\
             Use only the methods listed below. Return the complete file in a single code block.\n",
            language = naming.language,
            import = naming.import_name(module),
        );
        let request =
            OracleRequest::new(Role::TestEngineer, file_name.clone(), prompt).with_dependencies(vec![dependency.clone()]);
        let target = [CallTarget {
            label: format!("module {module} (class {class_name})"),
            class_name: &dependency.class_name,
            interface: &dependency.interface,
        }];

        let outcome = self
            .attempts(vec![])
            .run(request, |source| {
                let analysis = self.analyze(&file_name, source)?;
                let mut violations = Vec::new();
                let has_test = analysis.interface.signatures.iter().any(|s| s.name.starts_with("test"));
                if !has_test {
                    violations.push(Violation::Requirement { detail: "no test_* functions or methods".into() });
                }
                if !source.contains(class_name.as_str()) {
                    violations.push(Violation::Requirement {
                        detail: format!("does not reference class `{class_name}`"),
                    });
                }
                violations.extend(unknown_calls(&analysis, &target));
                into_result(&file_name, violations)
            })
            .await
            .map_err(|message| AssemblyError::Oracle { step: format!("tests for {module}"), message })?;

        Ok(finish(&file_name, outcome, |source, _, report, retry_count| TestArtifact {
            module: module.to_string(),
            file_name: file_name.clone(),
            source,
            report,
            retry_count,
        }))
    }

    async fn demo(
        &self,
        architecture: &SystemArchitecture,
        integration: &IntegrationArtifact,
    ) -> Result<Outcome<DemoArtifact>, AssemblyError> {
        let naming = &self.config.naming;
        let file_name = naming.demo_file.clone();
        let class_name = integration.class_name.as_str();
        info!(unit = %file_name, "Generating demo");

        let entry_points: Vec<String> = integration
            .interface
            .methods_of(class_name)
            .map(|s| s.to_string())
            .collect();
        let prompt = format!(
            "Write `{file_name}`, a small interactive demo for \"{system}\".\n\
             Import the system with `from {import} import {class_name}` and drive it ONLY through \
             the `{class_name}` methods listed below. Do not use the underlying modules directly.\n\
             A user-interface framework may be used here. Return the complete file in a single code block.\n",
            system = architecture.system_name,
            import = naming.import_name(&integration.file_name),
        );
        let request = OracleRequest::new(Role::DemoEngineer, file_name.clone(), prompt).with_dependencies(vec![
            DependencyInterface {
                module: integration.file_name.clone(),
                class_name: class_name.to_string(),
                interface: integration.interface.clone(),
            },
        ]);

        let target = [CallTarget {
            label: format!("the integration class {class_name}"),
            class_name,
            interface: &integration.interface,
        }];
        let module_classes: BTreeSet<&str> = integration
            .modules
            .iter()
            .filter_map(|m| architecture.module(m))
            .map(|m| m.class_name.as_str())
            .collect();

        let outcome = self
            .attempts(entry_points)
            .run(request, |source| {
                let analysis = self.analyze(&file_name, source)?;
                let mut violations = Vec::new();
                if !source.contains(class_name) {
                    violations.push(Violation::Requirement {
                        detail: format!("does not use the integration class `{class_name}`"),
                    });
                }
                let resolver = CallResolver::new(&analysis);
                let mut direct = BTreeSet::new();
                for call in &analysis.member_calls {
                    let class = resolver.resolve(&call.receiver);
                    if module_classes.contains(class) && direct.insert(format!("{}.{}()", call.receiver, call.method)) {
                        violations.push(Violation::Requirement {
                            detail: format!(
                                "`{}.{}()` calls module class {class} directly; go through {class_name}",
                                call.receiver, call.method
                            ),
                        });
                    }
                }
                violations.extend(unknown_calls(&analysis, &target));
                into_result(&file_name, violations)
            })
            .await
            .map_err(|message| AssemblyError::Oracle { step: "demo".into(), message })?;

        Ok(finish(&file_name, outcome, |source, _, report, retry_count| DemoArtifact {
            file_name: file_name.clone(),
            source,
            report,
            retry_count,
        }))
    }

    /// Single best-effort call; only an empty reply fails.
    async fn docs(
        &self,
        architecture: &SystemArchitecture,
        selection: &Selection<'_>,
    ) -> Result<Outcome<DocArtifact>, AssemblyError> {
        let naming = &self.config.naming;
        let file_name = naming.docs_file.clone();
        info!(unit = %file_name, "Generating documentation");

        let mut prompt = format!(
            "Write {file_name} in Markdown for \"{system}\".\n\n{description}\n\nModules:\n",
            system = architecture.system_name,
            description = architecture.description,
        );
        for (name, _) in &selection.included {
            let purpose = architecture.module(name).map(|m| m.purpose.as_str()).unwrap_or("");
            prompt.push_str(&format!("- {name} ({}): {purpose}\n", class_of(architecture, name)));
        }
        prompt.push_str(&format!(
            "\nCover installation, running `{}`, running the tests and how the modules fit together.\n",
            naming.demo_file
        ));

        let request = OracleRequest::new(Role::TechnicalWriter, file_name.clone(), prompt);
        let reply = self
            .oracle
            .synthesize(&request)
            .await
            .map_err(|e| AssemblyError::Oracle { step: "documentation".into(), message: format!("{e:#}") })?;
        let content = reply.trim().to_string();
        if content.is_empty() {
            warn!(unit = %file_name, "Documentation reply was empty");
            return Ok(Outcome::failed(vec!["documentation reply was empty".into()]));
        }
        Ok(Outcome::Completed(DocArtifact { file_name, content: format!("{content}\n") }))
    }
}

fn class_of(architecture: &SystemArchitecture, module: &str) -> String {
    architecture.module(module).map(|m| m.class_name.clone()).unwrap_or_default()
}

/// Split module outcomes into the assembled set and the omissions.
fn select<'m>(architecture: &SystemArchitecture, modules: &'m ModuleOutcomes) -> Selection<'m> {
    let graph = DependencyGraph::from_architecture(architecture);
    let failed: BTreeSet<String> = graph
        .names()
        .filter(|n| !modules.get(*n).is_some_and(Outcome::is_completed))
        .map(str::to_string)
        .collect();
    let tainted = graph.transitive_dependents(&failed);

    let mut omitted = Vec::new();
    for name in graph.names() {
        if failed.contains(name) {
            let reason = modules
                .get(name)
                .and_then(|o| o.diagnostics().first().cloned())
                .map(|d| format!("failed: {d}"))
                .unwrap_or_else(|| "not created".to_string());
            omitted.push(Omission { module: name.to_string(), reason });
        } else if tainted.contains(name) {
            let blockers: Vec<&str> = graph
                .dependencies(name)
                .iter()
                .filter(|d| failed.contains(*d) || tainted.contains(*d))
                .map(String::as_str)
                .collect();
            omitted.push(Omission {
                module: name.to_string(),
                reason: format!("depends on unavailable module(s): {}", blockers.join(", ")),
            });
        }
    }

    let included = graph
        .topological_order()
        .into_iter()
        .filter(|n| !failed.contains(n) && !tainted.contains(n))
        .filter_map(|n| {
            let (key, outcome) = modules.get_key_value(&n)?;
            Some((key.as_str(), outcome.completed()?))
        })
        .collect();
    Selection { included, omitted }
}

/// Turn an attempt outcome into an artifact outcome.
fn finish<T, R>(
    unit: &str,
    outcome: AttemptOutcome<T>,
    make: impl FnOnce(String, Option<T>, ValidationReport, u32) -> R,
) -> Outcome<R> {
    let AttemptOutcome { source, result, retry_count, history } = outcome;
    match result {
        Ok(value) => {
            info!(unit, retry_count, "Step completed");
            Outcome::Completed(make(source, Some(value), ValidationReport { error: None, history }, retry_count))
        }
        Err(err) => {
            let diagnostics = err.problems();
            let report = ValidationReport { error: Some(err), history };
            Outcome::Failed { last_attempt: Some(make(source, None, report, retry_count)), diagnostics }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModuleInterface, ModuleSpec, pascal_case};

    fn spec(name: &str, deps: &[&str]) -> ModuleSpec {
        ModuleSpec {
            name: name.into(),
            class_name: pascal_case(name),
            purpose: String::new(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            interfaces: vec![],
            priority: 1,
        }
    }

    fn completed(name: &str) -> Outcome<ModuleResult> {
        Outcome::Completed(ModuleResult {
            name: name.into(),
            source: format!("class {}:\n    pass\n", pascal_case(name)),
            interface: ModuleInterface::default(),
            report: ValidationReport::default(),
            retry_count: 0,
        })
    }

    #[test]
    fn test_select_omits_failed_modules_and_their_dependents() {
        let architecture = SystemArchitecture {
            system_name: "Shop".into(),
            description: String::new(),
            modules: vec![
                spec("a.py", &[]),
                spec("b.py", &["a.py"]),
                spec("c.py", &["b.py"]),
                spec("d.py", &[]),
            ],
            assembly_instructions: String::new(),
        };
        let mut modules = ModuleOutcomes::new();
        modules.insert("a.py".into(), Outcome::failed(vec!["`load` is missing".into()]));
        modules.insert("b.py".into(), completed("b.py"));
        modules.insert("c.py".into(), completed("c.py"));
        modules.insert("d.py".into(), completed("d.py"));

        let selection = select(&architecture, &modules);

        let included: Vec<&str> = selection.included.iter().map(|(n, _)| *n).collect();
        assert_eq!(included, vec!["d.py"]);
        let omitted: Vec<(&str, &str)> =
            selection.omitted.iter().map(|o| (o.module.as_str(), o.reason.as_str())).collect();
        assert_eq!(
            omitted,
            vec![
                ("a.py", "failed: `load` is missing"),
                ("b.py", "depends on unavailable module(s): a.py"),
                ("c.py", "depends on unavailable module(s): b.py"),
            ]
        );
    }

    #[test]
    fn test_select_counts_missing_outcomes_as_not_created() {
        let architecture = SystemArchitecture {
            system_name: "Shop".into(),
            description: String::new(),
            modules: vec![spec("a.py", &[]), spec("b.py", &[])],
            assembly_instructions: String::new(),
        };
        let mut modules = ModuleOutcomes::new();
        modules.insert("b.py".into(), completed("b.py"));

        let selection = select(&architecture, &modules);
        assert_eq!(selection.included.len(), 1);
        assert_eq!(selection.omitted[0].module, "a.py");
        assert_eq!(selection.omitted[0].reason, "not created");
    }
}
