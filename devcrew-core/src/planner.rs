//! Architecture planning: requirements in, validated architecture out.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::config::CoreConfig;
use crate::error::{CyclicDependencyError, PlanningError};
use crate::model::{DependencyGraph, ModuleCreationState, SystemArchitecture, pascal_case};
use crate::oracle::{CodeSynthesisOracle, OracleRequest, Role};
use crate::parse::decode_architecture;

/// Unit name used for the planning request.
pub const ARCHITECTURE_TARGET: &str = "architecture.json";

pub struct ArchitecturePlanner<'a, O> {
    oracle: &'a O,
    config: &'a CoreConfig,
}

impl<'a, O: CodeSynthesisOracle> ArchitecturePlanner<'a, O> {
    pub fn new(oracle: &'a O, config: &'a CoreConfig) -> Self {
        Self { oracle, config }
    }

    /// Ask the oracle for an architecture, decode it and clean it.
    pub async fn plan(&self, requirements: &str) -> Result<SystemArchitecture, PlanningError> {
        info!(chars = requirements.len(), "Planning architecture");
        let request = self.planning_request(requirements);
        let reply = self
            .oracle
            .synthesize(&request)
            .await
            .map_err(|e| PlanningError::Oracle(format!("{e:#}")))?;
        let architecture = decode_architecture(&reply)?;
        let architecture = self.validate_and_clean(architecture)?;
        info!(
            system = %architecture.system_name,
            modules = architecture.modules.len(),
            "Architecture planned"
        );
        Ok(architecture)
    }

    pub fn planning_request(&self, requirements: &str) -> OracleRequest {
        let naming = &self.config.naming;
        let requirements = truncate_chars(requirements, self.config.requirements_char_limit);
        let prompt = format!(
            r#"Design a modular {language} system for the requirements below.

REQUIREMENTS:
{requirements}

Rules:
- Split the system into 3-8 business-logic modules, each with a single responsibility.
- Module names are snake_case files ending in .{ext}; each module defines one main PascalCase class.
- List every public method other modules or the integration will call, as signatures with parameter and return types.
- Dependencies must name other modules in this architecture. No cycles.
- Do NOT plan user-interface, front-end or view modules. The demo ({demo}) is generated separately and is the only place UI code may live.
- Put data storage and external integrations in their own modules.
- Priority 1 is implemented first.

Reply with JSON only, in exactly this shape:
{{
  "system_name": "Descriptive System Name",
  "description": "What the system does",
  "modules": [
    {{
      "name": "module_name.{ext}",
      "class_name": "ClassName",
      "purpose": "What this module is responsible for",
      "dependencies": ["other_module.{ext}"],
      "interfaces": ["method_name(arg: type) -> return_type"],
      "priority": 1
    }}
  ],
  "assembly_instructions": "How the modules are wired together, including constructor arguments"
}}"#,
            language = naming.language,
            ext = naming.extension,
            demo = naming.demo_file,
        );
        OracleRequest::new(Role::Architect, ARCHITECTURE_TARGET, prompt)
    }

    /// Normalize a decoded architecture and enforce its invariants:
    /// unique trimmed names, no presentation-layer modules, dependencies
    /// that resolve, and an acyclic graph.
    pub fn validate_and_clean(&self, mut architecture: SystemArchitecture) -> Result<SystemArchitecture, PlanningError> {
        if architecture.system_name.trim().is_empty() {
            return Err(PlanningError::Invalid("system_name is empty".into()));
        }
        architecture.system_name = architecture.system_name.trim().to_string();

        let naming = &self.config.naming;
        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(architecture.modules.len());
        let mut removed = BTreeSet::new();

        for mut module in std::mem::take(&mut architecture.modules) {
            let trimmed = module.name.trim();
            if trimmed.is_empty() {
                warn!("Dropping module with empty name");
                continue;
            }
            module.name = naming.module_file(trimmed);
            if !seen.insert(module.name.clone()) {
                warn!(module = %module.name, "Dropping duplicate module");
                continue;
            }
            if let Some(reason) = self.config.presentation.module_marker(&module) {
                warn!(module = %module.name, %reason, "Removing presentation-layer module");
                removed.insert(module.name.clone());
                continue;
            }
            module.class_name = module.class_name.trim().to_string();
            if module.class_name.is_empty() {
                module.class_name = pascal_case(&module.name);
            }
            kept.push(module);
        }

        let known: BTreeSet<String> = kept.iter().map(|m| m.name.clone()).collect();
        for module in &mut kept {
            let mut deps = Vec::with_capacity(module.dependencies.len());
            for dep in &module.dependencies {
                let dep = naming.module_file(dep.trim());
                if removed.contains(&dep) {
                    info!(module = %module.name, dependency = %dep, "Pruning edge to removed module");
                } else if !known.contains(&dep) {
                    warn!(module = %module.name, dependency = %dep, "Pruning edge to unknown module");
                } else if !deps.contains(&dep) {
                    deps.push(dep);
                }
            }
            module.dependencies = deps;
        }

        if kept.is_empty() {
            return Err(PlanningError::Empty);
        }
        architecture.modules = kept;

        if let Some(cycle) = DependencyGraph::from_architecture(&architecture).find_cycle() {
            return Err(CyclicDependencyError { cycle }.into());
        }
        Ok(architecture)
    }

    /// Initial state for a validated architecture: every module Pending.
    pub fn create_module_state(&self, architecture: &SystemArchitecture) -> ModuleCreationState {
        ModuleCreationState::new(architecture)
    }
}

/// Cut to `limit` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
