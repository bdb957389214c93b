//! The code-synthesis oracle boundary.
//!
//! The oracle is an opaque, stateless text generator. Every call is a single
//! request/response exchange; the core never streams and never retries at
//! this layer.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::model::ModuleInterface;

/// Which kind of work the oracle is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Architect,
    ModuleEngineer,
    Integrator,
    TestEngineer,
    DemoEngineer,
    TechnicalWriter,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Architect => write!(f, "architect"),
            Role::ModuleEngineer => write!(f, "module engineer"),
            Role::Integrator => write!(f, "integrator"),
            Role::TestEngineer => write!(f, "test engineer"),
            Role::DemoEngineer => write!(f, "demo engineer"),
            Role::TechnicalWriter => write!(f, "technical writer"),
        }
    }
}

/// A verified interface made available to the unit being generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyInterface {
    pub module: String,
    pub class_name: String,
    pub interface: ModuleInterface,
}

/// One request to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub role: Role,
    /// File or unit being produced, e.g. `ledger.py`.
    pub target: String,
    pub prompt: String,
    pub dependency_interfaces: Vec<DependencyInterface>,
    /// Findings from the previous rejected attempt.
    pub feedback: Option<String>,
}

impl OracleRequest {
    pub fn new(role: Role, target: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            role,
            target: target.into(),
            prompt: prompt.into(),
            dependency_interfaces: Vec::new(),
            feedback: None,
        }
    }

    pub fn with_dependencies(mut self, deps: Vec<DependencyInterface>) -> Self {
        self.dependency_interfaces = deps;
        self
    }

    pub fn with_feedback(mut self, feedback: Option<String>) -> Self {
        self.feedback = feedback;
        self
    }

    /// The full prompt text sent to the oracle.
    pub fn render(&self) -> String {
        let mut out = self.prompt.trim_end().to_string();
        if !self.dependency_interfaces.is_empty() {
            out.push_str("\n\nAvailable dependency interfaces (use ONLY these methods):\n");
            for dep in &self.dependency_interfaces {
                out.push_str(&format!("\nModule {} (class {}):\n", dep.module, dep.class_name));
                out.push_str(&dep.interface.render());
            }
        }
        if let Some(feedback) = &self.feedback {
            out.push_str("\n\nFeedback from previous attempt:\n");
            out.push_str(feedback.trim_end());
            out.push('\n');
        }
        out
    }
}

/// A stateless request/response text generator.
pub trait CodeSynthesisOracle {
    fn synthesize(&self, request: &OracleRequest) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// Pull source code out of a free-text reply.
///
/// When the reply contains Markdown code fences the longest fenced block is
/// used, otherwise the whole trimmed reply.
pub fn extract_source(reply: &str) -> String {
    let mut best: Option<String> = None;
    let mut current: Option<Vec<&str>> = None;
    for line in reply.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(block) => {
                    let block = block.join("\n");
                    if best.as_ref().is_none_or(|b| block.len() > b.len()) {
                        best = Some(block);
                    }
                }
                None => current = Some(Vec::new()),
            }
            continue;
        }
        if let Some(block) = current.as_mut() {
            block.push(line);
        }
    }
    // An unterminated fence still counts.
    if let Some(block) = current {
        let block = block.join("\n");
        if best.as_ref().is_none_or(|b| block.len() > b.len()) {
            best = Some(block);
        }
    }
    match best {
        Some(block) => format!("{}\n", block.trim_matches('\n')),
        None => reply.trim().to_string(),
    }
}
