//! Error taxonomy for planning, creation and assembly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::UnitStatus;

/// Planning could not produce a usable architecture.
#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    #[error("oracle error: {0}")]
    Oracle(String),
    #[error(transparent)]
    Parse(#[from] ArchitectureParseError),
    #[error(transparent)]
    Cycle(#[from] CyclicDependencyError),
    #[error("architecture has no modules left after cleaning")]
    Empty,
    #[error("invalid architecture: {0}")]
    Invalid(String),
}

/// No decoding stage could turn the planner's reply into an architecture.
#[derive(Debug, thiserror::Error)]
#[error("could not decode architecture: {}", .reasons.join("; "))]
pub struct ArchitectureParseError {
    /// One reason per decoding stage that was tried.
    pub reasons: Vec<String>,
    /// The unparsed reply.
    pub raw: String,
}

#[derive(Debug, thiserror::Error)]
#[error("dependency cycle: {}", .cycle.join(" -> "))]
pub struct CyclicDependencyError {
    /// Closed path, first element repeated at the end.
    pub cycle: Vec<String>,
}

/// A dependency that keeps a module from being scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetDependency {
    pub name: String,
    /// `None` when the dependency is not part of the architecture.
    pub status: Option<UnitStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckModule {
    pub module: String,
    pub unmet: Vec<UnmetDependency>,
}

/// Pending modules remain but none are eligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("pipeline blocked: {}", describe_stuck(.stuck))]
pub struct BlockedPipelineError {
    pub stuck: Vec<StuckModule>,
}

fn describe_stuck(stuck: &[StuckModule]) -> String {
    stuck
        .iter()
        .map(|s| {
            let unmet: Vec<String> = s
                .unmet
                .iter()
                .map(|d| match d.status {
                    Some(status) => format!("{} is {status}", d.name),
                    None => format!("{} is unknown", d.name),
                })
                .collect();
            format!("{} waits on {}", s.module, unmet.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("unknown module {0}")]
    UnknownModule(String),
    #[error("module {module} cannot go from {from} to {to}")]
    InvalidTransition { module: String, from: UnitStatus, to: UnitStatus },
}

/// Module creation stopped before every module reached a terminal status.
#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error(transparent)]
    Blocked(#[from] BlockedPipelineError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error("oracle error while creating {module}: {message}")]
    Oracle { module: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("no completed modules to assemble")]
    NoCompletedModules,
    #[error("oracle error during {step}: {message}")]
    Oracle { step: String, message: String },
}

/// A single finding about a generated unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// The analyzer could not read the source.
    Unanalyzable { detail: String },
    EmptySource,
    MissingClass { class: String },
    MissingSignature { name: String, expected: String },
    ArityMismatch { name: String, expected: usize, found: String },
    ParamType { name: String, param: String, expected: String, found: String },
    ReturnType { name: String, expected: String, found: String },
    /// A member call that does not resolve against a published interface.
    UnknownMethod { call: String, target: String, available: Vec<String> },
    /// The unit references something it must not.
    Requirement { detail: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unanalyzable { detail } => write!(f, "source could not be analyzed: {detail}"),
            Violation::EmptySource => write!(f, "no source code was returned"),
            Violation::MissingClass { class } => write!(f, "class `{class}` is not defined"),
            Violation::MissingSignature { name, expected } => {
                write!(f, "`{name}` is missing, expected `{expected}`")
            }
            Violation::ArityMismatch { name, expected, found } => {
                write!(f, "`{name}` takes {found} argument(s), expected {expected}")
            }
            Violation::ParamType { name, param, expected, found } => write!(
                f,
                "parameter `{param}` of `{name}` is annotated `{found}`, expected `{expected}`"
            ),
            Violation::ReturnType { name, expected, found } => {
                write!(f, "`{name}` returns `{found}`, expected `{expected}`")
            }
            Violation::UnknownMethod { call, target, available } => {
                if available.is_empty() {
                    write!(f, "`{call}` does not exist on {target}")
                } else {
                    write!(f, "`{call}` does not exist on {target} (available: {})", available.join(", "))
                }
            }
            Violation::Requirement { detail } => write!(f, "{detail}"),
        }
    }
}

/// Generated source disagrees with what it was asked to implement or may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{} interface problem(s) in {unit}: {}", .violations.len(), join_violations(.violations))]
pub struct InterfaceValidationError {
    pub unit: String,
    pub violations: Vec<Violation>,
}

/// Generated source contains presentation-layer markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("presentation content in {unit}: {}", .markers.join(", "))]
pub struct PresentationContentViolation {
    pub unit: String,
    pub markers: Vec<String>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; ")
}

/// Why an attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValidationError {
    #[error(transparent)]
    Interface(InterfaceValidationError),
    #[error(transparent)]
    Presentation(PresentationContentViolation),
}

impl ValidationError {
    /// Each finding as its own line, for feedback and diagnostics.
    pub fn problems(&self) -> Vec<String> {
        match self {
            ValidationError::Interface(err) => err.violations.iter().map(|v| v.to_string()).collect(),
            ValidationError::Presentation(err) => vec![format!(
                "presentation-layer content is not allowed here (found: {})",
                err.markers.join(", ")
            )],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_error_lists_unmet_dependencies() {
        let err = BlockedPipelineError {
            stuck: vec![StuckModule {
                module: "e.py".into(),
                unmet: vec![UnmetDependency { name: "c.py".into(), status: Some(UnitStatus::Failed) }],
            }],
        };
        assert_eq!(err.to_string(), "pipeline blocked: e.py waits on c.py is failed");
    }

    #[test]
    fn cycle_error_renders_path() {
        let err = CyclicDependencyError { cycle: vec!["a".into(), "b".into(), "a".into()] };
        assert_eq!(err.to_string(), "dependency cycle: a -> b -> a");
    }

    #[test]
    fn validation_error_problems_are_one_per_violation() {
        let err = ValidationError::Interface(InterfaceValidationError {
            unit: "calc.py".into(),
            violations: vec![
                Violation::MissingClass { class: "Calc".into() },
                Violation::ReturnType { name: "compute".into(), expected: "int".into(), found: "str".into() },
            ],
        });
        let problems = err.problems();
        assert_eq!(problems.len(), 2);
        assert!(problems[1].contains("returns `str`"));
    }

    #[test]
    fn validation_error_serializes_tagged() {
        let err = ValidationError::Presentation(PresentationContentViolation {
            unit: "x.py".into(),
            markers: vec!["import gradio".into()],
        });
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "presentation");
        let back: ValidationError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
