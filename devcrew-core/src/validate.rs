//! Interface conformance and call checks, and the feedback sent back to the
//! oracle when an attempt is rejected.

use std::collections::{BTreeMap, BTreeSet};

use crate::analyzer::{AnalysisError, SourceAnalysis};
use crate::error::{InterfaceValidationError, ValidationError, Violation};
use crate::model::{ModuleInterface, ModuleSpec, PlannedSignature, Signature};

/// Compare a module's extracted interface with its planned one.
pub fn conformance(spec: &ModuleSpec, interface: &ModuleInterface) -> Vec<Violation> {
    let mut violations = Vec::new();
    let class = spec.class_name.as_str();
    let has_class = interface.has_class(class);
    if !has_class {
        violations.push(Violation::MissingClass { class: class.to_string() });
    }

    for planned in &spec.interfaces {
        if planned.name == "__init__" || planned.name == class {
            // Constructors are covered by the class check.
            continue;
        }
        match interface.find(class, &planned.name) {
            None => violations.push(Violation::MissingSignature {
                name: planned.name.clone(),
                expected: planned.to_string(),
            }),
            Some(found) => check_signature(planned, found, &mut violations),
        }
    }
    violations
}

fn check_signature(planned: &PlannedSignature, found: &Signature, violations: &mut Vec<Violation>) {
    if let Some(params) = &planned.params {
        let n = params.len();
        let fits = n >= found.required_arity() && found.max_arity().is_none_or(|max| n <= max);
        if !fits {
            violations.push(Violation::ArityMismatch {
                name: planned.name.clone(),
                expected: n,
                found: found.arity_label(),
            });
            return;
        }
        for (want, have) in params.iter().zip(found.positional()) {
            if let (Some(expected), Some(actual)) = (&want.ty, &have.annotation)
                && !types_match(expected, actual)
            {
                violations.push(Violation::ParamType {
                    name: planned.name.clone(),
                    param: have.name.clone(),
                    expected: expected.clone(),
                    found: actual.clone(),
                });
            }
        }
    }
    if let (Some(expected), Some(actual)) = (&planned.returns, &found.returns)
        && !types_match(expected, actual)
    {
        violations.push(Violation::ReturnType {
            name: planned.name.clone(),
            expected: expected.clone(),
            found: actual.clone(),
        });
    }
}

fn normalize_type(ty: &str) -> String {
    ty.chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '\'')
        .collect::<String>()
        .replace("typing.", "")
        .to_lowercase()
}

/// Loose annotation equality. `Any` matches everything.
pub fn types_match(expected: &str, actual: &str) -> bool {
    let (expected, actual) = (normalize_type(expected), normalize_type(actual));
    expected == "any" || actual == "any" || expected == actual
}

/// A class whose interface calls may be checked against.
#[derive(Debug, Clone)]
pub struct CallTarget<'a> {
    /// How the target is named in findings, e.g. `module ledger.py`.
    pub label: String,
    pub class_name: &'a str,
    pub interface: &'a ModuleInterface,
}

/// Maps call receivers to class names using the analyzer's bindings.
/// A receiver that is itself a class name resolves to that class.
pub struct CallResolver<'s> {
    bound: BTreeMap<&'s str, &'s str>,
}

impl<'s> CallResolver<'s> {
    pub fn new(analysis: &'s SourceAnalysis) -> Self {
        let bound = analysis
            .bindings
            .iter()
            .map(|b| (b.target.as_str(), b.class_name.as_str()))
            .collect();
        Self { bound }
    }

    pub fn resolve<'c>(&self, receiver: &'c str) -> &'c str
    where
        's: 'c,
    {
        self.bound.get(receiver).copied().unwrap_or(receiver)
    }
}

/// Member calls that resolve to a known class but name a method that class
/// does not expose. Unresolved receivers are ignored.
pub fn unknown_calls(analysis: &SourceAnalysis, targets: &[CallTarget<'_>]) -> Vec<Violation> {
    let resolver = CallResolver::new(analysis);
    let mut seen = BTreeSet::new();
    let mut violations = Vec::new();
    for call in &analysis.member_calls {
        let class = resolver.resolve(&call.receiver);
        let Some(target) = targets.iter().find(|t| t.class_name == class) else {
            continue;
        };
        if target.interface.find(target.class_name, &call.method).is_some() {
            continue;
        }
        if !seen.insert((call.receiver.clone(), call.method.clone())) {
            continue;
        }
        violations.push(Violation::UnknownMethod {
            call: format!("{}.{}()", call.receiver, call.method),
            target: target.label.clone(),
            available: target
                .interface
                .methods_of(target.class_name)
                .chain(target.interface.functions())
                .map(|s| s.name.clone())
                .collect(),
        });
    }
    violations
}

pub fn unanalyzable(err: &AnalysisError) -> Violation {
    Violation::Unanalyzable { detail: err.to_string() }
}

pub fn interface_error(unit: &str, violations: Vec<Violation>) -> ValidationError {
    ValidationError::Interface(InterfaceValidationError { unit: unit.to_string(), violations })
}

/// Wrap violations for `unit`, or `Ok` when there are none.
pub fn into_result(unit: &str, violations: Vec<Violation>) -> Result<(), ValidationError> {
    if violations.is_empty() { Ok(()) } else { Err(interface_error(unit, violations)) }
}

/// Corrective feedback for the next attempt.
pub fn render_feedback(error: &ValidationError, required: &[String], previous: &str, language: &str) -> String {
    let mut out = String::from("Your previous attempt was rejected for these reasons:\n");
    for problem in error.problems() {
        out.push_str(&format!("- {problem}\n"));
    }
    if !required.is_empty() {
        out.push_str("\nThe code MUST provide exactly these signatures:\n");
        for sig in required {
            out.push_str(&format!("- {sig}\n"));
        }
    }
    if !previous.trim().is_empty() {
        out.push_str(&format!(
            "\nPrevious attempt:\n```{}\n{}\n```\n",
            language.to_lowercase(),
            previous.trim_end()
        ));
    }
    out.push_str("\nReturn the complete corrected source.");
    out
}
