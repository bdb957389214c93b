//! Shared data model for a run.
//!
//! Everything here is serializable via serde_json so a whole run can be
//! externalized into a single run log and reloaded to resume.
//!
//! - `SystemArchitecture` / `ModuleSpec`: planner output, immutable afterwards
//! - `ModuleInterface`: signatures extracted from generated source
//! - `DependencyGraph` / `ModuleCreationState`: scheduling and status
//! - `Outcome`: closed Completed | Failed result for every unit of work

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BlockedPipelineError, StateError, StuckModule, UnmetDependency, ValidationError};

// ─── Architecture ────────────────────────────────────────────────────────────

/// A parameter of a planned signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedParam {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
}

/// A callable the planner declared for a module.
///
/// `params` is `None` when only the name was declared; arity and parameter
/// types are then left unchecked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PlannedSignatureRepr")]
pub struct PlannedSignature {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<PlannedParam>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

/// Planners emit either `"compute"`, `"compute(x: int) -> int"` or an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlannedSignatureRepr {
    Text(String),
    Detailed {
        name: String,
        #[serde(default)]
        params: Option<Vec<PlannedParam>>,
        #[serde(default, alias = "return_type", alias = "return")]
        returns: Option<String>,
    },
}

impl From<PlannedSignatureRepr> for PlannedSignature {
    fn from(repr: PlannedSignatureRepr) -> Self {
        match repr {
            PlannedSignatureRepr::Text(text) => PlannedSignature::parse(&text),
            PlannedSignatureRepr::Detailed { name, params, returns } => PlannedSignature {
                name: name.trim().to_string(),
                params,
                returns: returns.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            },
        }
    }
}

impl PlannedSignature {
    /// Parse a signature written the way a planner writes it, e.g.
    /// `def compute(self, x: int, y: float = 1.0) -> int`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim().trim_start_matches("def ").trim();
        let Some(open) = text.find('(') else {
            return PlannedSignature {
                name: text.trim_end_matches(':').trim().to_string(),
                params: None,
                returns: None,
            };
        };
        let name = text[..open].trim().to_string();
        let Some(close) = text.rfind(')').filter(|close| *close > open) else {
            return PlannedSignature { name, params: None, returns: None };
        };

        let params = split_top_level(&text[open + 1..close])
            .into_iter()
            .filter_map(|raw| {
                let raw = raw.split('=').next().unwrap_or("").trim();
                let (name, ty) = match raw.split_once(':') {
                    Some((n, t)) => (n.trim(), Some(t.trim().to_string())),
                    None => (raw, None),
                };
                if name.is_empty() || name == "self" || name == "cls" || name == "/" {
                    return None;
                }
                Some(PlannedParam { name: name.to_string(), ty: ty.filter(|t| !t.is_empty()) })
            })
            .collect();

        let returns = text[close + 1..]
            .trim()
            .strip_prefix("->")
            .map(|r| r.trim().trim_end_matches(':').trim().to_string())
            .filter(|r| !r.is_empty());

        PlannedSignature { name, params: Some(params), returns }
    }
}

impl fmt::Display for PlannedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(params) = &self.params {
            let rendered: Vec<String> = params
                .iter()
                .map(|p| match &p.ty {
                    Some(ty) => format!("{}: {ty}", p.name),
                    None => p.name.clone(),
                })
                .collect();
            write!(f, "({})", rendered.join(", "))?;
        }
        if let Some(ret) = &self.returns {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

/// Split on commas that are not nested inside brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts.into_iter().filter(|p| !p.trim().is_empty()).collect()
}

fn default_priority() -> i64 {
    1
}

/// A single module to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    /// File-like module name, e.g. `user_store.py`.
    pub name: String,
    /// Main class the module must define.
    #[serde(default)]
    pub class_name: String,
    pub purpose: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Declared interface, in declaration order.
    #[serde(default)]
    pub interfaces: Vec<PlannedSignature>,
    /// Lower runs first.
    #[serde(default = "default_priority")]
    pub priority: i64,
}

/// Overall system architecture produced by planning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemArchitecture {
    pub system_name: String,
    #[serde(default)]
    pub description: String,
    pub modules: Vec<ModuleSpec>,
    #[serde(default)]
    pub assembly_instructions: String,
}

impl SystemArchitecture {
    pub fn module(&self, name: &str) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Name of the class the integration unit must define.
    pub fn integration_class_name(&self) -> String {
        let compact: String = self
            .system_name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect();
        let compact = if compact.is_empty() { "System".to_string() } else { compact };
        format!("{compact}Integration")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `user_store.py` → `UserStore`.
pub fn pascal_case(name: &str) -> String {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    stem.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect()
}

// ─── Extracted interfaces ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    #[default]
    Regular,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

/// A parameter as declared in generated source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub kind: ParamKind,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ParamKind::VarPositional => write!(f, "*")?,
            ParamKind::VarKeyword => write!(f, "**")?,
            ParamKind::Regular => {}
        }
        write!(f, "{}", self.name)?;
        if let Some(ann) = &self.annotation {
            write!(f, ": {ann}")?;
        }
        if self.has_default {
            write!(f, " = ...")?;
        }
        Ok(())
    }
}

/// A public callable found by the analyzer. Receiver parameters are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    /// Owning class for methods, `None` for top-level functions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
}

impl Signature {
    /// Positional arguments that must be supplied.
    pub fn required_arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Regular && !p.has_default)
            .count()
    }

    /// Upper bound on accepted arguments; `None` when `*args` is present.
    pub fn max_arity(&self) -> Option<usize> {
        if self.params.iter().any(|p| p.kind == ParamKind::VarPositional) {
            return None;
        }
        Some(self.params.iter().filter(|p| p.kind == ParamKind::Regular).count())
    }

    pub fn positional(&self) -> impl Iterator<Item = &Param> {
        self.params.iter().filter(|p| p.kind == ParamKind::Regular)
    }

    pub fn arity_label(&self) -> String {
        let required = self.required_arity();
        match self.max_arity() {
            Some(max) if max == required => required.to_string(),
            Some(max) => format!("{required}..{max}"),
            None => format!("{required}.."),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "{}({})", self.name, params.join(", "))?;
        if let Some(ret) = &self.returns {
            write!(f, " -> {ret}")?;
        }
        Ok(())
    }
}

/// A public class and its constructor parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub name: String,
    /// `__init__` parameters; `None` when the class relies on the default constructor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constructor: Option<Vec<Param>>,
}

/// The interface actually exposed by a piece of generated source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModuleInterface {
    pub classes: Vec<ClassInfo>,
    pub signatures: Vec<Signature>,
}

impl ModuleInterface {
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c.name == name)
    }

    pub fn methods_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Signature> + 'a {
        self.signatures
            .iter()
            .filter(move |s| s.owner.as_deref() == Some(class))
    }

    pub fn functions(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter().filter(|s| s.owner.is_none())
    }

    /// Look up a callable the way a caller of `class` would reach it:
    /// a method of that class first, then a top-level function.
    pub fn find<'a>(&'a self, class: &'a str, name: &str) -> Option<&'a Signature> {
        self.methods_of(class)
            .find(|s| s.name == name)
            .or_else(|| self.functions().find(|s| s.name == name))
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.signatures.is_empty()
    }

    /// Human/LLM-readable listing used in prompts and feedback.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for class in &self.classes {
            match &class.constructor {
                Some(params) => {
                    let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                    out.push_str(&format!("Class {}({}):\n", class.name, params.join(", ")));
                }
                None => out.push_str(&format!("Class {}():\n", class.name)),
            }
            for method in self.methods_of(&class.name) {
                out.push_str(&format!("  - {method}\n"));
            }
        }
        for func in self.functions() {
            out.push_str(&format!("Function: {func}\n"));
        }
        if out.is_empty() {
            out.push_str("(no public callables)\n");
        }
        out
    }
}

// ─── Dependency graph ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GraphNode {
    name: String,
    dependencies: Vec<String>,
    priority: i64,
}

/// Dependency graph over module names, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<GraphNode>,
}

impl DependencyGraph {
    pub fn from_architecture(architecture: &SystemArchitecture) -> Self {
        Self {
            nodes: architecture
                .modules
                .iter()
                .map(|m| GraphNode {
                    name: m.name.clone(),
                    dependencies: m.dependencies.clone(),
                    priority: m.priority,
                })
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|n| n.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    pub fn dependencies(&self, name: &str) -> &[String] {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Scheduling key: ascending priority, then declaration order.
    pub fn ordering_key(&self, name: &str) -> (i64, usize) {
        self.nodes
            .iter()
            .enumerate()
            .find(|(_, n)| n.name == name)
            .map(|(i, n)| (n.priority, i))
            .unwrap_or((i64::MAX, usize::MAX))
    }

    /// Depth-first cycle search. Returns the cycle as a closed path
    /// (`a -> b -> a`) when one exists.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Grey,
            Black,
        }

        fn visit<'g>(
            graph: &'g DependencyGraph,
            name: &'g str,
            marks: &mut BTreeMap<&'g str, Mark>,
            path: &mut Vec<&'g str>,
        ) -> Option<Vec<String>> {
            marks.insert(name, Mark::Grey);
            path.push(name);
            for dep in graph.dependencies(name) {
                match marks.get(dep.as_str()).copied() {
                    Some(Mark::Grey) => {
                        let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(Mark::White) => {
                        if let Some(cycle) = visit(graph, dep.as_str(), marks, path) {
                            return Some(cycle);
                        }
                    }
                    // Black, or an edge to a node outside the graph.
                    _ => {}
                }
            }
            path.pop();
            marks.insert(name, Mark::Black);
            None
        }

        let mut marks: BTreeMap<&str, Mark> = self.names().map(|n| (n, Mark::White)).collect();
        for name in self.names() {
            if marks.get(name) == Some(&Mark::White) {
                let mut path = Vec::new();
                if let Some(cycle) = visit(self, name, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Modules ordered so every dependency precedes its dependents; ties are
    /// broken by the scheduling key. Nodes on a cycle are left out.
    pub fn topological_order(&self) -> Vec<String> {
        let mut remaining: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| {
                let known = n.dependencies.iter().filter(|d| self.contains(d)).count();
                (n.name.as_str(), known)
            })
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        loop {
            let mut ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, count)| **count == 0)
                .map(|(name, _)| *name)
                .collect();
            if ready.is_empty() {
                break;
            }
            ready.sort_by_key(|name| self.ordering_key(name));
            let next = ready[0];
            remaining.remove(next);
            for node in &self.nodes {
                if node.dependencies.iter().any(|d| d == next)
                    && let Some(count) = remaining.get_mut(node.name.as_str())
                {
                    *count = count.saturating_sub(1);
                }
            }
            order.push(next.to_string());
        }
        order
    }

    /// Every module that depends, directly or transitively, on one of `roots`.
    /// The roots themselves are not included.
    pub fn transitive_dependents(&self, roots: &BTreeSet<String>) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<&str> = roots.iter().map(|r| r.as_str()).collect();
        while let Some(current) = queue.pop_front() {
            for node in &self.nodes {
                if node.dependencies.iter().any(|d| d == current)
                    && !roots.contains(&node.name)
                    && found.insert(node.name.clone())
                {
                    queue.push_back(node.name.as_str());
                }
            }
        }
        found
    }
}

// ─── Creation state ──────────────────────────────────────────────────────────

/// Lifecycle of a module or assembly step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Pending => write!(f, "pending"),
            UnitStatus::InProgress => write!(f, "in progress"),
            UnitStatus::Completed => write!(f, "completed"),
            UnitStatus::Failed => write!(f, "failed"),
        }
    }
}

impl UnitStatus {
    fn can_become(self, next: UnitStatus) -> bool {
        matches!(
            (self, next),
            (UnitStatus::Pending, UnitStatus::InProgress)
                | (UnitStatus::InProgress, UnitStatus::Completed)
                | (UnitStatus::InProgress, UnitStatus::Failed)
        )
    }
}

/// Per-module status plus the interfaces published by completed modules.
///
/// Only `ModuleCreator` mutates this. An interface becomes readable through
/// [`ModuleCreationState::published_interface`] in the same transition that
/// marks its module Completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleCreationState {
    graph: DependencyGraph,
    statuses: BTreeMap<String, UnitStatus>,
    published: BTreeMap<String, ModuleInterface>,
    /// Number of scheduling decisions taken so far.
    cursor: usize,
}

impl ModuleCreationState {
    pub fn new(architecture: &SystemArchitecture) -> Self {
        let graph = DependencyGraph::from_architecture(architecture);
        let statuses = graph
            .names()
            .map(|n| (n.to_string(), UnitStatus::Pending))
            .collect();
        Self { graph, statuses, published: BTreeMap::new(), cursor: 0 }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self, name: &str) -> Option<UnitStatus> {
        self.statuses.get(name).copied()
    }

    pub fn modules_with(&self, status: UnitStatus) -> Vec<&str> {
        self.graph
            .names()
            .filter(|n| self.status(n) == Some(status))
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.statuses.values().any(|s| *s == UnitStatus::Pending)
    }

    /// Pending modules whose dependencies are all Completed, best first.
    pub fn frontier(&self) -> Vec<&str> {
        let mut frontier: Vec<&str> = self
            .graph
            .names()
            .filter(|n| self.status(n) == Some(UnitStatus::Pending))
            .filter(|n| {
                self.graph
                    .dependencies(n)
                    .iter()
                    .all(|d| self.status(d) == Some(UnitStatus::Completed))
            })
            .collect();
        frontier.sort_by_key(|n| self.graph.ordering_key(n));
        frontier
    }

    /// Pick the next unit of work and advance the cursor.
    pub fn next_eligible(&mut self) -> Option<String> {
        let next = self.frontier().first().map(|n| n.to_string())?;
        self.cursor += 1;
        Some(next)
    }

    pub fn transition(&mut self, name: &str, next: UnitStatus) -> Result<(), StateError> {
        let current = self
            .statuses
            .get_mut(name)
            .ok_or_else(|| StateError::UnknownModule(name.to_string()))?;
        if !current.can_become(next) {
            return Err(StateError::InvalidTransition {
                module: name.to_string(),
                from: *current,
                to: next,
            });
        }
        *current = next;
        Ok(())
    }

    /// Mark a module Completed and publish its verified interface.
    pub fn complete(&mut self, name: &str, interface: ModuleInterface) -> Result<(), StateError> {
        self.transition(name, UnitStatus::Completed)?;
        self.published.insert(name.to_string(), interface);
        Ok(())
    }

    /// Verified interface of a Completed module.
    pub fn published_interface(&self, name: &str) -> Option<&ModuleInterface> {
        match self.status(name) {
            Some(UnitStatus::Completed) => self.published.get(name),
            _ => None,
        }
    }

    /// Put modules interrupted mid-attempt by an aborted run back in the queue.
    /// Only valid when resuming a run from its log.
    pub fn requeue_interrupted(&mut self) -> Vec<String> {
        let mut requeued = Vec::new();
        for (name, status) in self.statuses.iter_mut() {
            if *status == UnitStatus::InProgress {
                *status = UnitStatus::Pending;
                requeued.push(name.clone());
            }
        }
        requeued
    }

    /// Describe why the remaining Pending modules cannot be scheduled.
    pub fn blocked(&self) -> BlockedPipelineError {
        let stuck = self
            .modules_with(UnitStatus::Pending)
            .into_iter()
            .map(|name| StuckModule {
                module: name.to_string(),
                unmet: self
                    .graph
                    .dependencies(name)
                    .iter()
                    .filter_map(|dep| {
                        let status = self.status(dep);
                        (status != Some(UnitStatus::Completed)).then(|| UnmetDependency {
                            name: dep.clone(),
                            status,
                        })
                    })
                    .collect(),
            })
            .collect();
        BlockedPipelineError { stuck }
    }

    /// Fail every module named by a blocked report. Pending modules become
    /// Failed without ever being attempted.
    pub fn fail_blocked(&mut self, blocked: &BlockedPipelineError) {
        for stuck in &blocked.stuck {
            if let Some(status) = self.statuses.get_mut(&stuck.module)
                && *status == UnitStatus::Pending
            {
                *status = UnitStatus::Failed;
            }
        }
    }
}

// ─── Results ─────────────────────────────────────────────────────────────────

/// Closed result of a unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome<T> {
    Completed(T),
    Failed {
        /// The last attempt, when one was made.
        last_attempt: Option<T>,
        diagnostics: Vec<String>,
    },
}

impl<T> Outcome<T> {
    pub fn failed(diagnostics: Vec<String>) -> Self {
        Outcome::Failed { last_attempt: None, diagnostics }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn completed(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Failed { .. } => None,
        }
    }

    /// The accepted value, or the last rejected attempt.
    pub fn latest(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Failed { last_attempt, .. } => last_attempt.as_ref(),
        }
    }

    pub fn diagnostics(&self) -> &[String] {
        match self {
            Outcome::Completed(_) => &[],
            Outcome::Failed { diagnostics, .. } => diagnostics,
        }
    }

    pub fn status(&self) -> UnitStatus {
        match self {
            Outcome::Completed(_) => UnitStatus::Completed,
            Outcome::Failed { .. } => UnitStatus::Failed,
        }
    }
}

/// Validation findings attached to a module or assembly artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Findings on the final attempt; `None` when it passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationError>,
    /// One line per earlier rejected attempt, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// The retained attempt for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub name: String,
    pub source: String,
    /// Analyzer-derived interface of `source`.
    pub interface: ModuleInterface,
    pub report: ValidationReport,
    pub retry_count: u32,
}

pub type ModuleOutcomes = BTreeMap<String, Outcome<ModuleResult>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationArtifact {
    pub file_name: String,
    pub class_name: String,
    pub source: String,
    /// Public methods of the integration class are the demo's entry points.
    pub interface: ModuleInterface,
    /// Modules wired in, in dependency order.
    pub modules: Vec<String>,
    pub report: ValidationReport,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestArtifact {
    pub module: String,
    pub file_name: String,
    pub source: String,
    pub report: ValidationReport,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoArtifact {
    pub file_name: String,
    pub source: String,
    pub report: ValidationReport,
    pub retry_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocArtifact {
    pub file_name: String,
    pub content: String,
}

/// A Completed or Failed module left out of assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Omission {
    pub module: String,
    pub reason: String,
}

/// Everything the assembler produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactSet {
    /// Modules that took part in assembly, in dependency order.
    pub included: Vec<String>,
    pub omitted: Vec<Omission>,
    pub integration: Outcome<IntegrationArtifact>,
    pub tests: BTreeMap<String, Outcome<TestArtifact>>,
    pub demo: Outcome<DemoArtifact>,
    pub docs: Outcome<DocArtifact>,
}

impl ArtifactSet {
    pub fn failed_steps(&self) -> Vec<String> {
        let mut failed = Vec::new();
        if !self.integration.is_completed() {
            failed.push("integration".to_string());
        }
        for (module, test) in &self.tests {
            if !test.is_completed() {
                failed.push(format!("tests for {module}"));
            }
        }
        if !self.demo.is_completed() {
            failed.push("demo".to_string());
        }
        if !self.docs.is_completed() {
            failed.push("documentation".to_string());
        }
        failed
    }
}
