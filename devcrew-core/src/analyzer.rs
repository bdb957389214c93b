//! Static interface extraction from generated source.
//!
//! The analyzer never executes code. It parses the source with tree-sitter
//! and reports:
//!   - the public classes and callables (the module's interface)
//!   - imported module paths
//!   - bindings of names to classes, used to resolve receivers: from
//!     `name = ClassName(...)`, typed parameters and plain aliasing
//!   - `receiver.method(...)` calls

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Parser};

use crate::model::{ClassInfo, ModuleInterface, Param, ParamKind, Signature};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("grammar failed to load: {0}")]
    Grammar(String),
    #[error("parser produced no tree")]
    NoTree,
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

/// `target = ClassName(...)`, `def f(target: ClassName)` or
/// `target = other` where `other` is already bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    /// Assigned expression text, e.g. `store` or `self.store`.
    pub target: String,
    pub class_name: String,
}

/// `receiver.method(...)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberCall {
    pub receiver: String,
    pub method: String,
    /// 1-based.
    pub line: usize,
}

/// Everything the analyzer reports about one source text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceAnalysis {
    pub interface: ModuleInterface,
    /// Dotted module paths, relative imports excluded.
    pub imports: Vec<String>,
    pub bindings: Vec<Binding>,
    pub member_calls: Vec<MemberCall>,
}

/// Reads interfaces out of source text in the target language.
pub trait InterfaceAnalyzer {
    fn analyze(&self, source: &str) -> Result<SourceAnalysis, AnalysisError>;

    fn extract(&self, source: &str) -> Result<ModuleInterface, AnalysisError> {
        self.analyze(source).map(|a| a.interface)
    }

    fn imports(&self, source: &str) -> Result<Vec<String>, AnalysisError> {
        self.analyze(source).map(|a| a.imports)
    }

    fn bindings(&self, source: &str) -> Result<Vec<Binding>, AnalysisError> {
        self.analyze(source).map(|a| a.bindings)
    }

    fn member_calls(&self, source: &str) -> Result<Vec<MemberCall>, AnalysisError> {
        self.analyze(source).map(|a| a.member_calls)
    }
}

/// Python analyzer backed by tree-sitter-python.
#[derive(Debug, Clone)]
pub struct PythonAnalyzer {
    language: tree_sitter::Language,
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self { language: tree_sitter_python::LANGUAGE.into() }
    }
}

impl InterfaceAnalyzer for PythonAnalyzer {
    fn analyze(&self, source: &str) -> Result<SourceAnalysis, AnalysisError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| AnalysisError::Grammar(e.to_string()))?;
        let tree = parser.parse(source, None).ok_or(AnalysisError::NoTree)?;
        let root = tree.root_node();
        if root.has_error() {
            let at = first_error(root).unwrap_or(root);
            let pos = at.start_position();
            return Err(AnalysisError::Syntax { line: pos.row + 1, column: pos.column + 1 });
        }

        let src = source.as_bytes();
        let mut analysis = SourceAnalysis::default();

        let mut cursor = root.walk();
        for item in root.named_children(&mut cursor) {
            let (def, _) = unwrap_decorated(item, src);
            match def.kind() {
                "function_definition" => {
                    if let Some(sig) = function_signature(def, src, None, false)
                        && is_public(&sig.name)
                    {
                        analysis.interface.signatures.push(sig);
                    }
                }
                "class_definition" => collect_class(def, src, &mut analysis.interface),
                _ => {}
            }
        }

        walk(root, &mut |node| match node.kind() {
            "import_statement" => {
                let mut c = node.walk();
                for child in node.named_children(&mut c) {
                    let name = match child.kind() {
                        "aliased_import" => child.child_by_field_name("name"),
                        "dotted_name" => Some(child),
                        _ => None,
                    };
                    if let Some(name) = name {
                        push_unique(&mut analysis.imports, text(name, src));
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module) = node.child_by_field_name("module_name")
                    && module.kind() == "dotted_name"
                {
                    push_unique(&mut analysis.imports, text(module, src));
                }
            }
            "function_definition" => {
                if let Some(list) = node.child_by_field_name("parameters") {
                    let mut c = list.walk();
                    for p in list.named_children(&mut c).filter_map(|n| param(n, src)) {
                        if let Some(class_name) = p.annotation.as_deref().and_then(annotation_class) {
                            analysis.bindings.push(Binding { target: p.name, class_name });
                        }
                    }
                }
            }
            "assignment" => {
                if let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right")) {
                    let class_name = match right.kind() {
                        "call" => right.child_by_field_name("function").and_then(|f| class_callee(f, src)),
                        // `self.store = store` inherits whatever `store` is bound to
                        "identifier" => {
                            let name = text(right, src);
                            analysis.bindings.iter().rev().find(|b| b.target == name).map(|b| b.class_name.clone())
                        }
                        _ => None,
                    }
                    .or_else(|| node.child_by_field_name("type").and_then(|t| annotation_class(&text(t, src))));
                    if let Some(class_name) = class_name {
                        analysis.bindings.push(Binding { target: text(left, src), class_name });
                    }
                }
            }
            "call" => {
                if let Some(function) = node.child_by_field_name("function")
                    && function.kind() == "attribute"
                    && let (Some(object), Some(attribute)) =
                        (function.child_by_field_name("object"), function.child_by_field_name("attribute"))
                {
                    analysis.member_calls.push(MemberCall {
                        receiver: text(object, src),
                        method: text(attribute, src),
                        line: node.start_position().row + 1,
                    });
                }
            }
            _ => {}
        });

        Ok(analysis)
    }
}

fn text(node: Node, src: &[u8]) -> String {
    node.utf8_text(src).unwrap_or("").to_string()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn is_public(name: &str) -> bool {
    !name.starts_with('_')
}

fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, visit);
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

/// Strip a `decorated_definition` wrapper, returning the definition and its
/// decorator texts.
fn unwrap_decorated<'t>(node: Node<'t>, src: &[u8]) -> (Node<'t>, Vec<String>) {
    if node.kind() != "decorated_definition" {
        return (node, Vec::new());
    }
    let mut decorators = Vec::new();
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            decorators.push(text(child, src).trim_start_matches('@').trim().to_string());
        }
    }
    let def = node.child_by_field_name("definition").unwrap_or(node);
    (def, decorators)
}

/// `Foo(...)` or `module.Foo(...)` binds a class when the callee name is capitalized.
fn class_callee(function: Node, src: &[u8]) -> Option<String> {
    let name = match function.kind() {
        "identifier" => text(function, src),
        "attribute" => text(function.child_by_field_name("attribute")?, src),
        _ => return None,
    };
    name.chars().next().is_some_and(char::is_uppercase).then_some(name)
}

/// Class named by a parameter or variable annotation: `Store`, `"Store"`,
/// `store.Store`, `Optional[Store]` or `Store | None`.
fn annotation_class(annotation: &str) -> Option<String> {
    let mut ty = annotation.trim().trim_matches(['"', '\'']);
    if let Some(inner) = ty.strip_prefix("Optional[").and_then(|t| t.strip_suffix(']')) {
        ty = inner.trim().trim_matches(['"', '\'']);
    }
    if ty.contains('|') {
        ty = ty.split('|').map(str::trim).find(|t| *t != "None")?;
    }
    if !ty.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.') {
        return None;
    }
    let name = ty.rsplit('.').next()?;
    name.chars().next().is_some_and(char::is_uppercase).then(|| name.to_string())
}

fn collect_class(class: Node, src: &[u8], interface: &mut ModuleInterface) {
    let Some(name) = class.child_by_field_name("name").map(|n| text(n, src)) else {
        return;
    };
    if !is_public(&name) {
        return;
    }
    let mut info = ClassInfo { name: name.clone(), constructor: None };
    let mut methods = Vec::new();

    if let Some(body) = class.child_by_field_name("body") {
        let mut cursor = body.walk();
        for item in body.named_children(&mut cursor) {
            let (def, decorators) = unwrap_decorated(item, src);
            if def.kind() != "function_definition" {
                continue;
            }
            let is_static = decorators.iter().any(|d| d == "staticmethod");
            let Some(sig) = function_signature(def, src, Some(&name), !is_static) else {
                continue;
            };
            if sig.name == "__init__" {
                info.constructor = Some(sig.params);
            } else if is_public(&sig.name) {
                methods.push(sig);
            }
        }
    }

    interface.classes.push(info);
    interface.signatures.extend(methods);
}

fn function_signature(def: Node, src: &[u8], owner: Option<&str>, drop_receiver: bool) -> Option<Signature> {
    let name = text(def.child_by_field_name("name")?, src);
    let mut params = Vec::new();
    if let Some(list) = def.child_by_field_name("parameters") {
        let mut cursor = list.walk();
        for node in list.named_children(&mut cursor) {
            if let Some(p) = param(node, src) {
                params.push(p);
            }
        }
    }
    if drop_receiver && params.first().is_some_and(|p| p.kind == ParamKind::Regular) {
        params.remove(0);
    }
    let returns = def.child_by_field_name("return_type").map(|n| text(n, src));
    Some(Signature { name, owner: owner.map(str::to_string), params, returns })
}

fn param(node: Node, src: &[u8]) -> Option<Param> {
    let plain = |name: String, kind: ParamKind| Param { name, annotation: None, has_default: false, kind };
    match node.kind() {
        "identifier" => Some(plain(text(node, src), ParamKind::Regular)),
        "list_splat_pattern" => Some(plain(first_named_text(node, src)?, ParamKind::VarPositional)),
        "dictionary_splat_pattern" => Some(plain(first_named_text(node, src)?, ParamKind::VarKeyword)),
        "typed_parameter" => {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).next()?;
            let mut p = param(inner, src)?;
            p.annotation = node.child_by_field_name("type").map(|t| text(t, src));
            Some(p)
        }
        "default_parameter" | "typed_default_parameter" => Some(Param {
            name: text(node.child_by_field_name("name")?, src),
            annotation: node.child_by_field_name("type").map(|t| text(t, src)),
            has_default: true,
            kind: ParamKind::Regular,
        }),
        // `*`, `/` and tuple patterns
        _ => None,
    }
}

fn first_named_text(node: Node, src: &[u8]) -> Option<String> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next();
    first.map(|n| text(n, src))
}
