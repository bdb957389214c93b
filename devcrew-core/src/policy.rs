//! Presentation-layer deny policy.
//!
//! Business-logic modules must not be user-interface code. The policy
//! rejects UI modules at planning time and UI content in generated source
//! at creation and assembly time. Matching is token based: `build_tools`
//! contains the letters "ui" but no `ui` token, so it is not a match.

use serde::{Deserialize, Serialize};

use crate::model::{ModuleInterface, ModuleSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationPolicy {
    /// Terms that mark a module name as presentation layer.
    pub name_terms: Vec<String>,
    /// Stronger terms checked against a module's stated purpose.
    pub purpose_terms: Vec<String>,
    /// Root import names of UI frameworks.
    pub import_terms: Vec<String>,
    /// Terms that mark a top-level class or function name as UI code.
    pub symbol_terms: Vec<String>,
    /// Module names exempt from the planning check.
    pub allow: Vec<String>,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for PresentationPolicy {
    fn default() -> Self {
        Self {
            name_terms: terms(&[
                "ui",
                "gui",
                "frontend",
                "front end",
                "user interface",
                "interface",
                "web",
                "web ui",
                "webapp",
                "web app",
                "view",
                "views",
                "widget",
                "widgets",
                "screen",
            ]),
            purpose_terms: terms(&[
                "user interface",
                "graphical",
                "gui",
                "frontend",
                "front end",
                "web ui",
                "web page",
                "ui",
            ]),
            import_terms: terms(&[
                "gradio", "streamlit", "tkinter", "pyqt5", "pyqt6", "pyside2", "pyside6", "kivy",
                "wx", "dash", "flet", "nicegui",
            ]),
            symbol_terms: terms(&["ui", "gui", "frontend", "front end", "user interface"]),
            allow: Vec::new(),
        }
    }
}

/// Lowercase word tokens: split on non-alphanumerics and camelCase
/// boundaries. A trailing file extension is dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let text = match text.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() && ext.len() <= 4 && !ext.contains(' ') => {
            stem
        }
        _ => text,
    };

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }
        let boundary = match prev {
            // fooBar
            Some(p) if p.is_lowercase() && c.is_uppercase() => true,
            // HTTPServer: split before the last capital of a run
            Some(p) if p.is_uppercase() && c.is_uppercase() => {
                chars.get(i + 1).is_some_and(|n| n.is_lowercase())
            }
            _ => false,
        };
        if boundary && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        current.extend(c.to_lowercase());
        prev = Some(c);
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// First term whose tokens appear contiguously in `tokens`.
fn match_term<'t>(tokens: &[String], terms: &'t [String]) -> Option<&'t str> {
    terms.iter().map(String::as_str).find(|term| {
        let needle = tokenize_phrase(term);
        !needle.is_empty() && tokens.windows(needle.len()).any(|window| window == needle.as_slice())
    })
}

/// Terms are phrases, so a trailing word like "web app" must not lose its
/// last token to extension stripping.
fn tokenize_phrase(term: &str) -> Vec<String> {
    term.split_whitespace().flat_map(tokenize).collect()
}

impl PresentationPolicy {
    /// Matching term if `text` contains one of `terms` as whole tokens.
    pub fn matches_terms<'t>(&self, text: &str, terms: &'t [String]) -> Option<&'t str> {
        match_term(&tokenize(text), terms)
    }

    /// Why a planned module is presentation layer, if it is.
    pub fn module_marker(&self, module: &ModuleSpec) -> Option<String> {
        if self.allow.iter().any(|a| a == &module.name) {
            return None;
        }
        if let Some(term) = self.matches_terms(&module.name, &self.name_terms) {
            return Some(format!("name matches `{term}`"));
        }
        if let Some(term) = match_term(&tokenize_phrase(&module.purpose), &self.purpose_terms) {
            return Some(format!("purpose mentions `{term}`"));
        }
        None
    }

    /// Presentation markers found in analyzed source.
    pub fn source_markers(&self, imports: &[String], interface: &ModuleInterface) -> Vec<String> {
        let mut markers = Vec::new();
        for import in imports {
            let root = import.split('.').next().unwrap_or(import).to_lowercase();
            if self.import_terms.iter().any(|t| t.eq_ignore_ascii_case(&root)) {
                markers.push(format!("import {import}"));
            }
        }
        let top_level = interface
            .classes
            .iter()
            .map(|c| c.name.as_str())
            .chain(interface.functions().map(|f| f.name.as_str()));
        for symbol in top_level {
            if let Some(term) = match_term(&tokenize_phrase(symbol), &self.symbol_terms) {
                markers.push(format!("symbol {symbol} matches `{term}`"));
            }
        }
        markers
    }
}
