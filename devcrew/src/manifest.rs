//! Project extras derived from the generated sources: `.env.example` and
//! `requirements.txt`.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::warn;

use devcrew_core::{InterfaceAnalyzer, Outcome, RunLog};

pub const ENV_TEMPLATE_FILE: &str = ".env.example";
pub const REQUIREMENTS_FILE: &str = "requirements.txt";

/// Standard-library roots that never go into requirements.txt.
const STDLIB: &[&str] = &[
    "abc", "argparse", "ast", "asyncio", "base64", "collections", "contextlib", "copy", "csv", "dataclasses",
    "datetime", "decimal", "enum", "functools", "glob", "hashlib", "heapq", "hmac", "http", "io", "itertools",
    "json", "logging", "math", "os", "pathlib", "pickle", "random", "re", "secrets", "shutil", "sqlite3",
    "statistics", "string", "subprocess", "sys", "tempfile", "threading", "time", "traceback", "typing",
    "unittest", "urllib", "uuid", "warnings", "__future__",
];

/// Import name → pinned requirement.
const PINS: &[(&str, &str)] = &[
    ("django", "Django>=4.0.0"),
    ("fastapi", "fastapi>=0.68.0"),
    ("flask", "Flask>=2.0.0"),
    ("gradio", "gradio>=4.0.0"),
    ("numpy", "numpy>=1.21.0"),
    ("pandas", "pandas>=1.3.0"),
    ("pytest", "pytest>=7.0.0"),
    ("requests", "requests>=2.28.0"),
    ("sqlalchemy", "SQLAlchemy>=1.4.0"),
    ("streamlit", "streamlit>=1.0.0"),
];

const ENV_PATTERNS: &[&str] = &[
    r#"os\.(?:getenv|environ\.get)\s*\(\s*['"]([^'"]+)['"](?:\s*,\s*(?:default\s*=\s*)?['"]([^'"]*)['"])?"#,
    r#"os\.environ\s*\[\s*['"]([^'"]+)['"]\s*\]"#,
];

/// A generated file worth scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

/// Every accepted source the run produced, in a stable order.
pub fn generated_sources(log: &RunLog) -> Vec<SourceFile> {
    let mut files: Vec<SourceFile> = log
        .modules
        .iter()
        .filter_map(|(name, outcome)| outcome.completed().map(|m| SourceFile { name: name.clone(), content: m.source.clone() }))
        .collect();
    if let Some(set) = &log.assembly {
        if let Outcome::Completed(integration) = &set.integration {
            files.push(SourceFile { name: integration.file_name.clone(), content: integration.source.clone() });
        }
        for test in set.tests.values().filter_map(Outcome::completed) {
            files.push(SourceFile { name: test.file_name.clone(), content: test.source.clone() });
        }
        if let Outcome::Completed(demo) = &set.demo {
            files.push(SourceFile { name: demo.file_name.clone(), content: demo.source.clone() });
        }
    }
    files
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub default: Option<String>,
    pub description: String,
    pub found_in: String,
}

/// Environment variables read by the sources, keyed by name. The first file
/// mentioning a variable is recorded; a default is taken from any mention.
pub fn scan_env_vars(files: &[SourceFile]) -> BTreeMap<String, EnvVar> {
    let patterns: Vec<Regex> = ENV_PATTERNS.iter().filter_map(|p| Regex::new(p).ok()).collect();
    let mut vars: BTreeMap<String, EnvVar> = BTreeMap::new();
    for file in files {
        for re in &patterns {
            for caps in re.captures_iter(&file.content) {
                let Some(name) = caps.get(1).map(|m| m.as_str().to_string()) else {
                    continue;
                };
                let default = caps.get(2).map(|m| m.as_str().to_string()).filter(|d| !d.is_empty());
                let entry = vars.entry(name.clone()).or_insert_with(|| EnvVar {
                    description: describe_env_var(&name),
                    name,
                    default: None,
                    found_in: file.name.clone(),
                });
                if entry.default.is_none() {
                    entry.default = default;
                }
            }
        }
    }
    vars
}

/// Human-readable description guessed from a variable name.
pub fn describe_env_var(name: &str) -> String {
    let lower = name.to_lowercase();
    let has = |s: &str| lower.contains(s);
    if has("api_key") {
        "API key for external service integration".into()
    } else if has("secret") {
        "Secret key for authentication".into()
    } else if has("token") {
        "Authentication token".into()
    } else if has("url") || has("endpoint") {
        "Service endpoint URL".into()
    } else if has("database") || has("db") {
        "Database connection string".into()
    } else if has("email") {
        "Email service configuration".into()
    } else if has("port") {
        "Service port number".into()
    } else if has("host") {
        "Service host address".into()
    } else {
        format!("Configuration value for {}", lower.replace('_', " "))
    }
}

/// `.env.example` contents, or `None` when no variables are read.
pub fn env_template(files: &[SourceFile]) -> Option<String> {
    let vars = scan_env_vars(files);
    if vars.is_empty() {
        return None;
    }
    let mut out = String::from(
        "# Environment variables\n# Copy this file to .env and fill in real values.\n# Do not commit .env.\n\n",
    );
    for var in vars.values() {
        out.push_str(&format!("# {}\n# Found in: {}\n", var.description, var.found_in));
        out.push_str(&format!("{}={}\n\n", var.name, var.default.as_deref().unwrap_or("your_value_here")));
    }
    Some(out)
}

/// Third-party import roots across `files`, skipping the standard library and
/// the generated modules themselves. Files that fail to parse are skipped.
pub fn third_party_imports<A: InterfaceAnalyzer>(analyzer: &A, files: &[SourceFile]) -> BTreeSet<String> {
    let local: BTreeSet<&str> = files.iter().map(|f| f.name.rsplit_once('.').map_or(f.name.as_str(), |(stem, _)| stem)).collect();
    let mut roots = BTreeSet::new();
    for file in files {
        let imports = match analyzer.imports(&file.content) {
            Ok(imports) => imports,
            Err(e) => {
                warn!(file = %file.name, error = %e, "Skipping imports of unparsable file");
                continue;
            }
        };
        for import in imports {
            let root = import.split('.').next().unwrap_or_default();
            if !root.is_empty() && !STDLIB.contains(&root) && !local.contains(root) {
                roots.insert(root.to_string());
            }
        }
    }
    roots
}

/// `requirements.txt` contents, or `None` when nothing third-party is imported.
pub fn requirements_txt<A: InterfaceAnalyzer>(analyzer: &A, files: &[SourceFile]) -> Option<String> {
    let roots = third_party_imports(analyzer, files);
    if roots.is_empty() {
        return None;
    }
    let mut out = String::from("# Python package requirements\n");
    for root in &roots {
        let pinned = PINS.iter().find(|(name, _)| *name == root.as_str()).map_or(root.as_str(), |(_, pin)| *pin);
        out.push_str(pinned);
        out.push('\n');
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devcrew_core::PythonAnalyzer;

    fn file(name: &str, content: &str) -> SourceFile {
        SourceFile { name: name.into(), content: content.into() }
    }

    #[test]
    fn test_env_vars_from_all_access_styles() {
        let files = vec![
            file(
                "weather.py",
                "import os\nKEY = os.getenv('WEATHER_API_KEY')\nURL = os.environ.get(\"WEATHER_URL\", \"https://api.example.com\")\n",
            ),
            file("store.py", "import os\nDB = os.environ['DATABASE_PATH']\nPORT = os.getenv('PORT', default='8080')\n"),
        ];
        let vars = scan_env_vars(&files);
        let names: Vec<_> = vars.keys().cloned().collect();
        assert_eq!(names, vec!["DATABASE_PATH", "PORT", "WEATHER_API_KEY", "WEATHER_URL"]);
        assert_eq!(vars["WEATHER_URL"].default.as_deref(), Some("https://api.example.com"));
        assert_eq!(vars["PORT"].default.as_deref(), Some("8080"));
        assert_eq!(vars["DATABASE_PATH"].found_in, "store.py");
        assert_eq!(vars["WEATHER_API_KEY"].description, "API key for external service integration");
    }

    #[test]
    fn test_describe_env_var() {
        assert_eq!(describe_env_var("JWT_SECRET"), "Secret key for authentication");
        assert_eq!(describe_env_var("SLACK_TOKEN"), "Authentication token");
        assert_eq!(describe_env_var("SMTP_HOST"), "Service host address");
        assert_eq!(describe_env_var("MAX_ITEMS"), "Configuration value for max items");
    }

    #[test]
    fn test_env_template_layout() {
        let files = vec![file("a.py", "import os\nX = os.getenv('LOG_LEVEL', 'info')\nY = os.getenv('SMTP_HOST')\n")];
        let text = env_template(&files).unwrap();
        assert!(text.contains("# Found in: a.py\nLOG_LEVEL=info\n"));
        assert!(text.contains("SMTP_HOST=your_value_here\n"));
        assert!(env_template(&[file("b.py", "x = 1\n")]).is_none());
    }

    #[test]
    fn test_requirements_exclude_stdlib_and_local_modules() {
        let files = vec![
            file("ledger.py", "import json\nimport requests\nfrom pandas import DataFrame\n"),
            file("report.py", "from ledger import Ledger\nimport matplotlib.pyplot as plt\n"),
            file("app.py", "import gradio as gr\nfrom report import Report\n"),
        ];
        let text = requirements_txt(&PythonAnalyzer::new(), &files).unwrap();
        assert_eq!(
            text,
            "# Python package requirements\ngradio>=4.0.0\nmatplotlib\npandas>=1.3.0\nrequests>=2.28.0\n"
        );
    }

    #[test]
    fn test_no_requirements_for_stdlib_only() {
        let files = vec![file("a.py", "import os\nimport typing\n")];
        assert!(requirements_txt(&PythonAnalyzer::new(), &files).is_none());
    }
}
