//! Configuration passed explicitly into each component.

use serde::{Deserialize, Serialize};

use crate::policy::PresentationPolicy;

/// Knobs shared by the planner, creator and assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Retries after the first module creation attempt.
    pub max_retries: u32,
    /// Retries after the first attempt for integration, test and demo steps.
    pub assembly_max_retries: u32,
    /// Requirements embedded in the planning prompt are cut to this many characters.
    pub requirements_char_limit: usize,
    pub presentation: PresentationPolicy,
    pub naming: TargetNaming,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            assembly_max_retries: 2,
            requirements_char_limit: 2000,
            presentation: PresentationPolicy::default(),
            naming: TargetNaming::default(),
        }
    }
}

/// Naming conventions of the generated project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetNaming {
    pub language: String,
    pub extension: String,
    pub integration_file: String,
    pub demo_file: String,
    pub docs_file: String,
    pub test_prefix: String,
}

impl Default for TargetNaming {
    fn default() -> Self {
        Self {
            language: "Python".into(),
            extension: "py".into(),
            integration_file: "system_integration.py".into(),
            demo_file: "app.py".into(),
            docs_file: "README.md".into(),
            test_prefix: "test_".into(),
        }
    }
}

impl TargetNaming {
    /// Module name without its extension.
    pub fn stem<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(&format!(".{}", self.extension)).unwrap_or(name)
    }

    /// Normalize a planned module name to a file name.
    pub fn module_file(&self, name: &str) -> String {
        format!("{}.{}", self.stem(name), self.extension)
    }

    /// `store.py` → `test_store.py`.
    pub fn test_file(&self, module: &str) -> String {
        format!("{}{}.{}", self.test_prefix, self.stem(module), self.extension)
    }

    /// Import path of a module inside the generated project.
    pub fn import_name<'a>(&self, module: &'a str) -> &'a str {
        self.stem(module)
    }
}
