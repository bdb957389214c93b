//! The run log: one JSON record of everything a run decided and produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::BlockedPipelineError;
use crate::model::{ArtifactSet, ModuleCreationState, ModuleOutcomes, SystemArchitecture, UnitStatus};

pub const RUN_LOG_FILE: &str = "run_log.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the requirements text.
    pub requirements_sha256: String,
    pub architecture: SystemArchitecture,
    pub state: ModuleCreationState,
    pub modules: ModuleOutcomes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked: Option<BlockedPipelineError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly: Option<ArtifactSet>,
    /// Why assembly did not run, when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembly_error: Option<String>,
}

impl RunLog {
    pub fn new(requirements: &str, architecture: SystemArchitecture, state: ModuleCreationState) -> Self {
        Self {
            created_at: Utc::now(),
            requirements_sha256: requirements_digest(requirements),
            architecture,
            state,
            modules: ModuleOutcomes::new(),
            blocked: None,
            assembly: None,
            assembly_error: None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Every unit that did not complete, labelled for the summary.
    pub fn failed_units(&self) -> Vec<String> {
        let mut failed: Vec<String> = self
            .state
            .graph()
            .names()
            .filter(|n| self.state.status(n) != Some(UnitStatus::Completed))
            .map(|n| format!("module {n}"))
            .collect();
        match &self.assembly {
            Some(set) => failed.extend(set.failed_steps()),
            None => failed.push("assembly".to_string()),
        }
        failed
    }

    pub fn succeeded(&self) -> bool {
        self.failed_units().is_empty()
    }
}

pub fn requirements_digest(requirements: &str) -> String {
    format!("{:x}", Sha256::digest(requirements.as_bytes()))
}
