//! Claude API client used as the code-synthesis oracle.
//!
//! One non-streaming Messages API request per oracle call. Each role gets
//! its own system prompt; the request body is the rendered oracle request.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use devcrew_core::{CodeSynthesisOracle, OracleRequest, Role};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_MAX_TOKENS: u32 = 8192;
const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Block types this client does not use.
    #[serde(other)]
    Other,
}

/// Response from Claude API.
#[derive(Debug, Deserialize)]
pub struct ApiResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Option<Usage>,
}

impl ApiResponse {
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Claude API client.
pub struct LlmClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            endpoint: API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Point at a different Messages API endpoint (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a conversation to Claude and get a response.
    pub async fn chat(&self, system: &str, messages: &[Message]) -> Result<ApiResponse> {
        let body = serde_json::json!({
            "model": &self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to call Claude API")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Claude API error {status}: {body}");
        }

        resp.json::<ApiResponse>()
            .await
            .context("Failed to parse Claude response")
    }

    /// Single-turn text completion.
    pub async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let messages = vec![Message { role: "user".to_string(), content: prompt.to_string() }];
        let resp = self.chat(system, &messages).await?;
        if let Some(usage) = &resp.usage {
            debug!(
                model = %self.model,
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                stop_reason = resp.stop_reason.as_deref().unwrap_or(""),
                "Claude usage"
            );
        }
        if resp.stop_reason.as_deref() == Some("max_tokens") {
            tracing::warn!(model = %self.model, "Reply truncated at max_tokens");
        }
        Ok(resp.text())
    }
}

impl CodeSynthesisOracle for LlmClient {
    async fn synthesize(&self, request: &OracleRequest) -> Result<String> {
        debug!(role = %request.role, target = %request.target, retry = request.feedback.is_some(), "Oracle request");
        self.complete(system_prompt(request.role), &request.render()).await
    }
}

pub fn system_prompt(role: Role) -> &'static str {
    match role {
        Role::Architect => ARCHITECT_SYSTEM,
        Role::ModuleEngineer => MODULE_ENGINEER_SYSTEM,
        Role::Integrator => INTEGRATOR_SYSTEM,
        Role::TestEngineer => TEST_ENGINEER_SYSTEM,
        Role::DemoEngineer => DEMO_ENGINEER_SYSTEM,
        Role::TechnicalWriter => TECHNICAL_WRITER_SYSTEM,
    }
}

const ARCHITECT_SYSTEM: &str = r#"You are a software architect. You turn requirements into a small set of business-logic modules with explicit, typed interfaces and an acyclic dependency graph.

Rules:
- Only business logic, storage and external integrations. Never user-interface modules.
- Every method another module will call is listed with parameter and return types.
- Reply with the JSON document only."#;

const MODULE_ENGINEER_SYSTEM: &str = r#"You are a senior engineer implementing one module of a larger system.

Rules:
- Implement exactly the requested class and method signatures.
- Use dependencies only through the interfaces you are given. Do not invent methods.
- No user-interface code or UI framework imports.
- Production quality: type hints, docstrings, input validation.
- Return the complete module in a single fenced code block."#;

const INTEGRATOR_SYSTEM: &str = r#"You are an integration engineer. You write the single class that wires finished modules into a working system.

Rules:
- Call modules only through the interfaces you are given.
- Do not import modules that are marked unavailable.
- No user-interface code.
- Return the complete file in a single fenced code block."#;

const TEST_ENGINEER_SYSTEM: &str = r#"You are a test engineer. You write focused unit tests for one module.

Rules:
- Test functions or methods are named test_*.
- Exercise every public method, including edge cases.
- Use only the methods listed in the interface.
- Return the complete file in a single fenced code block."#;

const DEMO_ENGINEER_SYSTEM: &str = r#"You build a small interactive demo for a finished system.

Rules:
- Drive the system only through the integration class and its listed methods.
- A user-interface framework is allowed here.
- Return the complete file in a single fenced code block."#;

const TECHNICAL_WRITER_SYSTEM: &str = r#"You are a technical writer. You produce a clear README in Markdown for a generated project: overview, setup, usage, tests and module layout. Reply with the Markdown only."#;
