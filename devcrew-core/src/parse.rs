//! Decoding the planner's reply into a [`SystemArchitecture`].
//!
//! Replies are loosely structured: sometimes bare JSON, sometimes JSON
//! wrapped in prose or code fences. Decoding runs an ordered chain of
//! stages and the first stage that yields an architecture wins.

use crate::error::ArchitectureParseError;
use crate::model::SystemArchitecture;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// The whole reply is the JSON document.
    Strict,
    /// Each top-level balanced `{...}` span in the reply, in order.
    BracketSpan,
}

impl DecodeStage {
    pub const CHAIN: [DecodeStage; 2] = [DecodeStage::Strict, DecodeStage::BracketSpan];

    fn name(self) -> &'static str {
        match self {
            DecodeStage::Strict => "strict",
            DecodeStage::BracketSpan => "bracket span",
        }
    }

    fn decode(self, raw: &str) -> Result<SystemArchitecture, String> {
        match self {
            DecodeStage::Strict => serde_json::from_str(raw.trim()).map_err(|e| e.to_string()),
            DecodeStage::BracketSpan => {
                let spans = object_spans(raw);
                if spans.is_empty() {
                    return Err("no balanced {...} span found".into());
                }
                let mut last_err = String::new();
                for span in spans {
                    match serde_json::from_str(span) {
                        Ok(arch) => return Ok(arch),
                        Err(e) => last_err = e.to_string(),
                    }
                }
                Err(last_err)
            }
        }
    }
}

/// Run the decode chain over a planner reply.
pub fn decode_architecture(raw: &str) -> Result<SystemArchitecture, ArchitectureParseError> {
    let mut reasons = Vec::new();
    for stage in DecodeStage::CHAIN {
        match stage.decode(raw) {
            Ok(arch) => {
                tracing::debug!(stage = stage.name(), "Decoded architecture");
                return Ok(arch);
            }
            Err(reason) => reasons.push(format!("{}: {reason}", stage.name())),
        }
    }
    Err(ArchitectureParseError { reasons, raw: raw.to_string() })
}

/// Outermost balanced `{...}` spans, honoring JSON string literals and
/// escapes so braces inside strings do not count.
fn object_spans(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0
                    && let Some(s) = start.take()
                {
                    spans.push(&text[s..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}
