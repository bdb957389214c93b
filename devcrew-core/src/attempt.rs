//! Bounded generate → validate → feedback loop shared by module creation
//! and assembly.

use tracing::{error, info, warn};

use crate::error::ValidationError;
use crate::oracle::{CodeSynthesisOracle, OracleRequest, extract_source};
use crate::validate::render_feedback;

/// What the loop ended with.
pub(crate) struct AttemptOutcome<T> {
    /// Source of the final attempt.
    pub source: String,
    pub result: Result<T, ValidationError>,
    /// Attempts made beyond the first.
    pub retry_count: u32,
    /// One line per earlier rejected attempt.
    pub history: Vec<String>,
}

/// Drives up to `max_retries + 1` oracle calls until `check` accepts a reply.
pub(crate) struct AttemptLoop<'a, O> {
    pub oracle: &'a O,
    pub max_retries: u32,
    /// Target language label, used for fences in feedback.
    pub language: &'a str,
    /// Signatures restated in feedback.
    pub required: Vec<String>,
}

impl<'a, O: CodeSynthesisOracle> AttemptLoop<'a, O> {
    /// Oracle transport failures are returned as `Err` with the rendered
    /// error chain; validation failures never are.
    pub async fn run<T>(
        &self,
        request: OracleRequest,
        mut check: impl FnMut(&str) -> Result<T, ValidationError>,
    ) -> Result<AttemptOutcome<T>, String> {
        let unit = request.target.clone();
        let mut feedback = None;
        let mut history = Vec::new();
        let mut attempt: u32 = 0;
        loop {
            let request = request.clone().with_feedback(feedback.take());
            let reply = self.oracle.synthesize(&request).await.map_err(|e| format!("{e:#}"))?;
            let source = extract_source(&reply);

            let err = match check(&source) {
                Ok(value) => {
                    if attempt > 0 {
                        info!(unit = %unit, retry_count = attempt, "Accepted after retry");
                    }
                    return Ok(AttemptOutcome { source, result: Ok(value), retry_count: attempt, history });
                }
                Err(err) => err,
            };

            if attempt >= self.max_retries {
                error!(unit = %unit, attempts = attempt + 1, error = %err, "Retries exhausted");
                return Ok(AttemptOutcome { source, result: Err(err), retry_count: attempt, history });
            }

            warn!(unit = %unit, attempt = attempt + 1, error = %err, "Attempt rejected");
            history.push(format!("attempt {}: {err}", attempt + 1));
            feedback = Some(render_feedback(&err, &self.required, &source, self.language));
            attempt += 1;
        }
    }
}
