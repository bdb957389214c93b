//! Completion summary printed at the end of a run.

use std::fmt::Write;

use devcrew_core::{Outcome, RunLog, UnitStatus};

const WIDTH: usize = 88;

/// Render the summary for a finished (or aborted) run.
pub fn render(log: &RunLog, files: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} ===", log.architecture.system_name);

    let names: Vec<&str> = log.state.graph().names().collect();
    let completed: Vec<&str> =
        names.iter().copied().filter(|n| log.state.status(n) == Some(UnitStatus::Completed)).collect();
    let _ = writeln!(out, "Modules: {}/{} completed", completed.len(), names.len());
    for name in &names {
        let status = log.state.status(name).unwrap_or(UnitStatus::Pending);
        let retries = log.modules.get(*name).and_then(Outcome::latest).map_or(0, |m| m.retry_count);
        let mark = if status == UnitStatus::Completed { "ok" } else { "FAILED" };
        let _ = writeln!(out, "  [{mark}] {name} ({status}, {retries} retries)");
        if let Some(outcome) = log.modules.get(*name) {
            push_diagnostics(&mut out, outcome.diagnostics());
        }
    }

    if let Some(blocked) = &log.blocked {
        let _ = writeln!(out, "Blocked:");
        push_diagnostics(&mut out, &[blocked.to_string()]);
    }

    match &log.assembly {
        Some(set) => {
            let _ = writeln!(out, "Assembly:");
            step(&mut out, "integration", &set.integration);
            for (module, test) in &set.tests {
                step(&mut out, &format!("tests for {module}"), test);
            }
            step(&mut out, "demo", &set.demo);
            step(&mut out, "documentation", &set.docs);
            if !set.omitted.is_empty() {
                let _ = writeln!(out, "Omitted:");
                for omission in &set.omitted {
                    let _ = writeln!(out, "  - {}: {}", omission.module, omission.reason);
                }
            }
        }
        None => {
            let reason = log.assembly_error.as_deref().unwrap_or("not run");
            let _ = writeln!(out, "Assembly: skipped ({reason})");
        }
    }

    if !files.is_empty() {
        let _ = writeln!(out, "Files:");
        for file in files {
            let _ = writeln!(out, "  {file}");
        }
    }

    let failed = log.failed_units();
    if failed.is_empty() {
        let _ = writeln!(out, "Result: all units completed");
    } else {
        let _ = writeln!(out, "Result: {} unit(s) failed: {}", failed.len(), failed.join(", "));
    }
    out
}

fn step<T>(out: &mut String, label: &str, outcome: &Outcome<T>) {
    let mark = if outcome.is_completed() { "ok" } else { "FAILED" };
    let _ = writeln!(out, "  [{mark}] {label}");
    push_diagnostics(out, outcome.diagnostics());
}

fn push_diagnostics(out: &mut String, diagnostics: &[String]) {
    for diagnostic in diagnostics {
        for (i, line) in wrap_lines(diagnostic, WIDTH).into_iter().enumerate() {
            let bullet = if i == 0 { "-" } else { " " };
            let _ = writeln!(out, "      {bullet} {line}");
        }
    }
}

/// Word-wrap each line of `text` to at most `max_len` characters. Single
/// words longer than that are kept whole.
pub fn wrap_lines(text: &str, max_len: usize) -> Vec<String> {
    let mut result = Vec::new();
    for line in text.lines() {
        if line.chars().count() <= max_len {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        for word in line.split_whitespace() {
            if !current.is_empty() && current.chars().count() + word.chars().count() + 1 > max_len {
                result.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        }
        if !current.is_empty() {
            result.push(current);
        }
    }
    result
}
