//! Pure verdict logic of the validation gate.
//!
//! The harness adapter runs the toolchain and reports an [`Execution`]; this
//! module turns that plus optional lint issues into a [`Verdict`].

use super::dataset::Dataset;
use super::types::Verdict;

/// Observed result of executing an artifact once.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Exit status 0 and no timeout.
    pub success: bool,
    /// Toolchain output (stderr/stdout) or a short reason.
    pub message: String,
    /// Parsed output dataset, if one was written and could be parsed.
    pub output: Option<Dataset>,
}

/// Knobs for [`judge`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatePolicy {
    /// Columns that must never hold negative numbers.
    pub non_negative_fields: Vec<String>,
    /// Fail the call when the style check reports issues.
    pub lint_blocking: bool,
    /// Maximum message length in bytes.
    pub message_limit: usize,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            non_negative_fields: Vec::new(),
            lint_blocking: false,
            message_limit: 4_000,
        }
    }
}

/// Combine the runtime check and the style check into one verdict.
///
/// Runtime failure always fails. Lint issues fail only when blocking.
pub fn judge(execution: &Execution, lint_issues: &[String], policy: &GatePolicy) -> Verdict {
    let verdict = runtime_verdict(execution, policy);
    let verdict = match verdict {
        Verdict::Pass { message } if !lint_issues.is_empty() => {
            let issues = format!(
                "{} style issue(s):\n{}",
                lint_issues.len(),
                lint_issues.join("\n")
            );
            if policy.lint_blocking {
                Verdict::fail(issues)
            } else {
                Verdict::pass(format!("{message}; {issues}"))
            }
        }
        other => other,
    };
    truncate(verdict, policy.message_limit)
}

fn runtime_verdict(execution: &Execution, policy: &GatePolicy) -> Verdict {
    if !execution.success {
        let message = execution.message.trim();
        return Verdict::fail(if message.is_empty() {
            "runtime error (no output)".to_string()
        } else {
            format!("runtime error:\n{message}")
        });
    }
    let Some(output) = &execution.output else {
        return Verdict::fail("no result: the artifact did not return a dataset");
    };
    if output.is_empty() {
        return Verdict::fail("empty result: the returned dataset has no rows");
    }
    for field in &policy.non_negative_fields {
        let rows = output.negative_rows(field);
        if !rows.is_empty() {
            return Verdict::fail(format!(
                "logic violation: '{field}' is negative in {} row(s) (first at row {})",
                rows.len(),
                rows[0]
            ));
        }
    }
    Verdict::pass(format!(
        "ok: {} rows, {} fields",
        output.row_count(),
        output.fields().len()
    ))
}

fn truncate(verdict: Verdict, limit: usize) -> Verdict {
    if verdict.message().len() <= limit {
        return verdict;
    }
    let mut cut = limit;
    while !verdict.message().is_char_boundary(cut) {
        cut -= 1;
    }
    let text = format!("{}\n[truncated]", &verdict.message()[..cut]);
    match verdict {
        Verdict::Pass { .. } => Verdict::pass(text),
        Verdict::Fail { .. } => Verdict::fail(text),
    }
}
