//! Human-readable output formatting

use crate::engine::ExecutionOutcome;

pub fn format_human(outcome: &ExecutionOutcome) -> String {
    let mut sections = Vec::new();

    if !outcome.stdout.is_empty() {
        sections.push(outcome.stdout.clone());
    }
    if !outcome.stderr.is_empty() {
        sections.push(format!("stderr: {}", outcome.stderr));
    }
    if let Some(result) = &outcome.result {
        sections.push(format!("=> {}", result.render()));
    }
    if let Some(fault) = &outcome.fault_before_run {
        sections.push(format!("error (parse): {}", fault.message));
    }
    if let Some(fault) = &outcome.fault_during_run {
        sections.push(format!("error (runtime): {}", fault));
    }

    if sections.is_empty() {
        String::new()
    } else {
        sections.join("\n")
    }
}
