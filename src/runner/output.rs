use std::path::Path;

use super::{RunState, RunSummary};

/// `850ms`, `1.5s`, `2m 5s`.
pub fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}m {}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

/// The end-of-run block written to the run log.
pub fn format_summary(summary: &RunSummary) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=== Test Run Summary ===".to_string(),
        format!("Total iterations: {}", summary.total),
        format!("Successful: {}", summary.succeeded),
        format!("Failed: {}", summary.failed),
        format!("Success rate: {:.1}%", summary.success_rate_percent),
        format!("Total duration: {}", format_duration(summary.total_duration_ms)),
        format!("Average duration: {}", format_duration(summary.average_duration_ms)),
    ];
    if summary.state == RunState::Cancelled {
        lines.push(format!(
            "Cancelled after {} of {} iterations",
            summary.total, summary.requested
        ));
    }

    lines.push(String::new());
    lines.push("Iteration timings:".to_string());
    for r in &summary.iterations {
        let status = if r.success { "✅" } else { "❌" };
        lines.push(format!(
            "  {} Iteration {}: {}",
            status,
            r.iteration,
            format_duration(r.duration_ms)
        ));
    }

    if summary.failed > 0 {
        lines.push(String::new());
        lines.push("Failed iterations:".to_string());
        for r in summary.iterations.iter().filter(|r| !r.success) {
            lines.push(format!(
                "  ❌ Iteration {}: {}",
                r.iteration,
                r.error.as_deref().unwrap_or("")
            ));
        }
    }

    if let Some(ref report) = summary.report_path {
        lines.push(String::new());
        lines.push(format!("HTML report: {}", report.display()));
    }
    lines
}

/// One-line completion notice.
pub fn completion_message(summary: &RunSummary) -> String {
    format!(
        "Test completed: {}/{} iterations passed ({})",
        summary.succeeded,
        summary.total,
        format_duration(summary.total_duration_ms)
    )
}

/// Write the summary as pretty JSON.
pub fn write_summary_json(summary: &RunSummary, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(summary)?)?;
    Ok(())
}
