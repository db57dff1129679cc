//! Text rendering for `runlog list`

use chrono::DateTime;
use colored::{ColoredString, Colorize};
use runlog::RunStatus;
use std::path::Path;

use crate::services::RunSummary;

/// Render the run listing, grouped by project in listing order
pub fn render_run_list(projects_dir: &Path, runs: &[RunSummary]) -> String {
    if runs.is_empty() {
        return format!("{} {}\n", "No runs found in".yellow(), projects_dir.display());
    }

    let mut projects: Vec<&str> = Vec::new();
    for run in runs {
        if !projects.contains(&run.project.as_str()) {
            projects.push(&run.project);
        }
    }

    let mut out = String::new();
    for project in projects {
        out.push_str(&format!("{}\n", project.bold()));
        for run in runs.iter().filter(|r| r.project == project) {
            let mut line = format!("  {} {}", status_label(run.status), run.run_name);
            if let Some(experiment) = &run.experiment_name {
                line.push_str(&format!("  ({})", experiment));
            }
            if let Some(created) = &run.created_at {
                line.push_str(&format!("  created {}", truncate_to_seconds(created)));
            }
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.push_str(&format!("\nTotal: {} run(s)\n", runs.len()));
    out
}

fn status_label(status: RunStatus) -> ColoredString {
    let label = format!("[{}]", status);
    match status {
        RunStatus::Running => label.yellow(),
        RunStatus::Finished => label.green(),
        RunStatus::Failed => label.red(),
        RunStatus::Unknown => label.dimmed(),
    }
}

fn truncate_to_seconds(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.chars().take(19).collect(),
    }
}
