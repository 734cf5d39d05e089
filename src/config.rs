use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MAX_DEFAULT_ITERATIONS: u32 = 10_000;

/// User-level run defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerSettings {
    pub default_iterations: u32,
    pub show_progress: bool,
    pub stop_on_first_failure: bool,
    /// Fallback when the discovered test config says nothing about headless mode.
    pub run_headed: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            default_iterations: 5,
            show_progress: true,
            stop_on_first_failure: false,
            run_headed: true,
        }
    }
}

/// Raw JSON representation; every field is optional for partial overrides.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    default_iterations: Option<u32>,
    show_progress: Option<bool>,
    stop_on_first_failure: Option<bool>,
    run_headed: Option<bool>,
}

/// Resolve settings: defaults → user global → project-local.
pub fn resolve(project_root: Option<&Path>) -> RunnerSettings {
    let global_path = dirs::home_dir().map(|h| h.join(".retest/settings.json"));
    let project_path = project_root.map(|r| r.join(".retest/settings.json"));
    resolve_with_paths(global_path.as_deref(), project_path.as_deref())
}

/// Testable resolver that accepts explicit file paths (no home dir dependency).
fn resolve_with_paths(global_path: Option<&Path>, project_path: Option<&Path>) -> RunnerSettings {
    let mut settings = RunnerSettings::default();

    if let Some(path) = global_path {
        apply_file(&mut settings, path);
    }
    if let Some(path) = project_path {
        apply_file(&mut settings, path);
    }

    settings
}

fn apply_file(settings: &mut RunnerSettings, path: &Path) {
    let Ok(content) = std::fs::read_to_string(path) else { return };
    let Ok(file) = serde_json::from_str::<SettingsFile>(&content) else {
        tracing::warn!("Invalid settings file, ignoring: {}", path.display());
        return;
    };
    if let Some(v) = file.default_iterations {
        if (1..=MAX_DEFAULT_ITERATIONS).contains(&v) {
            settings.default_iterations = v;
        } else {
            tracing::warn!(
                "defaultIterations ({}) out of range (1..{}), keeping {}",
                v,
                MAX_DEFAULT_ITERATIONS,
                settings.default_iterations
            );
        }
    }
    if let Some(v) = file.show_progress {
        settings.show_progress = v;
    }
    if let Some(v) = file.stop_on_first_failure {
        settings.stop_on_first_failure = v;
    }
    if let Some(v) = file.run_headed {
        settings.run_headed = v;
    }
}
