use std::path::Path;

use serde::Deserialize;

use super::adapter::*;
use crate::discovery;

pub struct PlaywrightAdapter;

/// Config files passed through with `--config`; same search as discovery
/// but only the runner's own filenames.
const CONFIG_FILES: &[&str] = &[
    "playwright.config.ts",
    "playwright.config.js",
    "playwright.config.mjs",
    "playwright.config.cjs",
];

static BLOB_REPORT: ReportMergeSpec = ReportMergeSpec {
    artifact_dir: "blob-report",
    artifact_env: "PLAYWRIGHT_BLOB_OUTPUT_FILE",
    artifact_extension: "zip",
    default_output_dir: "playwright-report",
    output_env: "PLAYWRIGHT_HTML_REPORT",
    entry_point: "index.html",
};

#[derive(Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    scripts: std::collections::HashMap<String, String>,
}

impl CommandAdapter for PlaywrightAdapter {
    fn name(&self) -> &str {
        "playwright"
    }

    fn workspace_markers(&self) -> &'static [&'static str] {
        &["package.json", "playwright.config.ts", "playwright.config.js"]
    }

    fn build_command(&self, ctx: &BuildContext<'_>) -> crate::Result<TestCommand> {
        // Serialize iterations and keep one blob per run regardless of user config.
        let mut flags: Vec<String> = vec![
            "--workers".into(),
            "1".into(),
            "--reporter".into(),
            "blob".into(),
        ];

        // The file headed mode was reconciled against, else the nearest one.
        let config_path = ctx.config_path.map(Path::to_path_buf).or_else(|| {
            discovery::find_config_file(ctx.test_path, CONFIG_FILES, Some(ctx.workspace_root))
        });
        if let Some(config_path) = config_path {
            flags.push("--config".into());
            flags.push(config_path.to_string_lossy().to_string());
        }

        // Playwright itself runs headless unless its config says otherwise.
        let config_runs_headless = ctx.config_headless().unwrap_or(true);
        if ctx.run_headed && config_runs_headless {
            flags.push("--headed".into());
        }

        let base = match test_script(ctx.workspace_root) {
            Some(script) => TestCommand::new(npm_program("npm")).args(["run", script, "--"]),
            None => TestCommand::new(npm_program("npx")).args(["playwright", "test"]),
        };

        let cmd = match ctx.test_name {
            Some(name) => base.args(flags).arg("--grep").arg(escape_regex(name)),
            None => base.args(flags).arg(ctx.relative_test_path()),
        };
        Ok(cmd)
    }

    fn report_merge(&self) -> Option<&'static ReportMergeSpec> {
        Some(&BLOB_REPORT)
    }

    fn merge_command(&self, artifact_dir: &Path) -> Option<TestCommand> {
        Some(
            TestCommand::new(npm_program("npx"))
                .args(["playwright", "merge-reports", "--reporter", "html"])
                .arg(artifact_dir.to_string_lossy()),
        )
    }
}

/// The npm script to run tests through, if `package.json` declares one.
fn test_script(workspace_root: &Path) -> Option<&'static str> {
    let content = std::fs::read_to_string(workspace_root.join("package.json")).ok()?;
    let pkg: PackageJson = match serde_json::from_str(&content) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Ignoring unparseable package.json: {}", e);
            return None;
        }
    };
    ["test:playwright", "test"]
        .into_iter()
        .find(|name| pkg.scripts.contains_key(*name))
}

fn npm_program(name: &str) -> String {
    if cfg!(windows) {
        format!("{}.cmd", name)
    } else {
        name.to_string()
    }
}
