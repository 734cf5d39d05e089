use std::path::Path;

use super::adapter::*;

pub struct DotnetAdapter;

impl CommandAdapter for DotnetAdapter {
    fn name(&self) -> &str {
        "dotnet"
    }

    fn workspace_markers(&self) -> &'static [&'static str] {
        &["Directory.Build.props", "global.json", "appsettings.json"]
    }

    fn is_workspace_root(&self, dir: &Path) -> bool {
        has_project_file(dir)
            || self.workspace_markers().iter().any(|m| dir.join(m).exists())
    }

    fn build_command(&self, ctx: &BuildContext<'_>) -> crate::Result<TestCommand> {
        let mut cmd = TestCommand::new("dotnet").arg("test");

        if ctx.config_headless().is_some() {
            let headless = if ctx.run_headed { "false" } else { "true" };
            cmd = cmd
                .arg("--environment")
                .arg(format!("PLAYWRIGHT_HEADLESS={}", headless));
        }
        if let Some(browser) = ctx.first_browser() {
            cmd = cmd
                .arg("--environment")
                .arg(format!("PLAYWRIGHT_BROWSER={}", browser));
        }

        let cmd = match ctx.test_name {
            Some(name) => cmd.arg("--filter").arg(format!("Name={}", escape_regex(name))),
            None => cmd.arg(ctx.relative_test_path()),
        };
        Ok(cmd)
    }
}

/// Project and solution files also mark a workspace; their names vary.
fn has_project_file(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|e| {
                let path = e.path();
                matches!(
                    path.extension().and_then(|x| x.to_str()),
                    Some("csproj") | Some("sln")
                )
            })
        })
        .unwrap_or(false)
}
