use std::path::Path;

use super::adapter::*;

pub struct MavenAdapter;

impl CommandAdapter for MavenAdapter {
    fn name(&self) -> &str {
        "maven"
    }

    fn workspace_markers(&self) -> &'static [&'static str] {
        &["pom.xml", "build.gradle", "build.gradle.kts"]
    }

    fn build_command(&self, ctx: &BuildContext<'_>) -> crate::Result<TestCommand> {
        let mut cmd = TestCommand::new(maven_program()).arg("test");

        // Only override what the project config already decides.
        if ctx.config_headless().is_some() {
            cmd = cmd.arg(format!("-Dplaywright.headless={}", !ctx.run_headed));
        }
        if let Some(browser) = ctx.first_browser() {
            cmd = cmd.arg(format!("-Dplaywright.browser={}", browser));
        }

        let class = test_class(ctx.test_path);
        let selector = match ctx.test_name {
            Some(name) => format!("{}#{}", class, escape_regex(name)),
            None => class,
        };
        Ok(cmd.arg(format!("-Dtest={}", selector)))
    }
}

/// Surefire selects by simple class name, which is the file stem.
fn test_class(test_path: &Path) -> String {
    test_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn maven_program() -> &'static str {
    if cfg!(windows) {
        "mvn.cmd"
    } else {
        "mvn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::NormalizedConfig;

    fn ctx<'a>(config: Option<&'a NormalizedConfig>, name: Option<&'a str>, headed: bool) -> BuildContext<'a> {
        BuildContext {
            test_path: Path::new("/ws/src/test/java/com/acme/LoginTest.java"),
            test_name: name,
            workspace_root: Path::new("/ws"),
            config,
            config_path: None,
            run_headed: headed,
        }
    }

    #[test]
    fn test_class_selector_without_config() {
        let cmd = MavenAdapter.build_command(&ctx(None, None, true)).unwrap();
        assert_eq!(cmd.args, vec!["test", "-Dtest=LoginTest"]);
    }

    #[test]
    fn test_method_selector_and_properties() {
        let config = NormalizedConfig {
            headless: Some(true),
            browsers: Some(vec!["firefox".into(), "webkit".into()]),
            ..Default::default()
        };
        let cmd = MavenAdapter
            .build_command(&ctx(Some(&config), Some("shouldLogin"), true))
            .unwrap();
        assert_eq!(
            cmd.args,
            vec![
                "test",
                "-Dplaywright.headless=false",
                "-Dplaywright.browser=firefox",
                "-Dtest=LoginTest#shouldLogin",
            ]
        );
    }
}
