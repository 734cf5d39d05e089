use super::adapter::*;

pub struct PytestAdapter;

impl CommandAdapter for PytestAdapter {
    fn name(&self) -> &str {
        "pytest"
    }

    fn workspace_markers(&self) -> &'static [&'static str] {
        &["pytest.ini", "pyproject.toml", "setup.cfg", "tox.ini", "conftest.py"]
    }

    fn build_command(&self, ctx: &BuildContext<'_>) -> crate::Result<TestCommand> {
        let mut cmd = TestCommand::new(python_program()).args(["-m", "pytest"]);

        // pytest-playwright is headless unless told otherwise.
        if ctx.run_headed {
            cmd = cmd.arg("--headed");
        }
        if let Some(browsers) = ctx.config.and_then(|c| c.browsers.as_ref()) {
            for browser in browsers {
                cmd = cmd.arg("--browser").arg(browser);
            }
        }

        let target = match ctx.test_name {
            Some(name) => format!("{}::{}", ctx.relative_test_path(), name),
            None => ctx.relative_test_path(),
        };
        Ok(cmd.arg(target).arg("-v"))
    }
}

fn python_program() -> &'static str {
    if cfg!(windows) {
        "python"
    } else {
        "python3"
    }
}
