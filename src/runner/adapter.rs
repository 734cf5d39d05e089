use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::discovery::NormalizedConfig;

/// Characters escaped in single-test name filters.
const REGEX_METACHARS: &[char] = &[
    '.', '*', '+', '?', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

#[derive(Debug, Clone, PartialEq)]
pub struct TestCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl TestCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Shell-style rendering for logs; arguments needing it are single-quoted.
impl fmt::Display for TestCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
            if plain {
                write!(f, " {}", arg)?;
            } else {
                write!(f, " '{}'", arg.replace('\'', r"'\''"))?;
            }
        }
        Ok(())
    }
}

/// Everything an adapter needs to synthesize one invocation.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub test_path: &'a Path,
    pub test_name: Option<&'a str>,
    pub workspace_root: &'a Path,
    pub config: Option<&'a NormalizedConfig>,
    /// File `config` was read from.
    pub config_path: Option<&'a Path>,
    /// Resolved headed decision (discovered config over user default).
    pub run_headed: bool,
}

impl BuildContext<'_> {
    /// Test path relative to the workspace root, or as given when it lies outside.
    pub fn relative_test_path(&self) -> String {
        self.test_path
            .strip_prefix(self.workspace_root)
            .unwrap_or(self.test_path)
            .to_string_lossy()
            .to_string()
    }

    pub fn config_headless(&self) -> Option<bool> {
        self.config.and_then(NormalizedConfig::effective_headless)
    }

    pub fn first_browser(&self) -> Option<&str> {
        self.config
            .and_then(|c| c.browsers.as_ref())
            .and_then(|b| b.first())
            .map(String::as_str)
    }
}

/// How an ecosystem's per-iteration machine-readable reports are named and
/// merged into one HTML report.
#[derive(Debug)]
pub struct ReportMergeSpec {
    /// Directory under the workspace root holding per-iteration artifacts.
    pub artifact_dir: &'static str,
    /// Environment variable telling the runner where to write one artifact.
    pub artifact_env: &'static str,
    pub artifact_extension: &'static str,
    /// Report directory under the workspace root when the config names none.
    pub default_output_dir: &'static str,
    /// Environment variable telling the merge tool where to write.
    pub output_env: &'static str,
    /// Entry-point file of the merged report.
    pub entry_point: &'static str,
}

impl ReportMergeSpec {
    pub fn artifact_dir(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(self.artifact_dir)
    }

    pub fn artifact_path(&self, workspace_root: &Path, iteration: u32) -> PathBuf {
        self.artifact_dir(workspace_root)
            .join(format!("report-{}.{}", iteration, self.artifact_extension))
    }
}

pub trait CommandAdapter: Send + Sync {
    /// Human-readable name: "playwright", "pytest".
    fn name(&self) -> &str;

    /// Files whose presence marks a workspace root for this ecosystem.
    fn workspace_markers(&self) -> &'static [&'static str];

    /// Whether `dir` is a workspace root for this ecosystem.
    fn is_workspace_root(&self, dir: &Path) -> bool {
        self.workspace_markers()
            .iter()
            .any(|marker| dir.join(marker).exists())
    }

    /// Build the command for one iteration.
    fn build_command(&self, ctx: &BuildContext<'_>) -> crate::Result<TestCommand>;

    /// Report merging support. Default: none.
    fn report_merge(&self) -> Option<&'static ReportMergeSpec> {
        None
    }

    /// Command merging every artifact in `artifact_dir` into one report.
    fn merge_command(&self, _artifact_dir: &Path) -> Option<TestCommand> {
        None
    }
}

/// Escape regex metacharacters so a test name matches literally.
pub fn escape_regex(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if REGEX_METACHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_regex_metachars() {
        assert_eq!(escape_regex("logs in (twice)"), r"logs in \(twice\)");
        assert_eq!(escape_regex("a.b*c+d?"), r"a\.b\*c\+d\?");
        assert_eq!(escape_regex("[x] {y} ^$|\\"), r"\[x\] \{y\} \^\$\|\\");
        assert_eq!(escape_regex("plain name"), "plain name");
    }

    #[test]
    fn test_display_quotes_when_needed() {
        let cmd = TestCommand::new("npx")
            .args(["playwright", "test", "--grep"])
            .arg(r"logs in \(twice\)");
        assert_eq!(cmd.to_string(), r"npx playwright test --grep 'logs in \(twice\)'");
    }

    #[test]
    fn test_relative_test_path() {
        let ctx = BuildContext {
            test_path: Path::new("/ws/e2e/login.spec.ts"),
            test_name: None,
            workspace_root: Path::new("/ws"),
            config: None,
            config_path: None,
            run_headed: false,
        };
        assert_eq!(ctx.relative_test_path(), Path::new("e2e/login.spec.ts").to_string_lossy());

        let outside = BuildContext { test_path: Path::new("/other/a.py"), ..ctx };
        assert_eq!(outside.relative_test_path(), "/other/a.py");
    }
}
