//! Best-effort discovery of a test runner's native configuration.
//!
//! Config files are located by walking from the test file's directory up to
//! the workspace root (nearest directory first) and read with textual
//! patterns rather than real parsers: Playwright configs are programs, and
//! the keys we care about are often dynamic expressions a strict parser
//! would reject.

/// A `&'static Regex` compiled on first use.
macro_rules! regex {
    ($pattern:expr) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($pattern).expect("static regex"))
    }};
}

pub mod csharp;
pub mod expr;
pub mod java;
pub mod javascript;
pub mod python;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::ecosystem::Ecosystem;

/// Settings recognized in a discovered config file. Every field is
/// independently optional: `None` means the file did not say, which is
/// different from an explicit `false` or `0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headless: Option<bool>,
    /// `use: { headless }`; wins over the top-level `headless`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_headless: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expect_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "baseURL")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browsers: Option<Vec<String>>,
}

impl NormalizedConfig {
    /// True when no recognized key was found. Such a file does not count as
    /// a discovered config and the search moves on.
    pub fn is_empty(&self) -> bool {
        *self == NormalizedConfig::default()
    }

    /// Headless setting the config itself asks for: nested `use.headless`
    /// first, then top-level `headless`. `None` when neither is present;
    /// callers supply their own default.
    pub fn effective_headless(&self) -> Option<bool> {
        self.use_headless.or(self.headless)
    }

    /// Human-readable lines describing what was found, for the run log.
    pub fn describe(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.effective_headless() {
            Some(h) => lines.push(format!("Using Playwright config: headless={}", h)),
            None => lines.push("Using Playwright config: headless not set".to_string()),
        }
        if let Some(t) = self.timeout {
            lines.push(format!("Config timeout: {}ms", t));
        }
        if let Some(t) = self.expect_timeout {
            lines.push(format!("Config expect timeout: {}ms", t));
        }
        if let Some(t) = self.action_timeout {
            lines.push(format!("Config action timeout: {}ms", t));
        }
        if let Some(t) = self.navigation_timeout {
            lines.push(format!("Config navigation timeout: {}ms", t));
        }
        if let Some(ref browsers) = self.browsers {
            lines.push(format!("Config browsers: {}", browsers.join(", ")));
        }
        if let Some(ref reporter) = self.reporter {
            lines.push(format!("Config reporter: {}", reporter));
        }
        lines
    }
}

/// Dialect of a candidate config file, selecting which textual reader runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    PlaywrightScript,
    PytestIni,
    PyprojectToml,
    MavenPom,
    Gradle,
    JavaProperties,
    DotnetJson,
    MsbuildXml,
}

const JAVASCRIPT_CANDIDATES: &[(&str, ConfigFormat)] = &[
    ("playwright.config.ts", ConfigFormat::PlaywrightScript),
    ("playwright.config.js", ConfigFormat::PlaywrightScript),
    ("playwright.config.mjs", ConfigFormat::PlaywrightScript),
    ("playwright.config.cjs", ConfigFormat::PlaywrightScript),
    ("tests/playwright.config.ts", ConfigFormat::PlaywrightScript),
    ("tests/playwright.config.js", ConfigFormat::PlaywrightScript),
];

const PYTHON_CANDIDATES: &[(&str, ConfigFormat)] = &[
    ("pytest.ini", ConfigFormat::PytestIni),
    ("pyproject.toml", ConfigFormat::PyprojectToml),
    ("setup.cfg", ConfigFormat::PytestIni),
    ("tox.ini", ConfigFormat::PytestIni),
];

const JAVA_CANDIDATES: &[(&str, ConfigFormat)] = &[
    ("pom.xml", ConfigFormat::MavenPom),
    ("build.gradle", ConfigFormat::Gradle),
    ("build.gradle.kts", ConfigFormat::Gradle),
    ("src/test/resources/application.properties", ConfigFormat::JavaProperties),
    ("src/test/resources/application.yml", ConfigFormat::JavaProperties),
];

const CSHARP_CANDIDATES: &[(&str, ConfigFormat)] = &[
    ("appsettings.json", ConfigFormat::DotnetJson),
    ("appsettings.Test.json", ConfigFormat::DotnetJson),
    ("runsettings.xml", ConfigFormat::MsbuildXml),
    ("Directory.Build.props", ConfigFormat::MsbuildXml),
    ("Directory.Build.targets", ConfigFormat::MsbuildXml),
];

/// Candidate files for an ecosystem, in per-directory priority order.
pub fn candidates(ecosystem: Ecosystem) -> &'static [(&'static str, ConfigFormat)] {
    match ecosystem {
        Ecosystem::JavaScript => JAVASCRIPT_CANDIDATES,
        Ecosystem::Python => PYTHON_CANDIDATES,
        Ecosystem::Java => JAVA_CANDIDATES,
        Ecosystem::CSharp => CSHARP_CANDIDATES,
    }
}

/// Directories to search, nearest first: `start_dir`, then each parent,
/// never escaping above `root`. `root` itself is always included when given.
/// Without a root the walk stops short of the filesystem root.
pub fn search_paths(start_dir: &Path, root: Option<&Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut current = Some(start_dir);

    while let Some(dir) = current {
        // The filesystem root has no parent; it is never searched implicitly.
        let Some(parent) = dir.parent() else { break };
        if dir.as_os_str().is_empty() {
            break;
        }
        paths.push(dir.to_path_buf());

        if root == Some(dir) {
            break;
        }
        if let Some(root) = root {
            if !parent.starts_with(root) {
                break;
            }
        }
        current = Some(parent);
    }

    if let Some(root) = root {
        if !paths.iter().any(|p| p == root) {
            paths.push(root.to_path_buf());
        }
    }

    paths
}

/// Find and read the nearest config for `test_path`. Returns the first
/// candidate (nearest directory, then candidate order) that yields at least
/// one recognized key. Unreadable files are logged and skipped.
pub fn read_config(
    test_path: &Path,
    ecosystem: Ecosystem,
    root: Option<&Path>,
) -> Option<NormalizedConfig> {
    read_config_with_path(test_path, ecosystem, root).map(|(_, config)| config)
}

/// Like [`read_config`] but also returns the file the config came from.
pub fn read_config_with_path(
    test_path: &Path,
    ecosystem: Ecosystem,
    root: Option<&Path>,
) -> Option<(PathBuf, NormalizedConfig)> {
    let test_dir = test_path.parent().unwrap_or(test_path);

    for dir in search_paths(test_dir, root) {
        for (name, format) in candidates(ecosystem) {
            let path = dir.join(name);
            if !path.is_file() {
                continue;
            }
            match read_candidate(&path, *format) {
                Ok(config) if !config.is_empty() => {
                    tracing::debug!("Using {} config from {}", ecosystem, path.display());
                    return Some((path, config));
                }
                Ok(_) => {
                    tracing::debug!("No recognized keys in {}, continuing", path.display());
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
    }

    None
}

/// First existing file among `names`, searched nearest-first. Existence is
/// enough; contents are not inspected.
pub fn find_config_file(test_path: &Path, names: &[&str], root: Option<&Path>) -> Option<PathBuf> {
    let test_dir = test_path.parent().unwrap_or(test_path);
    search_paths(test_dir, root)
        .into_iter()
        .flat_map(|dir| names.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

fn read_candidate(path: &Path, format: ConfigFormat) -> crate::Result<NormalizedConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| crate::Error::ConfigParse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(match format {
        ConfigFormat::PlaywrightScript => javascript::parse_playwright_config(&content),
        ConfigFormat::PytestIni => python::parse_pytest_ini(&content),
        ConfigFormat::PyprojectToml => python::parse_pyproject(&content),
        ConfigFormat::MavenPom => java::parse_pom(&content),
        ConfigFormat::Gradle => java::parse_gradle(&content),
        ConfigFormat::JavaProperties => java::parse_properties(&content),
        ConfigFormat::DotnetJson => csharp::parse_appsettings(&content),
        ConfigFormat::MsbuildXml => csharp::parse_msbuild_xml(&content),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_search_paths_nearest_first_and_bounded() {
        let root = Path::new("/work/project");
        let paths = search_paths(Path::new("/work/project/e2e/auth"), Some(root));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/work/project/e2e/auth"),
                PathBuf::from("/work/project/e2e"),
                PathBuf::from("/work/project"),
            ]
        );
    }

    #[test]
    fn test_search_paths_appends_root_when_start_outside() {
        let paths = search_paths(Path::new("/elsewhere/tests"), Some(Path::new("/work/project")));
        assert_eq!(
            paths,
            vec![PathBuf::from("/elsewhere/tests"), PathBuf::from("/work/project")]
        );
    }

    #[test]
    fn test_search_paths_without_root_skips_filesystem_root() {
        let paths = search_paths(Path::new("/a/b"), None);
        assert_eq!(paths, vec![PathBuf::from("/a/b"), PathBuf::from("/a")]);
    }

    #[test]
    fn test_effective_headless_nested_wins() {
        let config = NormalizedConfig {
            headless: Some(true),
            use_headless: Some(false),
            ..Default::default()
        };
        assert_eq!(config.effective_headless(), Some(false));

        let top_only = NormalizedConfig { headless: Some(true), ..Default::default() };
        assert_eq!(top_only.effective_headless(), Some(true));

        assert_eq!(NormalizedConfig::default().effective_headless(), None);
    }

    #[test]
    fn test_nearest_config_wins() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let test_dir = root.join("e2e");
        std::fs::create_dir_all(&test_dir).unwrap();
        std::fs::write(root.join("playwright.config.ts"), "export default { retries: 1 }").unwrap();
        std::fs::write(test_dir.join("playwright.config.ts"), "export default { retries: 4 }").unwrap();

        let config = read_config(&test_dir.join("login.spec.ts"), Ecosystem::JavaScript, Some(root))
            .expect("config should be found");
        assert_eq!(config.retries, Some(4));
    }

    #[test]
    fn test_file_without_recognized_keys_is_skipped() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let test_dir = root.join("e2e");
        std::fs::create_dir_all(&test_dir).unwrap();
        std::fs::write(test_dir.join("playwright.config.ts"), "export default {}").unwrap();
        std::fs::write(root.join("playwright.config.ts"), "export default { workers: 2 }").unwrap();

        let config = read_config(&test_dir.join("a.spec.ts"), Ecosystem::JavaScript, Some(root)).unwrap();
        assert_eq!(config.workers, Some(2));
    }

    #[test]
    fn test_candidate_order_within_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join("pytest.ini"), "[pytest]\naddopts = --headed\n").unwrap();
        std::fs::write(
            root.join("pyproject.toml"),
            "[tool.pytest.ini_options]\nheadless = true\n",
        )
        .unwrap();

        let config = read_config(&root.join("test_a.py"), Ecosystem::Python, Some(root)).unwrap();
        assert_eq!(config.headless, Some(false));
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempdir().unwrap();
        let result = read_config(&dir.path().join("Test.java"), Ecosystem::Java, Some(dir.path()));
        assert!(result.is_none());
    }

    #[test]
    fn test_find_config_file_by_existence() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let nested = root.join("tests/ui");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.join("playwright.config.js"), "").unwrap();

        let found = find_config_file(
            &nested.join("a.spec.js"),
            &["playwright.config.ts", "playwright.config.js"],
            Some(root),
        );
        assert_eq!(found, Some(root.join("playwright.config.js")));
    }
}
