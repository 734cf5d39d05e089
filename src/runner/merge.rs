use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use super::adapter::{CommandAdapter, ReportMergeSpec, TestCommand};
use super::process::{ProcessOutcome, ProcessRunner};
use super::RunObserver;
use crate::discovery::NormalizedConfig;

/// Merges per-iteration report artifacts into one HTML report, then removes
/// the artifacts.
pub struct ReportMerger<'a> {
    adapter: &'a dyn CommandAdapter,
    workspace_root: &'a Path,
}

impl<'a> ReportMerger<'a> {
    pub fn new(adapter: &'a dyn CommandAdapter, workspace_root: &'a Path) -> Self {
        Self { adapter, workspace_root }
    }

    /// Final report directory: the config's output directory resolved
    /// against the workspace root, else the ecosystem default.
    pub fn output_dir(&self, config: Option<&NormalizedConfig>) -> Option<PathBuf> {
        let spec = self.adapter.report_merge()?;
        Some(match config.and_then(|c| c.output_dir.as_deref()) {
            Some(dir) => self.workspace_root.join(dir),
            None => self.workspace_root.join(spec.default_output_dir),
        })
    }

    /// Merge whatever artifacts exist. Returns the report entry point on
    /// success. Never fails the run: problems are logged.
    pub async fn merge(
        &self,
        config: Option<&NormalizedConfig>,
        observer: &dyn RunObserver,
    ) -> Option<PathBuf> {
        let spec = self.adapter.report_merge()?;
        let artifact_dir = spec.artifact_dir(self.workspace_root);
        let command = self.adapter.merge_command(&artifact_dir)?;
        let output_dir = self.output_dir(config)?;
        self.run_merge(spec, command, &output_dir, observer).await
    }

    async fn run_merge(
        &self,
        spec: &ReportMergeSpec,
        mut command: TestCommand,
        output_dir: &Path,
        observer: &dyn RunObserver,
    ) -> Option<PathBuf> {
        let artifact_dir = spec.artifact_dir(self.workspace_root);
        if !artifact_dir.is_dir() {
            observer.log("No blob reports found to merge");
            return None;
        }

        let count = count_artifacts(&artifact_dir, spec.artifact_extension);
        let report = if count == 0 {
            observer.log("No blob reports found to merge");
            None
        } else {
            observer.log("");
            observer.log("=== Merging Playwright Reports ===");
            observer.log(&format!("Merging {} blob reports from {}", count, artifact_dir.display()));

            if output_dir.exists() {
                observer.log(&format!("Cleaning up old reports in: {}", output_dir.display()));
                if let Err(e) = std::fs::remove_dir_all(output_dir) {
                    tracing::warn!("Could not remove {}: {}", output_dir.display(), e);
                }
            }

            command
                .env
                .insert(spec.output_env.to_string(), output_dir.to_string_lossy().to_string());
            observer.log(&format!("Executing: {}", command));
            observer.log(&format!("Output directory: {}", output_dir.display()));

            // Fresh token; merging also runs after a cancelled run.
            let mut runner = ProcessRunner::new(CancellationToken::new());
            let sink = |_: super::process::Stream, line: &str| observer.log(line);
            match runner.run(&command, self.workspace_root, &sink).await {
                ProcessOutcome::Passed => {
                    let entry = output_dir.join(spec.entry_point);
                    if entry.is_file() {
                        observer.log(&format!("Merged report available at: {}", entry.display()));
                        Some(entry)
                    } else {
                        observer.log(&format!("Merge finished but {} was not written", entry.display()));
                        None
                    }
                }
                outcome => {
                    let err = crate::Error::MergeFailed(
                        outcome.error_detail().unwrap_or_default(),
                    );
                    tracing::warn!("{}", err);
                    observer.log(&format!("Report merging failed: {}", err));
                    None
                }
            }
        };

        // Intermediates are removed whatever happened above.
        observer.log(&format!("Cleaning up blob reports: {}", artifact_dir.display()));
        if let Err(e) = std::fs::remove_dir_all(&artifact_dir) {
            tracing::warn!("Could not clean up {}: {}", artifact_dir.display(), e);
            observer.log(&format!("Warning: Could not cleanup blob reports: {}", e));
        }

        report
    }
}

fn count_artifacts(dir: &Path, extension: &str) -> usize {
    WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some(extension))
        .count()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::runner::builder::adapter_for;
    use crate::ecosystem::Ecosystem;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    impl RunObserver for Lines {
        fn log(&self, line: &str) {
            self.0.lock().unwrap().push(line.to_string());
        }
    }

    fn seed_artifacts(root: &Path, n: u32) {
        let dir = root.join("blob-report");
        std::fs::create_dir_all(&dir).unwrap();
        for i in 1..=n {
            std::fs::write(dir.join(format!("report-{}.zip", i)), b"PK").unwrap();
        }
    }

    fn spec() -> &'static ReportMergeSpec {
        adapter_for(Ecosystem::JavaScript).report_merge().unwrap()
    }

    #[test]
    fn test_output_dir_resolution() {
        let merger = ReportMerger::new(adapter_for(Ecosystem::JavaScript), Path::new("/ws"));
        assert_eq!(merger.output_dir(None), Some(PathBuf::from("/ws/playwright-report")));

        let config = NormalizedConfig { output_dir: Some("reports/html".into()), ..Default::default() };
        assert_eq!(merger.output_dir(Some(&config)), Some(PathBuf::from("/ws/reports/html")));

        let python = ReportMerger::new(adapter_for(Ecosystem::Python), Path::new("/ws"));
        assert_eq!(python.output_dir(None), None);
    }

    #[tokio::test]
    async fn test_no_artifacts_is_noop() {
        let dir = tempdir().unwrap();
        let observer = Lines::default();
        let merger = ReportMerger::new(adapter_for(Ecosystem::JavaScript), dir.path());
        assert_eq!(merger.merge(None, &observer).await, None);
        assert_eq!(observer.0.lock().unwrap().as_slice(), ["No blob reports found to merge"]);
    }

    #[tokio::test]
    async fn test_successful_merge_replaces_stale_report() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        seed_artifacts(root, 3);
        let output = root.join("playwright-report");
        std::fs::create_dir_all(&output).unwrap();
        std::fs::write(output.join("stale.txt"), "old").unwrap();

        let command = TestCommand::new("sh").args([
            "-c",
            r#"mkdir -p "$PLAYWRIGHT_HTML_REPORT" && echo merged > "$PLAYWRIGHT_HTML_REPORT/index.html""#,
        ]);
        let observer = Lines::default();
        let merger = ReportMerger::new(adapter_for(Ecosystem::JavaScript), root);
        let report = merger.run_merge(spec(), command, &output, &observer).await;

        assert_eq!(report, Some(output.join("index.html")));
        assert!(!output.join("stale.txt").exists());
        assert!(!root.join("blob-report").exists());
        let lines = observer.0.lock().unwrap();
        assert!(lines.iter().any(|l| l.starts_with("Merging 3 blob reports")));
    }

    #[tokio::test]
    async fn test_failed_merge_still_cleans_up() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        seed_artifacts(root, 2);

        let command = TestCommand::new("sh").args(["-c", "echo 'corrupt blob' >&2; exit 1"]);
        let observer = Lines::default();
        let merger = ReportMerger::new(adapter_for(Ecosystem::JavaScript), root);
        let report = merger
            .run_merge(spec(), command, &root.join("playwright-report"), &observer)
            .await;

        assert_eq!(report, None);
        assert!(!root.join("blob-report").exists());
        let lines = observer.0.lock().unwrap();
        assert!(lines.iter().any(|l| l.contains("MERGE_FAILED: corrupt blob")));
    }
}
