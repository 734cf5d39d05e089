use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use retest::config::{self, RunnerSettings};
use retest::discovery;
use retest::ecosystem::Ecosystem;
use retest::locator;
use retest::runner::builder::find_workspace_root;
use retest::runner::{self, output, Progress, RunObserver, RunRequest};
use retest::Error;

/// Run one test many times in a row and merge the reports
#[derive(Parser, Debug)]
#[command(
    name = "retest",
    version,
    about = "Run a single Playwright-style test repeatedly to expose flakiness",
    after_help = "SETTINGS FILES:\n\
        ~/.retest/settings.json            user defaults\n\
        <workspace>/.retest/settings.json  project overrides"
)]
struct Args {
    /// More diagnostics on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a test file (or one test in it) repeatedly
    Run {
        /// Test file to run
        test_path: PathBuf,

        /// Number of iterations (default: defaultIterations setting)
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Run only the test with this name
        #[arg(long, conflicts_with = "line")]
        test: Option<String>,

        /// Run the test declared at or above this 1-based line
        #[arg(long)]
        line: Option<usize>,

        /// javascript, typescript, python, java or csharp (default: from extension)
        #[arg(long)]
        ecosystem: Option<Ecosystem>,

        /// Workspace root (default: nearest directory with a project marker)
        #[arg(long)]
        workspace: Option<PathBuf>,

        /// Stop after the first failing iteration
        #[arg(long)]
        stop_on_first_failure: bool,

        /// Force headed browsers when the test config does not decide
        #[arg(long, conflicts_with = "headless")]
        headed: bool,

        /// Force headless browsers when the test config does not decide
        #[arg(long)]
        headless: bool,

        /// Do not print progress lines
        #[arg(long)]
        no_progress: bool,

        /// Write the run summary as JSON to this file
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },

    /// Print the name of the test declared at or above a line
    Locate {
        file: PathBuf,

        /// 1-based line number
        #[arg(long)]
        line: usize,

        #[arg(long)]
        ecosystem: Option<Ecosystem>,
    },

    /// List every recognized test declaration in a file
    List {
        file: PathBuf,

        #[arg(long)]
        ecosystem: Option<Ecosystem>,
    },

    /// Print the test-runner config discovered for a test file
    Config {
        test_path: PathBuf,

        #[arg(long)]
        ecosystem: Option<Ecosystem>,

        #[arg(long)]
        workspace: Option<PathBuf>,
    },

    /// Print the resolved user defaults
    Settings {
        #[arg(long)]
        workspace: Option<PathBuf>,
    },
}

/// Prints the run log to stdout and progress to stderr.
struct ConsoleObserver;

impl RunObserver for ConsoleObserver {
    fn log(&self, line: &str) {
        println!("{}", line);
    }

    fn progress(&self, progress: &Progress) {
        let done = progress.increment_percent * (progress.iteration - 1) as f64;
        eprintln!(
            "[{:>3.0}%] Running iteration {}/{}",
            done, progress.iteration, progress.total
        );
    }

    fn report_ready(&self, path: &Path) {
        eprintln!("Report ready: {}", path.display());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match execute(args.command).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(2)
        }
    }
}

async fn execute(command: Commands) -> retest::Result<ExitCode> {
    match command {
        Commands::Run {
            test_path,
            iterations,
            test,
            line,
            ecosystem,
            workspace,
            stop_on_first_failure,
            headed,
            headless,
            no_progress,
            summary_json,
        } => {
            let test_path = test_path.canonicalize()?;
            let ecosystem = ecosystem.unwrap_or_else(|| Ecosystem::from_path(&test_path));
            let workspace_root = resolve_workspace(&test_path, ecosystem, workspace)?;

            let mut settings = config::resolve(Some(&workspace_root));
            if stop_on_first_failure {
                settings.stop_on_first_failure = true;
            }
            if headed {
                settings.run_headed = true;
            }
            if headless {
                settings.run_headed = false;
            }
            if no_progress {
                settings.show_progress = false;
            }

            let test_name = match (test, line) {
                (Some(name), _) => Some(name),
                (None, Some(line)) => Some(test_at_line(&test_path, ecosystem, line)?),
                (None, None) => None,
            };
            let iterations = iterations.unwrap_or(settings.default_iterations);
            if iterations == 0 {
                return Err(Error::InvalidIterations(iterations));
            }

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    eprintln!("Cancelling...");
                    on_interrupt.cancel();
                }
            });

            let request = RunRequest {
                test_path,
                ecosystem,
                test_name,
                iterations,
                workspace_root,
                settings,
            };
            let summary = runner::run_repeated(request, cancel, &ConsoleObserver).await?;

            if let Some(path) = summary_json {
                output::write_summary_json(&summary, &path)?;
            }
            eprintln!("{}", output::completion_message(&summary));

            Ok(if summary.failed == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::Locate { file, line, ecosystem } => {
            let ecosystem = ecosystem.unwrap_or_else(|| Ecosystem::from_path(&file));
            match test_at_line(&file, ecosystem, line) {
                Ok(name) => {
                    println!("{}", name);
                    Ok(ExitCode::SUCCESS)
                }
                Err(e @ Error::NoTestAtLine { .. }) => {
                    eprintln!("{}", e);
                    Ok(ExitCode::from(1))
                }
                Err(e) => Err(e),
            }
        }

        Commands::List { file, ecosystem } => {
            let ecosystem = ecosystem.unwrap_or_else(|| Ecosystem::from_path(&file));
            let source = std::fs::read_to_string(&file)?;
            for test in locator::find_tests(&source, ecosystem) {
                println!("{}: {}", test.line + 1, test.name);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Config { test_path, ecosystem, workspace } => {
            let test_path = test_path.canonicalize()?;
            let ecosystem = ecosystem.unwrap_or_else(|| Ecosystem::from_path(&test_path));
            let root = match workspace {
                Some(dir) => Some(dir.canonicalize()?),
                None => find_workspace_root(&test_path, ecosystem).ok(),
            };
            let config = discovery::read_config(&test_path, ecosystem, root.as_deref());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }

        Commands::Settings { workspace } => {
            let settings: RunnerSettings = config::resolve(workspace.as_deref());
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn resolve_workspace(
    test_path: &Path,
    ecosystem: Ecosystem,
    explicit: Option<PathBuf>,
) -> retest::Result<PathBuf> {
    match explicit {
        Some(dir) => dir
            .canonicalize()
            .map_err(|_| Error::NoWorkspace(test_path.to_path_buf())),
        None => find_workspace_root(test_path, ecosystem),
    }
}

fn test_at_line(file: &Path, ecosystem: Ecosystem, line: usize) -> retest::Result<String> {
    let source = std::fs::read_to_string(file)?;
    locator::locate_test(&source, ecosystem, line.saturating_sub(1)).ok_or_else(|| {
        Error::NoTestAtLine {
            path: file.to_path_buf(),
            line,
        }
    })
}
