use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::adapter::{BuildContext, CommandAdapter, TestCommand};
use super::dotnet_adapter::DotnetAdapter;
use super::env_file;
use super::maven_adapter::MavenAdapter;
use super::playwright_adapter::PlaywrightAdapter;
use super::pytest_adapter::PytestAdapter;
use crate::config::RunnerSettings;
use crate::discovery::{self, NormalizedConfig};
use crate::ecosystem::Ecosystem;

static PLAYWRIGHT: PlaywrightAdapter = PlaywrightAdapter;
static PYTEST: PytestAdapter = PytestAdapter;
static MAVEN: MavenAdapter = MavenAdapter;
static DOTNET: DotnetAdapter = DotnetAdapter;

/// Command grammar for an ecosystem.
pub fn adapter_for(ecosystem: Ecosystem) -> &'static dyn CommandAdapter {
    match ecosystem {
        Ecosystem::JavaScript => &PLAYWRIGHT,
        Ecosystem::Python => &PYTEST,
        Ecosystem::Java => &MAVEN,
        Ecosystem::CSharp => &DOTNET,
    }
}

/// Inputs for planning one iteration.
#[derive(Debug, Clone, Copy)]
pub struct BuildRequest<'a> {
    pub test_path: &'a Path,
    pub ecosystem: Ecosystem,
    pub test_name: Option<&'a str>,
    pub workspace_root: &'a Path,
    pub settings: &'a RunnerSettings,
    /// 1-based; namespaces the per-iteration report artifact.
    pub iteration: Option<u32>,
}

/// Everything resolved for one iteration: the command with its environment
/// overlay, and what went into it.
#[derive(Debug, Clone)]
pub struct EffectiveSettings {
    pub run_headed: bool,
    pub command: TestCommand,
    pub config: Option<NormalizedConfig>,
    pub config_path: Option<PathBuf>,
    /// Keys loaded from `.env` files, for the run log. Values are never logged.
    pub env_file_keys: Vec<String>,
    pub artifact_path: Option<PathBuf>,
}

/// Produces the command for each iteration. [`CommandBuilder`] is the real
/// implementation; tests substitute scripted commands.
pub trait CommandPlanner: Send + Sync {
    fn plan(&self, request: &BuildRequest<'_>) -> crate::Result<EffectiveSettings>;

    /// Adapter whose report merging runs after the iterations.
    fn adapter(&self, ecosystem: Ecosystem) -> &dyn CommandAdapter {
        adapter_for(ecosystem)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandBuilder;

impl CommandPlanner for CommandBuilder {
    fn plan(&self, request: &BuildRequest<'_>) -> crate::Result<EffectiveSettings> {
        if !request.workspace_root.is_dir() {
            return Err(crate::Error::NoWorkspace(request.test_path.to_path_buf()));
        }

        let adapter = adapter_for(request.ecosystem);
        let discovered = discovery::read_config_with_path(
            request.test_path,
            request.ecosystem,
            Some(request.workspace_root),
        );
        let (config_path, config) = match discovered {
            Some((path, config)) => (Some(path), Some(config)),
            None => (None, None),
        };

        let run_headed = resolve_headed(config.as_ref(), request.settings);
        let ctx = BuildContext {
            test_path: request.test_path,
            test_name: request.test_name,
            workspace_root: request.workspace_root,
            config: config.as_ref(),
            config_path: config_path.as_deref(),
            run_headed,
        };
        let mut command = adapter.build_command(&ctx)?;

        let file_vars = env_file::load_env_files(request.workspace_root);
        let env_file_keys = file_vars.keys().cloned().collect();
        command.env.extend(env_overlay(file_vars, std::env::var_os("NODE_ENV").is_some()));

        let mut artifact_path = None;
        if let (Some(spec), Some(iteration)) = (adapter.report_merge(), request.iteration) {
            let path = spec.artifact_path(request.workspace_root, iteration);
            if let Err(e) = std::fs::create_dir_all(spec.artifact_dir(request.workspace_root)) {
                tracing::warn!("Could not create {}: {}", spec.artifact_dir, e);
            }
            command
                .env
                .insert(spec.artifact_env.to_string(), path.to_string_lossy().to_string());
            artifact_path = Some(path);
        }

        Ok(EffectiveSettings {
            run_headed,
            command,
            config,
            config_path,
            env_file_keys,
            artifact_path,
        })
    }
}

/// Headed decision: the discovered config's own headless setting wins;
/// without one the user default stands.
pub fn resolve_headed(config: Option<&NormalizedConfig>, settings: &RunnerSettings) -> bool {
    config
        .and_then(NormalizedConfig::effective_headless)
        .map(|headless| !headless)
        .unwrap_or(settings.run_headed)
}

/// Variables layered over the ambient environment: `.env` values, then
/// `NODE_ENV=test` unless it is already set somewhere.
fn env_overlay(
    mut vars: BTreeMap<String, String>,
    ambient_node_env: bool,
) -> BTreeMap<String, String> {
    if !ambient_node_env && !vars.contains_key("NODE_ENV") {
        vars.insert("NODE_ENV".to_string(), "test".to_string());
    }
    vars
}

/// Nearest ancestor of `test_path` holding a marker for the ecosystem, or a
/// `.git` directory.
pub fn find_workspace_root(test_path: &Path, ecosystem: Ecosystem) -> crate::Result<PathBuf> {
    let adapter = adapter_for(ecosystem);
    let start = test_path.parent().unwrap_or(test_path);

    discovery::search_paths(start, None)
        .into_iter()
        .find(|dir| adapter.is_workspace_root(dir) || dir.join(".git").exists())
        .ok_or_else(|| crate::Error::NoWorkspace(test_path.to_path_buf()))
}
