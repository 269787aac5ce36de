//! Configuration file support for `repoctl` (`repoctl.toml`).
//!
//! Mirrors the nested-struct-with-`serde(default)` convention used
//! throughout this workspace's configuration layer: each concern gets
//! its own small struct with a hand-written `Default` impl, and the
//! top-level `Config` aggregates them. This is the "Environment/config"
//! option bundle from §6, plus the retry tuning §4.4 and §5 call for.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use repoctl_retry::RetryPolicy;
use repoctl_types::{DuplicateTenantMode, TargetConfigMap};
use repoctl_webhook::ServiceEndpointConfig;

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Single shared tenant-service endpoint, consulted for every
    /// `service_build_queued`/`building`/`built` callback (§4.2, §4.3).
    /// Simplification: the original keys endpoints per `service.type`;
    /// this workspace's `ServiceClient` is a single client shared across
    /// tenants (documented in DESIGN.md).
    #[serde(default)]
    pub service: Option<ServiceEndpointConfig>,
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// §6: build endpoints are only enabled when `build-config` is
    /// set.
    pub fn build_endpoints_enabled(&self) -> bool {
        self.build.target_config_path.is_some()
    }

    /// §6 "bot-agent-keys (agent key directory; presence enables
    /// challenge auth)".
    pub fn challenge_auth_enabled(&self) -> bool {
        self.auth.bot_agent_keys.is_some()
    }
}

/// Loads the target-configuration table (§6 "build-config") from a TOML
/// file. The table's shape is `TargetConfigMap` itself (`[[configs]]`
/// entries plus a `class_parents` map), not a `libbpkg` build-config
/// module — parsing that format is out of scope (§1 Non-goals).
pub fn load_target_config_map(path: &Path) -> Result<TargetConfigMap> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read target-config file: {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("failed to parse target-config file: {}", path.display()))
}

/// Loads the bot-agent-keys directory (§6 "bot-agent-keys"): one file
/// per known fingerprint, named after the fingerprint itself. File
/// contents (the actual key material) are not read — only presence in
/// the directory is consulted, matching `precheck::classify_bot`'s use
/// of this set as a membership test.
pub fn load_bot_agent_keys(dir: &Path) -> Result<BTreeSet<String>> {
    let mut keys = BTreeSet::new();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read bot-agent-keys directory: {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            if let Some(name) = entry.file_name().to_str() {
                keys.insert(name.to_string());
            }
        }
    }
    Ok(keys)
}

/// `ci-data` / `ci-handler` / `ci-handler-timeout` (§6): the external
/// CI pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiConfig {
    /// Directory CI submissions are persisted under
    /// (`ci-data/<uuid>/...`).
    #[serde(default = "default_ci_data")]
    pub data_dir: PathBuf,
    /// Optional external CI handler executable.
    #[serde(default)]
    pub handler: Option<PathBuf>,
    #[serde(default = "default_handler_timeout", with = "humantime_serde")]
    pub handler_timeout: Duration,
    #[serde(default)]
    pub duplicate_tenant_mode: DuplicateTenantMode,
}

fn default_ci_data() -> PathBuf {
    PathBuf::from("ci-data")
}

fn default_handler_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            data_dir: default_ci_data(),
            handler: None,
            handler_timeout: default_handler_timeout(),
            duplicate_tenant_mode: DuplicateTenantMode::Fail,
        }
    }
}

/// `build-{result,forced-rebuild,soft-rebuild,hard-rebuild,
/// queued}-timeout` plus their `build-alt-*` daytime-window variants,
/// and `build-config`/`build-interactive-login`/`build-toolchain-email`
/// (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Path to the target-config table; required to enable build
    /// endpoints (§6).
    #[serde(default)]
    pub target_config_path: Option<PathBuf>,

    #[serde(default = "default_result_timeout", with = "humantime_serde")]
    pub result_timeout: Duration,
    #[serde(default = "default_forced_rebuild_timeout", with = "humantime_serde")]
    pub forced_rebuild_timeout: Duration,
    #[serde(default = "default_soft_rebuild_timeout", with = "humantime_serde")]
    pub soft_rebuild_timeout: Duration,
    #[serde(default = "default_hard_rebuild_timeout", with = "humantime_serde")]
    pub hard_rebuild_timeout: Duration,
    #[serde(default = "default_queued_timeout", with = "humantime_serde")]
    pub queued_timeout: Duration,

    /// `(start, stop)` daytime windows that override the corresponding
    /// timeout above, keyed by the same names
    /// (`result`/`forced-rebuild`/`soft-rebuild`/`hard-rebuild`).
    #[serde(default)]
    pub alt_windows: BTreeMap<String, AltTimeoutWindow>,

    /// Regex-rewrite pairs applied to the interactive login template
    /// (§4.2 "Session and response").
    #[serde(default)]
    pub interactive_login_rewrites: Vec<(String, String)>,

    /// Toolchain name -> whether build-result emails are enabled for
    /// it (§4.3 "honoring the `build-toolchain-email` skip map").
    #[serde(default)]
    pub toolchain_email: BTreeMap<String, bool>,

    /// Maximum number of auxiliary machines a single task may request
    /// (§4.2 "exceeding 9 auxiliary machines").
    #[serde(default = "default_max_auxiliary_machines")]
    pub max_auxiliary_machines: u32,

    /// §9 "unresolved external test dependencies may cause
    /// task-manifest construction to fail rather than silently drop
    /// the test" — surfaced as a config choice rather than hardcoded
    /// (see DESIGN.md Open Question decision).
    #[serde(default = "default_true")]
    pub fail_on_unresolved_test_dependency: bool,
}

fn default_result_timeout() -> Duration {
    Duration::from_secs(10 * 60)
}
fn default_forced_rebuild_timeout() -> Duration {
    Duration::from_secs(60 * 60)
}
fn default_soft_rebuild_timeout() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
fn default_hard_rebuild_timeout() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}
fn default_queued_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_max_auxiliary_machines() -> u32 {
    9
}
fn default_true() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            target_config_path: None,
            result_timeout: default_result_timeout(),
            forced_rebuild_timeout: default_forced_rebuild_timeout(),
            soft_rebuild_timeout: default_soft_rebuild_timeout(),
            hard_rebuild_timeout: default_hard_rebuild_timeout(),
            queued_timeout: default_queued_timeout(),
            alt_windows: BTreeMap::new(),
            interactive_login_rewrites: Vec::new(),
            toolchain_email: BTreeMap::new(),
            max_auxiliary_machines: default_max_auxiliary_machines(),
            fail_on_unresolved_test_dependency: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AltTimeoutWindow {
    /// Seconds since local midnight.
    pub start: u32,
    pub stop: u32,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// `upload-data` / `upload-handler[-argument|-timeout]` /
/// `upload-email` (§6), and the toolchain/repository exclude filters
/// (§4.2 "upload URLs filtered by
/// `upload-{toolchain,repository}-exclude`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_upload_data")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub handler: Option<PathBuf>,
    #[serde(default)]
    pub handler_arguments: Vec<String>,
    #[serde(default = "default_handler_timeout", with = "humantime_serde")]
    pub handler_timeout: Duration,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub toolchain_exclude: Vec<String>,
    #[serde(default)]
    pub repository_exclude: Vec<String>,
}

fn default_upload_data() -> PathBuf {
    PathBuf::from("upload-data")
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            data_dir: default_upload_data(),
            handler: None,
            handler_arguments: Vec::new(),
            handler_timeout: default_handler_timeout(),
            email: None,
            toolchain_exclude: Vec::new(),
            repository_exclude: Vec::new(),
        }
    }
}

/// `bot-agent-keys` (§6): agent key directory; presence enables
/// challenge auth.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub bot_agent_keys: Option<PathBuf>,
}

/// Loader-specific options (§4.1): `existing-tenant`,
/// `ignore-unresolved` and its restriction, the fetch-tool retry, and
/// the optional metadata directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub existing_tenant: bool,
    #[serde(default)]
    pub ignore_unresolved: IgnoreUnresolvedMode,
    #[serde(default)]
    pub metadata_dir: Option<PathBuf>,
    #[serde(default = "default_fetch_retry_attempts")]
    pub fetch_retry_attempts: u32,
}

fn default_fetch_retry_attempts() -> u32 {
    5
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            existing_tenant: false,
            ignore_unresolved: IgnoreUnresolvedMode::Off,
            metadata_dir: None,
            fetch_retry_attempts: default_fetch_retry_attempts(),
        }
    }
}

/// §4.1 "Missing resolutions are fatal unless the loader is invoked
/// with `ignore-unresolved`, optionally restricted to conditional
/// dependencies or test dependencies."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreUnresolvedMode {
    #[default]
    Off,
    All,
    ConditionalOnly,
    TestOnly,
}

/// Nested retry configuration shared by the DB transaction retry and
/// the tenant/CI write-path retry (§4.4, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub policy: RetryPolicy,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    6
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            policy: RetryPolicy::Default,
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_disables_build_endpoints() {
        let cfg = Config::default();
        assert!(!cfg.build_endpoints_enabled());
    }

    #[test]
    fn challenge_auth_enabled_tracks_bot_agent_keys() {
        let mut cfg = Config::default();
        assert!(!cfg.challenge_auth_enabled());
        cfg.auth.bot_agent_keys = Some(PathBuf::from("/etc/repoctl/bot-keys"));
        assert!(cfg.challenge_auth_enabled());
    }

    #[test]
    fn loads_toml_with_partial_overrides() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("repoctl.toml");
        std::fs::write(
            &path,
            r#"
            [build]
            target_config_path = "/etc/repoctl/build-config"
            max_auxiliary_machines = 4
            "#,
        )?;
        let cfg = Config::load(&path)?;
        assert!(cfg.build_endpoints_enabled());
        assert_eq!(cfg.build.max_auxiliary_machines, 4);
        assert_eq!(cfg.build.result_timeout, default_result_timeout());
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load(std::path::Path::new("/nonexistent/repoctl.toml"));
        assert!(result.is_err());
    }
}
