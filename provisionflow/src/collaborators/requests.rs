//! Typed requests handed to collaborators.
//!
//! These are derived once from the per-domain configuration and shared
//! read-only by every stage of a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Options for building an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Path to the Dockerfile.
    pub dockerfile: PathBuf,
    /// Build context directory.
    pub context: PathBuf,
    /// Disable the layer cache.
    pub no_cache: bool,
    /// `KEY=VALUE` build arguments, in declaration order.
    pub build_args: Vec<(String, String)>,
    /// Multi-stage build target.
    pub target: Option<String>,
    /// Target platform, e.g. `linux/amd64`.
    pub platform: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            dockerfile: PathBuf::from("Dockerfile"),
            context: PathBuf::from("."),
            no_cache: false,
            build_args: Vec::new(),
            target: None,
            platform: None,
        }
    }
}

/// Options for scanning an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Write a SARIF report to this file.
    pub sarif: Option<PathBuf>,
}

/// What a scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Number of findings, when the scanner reports them in a countable form.
    pub findings: Option<usize>,
    /// Where the SARIF report was written.
    pub sarif: Option<PathBuf>,
}

/// A chart release to install, upgrade or validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseSpec {
    pub release: String,
    pub chart: String,
    pub namespace: String,
    pub values: Vec<PathBuf>,
    pub set: Vec<String>,
    pub create_namespace: bool,
    pub atomic: bool,
    /// Wait for resources to become ready, up to this many seconds.
    pub wait_timeout: Option<u64>,
}

impl ReleaseSpec {
    /// Creates a release spec with default options.
    #[must_use]
    pub fn new(release: impl Into<String>, chart: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: namespace.into(),
            values: Vec::new(),
            set: Vec::new(),
            create_namespace: false,
            atomic: false,
            wait_timeout: None,
        }
    }
}

/// Lint findings for a chart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    /// Lines reported by the linter, e.g. `[WARNING] icon is recommended`.
    pub messages: Vec<String>,
}

/// A Terraform working directory and its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSpec {
    pub dir: PathBuf,
    pub vars: Vec<(String, String)>,
    pub var_files: Vec<PathBuf>,
}

impl WorkspaceSpec {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            vars: Vec::new(),
            var_files: Vec::new(),
        }
    }
}

/// Result of comparing real infrastructure against recorded state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// True if real infrastructure differs from the configuration.
    pub drifted: bool,
}

/// Result of planning a change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    /// True if the plan contains changes.
    pub changes: bool,
    /// The saved plan file the applier consumes.
    pub plan_file: Option<PathBuf>,
}

/// One root module output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputValue {
    pub sensitive: bool,
    /// The value; `None` when sensitive.
    pub value: Option<serde_json::Value>,
}

/// All root module outputs, keyed by name.
pub type Outputs = BTreeMap<String, OutputValue>;
