//! Helm chart provisioning.

use super::{opaque_debug, validate};
use crate::collaborators::{
    ExistenceOracle, HelmCli, Installer, Linter, ReleaseSpec, TemplateRenderer, Upgrader,
};
use crate::context::StageContext;
use crate::core::{DeployableUnit, StageOutput};
use crate::errors::{CollaboratorError, ProvisionError};
use crate::pipeline::{ExistenceBranch, ParallelGroup, Pipeline, PipelineBuilder, StageFactory};
use crate::stages::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a chart run needs, resolved from flags once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartConfig {
    pub release: String,
    /// Chart reference: a path, `repo/name`, or an OCI URL.
    pub chart: String,
    pub namespace: String,
    pub values: Vec<PathBuf>,
    /// `key=value` overrides.
    pub set: Vec<String>,
    pub create_namespace: bool,
    pub atomic: bool,
    pub wait_timeout: Option<u64>,
}

impl ChartConfig {
    #[must_use]
    pub fn new(release: impl Into<String>, chart: impl Into<String>) -> Self {
        Self {
            release: release.into(),
            chart: chart.into(),
            namespace: "default".to_string(),
            values: Vec::new(),
            set: Vec::new(),
            create_namespace: false,
            atomic: false,
            wait_timeout: None,
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        validate::dns_label("release", &self.release, validate::MAX_RELEASE_NAME)?;
        validate::dns_label("namespace", &self.namespace, validate::MAX_NAMESPACE)?;
        validate::require("chart", &self.chart)?;
        validate::key_values("set", &self.set)?;
        Ok(())
    }

    #[must_use]
    pub fn release_spec(&self) -> ReleaseSpec {
        ReleaseSpec {
            release: self.release.clone(),
            chart: self.chart.clone(),
            namespace: self.namespace.clone(),
            values: self.values.clone(),
            set: self.set.clone(),
            create_namespace: self.create_namespace,
            atomic: self.atomic,
            wait_timeout: self.wait_timeout,
        }
    }

    #[must_use]
    pub fn unit(&self) -> DeployableUnit {
        DeployableUnit::release(&self.release, &self.namespace)
    }
}

/// Chart collaborators.
#[derive(Clone)]
pub struct ChartToolchain {
    pub oracle: Arc<dyn ExistenceOracle>,
    pub installer: Arc<dyn Installer>,
    pub upgrader: Arc<dyn Upgrader>,
    pub linter: Arc<dyn Linter>,
    pub renderer: Arc<dyn TemplateRenderer>,
}

impl ChartToolchain {
    /// Every collaborator backed by one helm CLI.
    #[must_use]
    pub fn helm(helm: HelmCli) -> Self {
        let helm = Arc::new(helm);
        Self {
            oracle: helm.clone(),
            installer: helm.clone(),
            upgrader: helm.clone(),
            linter: helm.clone(),
            renderer: helm,
        }
    }
}

struct InstallStage {
    installer: Arc<dyn Installer>,
    release: Arc<ReleaseSpec>,
}

struct UpgradeStage {
    upgrader: Arc<dyn Upgrader>,
    release: Arc<ReleaseSpec>,
}

struct LintStage {
    linter: Arc<dyn Linter>,
    release: Arc<ReleaseSpec>,
}

struct TemplateStage {
    renderer: Arc<dyn TemplateRenderer>,
    release: Arc<ReleaseSpec>,
}

opaque_debug!(InstallStage, UpgradeStage, LintStage, TemplateStage);

fn release_output(release: &ReleaseSpec, action: &str) -> StageOutput {
    StageOutput::ok_value("release", json!(release.release))
        .with_data("namespace", json!(release.namespace))
        .with_data("action", json!(action))
}

#[async_trait]
impl Stage for InstallStage {
    fn name(&self) -> &str {
        "install"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.installer.install(&self.release, ctx.cancel_token()).await?;
        Ok(release_output(&self.release, "installed"))
    }
}

#[async_trait]
impl Stage for UpgradeStage {
    fn name(&self) -> &str {
        "upgrade"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        self.upgrader.upgrade(&self.release, ctx.cancel_token()).await?;
        Ok(release_output(&self.release, "upgraded"))
    }
}

#[async_trait]
impl Stage for LintStage {
    fn name(&self) -> &str {
        "lint"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let report = self.linter.lint(&self.release, ctx.cancel_token()).await?;
        Ok(StageOutput::ok_value("messages", json!(report.messages)))
    }
}

#[async_trait]
impl Stage for TemplateStage {
    fn name(&self) -> &str {
        "template"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let manifest = self.renderer.render(&self.release, ctx.cancel_token()).await?;
        let documents = manifest
            .split("\n---")
            .filter(|doc| doc.lines().any(|line| !line.trim().is_empty() && !line.starts_with('#')))
            .count();
        Ok(StageOutput::ok_value("documents", json!(documents))
            .with_data("bytes", json!(manifest.len())))
    }
}

/// `release-exists ? upgrade : install → validate{lint, template}`.
pub fn chart_pipeline(
    config: &ChartConfig,
    tools: &ChartToolchain,
) -> Result<Pipeline, ProvisionError> {
    config.validate()?;
    let release = Arc::new(config.release_spec());

    let when_exists: StageFactory = {
        let upgrader = Arc::clone(&tools.upgrader);
        let release = Arc::clone(&release);
        Box::new(move || {
            Arc::new(UpgradeStage {
                upgrader: Arc::clone(&upgrader),
                release: Arc::clone(&release),
            }) as Arc<dyn Stage>
        })
    };
    let when_absent: StageFactory = {
        let installer = Arc::clone(&tools.installer);
        let release = Arc::clone(&release);
        Box::new(move || {
            Arc::new(InstallStage {
                installer: Arc::clone(&installer),
                release: Arc::clone(&release),
            }) as Arc<dyn Stage>
        })
    };

    PipelineBuilder::new("chart")
        .branch(ExistenceBranch::new(
            "release-exists",
            Arc::clone(&tools.oracle),
            when_exists,
            when_absent,
        ))
        .group(
            ParallelGroup::new("validate")
                .member(Arc::new(LintStage {
                    linter: Arc::clone(&tools.linter),
                    release: Arc::clone(&release),
                }))
                .member(Arc::new(TemplateStage {
                    renderer: Arc::clone(&tools.renderer),
                    release,
                })),
        )
        .build()
}
