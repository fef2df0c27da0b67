//! Container image provisioning.

use super::{opaque_debug, validate, RunConfig};
use crate::collaborators::{
    BuildOptions, Builder, DockerCli, Pusher, Remover, ScanOptions, Scanner, Tagger,
};
use crate::context::StageContext;
use crate::core::{DeployableUnit, DestinationKind, StageOutput};
use crate::errors::{CollaboratorError, ConfigurationError, ProvisionError};
use crate::pipeline::{ConfirmationGate, ParallelGroup, Pipeline, PipelineBuilder, Prompter, Step};
use crate::stages::Stage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use regex::Regex;

#[allow(clippy::expect_used)]
static AWS_ACCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{12}$").expect("valid regex"));

#[allow(clippy::expect_used)]
static AWS_REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d$").expect("valid regex"));

#[allow(clippy::expect_used)]
static ACR_REGISTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]{5,50}$").expect("valid regex"));

#[allow(clippy::expect_used)]
static GCP_PROJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]{4,28}[a-z0-9]$").expect("valid regex"));

/// Where a built image is pushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Destination {
    /// Docker Hub, or any registry already encoded in the image name.
    Hub,
    Ecr {
        account_id: String,
        region: String,
        repository: String,
    },
    Acr {
        subscription_id: String,
        resource_group: String,
        registry_name: String,
    },
    Gcr {
        project_id: String,
    },
}

impl Destination {
    #[must_use]
    pub const fn kind(&self) -> DestinationKind {
        match self {
            Self::Hub => DestinationKind::Hub,
            Self::Ecr { .. } => DestinationKind::Ecr,
            Self::Acr { .. } => DestinationKind::Acr,
            Self::Gcr { .. } => DestinationKind::Gcr,
        }
    }

    /// The fully qualified reference `image:tag` is pushed under.
    #[must_use]
    pub fn reference(&self, image: &str, tag: &str) -> String {
        match self {
            Self::Hub => format!("{image}:{tag}"),
            Self::Ecr {
                account_id,
                region,
                repository,
            } => format!("{account_id}.dkr.ecr.{region}.amazonaws.com/{repository}:{tag}"),
            Self::Acr { registry_name, .. } => format!("{registry_name}.azurecr.io/{image}:{tag}"),
            Self::Gcr { project_id } => format!("gcr.io/{project_id}/{image}:{tag}"),
        }
    }

    fn check(field: &str, value: &str, re: &Regex, hint: &str) -> Result<(), ProvisionError> {
        validate::require(field, value)?;
        if re.is_match(value) {
            Ok(())
        } else {
            Err(ConfigurationError::new(format!("'{value}' is not a valid {field}"))
                .with_field(field)
                .with_fix_hint(hint)
                .into())
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        match self {
            Self::Hub => Ok(()),
            Self::Ecr {
                account_id,
                region,
                repository,
            } => {
                Self::check("account-id", account_id, &AWS_ACCOUNT_RE, "Use the 12-digit AWS account id.")?;
                Self::check("region", region, &AWS_REGION_RE, "Use an AWS region such as eu-west-1.")?;
                validate::image_name("repository", repository)
            }
            Self::Acr {
                subscription_id,
                resource_group,
                registry_name,
            } => {
                validate::require("subscription-id", subscription_id)?;
                validate::require("resource-group", resource_group)?;
                Self::check(
                    "registry-name",
                    registry_name,
                    &ACR_REGISTRY_RE,
                    "ACR names are 5-50 alphanumeric characters.",
                )
            }
            Self::Gcr { project_id } => Self::check(
                "project-id",
                project_id,
                &GCP_PROJECT_RE,
                "GCP project ids are 6-30 lowercase letters, digits or '-'.",
            ),
        }
    }
}

/// Everything a container run needs, resolved from flags once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: String,
    pub tag: String,
    pub destination: Destination,
    /// Push under this reference instead of the destination reference.
    pub target_tag: Option<String>,
    pub build: BuildOptions,
    /// Write the scan report as SARIF to this file.
    pub sarif: Option<PathBuf>,
    /// Remove the local references after a successful push.
    pub delete_local: bool,
}

impl ContainerConfig {
    #[must_use]
    pub fn new(image: impl Into<String>, tag: impl Into<String>, destination: Destination) -> Self {
        Self {
            image: image.into(),
            tag: tag.into(),
            destination,
            target_tag: None,
            build: BuildOptions::default(),
            sarif: None,
            delete_local: false,
        }
    }

    pub fn validate(&self) -> Result<(), ProvisionError> {
        validate::image_name("image", &self.image)?;
        validate::image_tag("tag", &self.tag)?;
        self.destination.validate()?;
        if let Some(target) = &self.target_tag {
            validate::require("target-tag", target)?;
        }
        Ok(())
    }

    /// The reference the image is built under.
    #[must_use]
    pub fn local_ref(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }

    /// The reference the image is pushed under.
    #[must_use]
    pub fn push_ref(&self) -> String {
        self.target_tag
            .clone()
            .unwrap_or_else(|| self.destination.reference(&self.image, &self.tag))
    }

    #[must_use]
    pub fn unit(&self) -> DeployableUnit {
        DeployableUnit::image(&self.image, self.destination.kind())
    }
}

/// Container collaborators.
#[derive(Clone)]
pub struct ContainerToolchain {
    pub builder: Arc<dyn Builder>,
    pub scanner: Arc<dyn Scanner>,
    pub tagger: Arc<dyn Tagger>,
    pub pusher: Arc<dyn Pusher>,
    pub remover: Arc<dyn Remover>,
}

impl ContainerToolchain {
    /// Every collaborator backed by one docker CLI.
    #[must_use]
    pub fn docker(docker: DockerCli) -> Self {
        let docker = Arc::new(docker);
        Self {
            builder: docker.clone(),
            scanner: docker.clone(),
            tagger: docker.clone(),
            pusher: docker.clone(),
            remover: docker,
        }
    }
}

struct BuildStage {
    builder: Arc<dyn Builder>,
    config: Arc<ContainerConfig>,
}

struct ScanStage {
    scanner: Arc<dyn Scanner>,
    config: Arc<ContainerConfig>,
}

/// Adds the push reference to the built image when it differs from the
/// build reference.
struct TagStage {
    tagger: Arc<dyn Tagger>,
    config: Arc<ContainerConfig>,
}

struct PushStage {
    pusher: Arc<dyn Pusher>,
    config: Arc<ContainerConfig>,
}

struct RemoveLocalStage {
    remover: Arc<dyn Remover>,
    config: Arc<ContainerConfig>,
}

opaque_debug!(BuildStage, ScanStage, TagStage, PushStage, RemoveLocalStage);

#[async_trait]
impl Stage for BuildStage {
    fn name(&self) -> &str {
        "build"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let reference = self.config.local_ref();
        self.builder
            .build(&reference, &self.config.build, ctx.cancel_token())
            .await?;
        Ok(StageOutput::ok_value("reference", json!(reference)))
    }
}

#[async_trait]
impl Stage for ScanStage {
    fn name(&self) -> &str {
        "scan"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let options = ScanOptions {
            sarif: self.config.sarif.clone(),
        };
        let report = self
            .scanner
            .scan(&self.config.local_ref(), &options, ctx.cancel_token())
            .await?;
        Ok(StageOutput::ok_value("findings", json!(report.findings))
            .with_data("sarif", json!(report.sarif)))
    }
}

#[async_trait]
impl Stage for TagStage {
    fn name(&self) -> &str {
        "tag"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let source = self.config.local_ref();
        let target = self.config.push_ref();
        if source == target {
            return Ok(StageOutput::skip("no retag required"));
        }
        self.tagger.tag(&source, &target, ctx.cancel_token()).await?;
        Ok(StageOutput::ok_value("source", json!(source)).with_data("target", json!(target)))
    }
}

#[async_trait]
impl Stage for PushStage {
    fn name(&self) -> &str {
        "push"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let reference = self.config.push_ref();
        let destination = self.config.destination.kind();
        self.pusher
            .push(&reference, destination, ctx.cancel_token())
            .await?;
        Ok(StageOutput::ok_value("reference", json!(reference))
            .with_data("destination", json!(destination)))
    }
}

#[async_trait]
impl Stage for RemoveLocalStage {
    fn name(&self) -> &str {
        "remove-local"
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageOutput, CollaboratorError> {
        let mut references = vec![self.config.push_ref()];
        let local = self.config.local_ref();
        if references[0] != local {
            references.push(local);
        }
        for reference in &references {
            self.remover.remove(reference, ctx.cancel_token()).await?;
        }
        Ok(StageOutput::ok_value("removed", json!(references)))
    }
}

/// `build → verify{scan, tag} → confirm-push → push → [remove-local]`.
///
/// Push and the optional local removal are both gated on the same
/// confirmation; a declined push never removes anything.
pub fn container_pipeline(
    config: &ContainerConfig,
    tools: &ContainerToolchain,
    run: &RunConfig,
    prompter: Arc<dyn Prompter>,
) -> Result<Pipeline, ProvisionError> {
    config.validate()?;
    let config = Arc::new(config.clone());

    let gate = ConfirmationGate::new(
        "confirm-push",
        format!("push {} to {}", config.push_ref(), config.destination.kind()),
        run.gate_options(),
        prompter,
    );
    let remove = Arc::new(RemoveLocalStage {
        remover: Arc::clone(&tools.remover),
        config: Arc::clone(&config),
    });

    PipelineBuilder::new("container")
        .stage(Arc::new(BuildStage {
            builder: Arc::clone(&tools.builder),
            config: Arc::clone(&config),
        }))
        .group(
            ParallelGroup::new("verify")
                .member(Arc::new(ScanStage {
                    scanner: Arc::clone(&tools.scanner),
                    config: Arc::clone(&config),
                }))
                .member(Arc::new(TagStage {
                    tagger: Arc::clone(&tools.tagger),
                    config: Arc::clone(&config),
                })),
        )
        .gate(gate)
        .gated(Arc::new(PushStage {
            pusher: Arc::clone(&tools.pusher),
            config: Arc::clone(&config),
        }) as Arc<dyn Stage>)
        .gated_if(config.delete_local, || Step::Stage(remove))
        .build()
}
