//! Per-domain flags and their conversion into configuration structs.

use crate::collaborators::BuildOptions;
use crate::errors::{ConfigurationError, ProvisionError};
use crate::provision::{validate, ChartConfig, ContainerConfig, Destination, InfraConfig};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Registry family selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DestinationArg {
    /// Docker Hub
    #[default]
    Hub,
    /// AWS Elastic Container Registry
    Ecr,
    /// Azure Container Registry
    Acr,
    /// Google Container Registry
    Gcr,
}

fn required(value: Option<String>, flag: &str, destination: &str) -> Result<String, ProvisionError> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        ConfigurationError::new(format!("--{flag} is required for {destination}"))
            .with_field(flag)
            .into()
    })
}

/// Build, scan and push an image
#[derive(Debug, Clone, Args)]
pub struct ContainerArgs {
    /// Image name, e.g. `web` or `team/web`
    #[arg(long, short = 'i')]
    pub image: String,

    /// Image tag
    #[arg(long, short = 't', default_value = "latest")]
    pub tag: String,

    /// Registry to push to
    #[arg(long, value_enum, default_value_t = DestinationArg::Hub)]
    pub destination: DestinationArg,

    /// AWS account id (ECR)
    #[arg(long)]
    pub account_id: Option<String>,

    /// AWS region (ECR)
    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// ECR repository; defaults to the image name
    #[arg(long)]
    pub repository: Option<String>,

    /// Azure subscription id (ACR)
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: Option<String>,

    /// Azure resource group (ACR)
    #[arg(long)]
    pub resource_group: Option<String>,

    /// ACR registry name (ACR)
    #[arg(long)]
    pub registry_name: Option<String>,

    /// GCP project id (GCR)
    #[arg(long, env = "GOOGLE_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Push under this full reference instead of the registry default
    #[arg(long)]
    pub target_tag: Option<String>,

    /// Path to the Dockerfile
    #[arg(long, short = 'f', default_value = "Dockerfile")]
    pub file: PathBuf,

    /// Build context directory
    #[arg(long, default_value = ".")]
    pub context: PathBuf,

    /// Build without the layer cache
    #[arg(long)]
    pub no_cache: bool,

    /// Build argument, repeatable
    #[arg(long = "build-arg", value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Multi-stage build target
    #[arg(long)]
    pub target: Option<String>,

    /// Target platform, e.g. linux/amd64
    #[arg(long)]
    pub platform: Option<String>,

    /// Write the scan report as SARIF to this file
    #[arg(long)]
    pub sarif: Option<PathBuf>,

    /// Remove the local image after a successful push
    #[arg(long)]
    pub delete: bool,
}

impl ContainerArgs {
    fn destination(&self) -> Result<Destination, ProvisionError> {
        Ok(match self.destination {
            DestinationArg::Hub => Destination::Hub,
            DestinationArg::Ecr => Destination::Ecr {
                account_id: required(self.account_id.clone(), "account-id", "ECR")?,
                region: required(self.region.clone(), "region", "ECR")?,
                repository: self.repository.clone().unwrap_or_else(|| self.image.clone()),
            },
            DestinationArg::Acr => Destination::Acr {
                subscription_id: required(self.subscription_id.clone(), "subscription-id", "ACR")?,
                resource_group: required(self.resource_group.clone(), "resource-group", "ACR")?,
                registry_name: required(self.registry_name.clone(), "registry-name", "ACR")?,
            },
            DestinationArg::Gcr => Destination::Gcr {
                project_id: required(self.project_id.clone(), "project-id", "GCR")?,
            },
        })
    }

    pub fn into_config(self) -> Result<ContainerConfig, ProvisionError> {
        let destination = self.destination()?;
        let build = BuildOptions {
            dockerfile: self.file,
            context: self.context,
            no_cache: self.no_cache,
            build_args: validate::key_values("build-arg", &self.build_args)?,
            target: self.target,
            platform: self.platform,
        };
        let config = ContainerConfig {
            target_tag: self.target_tag,
            build,
            sarif: self.sarif,
            delete_local: self.delete,
            ..ContainerConfig::new(self.image, self.tag, destination)
        };
        config.validate()?;
        Ok(config)
    }
}

/// Install or upgrade a release, then lint and render it
#[derive(Debug, Clone, Args)]
pub struct ChartArgs {
    /// Release name
    pub release: String,

    /// Chart path or reference
    pub chart: String,

    /// Kubernetes namespace
    #[arg(long, short = 'n', default_value = "default")]
    pub namespace: String,

    /// Values file, repeatable
    #[arg(long = "values", short = 'f')]
    pub values: Vec<PathBuf>,

    /// Value override, repeatable
    #[arg(long, value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Create the namespace if it does not exist
    #[arg(long)]
    pub create_namespace: bool,

    /// Roll back on a failed install or upgrade
    #[arg(long)]
    pub atomic: bool,

    /// Wait up to this many seconds for resources to become ready
    #[arg(long, value_name = "SECONDS")]
    pub wait_timeout: Option<u64>,
}

impl ChartArgs {
    pub fn into_config(self) -> Result<ChartConfig, ProvisionError> {
        let config = ChartConfig {
            release: self.release,
            chart: self.chart,
            namespace: self.namespace,
            values: self.values,
            set: self.set,
            create_namespace: self.create_namespace,
            atomic: self.atomic,
            wait_timeout: self.wait_timeout,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Init, inspect, apply and read outputs of a Terraform workspace
#[derive(Debug, Clone, Args)]
pub struct InfraArgs {
    /// Terraform working directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Input variable, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Variable file relative to the working directory, repeatable
    #[arg(long = "var-file")]
    pub var_files: Vec<PathBuf>,
}

impl InfraArgs {
    pub fn into_config(self) -> Result<InfraConfig, ProvisionError> {
        let config = InfraConfig {
            dir: self.dir,
            vars: validate::key_values("var", &self.vars)?,
            var_files: self.var_files,
        };
        config.validate()?;
        Ok(config)
    }
}
