//! Container collaborators backed by the `docker` CLI.

use super::requests::{BuildOptions, ScanOptions, ScanReport};
use super::runner::{CommandRunner, Invocation};
use super::{Builder, Pusher, Remover, Scanner, Tagger};
use crate::cancellation::CancellationToken;
use crate::core::DestinationKind;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const PROGRAM: &str = "docker";

/// Drives `docker build`, `docker scout`, `docker tag`, `docker push` and
/// `docker image rm`.
#[derive(Clone)]
pub struct DockerCli {
    runner: Arc<dyn CommandRunner>,
}

impl DockerCli {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn docker(
        &self,
        invocation: Invocation,
        cancel: &CancellationToken,
    ) -> Result<String, CollaboratorError> {
        let output = self.runner.run(&invocation, cancel).await?.check(PROGRAM)?;
        Ok(output.stdout)
    }

    fn build_invocation(reference: &str, options: &BuildOptions) -> Invocation {
        let mut inv = Invocation::new(PROGRAM)
            .args(["build", "-t", reference, "-f"])
            .arg(options.dockerfile.to_string_lossy())
            .flag("--no-cache", options.no_cache);
        for (key, value) in &options.build_args {
            inv = inv.arg("--build-arg").arg(format!("{key}={value}"));
        }
        inv.opt("--target", options.target.as_deref())
            .opt("--platform", options.platform.as_deref())
            .arg(options.context.to_string_lossy())
    }
}

impl fmt::Debug for DockerCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerCli").finish_non_exhaustive()
    }
}

#[async_trait]
impl Builder for DockerCli {
    async fn build(
        &self,
        reference: &str,
        options: &BuildOptions,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        self.docker(Self::build_invocation(reference, options), cancel)
            .await
            .map(drop)
    }
}

#[async_trait]
impl Scanner for DockerCli {
    async fn scan(
        &self,
        reference: &str,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, CollaboratorError> {
        let mut inv = Invocation::new(PROGRAM).args(["scout", "cves", reference]);
        if let Some(path) = &options.sarif {
            inv = inv
                .args(["--format", "sarif", "--output"])
                .arg(path.to_string_lossy());
        }
        self.docker(inv, cancel).await?;

        let findings = match &options.sarif {
            Some(path) => count_sarif_results(path).await,
            None => None,
        };
        Ok(ScanReport {
            findings,
            sarif: options.sarif.clone(),
        })
    }
}

#[async_trait]
impl Tagger for DockerCli {
    async fn tag(
        &self,
        source: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        let inspect = Invocation::new(PROGRAM).args(["image", "inspect", source]);
        if !self.runner.run(&inspect, cancel).await?.success() {
            return Err(CollaboratorError::MissingSource(source.to_string()));
        }
        self.docker(Invocation::new(PROGRAM).args(["tag", source, target]), cancel)
            .await
            .map(drop)
    }
}

#[async_trait]
impl Pusher for DockerCli {
    async fn push(
        &self,
        reference: &str,
        destination: DestinationKind,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        info!(reference = %reference, destination = %destination, "Pushing image");
        self.docker(Invocation::new(PROGRAM).args(["push", reference]), cancel)
            .await
            .map(drop)
    }
}

#[async_trait]
impl Remover for DockerCli {
    async fn remove(
        &self,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        self.docker(Invocation::new(PROGRAM).args(["image", "rm", reference]), cancel)
            .await
            .map(drop)
    }
}

/// Counts `runs[*].results[*]` in a SARIF report. Unreadable reports yield `None`.
async fn count_sarif_results(path: &Path) -> Option<usize> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "SARIF report not readable");
            return None;
        }
    };
    let report: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    let runs = report.get("runs")?.as_array()?;
    Some(
        runs.iter()
            .filter_map(|run| run.get("results").and_then(serde_json::Value::as_array))
            .map(Vec::len)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CommandOutput, MockCommandRunner};
    use mockall::predicate::*;
    use pretty_assertions::assert_eq;

    fn args_of(inv: &Invocation) -> Vec<&str> {
        inv.args.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_build_invocation_with_all_options() {
        let options = BuildOptions {
            no_cache: true,
            build_args: vec![("VERSION".into(), "1.2".into())],
            target: Some("runtime".into()),
            platform: Some("linux/amd64".into()),
            ..BuildOptions::default()
        };

        let inv = DockerCli::build_invocation("web:1.2", &options);

        assert_eq!(
            args_of(&inv),
            vec![
                "build", "-t", "web:1.2", "-f", "Dockerfile", "--no-cache", "--build-arg",
                "VERSION=1.2", "--target", "runtime", "--platform", "linux/amd64", "."
            ]
        );
    }

    #[tokio::test]
    async fn test_tag_fails_when_source_missing() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv, _| inv.has_arg("inspect"))
            .times(1)
            .returning(|_, _| Ok(CommandOutput::exit(1, "No such image")));
        runner.expect_run().withf(|inv, _| inv.args[0] == "tag").never();

        let docker = DockerCli::new(Arc::new(runner));
        let err = docker
            .tag("web:1.0", "repo/web:1.0", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CollaboratorError::MissingSource(ref s) if s == "web:1.0"));
    }

    #[tokio::test]
    async fn test_tag_after_successful_inspect() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv, _| inv.has_arg("inspect"))
            .returning(|_, _| Ok(CommandOutput::ok("[]")));
        runner
            .expect_run()
            .withf(|inv, _| args_of(inv) == vec!["tag", "web:1.0", "repo/web:1.0"])
            .times(1)
            .returning(|_, _| Ok(CommandOutput::ok("")));

        let docker = DockerCli::new(Arc::new(runner));
        docker
            .tag("web:1.0", "repo/web:1.0", &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_error_carries_stderr() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .returning(|_, _| Ok(CommandOutput::exit(1, "denied: requested access to the resource is denied")));

        let docker = DockerCli::new(Arc::new(runner));
        let err = docker
            .push("web:1.0", DestinationKind::Hub, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("denied"));
    }

    #[tokio::test]
    async fn test_scan_counts_sarif_findings() {
        let dir = tempfile::tempdir().unwrap();
        let sarif = dir.path().join("scan.sarif");
        std::fs::write(
            &sarif,
            r#"{"runs":[{"results":[{"ruleId":"CVE-1"},{"ruleId":"CVE-2"}]},{"results":[{"ruleId":"CVE-3"}]}]}"#,
        )
        .unwrap();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv, _| inv.has_arg("scout") && inv.has_arg("sarif"))
            .returning(|_, _| Ok(CommandOutput::ok("")));

        let docker = DockerCli::new(Arc::new(runner));
        let report = docker
            .scan(
                "web:1.0",
                &ScanOptions { sarif: Some(sarif.clone()) },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(report.findings, Some(3));
        assert_eq!(report.sarif, Some(sarif));
    }

    #[tokio::test]
    async fn test_scan_without_sarif_reports_no_count() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(always(), always())
            .returning(|_, _| Ok(CommandOutput::ok("0 vulnerabilities")));

        let docker = DockerCli::new(Arc::new(runner));
        let report = docker
            .scan("web:1.0", &ScanOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report, ScanReport::default());
    }
}
