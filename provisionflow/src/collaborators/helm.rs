//! Chart collaborators backed by the `helm` CLI.

use super::requests::{LintReport, ReleaseSpec};
use super::runner::{CommandRunner, Invocation};
use super::{ExistenceOracle, Installer, Linter, TemplateRenderer, Upgrader};
use crate::cancellation::CancellationToken;
use crate::core::DeployableUnit;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const PROGRAM: &str = "helm";

/// Drives `helm status`, `install`, `upgrade`, `lint` and `template`.
#[derive(Clone)]
pub struct HelmCli {
    runner: Arc<dyn CommandRunner>,
}

impl HelmCli {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn helm(
        &self,
        invocation: Invocation,
        cancel: &CancellationToken,
    ) -> Result<String, CollaboratorError> {
        let output = self.runner.run(&invocation, cancel).await?.check(PROGRAM)?;
        Ok(output.stdout)
    }

    /// `-f` and `--set` arguments shared by every release command.
    fn with_values(mut inv: Invocation, release: &ReleaseSpec) -> Invocation {
        for file in &release.values {
            inv = inv.arg("-f").arg(file.to_string_lossy());
        }
        for assignment in &release.set {
            inv = inv.arg("--set").arg(assignment);
        }
        inv
    }

    fn release_invocation(command: &str, release: &ReleaseSpec) -> Invocation {
        let inv = Invocation::new(PROGRAM)
            .args([
                command,
                release.release.as_str(),
                release.chart.as_str(),
                "-n",
                release.namespace.as_str(),
            ])
            .flag("--create-namespace", release.create_namespace && command == "install")
            .flag("--atomic", release.atomic);
        let inv = match release.wait_timeout {
            Some(secs) => inv.arg("--wait").arg("--timeout").arg(format!("{secs}s")),
            None => inv,
        };
        Self::with_values(inv, release)
    }
}

impl fmt::Debug for HelmCli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelmCli").finish_non_exhaustive()
    }
}

const RELEASE_NOT_FOUND: &str = "Error: release: not found";

/// Returns true if helm reported that the release itself does not exist.
///
/// Other "not found" errors (kube context, kubeconfig, namespace) leave the
/// question unanswered.
fn is_release_not_found(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.trim_start().starts_with(RELEASE_NOT_FOUND))
}

#[async_trait]
impl ExistenceOracle for HelmCli {
    async fn exists(
        &self,
        unit: &DeployableUnit,
        cancel: &CancellationToken,
    ) -> Result<bool, CollaboratorError> {
        let namespace = unit.namespace().unwrap_or("default");
        let inv = Invocation::new(PROGRAM).args(["status", unit.name.as_str(), "-n", namespace, "-o", "json"]);
        let output = self.runner.run(&inv, cancel).await?;

        if output.success() {
            debug!(release = %unit.name, namespace, "Release found");
            return Ok(true);
        }
        if is_release_not_found(&output.stderr) {
            debug!(release = %unit.name, namespace, "Release not found");
            return Ok(false);
        }
        Err(output.into_error(PROGRAM))
    }
}

#[async_trait]
impl Installer for HelmCli {
    async fn install(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        self.helm(Self::release_invocation("install", release), cancel)
            .await
            .map(drop)
    }
}

#[async_trait]
impl Upgrader for HelmCli {
    async fn upgrade(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<(), CollaboratorError> {
        self.helm(Self::release_invocation("upgrade", release), cancel)
            .await
            .map(drop)
    }
}

#[async_trait]
impl Linter for HelmCli {
    async fn lint(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<LintReport, CollaboratorError> {
        let inv = Self::with_values(Invocation::new(PROGRAM).args(["lint", release.chart.as_str()]), release);
        let stdout = self.helm(inv, cancel).await?;
        let messages = stdout
            .lines()
            .map(str::trim)
            .filter(|line| line.starts_with('['))
            .map(ToString::to_string)
            .collect();
        Ok(LintReport { messages })
    }
}

#[async_trait]
impl TemplateRenderer for HelmCli {
    async fn render(
        &self,
        release: &ReleaseSpec,
        cancel: &CancellationToken,
    ) -> Result<String, CollaboratorError> {
        let inv = Invocation::new(PROGRAM).args([
            "template",
            release.release.as_str(),
            release.chart.as_str(),
            "-n",
            release.namespace.as_str(),
        ]);
        self.helm(Self::with_values(inv, release), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CommandOutput, MockCommandRunner};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn oracle_with(output: CommandOutput) -> HelmCli {
        oracle_answering(output, 1)
    }

    fn oracle_answering(output: CommandOutput, calls: usize) -> HelmCli {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv, _| inv.args[..2] == ["status".to_string(), "web".to_string()])
            .times(calls)
            .returning(move |_, _| Ok(output.clone()));
        HelmCli::new(Arc::new(runner))
    }

    #[tokio::test]
    async fn test_exists_when_status_succeeds() {
        let helm = oracle_with(CommandOutput::ok("{}"));
        let unit = DeployableUnit::release("web", "prod");

        assert!(helm.exists(&unit, &CancellationToken::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_absent_when_release_not_found() {
        let helm = oracle_with(CommandOutput::exit(1, "Error: release: not found"));
        let unit = DeployableUnit::release("web", "prod");

        assert!(!helm.exists(&unit, &CancellationToken::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_error() {
        let helm = oracle_with(CommandOutput::exit(
            1,
            "Error: Kubernetes cluster unreachable: connection refused",
        ));
        let unit = DeployableUnit::release("web", "prod");

        let err = helm.exists(&unit, &CancellationToken::new()).await.unwrap_err();
        assert!(err.to_string().contains("cluster unreachable"));
    }

    #[tokio::test]
    async fn test_missing_kube_context_is_error_not_absence() {
        let helm = oracle_with(CommandOutput::exit(
            1,
            "Error: Kubernetes cluster unreachable: context \"prod\" not found",
        ));
        let unit = DeployableUnit::release("web", "prod");

        let result = helm.exists(&unit, &CancellationToken::new()).await;
        assert!(
            matches!(result, Err(CollaboratorError::Exit { .. })),
            "expected an error, got {result:?}"
        );
    }

    #[tokio::test]
    async fn test_repeated_checks_agree() {
        let unit = DeployableUnit::release("web", "prod");
        let cancel = CancellationToken::new();

        for output in [CommandOutput::ok("{}"), CommandOutput::exit(1, "Error: release: not found")] {
            let helm = oracle_answering(output, 2);
            let first = helm.exists(&unit, &cancel).await.unwrap();
            let second = helm.exists(&unit, &cancel).await.unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_install_invocation() {
        let release = ReleaseSpec {
            values: vec![PathBuf::from("values-prod.yaml")],
            set: vec!["image.tag=1.2".into()],
            create_namespace: true,
            atomic: true,
            wait_timeout: Some(300),
            ..ReleaseSpec::new("web", "./charts/web", "prod")
        };

        let install = HelmCli::release_invocation("install", &release);
        assert_eq!(
            install.to_string(),
            "helm install web ./charts/web -n prod --create-namespace --atomic --wait --timeout 300s -f values-prod.yaml --set image.tag=1.2"
        );

        let upgrade = HelmCli::release_invocation("upgrade", &release);
        assert!(!upgrade.has_arg("--create-namespace"));
    }

    #[tokio::test]
    async fn test_lint_collects_bracketed_messages() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_, _| {
            Ok(CommandOutput::ok(
                "==> Linting ./charts/web\n[INFO] Chart.yaml: icon is recommended\n\n1 chart(s) linted, 0 chart(s) failed\n",
            ))
        });

        let helm = HelmCli::new(Arc::new(runner));
        let report = helm
            .lint(&ReleaseSpec::new("web", "./charts/web", "prod"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.messages, vec!["[INFO] Chart.yaml: icon is recommended"]);
    }
}
