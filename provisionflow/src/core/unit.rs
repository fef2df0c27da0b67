//! The target of a provisioning run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical container registry a push is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// Docker Hub.
    Hub,
    /// AWS Elastic Container Registry.
    Ecr,
    /// Azure Container Registry.
    Acr,
    /// Google Container Registry.
    Gcr,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hub => write!(f, "hub"),
            Self::Ecr => write!(f, "ecr"),
            Self::Acr => write!(f, "acr"),
            Self::Gcr => write!(f, "gcr"),
        }
    }
}

/// Where a deployable unit lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scope {
    /// A container registry.
    Registry(DestinationKind),
    /// A Kubernetes namespace.
    Namespace(String),
    /// An infrastructure working directory.
    Workspace(String),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(kind) => write!(f, "registry:{kind}"),
            Self::Namespace(ns) => write!(f, "namespace:{ns}"),
            Self::Workspace(dir) => write!(f, "workspace:{dir}"),
        }
    }
}

/// The named, scoped target of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployableUnit {
    /// Image, release or workspace name.
    pub name: String,
    /// Scope the name is resolved in.
    pub scope: Scope,
}

impl DeployableUnit {
    /// Creates a new unit.
    #[must_use]
    pub fn new(name: impl Into<String>, scope: Scope) -> Self {
        Self {
            name: name.into(),
            scope,
        }
    }

    /// A container image pushed to a registry.
    #[must_use]
    pub fn image(name: impl Into<String>, destination: DestinationKind) -> Self {
        Self::new(name, Scope::Registry(destination))
    }

    /// A chart release in a namespace.
    #[must_use]
    pub fn release(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self::new(name, Scope::Namespace(namespace.into()))
    }

    /// An infrastructure workspace.
    #[must_use]
    pub fn workspace(name: impl Into<String>, dir: impl Into<String>) -> Self {
        Self::new(name, Scope::Workspace(dir.into()))
    }

    /// Returns the namespace if the unit is namespaced.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        match &self.scope {
            Scope::Namespace(ns) => Some(ns),
            _ => None,
        }
    }
}

impl fmt::Display for DeployableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.scope)
    }
}

/// The answer of an existence check.
///
/// Only valid for the branch it was taken for; never cached across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistenceFact {
    /// Whether the unit was found.
    pub exists: bool,
    /// Scope the check ran in.
    pub scope: Scope,
    /// When the check completed.
    pub checked_at: DateTime<Utc>,
}

impl ExistenceFact {
    /// Records a fresh fact for a unit.
    #[must_use]
    pub fn observed(unit: &DeployableUnit, exists: bool) -> Self {
        Self {
            exists,
            scope: unit.scope.clone(),
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_display() {
        let unit = DeployableUnit::release("web", "prod");
        assert_eq!(unit.to_string(), "web (namespace:prod)");

        let image = DeployableUnit::image("api", DestinationKind::Ecr);
        assert_eq!(image.to_string(), "api (registry:ecr)");
    }

    #[test]
    fn test_namespace_accessor() {
        assert_eq!(DeployableUnit::release("web", "prod").namespace(), Some("prod"));
        assert_eq!(DeployableUnit::workspace("infra", ".").namespace(), None);
    }

    #[test]
    fn test_scope_serialize() {
        let json = serde_json::to_value(Scope::Registry(DestinationKind::Gcr)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "registry", "value": "gcr"}));
    }

    #[test]
    fn test_existence_fact_keeps_scope() {
        let unit = DeployableUnit::release("web", "prod");
        let fact = ExistenceFact::observed(&unit, true);

        assert!(fact.exists);
        assert_eq!(fact.scope, Scope::Namespace("prod".to_string()));
    }
}
