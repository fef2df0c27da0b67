//! Install-or-upgrade branching on an existence check.

use crate::cancellation::CancellationToken;
use crate::collaborators::ExistenceOracle;
use crate::core::{DeployableUnit, ExistenceFact};
use crate::errors::ProvisionError;
use crate::stages::Stage;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Builds a stage on demand. Only the selected side of a branch is built.
pub type StageFactory = Box<dyn Fn() -> Arc<dyn Stage> + Send + Sync>;

/// Chooses between two stages by asking whether the run's unit exists.
///
/// The oracle is asked exactly once per run, right before the choice, and
/// its answer is never cached. If the oracle cannot answer, the branch fails
/// with [`ProvisionError::AmbiguousState`] and neither side runs.
pub struct ExistenceBranch {
    name: String,
    oracle: Arc<dyn ExistenceOracle>,
    when_exists: StageFactory,
    when_absent: StageFactory,
}

impl ExistenceBranch {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        oracle: Arc<dyn ExistenceOracle>,
        when_exists: StageFactory,
        when_absent: StageFactory,
    ) -> Self {
        Self {
            name: name.into(),
            oracle,
            when_exists,
            when_absent,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Asks the oracle and builds the selected stage.
    pub async fn resolve(
        &self,
        unit: &DeployableUnit,
        cancel: &CancellationToken,
    ) -> Result<(ExistenceFact, Arc<dyn Stage>), ProvisionError> {
        let exists = self
            .oracle
            .exists(unit, cancel)
            .await
            .map_err(|source| {
                if source.is_cancelled() {
                    ProvisionError::from_stage(&self.name, source)
                } else {
                    ProvisionError::AmbiguousState {
                        unit: unit.to_string(),
                        source,
                    }
                }
            })?;

        let stage = if exists {
            (self.when_exists)()
        } else {
            (self.when_absent)()
        };
        info!(branch = %self.name, unit = %unit, exists, selected = stage.name(), "Existence checked");
        Ok((ExistenceFact::observed(unit, exists), stage))
    }
}

impl fmt::Debug for ExistenceBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExistenceBranch")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
