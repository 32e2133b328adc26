//! Feature handler stage contract

use async_trait::async_trait;

use netconfd_core::{ApplyError, ConfigError, ExtractionError, FeatureRecord, GenerationError};
use netconfd_tree::ConfigAccessor;

use crate::system::SystemOps;

/// One configuration handler governing a single network feature.
///
/// A handler is invoked once per committed change to its feature's subtree
/// and owns a disjoint set of artifact paths keyed by the instance
/// identifier. The four stages are run strictly in declaration order by the
/// driver; each stage sees the same record, read-only.
#[async_trait]
pub trait FeatureHandler: Send + Sync {
    type Record: FeatureRecord;

    /// Feature name, used for logging and error context
    fn feature(&self) -> &'static str;

    /// Walk the accessor under the feature's root path and produce a
    /// normalized, fully-defaulted record.
    ///
    /// Must be side-effect free and safe to call repeatedly. When the root
    /// path for `identifier` is absent the record comes back with
    /// `deleted = true` and no further tree reads are performed.
    fn extract(
        &self,
        config: &dyn ConfigAccessor,
        identifier: &str,
    ) -> Result<Self::Record, ExtractionError>;

    /// Check record invariants, failing on the first violation.
    ///
    /// May read OS state (device file existence) through `system` but must
    /// not mutate anything. Skips all checks for a deleted record.
    async fn verify(
        &self,
        record: &Self::Record,
        system: &dyn SystemOps,
    ) -> Result<(), ConfigError>;

    /// Write or remove the instance's on-disk artifacts.
    ///
    /// Stops the consuming unit before touching the artifact
    /// (stop-before-rewrite), then either removes the artifact (tolerating
    /// absence) on delete or rewrites it in full. Rendering is deterministic:
    /// the same record produces byte-identical artifact content.
    async fn generate(
        &self,
        record: &Self::Record,
        system: &dyn SystemOps,
    ) -> Result<(), GenerationError>;

    /// Reconcile live system state with the record.
    ///
    /// Returns immediately for deleted or disabled records. Otherwise loads
    /// required kernel modules, (re)starts the owning unit (inside the
    /// configured VRF when one is set) and fixes artifact ownership.
    async fn apply(&self, record: &Self::Record, system: &dyn SystemOps)
        -> Result<(), ApplyError>;
}
