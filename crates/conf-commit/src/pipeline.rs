//! Commit pipeline driver
//!
//! Runs the four stages in fixed order and short-circuits on the first
//! failure. Extract and verify failures abort before any externally
//! observable effect. Once generate starts there is no automatic rollback:
//! a failed apply leaves the artifact rewritten and the service state
//! unreconciled until the next successful commit.

use log::{error, info};

use netconfd_core::{FeatureRecord, Result};
use netconfd_tree::ConfigAccessor;

use crate::handler::FeatureHandler;
use crate::system::SystemOps;

/// Run the full pipeline for one feature instance.
///
/// On success the on-disk artifacts and the live system state both match
/// the extracted record as of return time.
pub async fn commit<H: FeatureHandler>(
    handler: &H,
    config: &dyn ConfigAccessor,
    system: &dyn SystemOps,
    identifier: &str,
) -> Result<()> {
    info!("committing {} instance {}", handler.feature(), identifier);

    let record = handler.extract(config, identifier)?;
    handler.verify(&record, system).await?;

    // Side effects start here
    handler.generate(&record, system).await?;
    handler.apply(&record, system).await?;

    if record.deleted() {
        info!("{} instance {} removed", handler.feature(), identifier);
    } else {
        info!("{} instance {} applied", handler.feature(), identifier);
    }
    Ok(())
}

/// Run the pipeline for several instances of the same feature.
///
/// Instances are processed sequentially and independently: a failure in one
/// instance's run does not block the remaining instances, each identifier
/// gets its own outcome.
pub async fn commit_each<H: FeatureHandler>(
    handler: &H,
    config: &dyn ConfigAccessor,
    system: &dyn SystemOps,
    identifiers: &[&str],
) -> Vec<(String, Result<()>)> {
    let mut outcomes = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let outcome = commit(handler, config, system, identifier).await;
        if let Err(e) = &outcome {
            error!(
                "{} instance {} failed: {}",
                handler.feature(),
                identifier,
                e
            );
        }
        outcomes.push((identifier.to_string(), outcome));
    }
    outcomes
}
