//! netconfd commit
//!
//! The four-stage commit pipeline: extract, verify, generate, apply.
//! Feature handlers implement the stage contract; the driver runs them in
//! fixed order and short-circuits on the first failure.

pub mod handler;
pub mod pipeline;
pub mod system;


pub use handler::FeatureHandler;
pub use pipeline::{commit, commit_each};
pub use system::{HostSystem, SystemOps};
