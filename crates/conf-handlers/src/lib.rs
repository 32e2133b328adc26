//! netconfd handlers
//!
//! Reference feature handlers built on the commit pipeline: the SSH service
//! (a service enabler with optional VRF binding) and the wireless-modem
//! interface (a point-to-point link dialer).

pub mod ssh;
pub mod wwan;

#[cfg(test)]
mod tests;

pub use ssh::{SshHandler, SshRecord};
pub use wwan::{WwanHandler, WwanRecord};
