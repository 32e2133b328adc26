//! SSH service handler
//!
//! Renders an sshd configuration artifact from the `service ssh` subtree and
//! (re)starts the SSH unit, optionally bound into a VRF.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use tokio::fs;

use netconfd_core::{ApplyError, ConfigError, ExtractionError, FeatureRecord, GenerationError};
use netconfd_commit::{FeatureHandler, SystemOps};
use netconfd_tree::{ConfigAccessor, Scoped};

const ROOT_PATH: [&str; 2] = ["service", "ssh"];

/// Normalized SSH service configuration
#[derive(Debug, Clone, Serialize)]
pub struct SshRecord {
    pub identifier: String,
    pub deleted: bool,
    /// Listen ports, at least one ("22" by default)
    pub ports: Vec<String>,
    /// Listen addresses; empty means all addresses
    pub listen_addresses: Vec<String>,
    pub log_level: String,
    pub password_authentication: bool,
    /// Reverse-resolve client addresses (UseDNS)
    pub host_validation: bool,
    pub client_keepalive: Option<u32>,
    pub vrf: Option<String>,
}

impl SshRecord {
    fn with_defaults(identifier: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            deleted: false,
            ports: vec!["22".to_string()],
            listen_addresses: Vec::new(),
            log_level: "INFO".to_string(),
            password_authentication: true,
            host_validation: true,
            client_keepalive: None,
            vrf: None,
        }
    }
}

impl FeatureRecord for SshRecord {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn deleted(&self) -> bool {
        self.deleted
    }
}

/// Handler for the `service ssh` subtree
pub struct SshHandler {
    config_path: PathBuf,
    unit: String,
}

impl SshHandler {
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from("/run/sshd/sshd_config"),
            unit: "ssh.service".to_string(),
        }
    }

    /// Create a handler writing its artifact to a custom location
    pub fn with_paths(config_path: PathBuf, unit: &str) -> Self {
        Self {
            config_path,
            unit: unit.to_string(),
        }
    }

    /// Path of the rendered sshd configuration artifact
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn render(record: &SshRecord) -> String {
        let mut out = String::new();
        out.push_str("### Autogenerated by netconfd ###\n\n");

        for port in &record.ports {
            out.push_str(&format!("Port {}\n", port));
        }
        for address in &record.listen_addresses {
            out.push_str(&format!("ListenAddress {}\n", address));
        }

        out.push_str(&format!("LogLevel {}\n", record.log_level.to_uppercase()));
        out.push_str(&format!(
            "UseDNS {}\n",
            if record.host_validation { "yes" } else { "no" }
        ));
        out.push_str(&format!(
            "PasswordAuthentication {}\n",
            if record.password_authentication {
                "yes"
            } else {
                "no"
            }
        ));
        if let Some(interval) = record.client_keepalive {
            out.push_str(&format!("ClientAliveInterval {}\n", interval));
        }

        out.push_str("Protocol 2\n");
        out.push_str("PidFile /run/sshd.pid\n");
        out
    }
}

impl Default for SshHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureHandler for SshHandler {
    type Record = SshRecord;

    fn feature(&self) -> &'static str {
        "ssh"
    }

    fn extract(
        &self,
        config: &dyn ConfigAccessor,
        identifier: &str,
    ) -> Result<SshRecord, ExtractionError> {
        let mut record = SshRecord::with_defaults(identifier);

        if !config.exists(&ROOT_PATH) {
            record.deleted = true;
            return Ok(record);
        }

        let cfg = Scoped::new(config, &ROOT_PATH);

        let ports = cfg.values(&["port"]);
        if !ports.is_empty() {
            record.ports = ports;
        }

        record.listen_addresses = cfg.values(&["listen-address"]);

        if let Some(level) = cfg.value(&["loglevel"]) {
            record.log_level = level;
        }

        if cfg.exists(&["disable-password-authentication"]) {
            record.password_authentication = false;
        }

        if cfg.exists(&["disable-host-validation"]) {
            record.host_validation = false;
        }

        if let Some(interval) = cfg.value(&["client-keepalive-interval"]) {
            let parsed = interval
                .parse::<u32>()
                .map_err(|_| ExtractionError::InvalidValue {
                    field: "client-keepalive-interval".to_string(),
                    value: interval.clone(),
                })?;
            record.client_keepalive = Some(parsed);
        }

        record.vrf = cfg.value(&["vrf"]);

        if let Ok(doc) = serde_json::to_string(&record) {
            debug!("normalized ssh record: {}", doc);
        }
        Ok(record)
    }

    async fn verify(&self, record: &SshRecord, _system: &dyn SystemOps) -> Result<(), ConfigError> {
        if record.deleted {
            return Ok(());
        }

        for port in &record.ports {
            if port.parse::<u16>().map(|p| p == 0).unwrap_or(true) {
                return Err(ConfigError::Invariant {
                    message: format!("'{}' is not a valid listen port", port),
                });
            }
        }

        // VRF existence is cross-feature state only known at commit time;
        // it is checked by apply, not here.
        Ok(())
    }

    async fn generate(
        &self,
        record: &SshRecord,
        system: &dyn SystemOps,
    ) -> Result<(), GenerationError> {
        // Stop-before-rewrite: the daemon must not keep running against an
        // artifact that is about to change or disappear.
        if let Err(e) = system.stop_unit(&self.unit).await {
            warn!("stopping {} before rewrite failed: {}", self.unit, e);
        }

        let path = self.config_path.display().to_string();

        if record.deleted {
            match fs::remove_file(&self.config_path).await {
                Ok(()) => debug!("removed {}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(GenerationError::Remove { path, source: e }),
            }
            return Ok(());
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| GenerationError::Write {
                path: path.clone(),
                source: e,
            })?;
        }

        fs::write(&self.config_path, Self::render(record))
            .await
            .map_err(|e| GenerationError::Write { path, source: e })?;

        Ok(())
    }

    async fn apply(&self, record: &SshRecord, system: &dyn SystemOps) -> Result<(), ApplyError> {
        if record.deleted || record.disabled() {
            // The unit was already stopped before the artifact was touched
            return Ok(());
        }

        match &record.vrf {
            Some(vrf) => {
                // A missing VRF aborts the commit; falling back to the
                // default VRF would contradict the committed configuration.
                if !system.vrf_exists(vrf).await {
                    return Err(ApplyError::VrfMissing { vrf: vrf.clone() });
                }
                system.start_unit_in_vrf(&self.unit, vrf).await?;

                // Same diagnostic the smoke checks run by hand
                match system.vrf_pids(vrf).await {
                    Ok(pids) => debug!("processes in VRF {}: {}", vrf, pids.trim()),
                    Err(e) => warn!("listing VRF {} processes failed: {}", vrf, e),
                }
                Ok(())
            }
            None => system.start_unit(&self.unit).await,
        }
    }
}
