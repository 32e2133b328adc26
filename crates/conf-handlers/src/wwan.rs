//! Wireless-modem interface handler
//!
//! One instance per WWAN interface (`interfaces wirelessmodem <intf>`).
//! Renders a PPP peer file, loads the USB serial kernel modules and dials
//! the connection through a templated `ppp@<intf>` unit.

use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use tokio::fs;

use netconfd_core::{ApplyError, ConfigError, ExtractionError, FeatureRecord, GenerationError};
use netconfd_commit::{FeatureHandler, SystemOps};
use netconfd_tree::{ConfigAccessor, Scoped};

/// Kernel modules the PPP dialer depends on
const KERNEL_MODULES: [&str; 3] = ["option", "usb_wwan", "usbserial"];

/// Normalized wireless-modem interface configuration
#[derive(Debug, Clone, Serialize)]
pub struct WwanRecord {
    pub intf: String,
    pub deleted: bool,
    pub description: String,
    /// Serial device under /dev the modem is attached to
    pub device: String,
    pub disable: bool,
    pub disable_link_detect: u8,
    pub on_demand: bool,
    /// Metric for the backup default route
    pub metric: u32,
    pub mtu: u16,
    /// Accept DNS servers announced by the peer
    pub use_peer_dns: bool,
    /// Carrier network the peer file dials into
    pub network: String,
    pub logfile: PathBuf,
}

impl WwanRecord {
    fn with_defaults(intf: &str, logfile: PathBuf) -> Self {
        Self {
            intf: intf.to_string(),
            deleted: false,
            description: String::new(),
            device: "ttyUSB0".to_string(),
            disable: false,
            disable_link_detect: 1,
            on_demand: false,
            metric: 10,
            mtu: 1500,
            use_peer_dns: true,
            network: "att".to_string(),
            logfile,
        }
    }
}

impl FeatureRecord for WwanRecord {
    fn identifier(&self) -> &str {
        &self.intf
    }

    fn deleted(&self) -> bool {
        self.deleted
    }

    fn disabled(&self) -> bool {
        self.disable
    }
}

/// Handler for `interfaces wirelessmodem` instances
pub struct WwanHandler {
    peers_dir: PathBuf,
    log_dir: PathBuf,
    log_owner: String,
    log_group: String,
}

impl WwanHandler {
    pub fn new() -> Self {
        Self {
            peers_dir: PathBuf::from("/etc/ppp/peers"),
            log_dir: PathBuf::from("/var/log/netconfd"),
            log_owner: "root".to_string(),
            log_group: "netconf".to_string(),
        }
    }

    /// Create a handler with custom artifact directories
    pub fn with_dirs(peers_dir: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            peers_dir,
            log_dir,
            ..Self::new()
        }
    }

    /// Path of the PPP peer file for `intf`
    pub fn peer_path(&self, intf: &str) -> PathBuf {
        self.peers_dir.join(intf)
    }

    fn unit(intf: &str) -> String {
        format!("ppp@{}.service", intf)
    }

    fn render(record: &WwanRecord) -> String {
        let mut out = String::new();
        out.push_str("### Autogenerated by netconfd ###\n");
        if !record.description.is_empty() {
            out.push_str(&format!("# {}\n", record.description));
        }
        out.push('\n');

        out.push_str("# physical device\n");
        out.push_str(&format!("/dev/{}\n\n", record.device));

        out.push_str(&format!("ipparam {} {}\n", record.intf, record.metric));
        if record.on_demand {
            out.push_str("demand\n");
        }
        if record.use_peer_dns {
            out.push_str("usepeerdns\n");
        }
        out.push_str(&format!("logfile {}\n", record.logfile.display()));
        out.push_str(&format!("linkname {}\n", record.intf));
        out.push_str("lcp-echo-failure 0\n");
        out.push_str("115200\n");
        out.push_str("debug\n");
        out.push_str("nodefaultroute\n");
        out.push_str("ipcp-max-failure 4\n");
        out.push_str("ipcp-accept-local\n");
        out.push_str("ipcp-accept-remote\n");
        out.push_str("noauth\n");
        out.push_str("crtscts\n");
        out.push_str("lock\n");
        out.push_str("persist\n");
        out
    }
}

impl Default for WwanHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureHandler for WwanHandler {
    type Record = WwanRecord;

    fn feature(&self) -> &'static str {
        "wirelessmodem"
    }

    fn extract(
        &self,
        config: &dyn ConfigAccessor,
        identifier: &str,
    ) -> Result<WwanRecord, ExtractionError> {
        if identifier.is_empty() {
            return Err(ExtractionError::MissingIdentifier {
                feature: "wirelessmodem".to_string(),
            });
        }

        let logfile = self.log_dir.join(format!("ppp_{}.log", identifier));
        let mut record = WwanRecord::with_defaults(identifier, logfile);

        // Interface has been removed: nothing else may be read
        if !config.exists(&["interfaces", "wirelessmodem", identifier]) {
            record.deleted = true;
            return Ok(record);
        }

        let cfg = Scoped::new(config, &["interfaces", "wirelessmodem", identifier]);

        // Metric for the backup default route
        if let Some(distance) = cfg.value(&["backup", "distance"]) {
            record.metric = distance
                .parse::<u32>()
                .map_err(|_| ExtractionError::InvalidValue {
                    field: "backup distance".to_string(),
                    value: distance.clone(),
                })?;
        }

        if let Some(description) = cfg.value(&["description"]) {
            record.description = description;
        }

        if let Some(device) = cfg.value(&["device"]) {
            record.device = device;
        }

        if cfg.exists(&["disable"]) {
            record.disable = true;
        }

        // Ignore link state changes
        if cfg.exists(&["disable-link-detect"]) {
            record.disable_link_detect = 2;
        }

        if let Some(mtu) = cfg.value(&["mtu"]) {
            record.mtu = mtu.parse::<u16>().map_err(|_| ExtractionError::InvalidValue {
                field: "mtu".to_string(),
                value: mtu.clone(),
            })?;
        }

        if let Some(network) = cfg.value(&["network"]) {
            record.network = network;
        }

        // Do not use DNS servers provided by the peer
        if cfg.exists(&["no-dns"]) {
            record.use_peer_dns = false;
        }

        if cfg.exists(&["ondemand"]) {
            record.on_demand = true;
        }

        if let Ok(doc) = serde_json::to_string(&record) {
            debug!("normalized wirelessmodem record: {}", doc);
        }
        Ok(record)
    }

    async fn verify(&self, record: &WwanRecord, system: &dyn SystemOps) -> Result<(), ConfigError> {
        if record.deleted {
            return Ok(());
        }

        // Serial devices are not regular files, so this must be a bare
        // existence check rather than an is_file test.
        let device = PathBuf::from("/dev").join(&record.device);
        if !system.path_exists(&device) {
            return Err(ConfigError::DeviceMissing {
                device: record.device.clone(),
            });
        }

        Ok(())
    }

    async fn generate(
        &self,
        record: &WwanRecord,
        system: &dyn SystemOps,
    ) -> Result<(), GenerationError> {
        // Always hang up the connection before the peer file changes
        let unit = Self::unit(&record.intf);
        if let Err(e) = system.stop_unit(&unit).await {
            warn!("hanging up {} failed: {}", unit, e);
        }

        let peer_file = self.peer_path(&record.intf);
        let path = peer_file.display().to_string();

        if record.deleted {
            match fs::remove_file(&peer_file).await {
                Ok(()) => debug!("removed {}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(GenerationError::Remove { path, source: e }),
            }
            return Ok(());
        }

        if let Some(parent) = peer_file.parent() {
            fs::create_dir_all(parent).await.map_err(|e| GenerationError::Write {
                path: path.clone(),
                source: e,
            })?;
        }

        fs::write(&peer_file, Self::render(record))
            .await
            .map_err(|e| GenerationError::Write { path, source: e })?;

        Ok(())
    }

    async fn apply(&self, record: &WwanRecord, system: &dyn SystemOps) -> Result<(), ApplyError> {
        if record.deleted {
            // Connection was hung up before the peer file was removed
            return Ok(());
        }

        if record.disable {
            return Ok(());
        }

        for module in KERNEL_MODULES {
            system.ensure_module(module).await?;
        }

        system.start_unit(&Self::unit(&record.intf)).await?;

        // The dialer creates the log file once it is up; ownership is fixed
        // afterwards and a not-yet-existing file is skipped.
        system
            .chown(&record.logfile, &self.log_owner, &self.log_group)
            .await?;

        Ok(())
    }
}
