//! Tests for the reference handlers
//!
//! Mirrors what the external smoketests check: rendered artifact content,
//! unit start/stop ordering and VRF binding, with recorded system calls
//! standing in for the live host.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use regex::Regex;
    use tempfile::TempDir;

    use netconfd_commit::{commit, FeatureHandler, SystemOps};
    use netconfd_core::{ApplyError, CommitError, ExtractionError};
    use netconfd_tree::{ConfigAccessor, ConfigTree};

    use crate::ssh::SshHandler;
    use crate::wwan::WwanHandler;

    /// Recording system double
    struct FakeSystem {
        calls: Mutex<Vec<String>>,
        device_present: bool,
        vrfs: Mutex<HashSet<String>>,
        fail_module: Option<&'static str>,
    }

    impl FakeSystem {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                device_present: true,
                vrfs: Mutex::new(HashSet::new()),
                fail_module: None,
            }
        }

        fn without_device() -> Self {
            Self {
                device_present: false,
                ..Self::new()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn add_vrf(&self, name: &str) {
            self.vrfs.lock().unwrap().insert(name.to_string());
        }
    }

    #[async_trait]
    impl SystemOps for FakeSystem {
        fn path_exists(&self, path: &Path) -> bool {
            if path.starts_with("/dev") {
                self.device_present
            } else {
                path.exists()
            }
        }

        async fn start_unit(&self, unit: &str) -> Result<(), ApplyError> {
            self.record(format!("start {}", unit));
            Ok(())
        }

        async fn start_unit_in_vrf(&self, unit: &str, vrf: &str) -> Result<(), ApplyError> {
            self.record(format!("start {} in VRF {}", unit, vrf));
            Ok(())
        }

        async fn stop_unit(&self, unit: &str) -> Result<(), ApplyError> {
            self.record(format!("stop {}", unit));
            Ok(())
        }

        async fn vrf_exists(&self, vrf: &str) -> bool {
            self.vrfs.lock().unwrap().contains(vrf)
        }

        async fn vrf_pids(&self, vrf: &str) -> Result<String, ApplyError> {
            self.record(format!("pids {}", vrf));
            Ok("sshd 1234\n".to_string())
        }

        async fn ensure_module(&self, module: &str) -> Result<(), ApplyError> {
            self.record(format!("module {}", module));
            if self.fail_module == Some(module) {
                return Err(ApplyError::ModuleLoad {
                    module: module.to_string(),
                });
            }
            Ok(())
        }

        async fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), ApplyError> {
            self.record(format!("chown {} {}:{}", path.display(), owner, group));
            Ok(())
        }
    }

    /// Accessor whose root path is absent and which panics on any further
    /// read, proving the extractor short-circuits on deletion.
    struct AbsentRoot {
        root: Vec<String>,
    }

    impl AbsentRoot {
        fn new(root: &[&str]) -> Self {
            Self {
                root: root.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl ConfigAccessor for AbsentRoot {
        fn exists(&self, path: &[&str]) -> bool {
            if path == self.root.iter().map(String::as_str).collect::<Vec<_>>() {
                return false;
            }
            panic!("tree read after root absence was detected: {:?}", path);
        }

        fn value(&self, path: &[&str]) -> Option<String> {
            panic!("tree read after root absence was detected: {:?}", path);
        }

        fn values(&self, path: &[&str]) -> Vec<String> {
            panic!("tree read after root absence was detected: {:?}", path);
        }
    }

    fn ssh_handler(dir: &TempDir) -> SshHandler {
        SshHandler::with_paths(dir.path().join("sshd_config"), "ssh.service")
    }

    fn wwan_handler(dir: &TempDir) -> WwanHandler {
        WwanHandler::with_dirs(dir.path().join("peers"), dir.path().join("log"))
    }

    fn wwan_tree(intf: &str) -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.set(&["interfaces", "wirelessmodem", intf, "device"], "ttyUSB2");
        tree
    }

    fn config_values(artifact: &str, key: &str) -> Vec<String> {
        let re = Regex::new(&format!(r"(?m)^{} (.+)$", key)).unwrap();
        re.captures_iter(artifact)
            .map(|c| c[1].to_string())
            .collect()
    }

    #[test]
    fn ssh_defaults_are_complete() {
        let mut tree = ConfigTree::new();
        tree.touch(&["service", "ssh"]);

        let handler = SshHandler::new();
        let record = handler.extract(&tree, "ssh").unwrap();

        assert!(!record.deleted);
        assert_eq!(record.ports, vec!["22"]);
        assert!(record.listen_addresses.is_empty());
        assert_eq!(record.log_level, "INFO");
        assert!(record.password_authentication);
        assert!(record.host_validation);
        assert_eq!(record.client_keepalive, None);
        assert_eq!(record.vrf, None);
    }

    #[test]
    fn wwan_defaults_are_complete() {
        let mut tree = ConfigTree::new();
        tree.touch(&["interfaces", "wirelessmodem", "wlm0"]);

        let handler = WwanHandler::new();
        let record = handler.extract(&tree, "wlm0").unwrap();

        assert!(!record.deleted);
        assert_eq!(record.device, "ttyUSB0");
        assert_eq!(record.metric, 10);
        assert_eq!(record.mtu, 1500);
        assert_eq!(record.network, "att");
        assert!(record.use_peer_dns);
        assert!(!record.on_demand);
        assert!(!record.disable);
        assert_eq!(record.disable_link_detect, 1);
    }

    #[test]
    fn wwan_requires_an_identifier() {
        let tree = ConfigTree::new();
        let handler = WwanHandler::new();
        let err = handler.extract(&tree, "").unwrap_err();
        assert!(matches!(err, ExtractionError::MissingIdentifier { .. }));
    }

    #[test]
    fn deletion_short_circuits_all_reads() {
        let handler = WwanHandler::new();
        let accessor = AbsentRoot::new(&["interfaces", "wirelessmodem", "wlm0"]);
        let record = handler.extract(&accessor, "wlm0").unwrap();
        assert!(record.deleted);

        let handler = SshHandler::new();
        let accessor = AbsentRoot::new(&["service", "ssh"]);
        let record = handler.extract(&accessor, "ssh").unwrap();
        assert!(record.deleted);
    }

    #[tokio::test]
    async fn missing_device_gates_generate_and_apply() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);
        let tree = wwan_tree("wlm0");
        let system = FakeSystem::without_device();

        let err = commit(&handler, &tree, &system, "wlm0").await.unwrap_err();
        assert!(matches!(err, CommitError::Validation(_)));

        // No side effect reached the system or the filesystem
        assert!(system.calls().is_empty());
        assert!(!handler.peer_path("wlm0").exists());
    }

    #[tokio::test]
    async fn reapply_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let handler = ssh_handler(&dir);
        let mut tree = ConfigTree::new();
        tree.set(&["service", "ssh", "port"], "2222");
        tree.set(&["service", "ssh", "listen-address"], "192.0.2.1");

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "ssh").await.unwrap();
        let first = std::fs::read(handler.config_path()).unwrap();

        commit(&handler, &tree, &system, "ssh").await.unwrap();
        let second = std::fs::read(handler.config_path()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn artifact_round_trips_ports_and_addresses() {
        let dir = TempDir::new().unwrap();
        let handler = ssh_handler(&dir);

        let ports = ["22", "2222", "2223", "2224"];
        let addresses = ["127.0.0.1", "::1"];

        let mut tree = ConfigTree::new();
        for port in ports {
            tree.set(&["service", "ssh", "port"], port);
        }
        for address in addresses {
            tree.set(&["service", "ssh", "listen-address"], address);
        }

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "ssh").await.unwrap();

        let artifact = std::fs::read_to_string(handler.config_path()).unwrap();
        assert_eq!(config_values(&artifact, "Port"), ports.to_vec());
        assert_eq!(config_values(&artifact, "ListenAddress"), addresses.to_vec());
    }

    #[tokio::test]
    async fn ssh_toggles_render_into_artifact() {
        let dir = TempDir::new().unwrap();
        let handler = ssh_handler(&dir);

        let mut tree = ConfigTree::new();
        tree.set(&["service", "ssh", "port"], "1234");
        tree.set(&["service", "ssh", "loglevel"], "verbose");
        tree.set(&["service", "ssh", "client-keepalive-interval"], "100");
        tree.set(&["service", "ssh", "listen-address"], "127.0.0.1");
        tree.touch(&["service", "ssh", "disable-host-validation"]);
        tree.touch(&["service", "ssh", "disable-password-authentication"]);

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "ssh").await.unwrap();

        let artifact = std::fs::read_to_string(handler.config_path()).unwrap();
        assert_eq!(config_values(&artifact, "Port"), vec!["1234"]);
        assert_eq!(config_values(&artifact, "LogLevel"), vec!["VERBOSE"]);
        assert_eq!(config_values(&artifact, "UseDNS"), vec!["no"]);
        assert_eq!(
            config_values(&artifact, "PasswordAuthentication"),
            vec!["no"]
        );
        assert_eq!(config_values(&artifact, "ClientAliveInterval"), vec!["100"]);
    }

    #[tokio::test]
    async fn missing_vrf_aborts_apply_until_it_exists() {
        let dir = TempDir::new().unwrap();
        let handler = ssh_handler(&dir);

        let mut tree = ConfigTree::new();
        tree.set(&["service", "ssh", "port"], "22");
        tree.set(&["service", "ssh", "vrf"], "mgmt");

        let system = FakeSystem::new();
        let err = commit(&handler, &tree, &system, "ssh").await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::Apply(ApplyError::VrfMissing { .. })
        ));
        assert!(!system.calls().iter().any(|c| c.starts_with("start")));

        // VRF created out-of-band, the same record now applies
        system.add_vrf("mgmt");
        commit(&handler, &tree, &system, "ssh").await.unwrap();

        // VRF-bound start, then the PID listing diagnostic
        let calls = system.calls();
        let started = calls
            .iter()
            .position(|c| c == "start ssh.service in VRF mgmt")
            .unwrap();
        let listed = calls.iter().position(|c| c == "pids mgmt").unwrap();
        assert!(started < listed);
    }

    #[tokio::test]
    async fn deletion_removes_artifact_and_starts_nothing() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);
        let mut tree = wwan_tree("wlm0");

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "wlm0").await.unwrap();
        assert!(handler.peer_path("wlm0").exists());

        tree.delete(&["interfaces", "wirelessmodem", "wlm0"]);

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "wlm0").await.unwrap();
        assert!(!handler.peer_path("wlm0").exists());
        assert_eq!(system.calls(), vec!["stop ppp@wlm0.service"]);

        // Second deletion tolerates the missing artifact
        commit(&handler, &tree, &system, "wlm0").await.unwrap();
    }

    #[tokio::test]
    async fn wwan_dials_after_stop_modules_and_fixes_log_ownership() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);
        let tree = wwan_tree("wlm0");

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "wlm0").await.unwrap();

        let calls = system.calls();
        // Hang-up comes first, before the peer file is rewritten or dialed
        assert_eq!(calls[0], "stop ppp@wlm0.service");
        assert_eq!(
            &calls[1..4],
            &["module option", "module usb_wwan", "module usbserial"]
        );
        assert_eq!(calls[4], "start ppp@wlm0.service");
        assert!(calls[5].starts_with("chown"));
        assert!(calls[5].ends_with("root:netconf"));
    }

    #[tokio::test]
    async fn wwan_module_load_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);
        let tree = wwan_tree("wlm0");

        let system = FakeSystem {
            fail_module: Some("usb_wwan"),
            ..FakeSystem::new()
        };

        let err = commit(&handler, &tree, &system, "wlm0").await.unwrap_err();
        assert!(matches!(
            err,
            CommitError::Apply(ApplyError::ModuleLoad { .. })
        ));
        assert!(!system.calls().iter().any(|c| c.starts_with("start")));
    }

    #[tokio::test]
    async fn disabled_wwan_is_rendered_but_not_dialed() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);
        let mut tree = wwan_tree("wlm0");
        tree.touch(&["interfaces", "wirelessmodem", "wlm0", "disable"]);

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "wlm0").await.unwrap();

        assert!(handler.peer_path("wlm0").exists());
        assert!(!system.calls().iter().any(|c| c.starts_with("start")));
    }

    #[tokio::test]
    async fn wwan_peer_file_reflects_record() {
        let dir = TempDir::new().unwrap();
        let handler = wwan_handler(&dir);

        let mut tree = wwan_tree("wlm0");
        tree.set(
            &["interfaces", "wirelessmodem", "wlm0", "description"],
            "uplink of last resort",
        );
        tree.set(&["interfaces", "wirelessmodem", "wlm0", "backup", "distance"], "250");
        tree.touch(&["interfaces", "wirelessmodem", "wlm0", "ondemand"]);
        tree.touch(&["interfaces", "wirelessmodem", "wlm0", "no-dns"]);

        let system = FakeSystem::new();
        commit(&handler, &tree, &system, "wlm0").await.unwrap();

        let artifact = std::fs::read_to_string(handler.peer_path("wlm0")).unwrap();
        assert!(artifact.contains("# uplink of last resort"));
        assert!(artifact.contains("/dev/ttyUSB2"));
        assert!(artifact.contains("ipparam wlm0 250"));
        assert!(artifact.contains("demand\n"));
        assert!(!artifact.contains("usepeerdns"));
        assert!(artifact.contains("linkname wlm0"));
    }

    #[test]
    fn records_serialize_for_diagnostics() {
        let mut tree = ConfigTree::new();
        tree.set(&["service", "ssh", "port"], "2222");
        tree.set(&["service", "ssh", "vrf"], "mgmt");

        let record = SshHandler::new().extract(&tree, "ssh").unwrap();
        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["ports"][0], "2222");
        assert_eq!(doc["vrf"], "mgmt");

        let record = WwanHandler::new().extract(&wwan_tree("wlm0"), "wlm0").unwrap();
        let doc = serde_json::to_value(&record).unwrap();
        assert_eq!(doc["device"], "ttyUSB2");
        assert_eq!(doc["metric"], 10);
    }

    #[test]
    fn bad_keepalive_value_is_an_extraction_error() {
        let mut tree = ConfigTree::new();
        tree.set(&["service", "ssh", "client-keepalive-interval"], "soon");

        let handler = SshHandler::new();
        let err = handler.extract(&tree, "ssh").unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidValue { .. }));
    }
}
