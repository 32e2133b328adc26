//! System operations consumed by the apply and generate stages

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::process::Command;
use tokio::time::timeout;

use netconfd_core::ApplyError;

/// Externally observable operations the pipeline performs.
///
/// Verify is limited to the read-only probes (`path_exists`, `vrf_exists`);
/// everything else belongs to generate (unit stop) and apply.
#[async_trait]
pub trait SystemOps: Send + Sync {
    /// Whether `path` exists. Works for device files, which are not
    /// regular files and would fail an `is_file` check.
    fn path_exists(&self, path: &Path) -> bool;

    /// Start a service unit
    async fn start_unit(&self, unit: &str) -> Result<(), ApplyError>;

    /// Start a service unit bound into the named VRF
    async fn start_unit_in_vrf(&self, unit: &str, vrf: &str) -> Result<(), ApplyError>;

    /// Stop a service unit. Tolerant: stopping a unit that is not running
    /// is not an error, so generate can always stop-before-rewrite.
    async fn stop_unit(&self, unit: &str) -> Result<(), ApplyError>;

    /// Whether the named VRF device exists
    async fn vrf_exists(&self, vrf: &str) -> bool;

    /// List PIDs bound into the named VRF (diagnostic surface)
    async fn vrf_pids(&self, vrf: &str) -> Result<String, ApplyError>;

    /// Make sure a kernel module is loaded, probing and loading on demand
    async fn ensure_module(&self, module: &str) -> Result<(), ApplyError>;

    /// Change ownership of `path` to `owner:group`. A path that does not
    /// exist yet is skipped, not an error.
    async fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), ApplyError>;
}

/// Real implementation shelling out to the host
pub struct HostSystem {
    systemctl_path: String,
    ip_path: String,
    modprobe_path: String,
    chown_path: String,
    sys_module_dir: PathBuf,
    sys_class_net_dir: PathBuf,
    operation_timeout: Duration,
}

impl HostSystem {
    pub fn new() -> Self {
        Self {
            systemctl_path: "/usr/bin/systemctl".to_string(),
            ip_path: "/usr/sbin/ip".to_string(),
            modprobe_path: "/usr/sbin/modprobe".to_string(),
            chown_path: "/usr/bin/chown".to_string(),
            sys_module_dir: PathBuf::from("/sys/module"),
            sys_class_net_dir: PathBuf::from("/sys/class/net"),
            operation_timeout: Duration::from_secs(60),
        }
    }

    /// Run a command, capturing output and enforcing the operation timeout
    async fn run(&self, program: &str, args: &[&str]) -> Result<std::process::Output, ApplyError> {
        let rendered = format!("{} {}", program, args.join(" "));
        debug!("running {}", rendered);

        let mut cmd = Command::new(program);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = timeout(self.operation_timeout, cmd.output())
            .await
            .map_err(|_| ApplyError::Command {
                command: rendered.clone(),
                detail: "timed out".to_string(),
            })?
            .map_err(|e| ApplyError::Command {
                command: rendered,
                detail: e.to_string(),
            })?;

        Ok(output)
    }

    fn stderr_line(output: &std::process::Output) -> String {
        let text = String::from_utf8_lossy(&output.stderr);
        text.lines().next().unwrap_or("exited with failure").to_string()
    }
}

impl Default for HostSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SystemOps for HostSystem {
    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    async fn start_unit(&self, unit: &str) -> Result<(), ApplyError> {
        info!("starting {}", unit);
        let output = self.run(&self.systemctl_path, &["start", unit]).await?;
        if !output.status.success() {
            return Err(ApplyError::Service {
                unit: unit.to_string(),
                action: "start".to_string(),
                detail: Self::stderr_line(&output),
            });
        }
        Ok(())
    }

    async fn start_unit_in_vrf(&self, unit: &str, vrf: &str) -> Result<(), ApplyError> {
        info!("starting {} in VRF {}", unit, vrf);
        let output = self
            .run(
                &self.ip_path,
                &["vrf", "exec", vrf, &self.systemctl_path, "start", unit],
            )
            .await?;
        if !output.status.success() {
            return Err(ApplyError::Service {
                unit: unit.to_string(),
                action: format!("start in VRF {}", vrf),
                detail: Self::stderr_line(&output),
            });
        }
        Ok(())
    }

    async fn stop_unit(&self, unit: &str) -> Result<(), ApplyError> {
        info!("stopping {}", unit);
        let output = self.run(&self.systemctl_path, &["stop", unit]).await?;
        if !output.status.success() {
            // The unit may simply not be running
            warn!("stopping {} reported: {}", unit, Self::stderr_line(&output));
        }
        Ok(())
    }

    async fn vrf_exists(&self, vrf: &str) -> bool {
        self.sys_class_net_dir.join(vrf).exists()
    }

    async fn vrf_pids(&self, vrf: &str) -> Result<String, ApplyError> {
        let output = self.run(&self.ip_path, &["vrf", "pids", vrf]).await?;
        if !output.status.success() {
            return Err(ApplyError::Command {
                command: format!("{} vrf pids {}", self.ip_path, vrf),
                detail: Self::stderr_line(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn ensure_module(&self, module: &str) -> Result<(), ApplyError> {
        if self.sys_module_dir.join(module).exists() {
            return Ok(());
        }
        info!("loading kernel module {}", module);
        let output = self.run(&self.modprobe_path, &[module]).await?;
        if !output.status.success() {
            return Err(ApplyError::ModuleLoad {
                module: module.to_string(),
            });
        }
        Ok(())
    }

    async fn chown(&self, path: &Path, owner: &str, group: &str) -> Result<(), ApplyError> {
        if !path.exists() {
            debug!("skipping chown, {} does not exist yet", path.display());
            return Ok(());
        }
        let spec = format!("{}:{}", owner, group);
        let target = path.display().to_string();
        let output = self.run(&self.chown_path, &[&spec, &target]).await?;
        if !output.status.success() {
            return Err(ApplyError::Ownership {
                path: target,
                detail: Self::stderr_line(&output),
            });
        }
        Ok(())
    }
}
