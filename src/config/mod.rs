use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub csi: CsiConfig,
    pub exec: ExecConfig,
    pub log: LogConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiConfig {
    /// `unix://` socket the gRPC services listen on
    pub endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Deadline for each external tool invocation
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

impl Default for CsiConfig {
    fn default() -> Self {
        Self { endpoint: "unix:///var/lib/kubelet/plugins/lvm.csi.io/csi.sock".to_string() }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "lvm_csi=debug,info".to_string(), json: false }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ExecConfig {
    /// Never shorter than one second; zero is also rejected at load time.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl Config {
    /// Load `lvm-csi.*` from the working directory if present, then
    /// `LVM_CSI__*` overrides.
    pub fn load() -> anyhow::Result<Self> {
        Self::layered("lvm-csi", false)
    }

    /// Load from a file that must exist (extension optional), then
    /// `LVM_CSI__*` overrides.
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::layered(&path.as_ref().to_string_lossy(), true)
    }

    fn layered(name: &str, required: bool) -> anyhow::Result<Self> {
        let loaded: Self = config::Config::builder()
            .add_source(config::File::with_name(name).required(required))
            .add_source(config::Environment::with_prefix("LVM_CSI").separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", name))?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.exec.timeout_secs == 0 {
            anyhow::bail!("exec.timeout_secs must be at least 1");
        }
        Ok(())
    }
}
