//! Logical volume management.
//!
//! Wraps the host's LVM tools (`lvcreate`, `lvdisplay`, `lvremove`) for the
//! single volume group this driver provisions from.

mod display;

pub use display::{LV_PATH_LABEL, LV_STATUS_LABEL, LvDisplay, ParseError, parse_lv_display};

use crate::exec::{CommandLine, CommandRunner, ExecError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Volume group every logical volume is carved from.
pub const VOLUME_GROUP: &str = "vg001";

pub const ATTR_NAME: &str = "name";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_LV_PATH: &str = "lvPath";

const GIB: u64 = 1024 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum LvmError {
    #[error("LVM command failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Unparseable lvdisplay output: {0}")]
    Parse(#[from] ParseError),
}

pub type LvmResult<T> = Result<T, LvmError>;

/// A provisioned logical volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: Uuid,
    pub name: String,
    pub capacity_bytes: u64,
    /// Always holds `name`, `status` and `lvPath`.
    pub attributes: HashMap<String, String>,
}

impl Volume {
    pub fn device_path(&self) -> Option<&str> {
        self.attributes.get(ATTR_LV_PATH).map(String::as_str)
    }

    pub fn status(&self) -> Option<&str> {
        self.attributes.get(ATTR_STATUS).map(String::as_str)
    }
}

/// Size argument for `lvcreate -L`, in whole gibibytes rounded up.
pub fn size_argument(size_bytes: u64) -> String {
    format!("{}G", size_bytes.div_ceil(GIB).max(1))
}

/// Device node LVM creates for a volume in [`VOLUME_GROUP`].
pub fn device_path_for(name: &str) -> String {
    format!("/dev/{}/{}", VOLUME_GROUP, name)
}

/// Whether `name` is a logical volume name LVM would accept: characters from
/// `[A-Za-z0-9+_.-]`, no leading `-`, and neither `.` nor `..`.
pub fn is_valid_volume_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '_' | '.' | '-'))
}

/// Volume name of a device path in [`VOLUME_GROUP`], or `None` when `path` is
/// anything other than `/dev/vg001/<name>` with a valid name.
pub fn volume_name_from_path(path: &str) -> Option<&str> {
    path.strip_prefix("/dev/")
        .and_then(|rest| rest.strip_prefix(VOLUME_GROUP))
        .and_then(|rest| rest.strip_prefix('/'))
        .filter(|name| is_valid_volume_name(name))
}

#[derive(Clone)]
pub struct LvmManager {
    runner: Arc<dyn CommandRunner>,
}

impl LvmManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Create a logical volume and read back its path and status.
    pub async fn create_volume(&self, name: &str, size_bytes: u64) -> LvmResult<Volume> {
        let create = CommandLine::new("lvcreate")
            .args(["-n", name, "-L"])
            .arg(size_argument(size_bytes))
            .arg(VOLUME_GROUP);
        if let Err(e) = self.runner.run(&create).await {
            tracing::error!("Failed to create logical volume {}: {}", name, e);
            return Err(e.into());
        }

        let expected_path = device_path_for(name);
        let output = self
            .runner
            .run(&CommandLine::new("lvdisplay").arg(&expected_path))
            .await
            .inspect_err(|e| tracing::error!("Failed to display logical volume {}: {}", name, e))?;

        let display = parse_lv_display(&output)?;
        if display.path.is_none() {
            tracing::warn!("lvdisplay reported no LV Path for {}, assuming {}", name, expected_path);
        }
        let lv_path = display.path.unwrap_or(expected_path);
        let lv_status = display.status.unwrap_or_default();

        tracing::info!("Created logical volume {} at {} ({})", name, lv_path, lv_status);

        let attributes = HashMap::from([
            (ATTR_NAME.to_string(), name.to_string()),
            (ATTR_STATUS.to_string(), lv_status),
            (ATTR_LV_PATH.to_string(), lv_path),
        ]);

        Ok(Volume { id: Uuid::new_v4(), name: name.to_string(), capacity_bytes: size_bytes, attributes })
    }

    /// Force-remove the logical volume at `lv_path`. Not idempotent.
    pub async fn delete_volume(&self, lv_path: &str) -> LvmResult<()> {
        self.runner
            .run(&CommandLine::new("lvremove").args(["-f", lv_path]))
            .await
            .inspect_err(|e| tracing::error!("Failed to remove logical volume {}: {}", lv_path, e))?;

        tracing::info!("Removed logical volume {}", lv_path);
        Ok(())
    }

    /// Inspect the volume group. Listing is not parsed; the result is always empty.
    pub async fn list_volumes(&self) -> LvmResult<Vec<Volume>> {
        self.runner
            .run(&CommandLine::new("lvdisplay").arg(VOLUME_GROUP))
            .await
            .inspect_err(|e| tracing::error!("Failed to display volume group {}: {}", VOLUME_GROUP, e))?;

        Ok(Vec::new())
    }
}
