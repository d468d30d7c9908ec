//! Volume lifecycle.
//!
//! A volume moves through `created -> published -> unpublished -> deleted`.
//! [`Driver`] validates the request data each step needs, then delegates to
//! the LVM manager (create/delete) or the export manager (publish/unpublish).

mod error;

pub use error::{DriverError, DriverResult};

use crate::exec::CommandRunner;
use crate::lvm::{ATTR_LV_PATH, LvmManager, Volume, volume_name_from_path};
use crate::target::ExportManager;
use std::collections::HashMap;
use std::sync::Arc;

pub const ATTR_INITIATOR: &str = "initiator";
pub const ATTR_DRIVER_VOLUME_TYPE: &str = "driverVolumeType";
pub const DRIVER_VOLUME_TYPE: &str = "iscsi";

const MOUNT_UNSUPPORTED: &str = "mounted volumes are not supported, only raw block access";

/// How a consumer wants to access a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Block,
    Mount,
}

/// Outcome of a capability check. Unsupported capabilities are a normal
/// answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityCheck {
    pub supported: bool,
    pub message: String,
}

pub struct Driver {
    lvm: LvmManager,
    exports: ExportManager,
}

impl Driver {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_parts(LvmManager::new(runner.clone()), ExportManager::new(runner))
    }

    pub fn with_parts(lvm: LvmManager, exports: ExportManager) -> Self {
        Self { lvm, exports }
    }

    pub fn export_manager(&self) -> &ExportManager {
        &self.exports
    }

    /// Provision a volume. Nothing is run when the capacity is missing.
    pub async fn create_volume(&self, name: &str, capacity_bytes: Option<u64>) -> DriverResult<Volume> {
        let Some(size) = capacity_bytes else {
            tracing::warn!("Capacity required for volume {}", name);
            return Err(DriverError::MissingParameter("Capacity"));
        };

        Ok(self.lvm.create_volume(name, size).await?)
    }

    /// Remove the volume whose device path is carried in `credentials`.
    pub async fn delete_volume(&self, credentials: &HashMap<String, String>) -> DriverResult<()> {
        let lv_path = device_path(credentials)?;
        Ok(self.lvm.delete_volume(lv_path).await?)
    }

    /// Export a volume to an initiator and return its connection info.
    ///
    /// Both `lvPath` and `initiator` must be present; an empty initiator
    /// grants access to all initiators.
    pub async fn initialize_connection(
        &self,
        attributes: &HashMap<String, String>,
    ) -> DriverResult<HashMap<String, String>> {
        let lv_path = device_path(attributes)?;
        let initiator = required(attributes, ATTR_INITIATOR)?;

        let export = self.exports.create_export(lv_path, Some(initiator)).await?;

        let mut info = export.to_publish_info();
        info.insert(ATTR_DRIVER_VOLUME_TYPE.to_string(), DRIVER_VOLUME_TYPE.to_string());
        Ok(info)
    }

    /// Withdraw an export. The initiator is optional and defaults to all.
    pub async fn terminate_connection(&self, credentials: &HashMap<String, String>) -> DriverResult<()> {
        let lv_path = device_path(credentials)?;
        let initiator = credentials.get(ATTR_INITIATOR).map(String::as_str);

        Ok(self.exports.remove_export(lv_path, initiator).await?)
    }

    pub fn validate_volume_capabilities(
        &self,
        volume_id: &str,
        capabilities: &[AccessType],
    ) -> DriverResult<CapabilityCheck> {
        if volume_id.trim().is_empty() {
            return Err(DriverError::InvalidVolumeId);
        }

        Ok(match check_access(capabilities) {
            Ok(()) => CapabilityCheck { supported: true, message: "supported".to_string() },
            Err(e) => CapabilityCheck { supported: false, message: e.to_string() },
        })
    }

    /// Declared as a controller capability but not available.
    pub async fn list_volumes(&self) -> DriverResult<Vec<Volume>> {
        Err(DriverError::NotImplemented("ListVolumes"))
    }

    /// Declared as a controller capability but not available.
    pub async fn get_capacity(&self) -> DriverResult<u64> {
        Err(DriverError::NotImplemented("GetCapacity"))
    }
}

fn required<'a>(map: &'a HashMap<String, String>, key: &'static str) -> DriverResult<&'a str> {
    map.get(key).map(String::as_str).ok_or_else(|| {
        tracing::warn!("Failed to find {} in volume metadata", key);
        DriverError::MissingAttribute(key)
    })
}

/// The `lvPath` entry, which must name a volume of our volume group.
fn device_path(map: &HashMap<String, String>) -> DriverResult<&str> {
    let lv_path = required(map, ATTR_LV_PATH)?;
    if volume_name_from_path(lv_path).is_none() {
        tracing::warn!("Rejecting {} {:?}: not a logical volume of this driver", ATTR_LV_PATH, lv_path);
        return Err(DriverError::InvalidAttribute { key: ATTR_LV_PATH, value: lv_path.to_string() });
    }
    Ok(lv_path)
}

fn check_access(capabilities: &[AccessType]) -> DriverResult<()> {
    if capabilities.contains(&AccessType::Mount) {
        return Err(DriverError::UnsupportedCapability(MOUNT_UNSUPPORTED.to_string()));
    }
    Ok(())
}
