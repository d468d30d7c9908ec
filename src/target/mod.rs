//! iSCSI export management.
//!
//! One tgtd target per process, created on first use and never torn down.
//! Exports are LUNs on that target, one per logical volume, with initiators
//! admitted through the target's ACL.

mod lun;
pub mod tgtadm;

pub use lun::{INITIAL_LUN, LUN_ROTATION, LunAllocator};
pub use tgtadm::{ShowParseError, TargetInfo, parse_show};

use crate::exec::{CommandRunner, ExecError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub const TARGET_ID: u32 = 1;
pub const TARGET_IQN: &str = "iqn.2017-10.io.opensds:volume:00000001";
pub const TARGET_PORTAL: &str = "127.0.0.1:2360";

/// Initiator token that admits every initiator.
pub const ALL_INITIATORS: &str = "ALL";

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Target operation failed: {0}")]
    Exec(#[from] ExecError),

    #[error("Unparseable tgtadm output: {0}")]
    Parse(#[from] ShowParseError),

    #[error("Can't find lun with path {0}")]
    ExportNotFound(String),
}

pub type TargetResult<T> = Result<T, TargetError>;

/// Connection details handed back to the initiator side after an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescriptor {
    pub target_discovered: bool,
    pub target_iqn: String,
    pub target_portal: String,
    pub target_lun: u32,
    pub discard: bool,
}

impl ExportDescriptor {
    pub fn to_publish_info(&self) -> HashMap<String, String> {
        HashMap::from([
            ("targetDiscovered".to_string(), self.target_discovered.to_string()),
            ("targetIQN".to_string(), self.target_iqn.clone()),
            ("targetPortal".to_string(), self.target_portal.clone()),
            ("targetLun".to_string(), self.target_lun.to_string()),
            ("discard".to_string(), self.discard.to_string()),
        ])
    }
}

/// Empty or missing initiators fall back to [`ALL_INITIATORS`].
pub fn initiator_or_wildcard(initiator: Option<&str>) -> &str {
    match initiator {
        Some(i) if !i.trim().is_empty() => i,
        _ => ALL_INITIATORS,
    }
}

struct TargetState {
    luns: LunAllocator,
}

/// Owner of the singleton target.
///
/// Every counter access and every target mutation happens while holding
/// `state`, so concurrent exports never share a LUN and ACL updates never
/// interleave.
pub struct ExportManager {
    runner: Arc<dyn CommandRunner>,
    state: Mutex<TargetState>,
}

impl ExportManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_allocator(runner, LunAllocator::new())
    }

    pub fn with_allocator(runner: Arc<dyn CommandRunner>, luns: LunAllocator) -> Self {
        Self { runner, state: Mutex::new(TargetState { luns }) }
    }

    /// Map `path` to the next LUN and admit `initiator`.
    ///
    /// A failure after the LUN is added leaves it mapped; removing the same
    /// path later cleans it up.
    pub async fn create_export(
        &self,
        path: &str,
        initiator: Option<&str>,
    ) -> TargetResult<ExportDescriptor> {
        let initiator = initiator_or_wildcard(initiator);
        let mut state = self.state.lock().await;

        let lun = state.luns.allocate();
        tracing::debug!("Allocated LUN {} for {}", lun, path);

        self.ensure_target().await?;
        self.runner.run(&tgtadm::new_lun(TARGET_ID, lun, path)).await.inspect_err(|e| {
            tracing::error!("Failed to add LUN {} for {}: {}", lun, path, e)
        })?;
        self.runner.run(&tgtadm::bind_initiator(TARGET_ID, initiator)).await.inspect_err(|e| {
            tracing::error!("Failed to bind initiator {}: {}", initiator, e)
        })?;

        tracing::info!("Exported {} as LUN {} to {}", path, lun, initiator);

        Ok(ExportDescriptor {
            target_discovered: true,
            target_iqn: TARGET_IQN.to_string(),
            target_portal: TARGET_PORTAL.to_string(),
            target_lun: lun,
            discard: false,
        })
    }

    /// Revoke `initiator`, then unmap the LUN backing `path`.
    ///
    /// The initiator is unbound even when `path` turns out not to be exported.
    pub async fn remove_export(&self, path: &str, initiator: Option<&str>) -> TargetResult<()> {
        let initiator = initiator_or_wildcard(initiator);
        let _state = self.state.lock().await;

        self.runner.run(&tgtadm::unbind_initiator(TARGET_ID, initiator)).await.inspect_err(|e| {
            tracing::error!("Failed to unbind initiator {}: {}", initiator, e)
        })?;

        let lun = self
            .target()
            .await?
            .and_then(|t| t.lun_for_path(path))
            .ok_or_else(|| TargetError::ExportNotFound(path.to_string()))?;

        self.runner.run(&tgtadm::delete_lun(TARGET_ID, lun)).await.inspect_err(|e| {
            tracing::error!("Failed to remove LUN {} for {}: {}", lun, path, e)
        })?;

        tracing::info!("Removed export of {} (LUN {}) from {}", path, lun, initiator);
        Ok(())
    }

    /// Current device path to LUN mapping of the target.
    pub async fn exports(&self) -> TargetResult<HashMap<String, u32>> {
        let _state = self.state.lock().await;
        Ok(self
            .target()
            .await?
            .map(|t| t.luns.into_iter().map(|(lun, path)| (path, lun)).collect())
            .unwrap_or_default())
    }

    /// Initiators currently admitted to the target.
    pub async fn initiators(&self) -> TargetResult<Vec<String>> {
        let _state = self.state.lock().await;
        Ok(self.target().await?.map(|t| t.acl).unwrap_or_default())
    }

    /// Last LUN number handed out.
    pub async fn current_lun(&self) -> u32 {
        self.state.lock().await.luns.current()
    }

    async fn target(&self) -> TargetResult<Option<TargetInfo>> {
        let output = self.runner.run(&tgtadm::show_targets()).await?;
        Ok(parse_show(&output)?.into_iter().find(|t| t.tid == TARGET_ID))
    }

    async fn ensure_target(&self) -> TargetResult<()> {
        if self.target().await?.is_some() {
            return Ok(());
        }

        self.runner
            .run(&tgtadm::new_target(TARGET_ID, TARGET_IQN))
            .await
            .inspect_err(|e| tracing::error!("Failed to create target {}: {}", TARGET_IQN, e))?;
        tracing::info!("Created iSCSI target {} ({})", TARGET_ID, TARGET_IQN);
        Ok(())
    }
}
