use crate::lvm::LvmError;
use crate::target::TargetError;
use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum DriverError {
    /// A required request field (e.g. the capacity range) is absent.
    #[error("{0} required!")]
    MissingParameter(&'static str),

    /// A required entry of the attribute or credential map is absent.
    #[error("Failed to find {0} in volume metadata!")]
    MissingAttribute(&'static str),

    /// An attribute or credential entry is present but unusable.
    #[error("Invalid {key} in volume metadata: {value:?}")]
    InvalidAttribute { key: &'static str, value: String },

    #[error("invalid volume id")]
    InvalidVolumeId,

    #[error("Unsupported request version {0}")]
    UnsupportedVersion(String),

    #[error("Volume manager failure: {0}")]
    ToolInvocation(#[source] LvmError),

    #[error("Target operation failure: {0}")]
    TargetOperation(#[source] TargetError),

    #[error("Can't find lun with path {0}")]
    ExportNotFound(String),

    #[error("{0}")]
    UnsupportedCapability(String),

    #[error("{0} not implemented")]
    NotImplemented(&'static str),
}

impl From<LvmError> for DriverError {
    fn from(err: LvmError) -> Self {
        Self::ToolInvocation(err)
    }
}

impl From<TargetError> for DriverError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::ExportNotFound(path) => Self::ExportNotFound(path),
            other => Self::TargetOperation(other),
        }
    }
}

impl DriverError {
    /// Whether retrying the same request can never succeed.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter(_)
                | Self::MissingAttribute(_)
                | Self::InvalidAttribute { .. }
                | Self::InvalidVolumeId
                | Self::UnsupportedVersion(_)
                | Self::UnsupportedCapability(_)
                | Self::NotImplemented(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecError;

    #[test]
    fn test_missing_parameter_message() {
        assert_eq!(DriverError::MissingParameter("Capacity").to_string(), "Capacity required!");
    }

    #[test]
    fn test_missing_attribute_message() {
        assert_eq!(
            DriverError::MissingAttribute("lvPath").to_string(),
            "Failed to find lvPath in volume metadata!"
        );
    }

    #[test]
    fn test_export_not_found_is_lifted() {
        let err: DriverError = TargetError::ExportNotFound("/dev/vg001/x".to_string()).into();
        assert!(matches!(err, DriverError::ExportNotFound(ref p) if p == "/dev/vg001/x"));
    }

    #[test]
    fn test_target_exec_failure_maps_to_target_operation() {
        let exec = ExecError::Failed { command: "tgtadm".to_string(), code: Some(1), stderr: String::new() };
        let err: DriverError = TargetError::Exec(exec).into();
        assert!(matches!(err, DriverError::TargetOperation(_)));
        assert!(!err.is_caller_error());
    }

    #[test]
    fn test_lvm_failure_maps_to_tool_invocation() {
        let exec = ExecError::Failed { command: "lvremove".to_string(), code: Some(5), stderr: String::new() };
        let err: DriverError = LvmError::Exec(exec).into();
        assert!(matches!(err, DriverError::ToolInvocation(_)));
    }

    #[test]
    fn test_invalid_attribute_message() {
        let err = DriverError::InvalidAttribute { key: "lvPath", value: "/dev/sda".to_string() };
        assert_eq!(err.to_string(), "Invalid lvPath in volume metadata: \"/dev/sda\"");
    }

    #[test]
    fn test_caller_errors() {
        assert!(DriverError::MissingParameter("Capacity").is_caller_error());
        assert!(DriverError::InvalidAttribute { key: "lvPath", value: "vg001".to_string() }.is_caller_error());
        assert!(DriverError::InvalidVolumeId.is_caller_error());
        assert!(!DriverError::ExportNotFound("/dev/x".to_string()).is_caller_error());
    }
}
