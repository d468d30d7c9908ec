// Protocol version negotiation and error envelopes

use crate::csi::proto::{self, Version};
use crate::csi::proto::error::{
    GeneralError, ValidateVolumeCapabilitiesError, Value,
    general_error::GeneralErrorCode,
    validate_volume_capabilities_error::ValidateVolumeCapabilitiesErrorCode,
};
use crate::driver::DriverError;
use tonic::Status;

/// Protocol versions this plugin speaks, as (major, minor, patch).
pub const SUPPORTED_VERSIONS: [(u32, u32, u32); 2] = [(0, 1, 0), (1, 0, 0)];

pub fn supported_versions() -> Vec<Version> {
    SUPPORTED_VERSIONS
        .iter()
        .map(|&(major, minor, patch)| Version { major, minor, patch })
        .collect()
}

/// Requests may omit their version; a version that is present must be supported.
pub fn check_version(version: Option<&Version>) -> Result<(), DriverError> {
    match version {
        None => Ok(()),
        Some(v) if SUPPORTED_VERSIONS.contains(&(v.major, v.minor, v.patch)) => Ok(()),
        Some(v) => Err(DriverError::UnsupportedVersion(format!("{}.{}.{}", v.major, v.minor, v.patch))),
    }
}

/// Build the error payload for a failed call.
///
/// Calls that are not implemented have no error payload in the protocol and
/// are answered with an `UNIMPLEMENTED` status instead.
pub fn error_reply(err: DriverError) -> Result<proto::Error, Status> {
    let value = match err {
        DriverError::NotImplemented(_) => return Err(Status::unimplemented(err.to_string())),
        DriverError::InvalidVolumeId => {
            Value::ValidateVolumeCapabilitiesError(ValidateVolumeCapabilitiesError {
                error_code: ValidateVolumeCapabilitiesErrorCode::InvalidVolumeInfo as i32,
                error_description: err.to_string(),
            })
        }
        DriverError::MissingParameter(_)
        | DriverError::MissingAttribute(_)
        | DriverError::InvalidAttribute { .. } => {
            general(GeneralErrorCode::MissingRequiredField, &err)
        }
        DriverError::UnsupportedVersion(_) => general(GeneralErrorCode::UnsupportedRequestVersion, &err),
        _ => general(GeneralErrorCode::Undefined, &err),
    };

    Ok(proto::Error { value: Some(value) })
}

fn general(code: GeneralErrorCode, err: &DriverError) -> Value {
    Value::GeneralError(GeneralError {
        error_code: code as i32,
        caller_must_not_retry: err.is_caller_error(),
        error_description: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn general_of(err: proto::Error) -> GeneralError {
        match err.value {
            Some(Value::GeneralError(g)) => g,
            other => panic!("expected general error, got {:?}", other),
        }
    }

    #[test]
    fn test_supported_versions() {
        let versions = supported_versions();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0], Version { major: 0, minor: 1, patch: 0 });
        assert_eq!(versions[1], Version { major: 1, minor: 0, patch: 0 });
    }

    #[test]
    fn test_check_version() {
        assert!(check_version(None).is_ok());
        assert!(check_version(Some(&Version { major: 0, minor: 1, patch: 0 })).is_ok());
        assert!(check_version(Some(&Version { major: 1, minor: 0, patch: 0 })).is_ok());
        let err = check_version(Some(&Version { major: 0, minor: 2, patch: 0 })).unwrap_err();
        assert!(matches!(err, DriverError::UnsupportedVersion(ref v) if v == "0.2.0"));
    }

    #[test]
    fn test_missing_parameter_is_missing_required_field() {
        let g = general_of(error_reply(DriverError::MissingParameter("Capacity")).unwrap());
        assert_eq!(g.error_code, GeneralErrorCode::MissingRequiredField as i32);
        assert!(g.caller_must_not_retry);
        assert_eq!(g.error_description, "Capacity required!");
    }

    #[test]
    fn test_invalid_attribute_is_not_retryable() {
        let err = DriverError::InvalidAttribute { key: "lvPath", value: "vg001".to_string() };
        let g = general_of(error_reply(err).unwrap());
        assert_eq!(g.error_code, GeneralErrorCode::MissingRequiredField as i32);
        assert!(g.caller_must_not_retry);
    }

    #[test]
    fn test_export_not_found_is_undefined() {
        let g = general_of(error_reply(DriverError::ExportNotFound("/dev/x".to_string())).unwrap());
        assert_eq!(g.error_code, GeneralErrorCode::Undefined as i32);
        assert!(!g.caller_must_not_retry);
        assert!(g.error_description.contains("/dev/x"));
    }

    #[test]
    fn test_unsupported_version() {
        let g = general_of(error_reply(DriverError::UnsupportedVersion("9.9.9".to_string())).unwrap());
        assert_eq!(g.error_code, GeneralErrorCode::UnsupportedRequestVersion as i32);
    }

    #[test]
    fn test_invalid_volume_id() {
        let err = error_reply(DriverError::InvalidVolumeId).unwrap();
        match err.value {
            Some(Value::ValidateVolumeCapabilitiesError(e)) => {
                assert_eq!(e.error_code, ValidateVolumeCapabilitiesErrorCode::InvalidVolumeInfo as i32);
                assert_eq!(e.error_description, "invalid volume id");
            }
            other => panic!("unexpected error payload: {:?}", other),
        }
    }

    #[test]
    fn test_not_implemented_is_status() {
        let status = error_reply(DriverError::NotImplemented("ListVolumes")).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unimplemented);
    }
}
