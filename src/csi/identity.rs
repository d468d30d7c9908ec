use crate::csi::proto::{
    GetPluginInfoRequest, GetPluginInfoResponse, GetSupportedVersionsRequest,
    GetSupportedVersionsResponse, get_plugin_info_response, get_supported_versions_response,
    identity_server::Identity,
};
use crate::csi::reply::{check_version, error_reply, supported_versions};
use tonic::{Request, Response, Status};

pub const PLUGIN_NAME: &str = "lvm.csi.io";
pub const PLUGIN_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity Service implementation
///
/// Advertises the protocol versions and plugin identity to the orchestrator.
#[derive(Debug, Clone)]
pub struct IdentityService {
    name: String,
    version: String,
}

impl IdentityService {
    pub fn new() -> Self {
        Self { name: PLUGIN_NAME.to_string(), version: PLUGIN_VERSION.to_string() }
    }
}

impl Default for IdentityService {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl Identity for IdentityService {
    async fn get_supported_versions(
        &self,
        _request: Request<GetSupportedVersionsRequest>,
    ) -> Result<Response<GetSupportedVersionsResponse>, Status> {
        tracing::debug!("GetSupportedVersions");

        Ok(Response::new(GetSupportedVersionsResponse {
            reply: Some(get_supported_versions_response::Reply::Result(
                get_supported_versions_response::Success { supported_versions: supported_versions() },
            )),
        }))
    }

    async fn get_plugin_info(
        &self,
        request: Request<GetPluginInfoRequest>,
    ) -> Result<Response<GetPluginInfoResponse>, Status> {
        let req = request.into_inner();
        tracing::debug!("GetPluginInfo");

        let reply = match check_version(req.version.as_ref()) {
            Ok(()) => get_plugin_info_response::Reply::Result(get_plugin_info_response::Success {
                name: self.name.clone(),
                vendor_version: self.version.clone(),
                manifest: Default::default(),
            }),
            Err(e) => get_plugin_info_response::Reply::Error(error_reply(e)?),
        };

        Ok(Response::new(GetPluginInfoResponse { reply: Some(reply) }))
    }
}
