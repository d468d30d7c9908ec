use crate::csi::proto::{
    GetNodeIdRequest, GetNodeIdResponse, NodeGetCapabilitiesRequest, NodeGetCapabilitiesResponse,
    NodeProbeRequest, NodeProbeResponse, NodePublishVolumeRequest, NodePublishVolumeResponse,
    NodeUnpublishVolumeRequest, NodeUnpublishVolumeResponse, node_server::Node,
};
use tonic::{Request, Response, Status};

/// Node Service implementation
///
/// Attaching and mounting on the node is not provided by this plugin; every
/// call answers `UNIMPLEMENTED`.
#[derive(Debug, Clone, Default)]
pub struct NodeService;

impl NodeService {
    pub fn new() -> Self {
        Self
    }
}

fn unimplemented(method: &str) -> Status {
    tracing::warn!("{} called but not implemented", method);
    Status::unimplemented(format!("{} not implemented", method))
}

#[tonic::async_trait]
impl Node for NodeService {
    async fn node_publish_volume(
        &self,
        _request: Request<NodePublishVolumeRequest>,
    ) -> Result<Response<NodePublishVolumeResponse>, Status> {
        Err(unimplemented("NodePublishVolume"))
    }

    async fn node_unpublish_volume(
        &self,
        _request: Request<NodeUnpublishVolumeRequest>,
    ) -> Result<Response<NodeUnpublishVolumeResponse>, Status> {
        Err(unimplemented("NodeUnpublishVolume"))
    }

    async fn get_node_id(
        &self,
        _request: Request<GetNodeIdRequest>,
    ) -> Result<Response<GetNodeIdResponse>, Status> {
        Err(unimplemented("GetNodeID"))
    }

    async fn node_probe(
        &self,
        _request: Request<NodeProbeRequest>,
    ) -> Result<Response<NodeProbeResponse>, Status> {
        Err(unimplemented("NodeProbe"))
    }

    async fn node_get_capabilities(
        &self,
        _request: Request<NodeGetCapabilitiesRequest>,
    ) -> Result<Response<NodeGetCapabilitiesResponse>, Status> {
        Err(unimplemented("NodeGetCapabilities"))
    }
}
