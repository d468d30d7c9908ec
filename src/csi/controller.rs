use crate::csi::CsiMetrics;
use crate::csi::proto::{
    ControllerGetCapabilitiesRequest, ControllerGetCapabilitiesResponse,
    ControllerProbeRequest, ControllerProbeResponse, ControllerPublishVolumeRequest,
    ControllerPublishVolumeResponse, ControllerServiceCapability,
    ControllerUnpublishVolumeRequest, ControllerUnpublishVolumeResponse, CreateVolumeRequest,
    CreateVolumeResponse, Credentials, DeleteVolumeRequest, DeleteVolumeResponse,
    GetCapacityRequest, GetCapacityResponse, ListVolumesRequest, ListVolumesResponse,
    ValidateVolumeCapabilitiesRequest, ValidateVolumeCapabilitiesResponse, Version,
    VolumeCapability, VolumeInfo, controller_get_capabilities_response,
    controller_probe_response, controller_publish_volume_response,
    controller_server::Controller, controller_service_capability,
    controller_unpublish_volume_response, create_volume_response, delete_volume_response,
    get_capacity_response, list_volumes_response, validate_volume_capabilities_response,
    volume_capability,
};
use crate::csi::reply::{check_version, error_reply};
use crate::driver::{AccessType, Driver, DriverError, DriverResult};
use crate::lvm::Volume;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tonic::{Request, Response, Status};

use crate::csi::proto::controller_service_capability::rpc::Type as RpcType;

/// Capabilities advertised by `ControllerGetCapabilities`.
///
/// `ListVolumes` and `GetCapacity` are advertised even though both calls
/// answer `UNIMPLEMENTED`.
pub const DECLARED_CAPABILITIES: [RpcType; 4] = [
    RpcType::CreateDeleteVolume,
    RpcType::PublishUnpublishVolume,
    RpcType::ListVolumes,
    RpcType::GetCapacity,
];

/// Controller Service implementation
///
/// Handles volume lifecycle: create, delete, publish, unpublish
#[derive(Clone)]
pub struct ControllerService {
    driver: Arc<Driver>,
    metrics: Arc<CsiMetrics>,
}

impl ControllerService {
    pub fn new(driver: Arc<Driver>, metrics: Arc<CsiMetrics>) -> Self {
        Self { driver, metrics }
    }

    /// Run one driver call: version check, timing, logging, error envelope.
    ///
    /// The outer `Err` is a transport-level status; the inner `Err` is the
    /// protocol error payload to place in the reply.
    async fn call<T, Fut>(
        &self,
        method: &'static str,
        version: Option<&Version>,
        op: impl FnOnce() -> Fut,
    ) -> Result<Result<T, crate::csi::proto::Error>, Status>
    where
        Fut: Future<Output = DriverResult<T>>,
    {
        tracing::info!("start to {}", method);
        let started = Instant::now();

        let outcome = match check_version(version) {
            Ok(()) => op().await,
            Err(e) => Err(e),
        };

        self.metrics.record_operation(method, started.elapsed().as_secs_f64(), outcome.is_ok());
        tracing::info!("end to {}", method);

        match outcome {
            Ok(value) => Ok(Ok(value)),
            Err(e) => {
                tracing::error!("{} failed: {}", method, e);
                error_reply(e).map(Err)
            }
        }
    }

    fn volume_info(volume: Volume) -> VolumeInfo {
        VolumeInfo {
            capacity_bytes: volume.capacity_bytes,
            id: volume.id.to_string(),
            attributes: volume.attributes,
        }
    }

    fn credentials(credentials: Option<Credentials>) -> HashMap<String, String> {
        credentials.map(|c| c.data).unwrap_or_default()
    }

    fn access_types(capabilities: &[VolumeCapability]) -> Vec<AccessType> {
        capabilities
            .iter()
            .filter_map(|cap| match cap.access_type {
                Some(volume_capability::AccessType::Block(_)) => Some(AccessType::Block),
                Some(volume_capability::AccessType::Mount(_)) => Some(AccessType::Mount),
                None => None,
            })
            .collect()
    }
}

#[tonic::async_trait]
impl Controller for ControllerService {
    async fn create_volume(
        &self,
        request: Request<CreateVolumeRequest>,
    ) -> Result<Response<CreateVolumeResponse>, Status> {
        let req = request.into_inner();
        let capacity = req.capacity_range.as_ref().map(|r| r.required_bytes);

        let reply = match self
            .call("CreateVolume", req.version.as_ref(), || self.driver.create_volume(&req.name, capacity))
            .await?
        {
            Ok(volume) => {
                self.metrics.volume_created();
                create_volume_response::Reply::Result(create_volume_response::Success {
                    volume_info: Some(Self::volume_info(volume)),
                })
            }
            Err(error) => create_volume_response::Reply::Error(error),
        };

        Ok(Response::new(CreateVolumeResponse { reply: Some(reply) }))
    }

    async fn delete_volume(
        &self,
        request: Request<DeleteVolumeRequest>,
    ) -> Result<Response<DeleteVolumeResponse>, Status> {
        let req = request.into_inner();
        let credentials = Self::credentials(req.user_credentials);

        let reply = match self
            .call("DeleteVolume", req.version.as_ref(), || self.driver.delete_volume(&credentials))
            .await?
        {
            Ok(()) => {
                self.metrics.volume_deleted();
                delete_volume_response::Reply::Result(delete_volume_response::Success {})
            }
            Err(error) => delete_volume_response::Reply::Error(error),
        };

        Ok(Response::new(DeleteVolumeResponse { reply: Some(reply) }))
    }

    async fn controller_publish_volume(
        &self,
        request: Request<ControllerPublishVolumeRequest>,
    ) -> Result<Response<ControllerPublishVolumeResponse>, Status> {
        let req = request.into_inner();

        let reply = match self
            .call("ControllerPublishVolume", req.version.as_ref(), || {
                self.driver.initialize_connection(&req.volume_attributes)
            })
            .await?
        {
            Ok(publish_volume_info) => {
                self.metrics.export_created();
                controller_publish_volume_response::Reply::Result(
                    controller_publish_volume_response::Success { publish_volume_info },
                )
            }
            Err(error) => controller_publish_volume_response::Reply::Error(error),
        };

        Ok(Response::new(ControllerPublishVolumeResponse { reply: Some(reply) }))
    }

    async fn controller_unpublish_volume(
        &self,
        request: Request<ControllerUnpublishVolumeRequest>,
    ) -> Result<Response<ControllerUnpublishVolumeResponse>, Status> {
        let req = request.into_inner();
        let credentials = Self::credentials(req.user_credentials);

        let reply = match self
            .call("ControllerUnpublishVolume", req.version.as_ref(), || {
                self.driver.terminate_connection(&credentials)
            })
            .await?
        {
            Ok(()) => {
                self.metrics.export_removed();
                controller_unpublish_volume_response::Reply::Result(
                    controller_unpublish_volume_response::Success {},
                )
            }
            Err(error) => controller_unpublish_volume_response::Reply::Error(error),
        };

        Ok(Response::new(ControllerUnpublishVolumeResponse { reply: Some(reply) }))
    }

    async fn validate_volume_capabilities(
        &self,
        request: Request<ValidateVolumeCapabilitiesRequest>,
    ) -> Result<Response<ValidateVolumeCapabilitiesResponse>, Status> {
        let req = request.into_inner();
        let access = Self::access_types(&req.volume_capabilities);

        let reply = match self
            .call("ValidateVolumeCapabilities", req.version.as_ref(), || async {
                self.driver.validate_volume_capabilities(&req.volume_id, &access)
            })
            .await?
        {
            Ok(check) => validate_volume_capabilities_response::Reply::Result(
                validate_volume_capabilities_response::Success {
                    supported: check.supported,
                    message: check.message,
                },
            ),
            Err(error) => validate_volume_capabilities_response::Reply::Error(error),
        };

        Ok(Response::new(ValidateVolumeCapabilitiesResponse { reply: Some(reply) }))
    }

    async fn list_volumes(
        &self,
        request: Request<ListVolumesRequest>,
    ) -> Result<Response<ListVolumesResponse>, Status> {
        let req = request.into_inner();

        let reply = match self.call("ListVolumes", req.version.as_ref(), || self.driver.list_volumes()).await? {
            Ok(volumes) => list_volumes_response::Reply::Result(list_volumes_response::Success {
                entries: volumes
                    .into_iter()
                    .map(|v| list_volumes_response::success::Entry {
                        volume_info: Some(Self::volume_info(v)),
                    })
                    .collect(),
                next_token: String::new(),
            }),
            Err(error) => list_volumes_response::Reply::Error(error),
        };

        Ok(Response::new(ListVolumesResponse { reply: Some(reply) }))
    }

    async fn get_capacity(
        &self,
        request: Request<GetCapacityRequest>,
    ) -> Result<Response<GetCapacityResponse>, Status> {
        let req = request.into_inner();

        let reply = match self.call("GetCapacity", req.version.as_ref(), || self.driver.get_capacity()).await? {
            Ok(available_capacity) => {
                get_capacity_response::Reply::Result(get_capacity_response::Success { available_capacity })
            }
            Err(error) => get_capacity_response::Reply::Error(error),
        };

        Ok(Response::new(GetCapacityResponse { reply: Some(reply) }))
    }

    async fn controller_probe(
        &self,
        request: Request<ControllerProbeRequest>,
    ) -> Result<Response<ControllerProbeResponse>, Status> {
        let req = request.into_inner();

        let reply = match self
            .call("ControllerProbe", req.version.as_ref(), || async {
                Err::<(), _>(DriverError::NotImplemented("ControllerProbe"))
            })
            .await?
        {
            Ok(()) => controller_probe_response::Reply::Result(controller_probe_response::Success {}),
            Err(error) => controller_probe_response::Reply::Error(error),
        };

        Ok(Response::new(ControllerProbeResponse { reply: Some(reply) }))
    }

    async fn controller_get_capabilities(
        &self,
        request: Request<ControllerGetCapabilitiesRequest>,
    ) -> Result<Response<ControllerGetCapabilitiesResponse>, Status> {
        let req = request.into_inner();

        let reply = match check_version(req.version.as_ref()) {
            Ok(()) => {
                let capabilities = DECLARED_CAPABILITIES
                    .iter()
                    .map(|t| ControllerServiceCapability {
                        r#type: Some(controller_service_capability::Type::Rpc(
                            controller_service_capability::Rpc { r#type: *t as i32 },
                        )),
                    })
                    .collect();
                controller_get_capabilities_response::Reply::Result(
                    controller_get_capabilities_response::Success { capabilities },
                )
            }
            Err(e) => controller_get_capabilities_response::Reply::Error(error_reply(e)?),
        };

        Ok(Response::new(ControllerGetCapabilitiesResponse { reply: Some(reply) }))
    }
}
