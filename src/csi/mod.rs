pub mod controller;
pub mod identity;
pub mod metrics;
pub mod node;
pub mod reply;
pub mod server;

pub use controller::ControllerService;
pub use identity::IdentityService;
pub use metrics::CsiMetrics;
pub use node::NodeService;
pub use server::CsiServer;

// Re-export generated proto types
pub mod proto {
    tonic::include_proto!("csi");
}
