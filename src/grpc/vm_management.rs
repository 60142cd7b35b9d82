//! Client for the VM management gRPC service
//!
//! Wire contract (`api.proto`):
//!
//! ```text
//! package api;
//!
//! service VMManagementService {
//!   rpc StartVM(StartVMRequest) returns (StartVMResponse);
//! }
//!
//! message StartVMRequest  { string vm_name = 1; }
//! message StartVMResponse { string vm_id = 1; string ip_address = 2; }
//! ```
//!
//! The messages and client stub below are written out in the same shape
//! `tonic-build` generates, so the crate builds without `protoc`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartVmRequest {
        #[prost(string, tag = "1")]
        pub vm_name: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct StartVmResponse {
        #[prost(string, tag = "1")]
        pub vm_id: ::prost::alloc::string::String,
        #[prost(string, tag = "2")]
        pub ip_address: ::prost::alloc::string::String,
    }

    pub mod vm_management_service_client {
        use tonic::codegen::*;

        #[derive(Debug, Clone)]
        pub struct VmManagementServiceClient<T> {
            inner: tonic::client::Grpc<T>,
        }

        impl VmManagementServiceClient<tonic::transport::Channel> {
            /// Attempt to create a new client by connecting to a given endpoint.
            pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
            where
                D: TryInto<tonic::transport::Endpoint>,
                D::Error: Into<StdError>,
            {
                let conn = tonic::transport::Endpoint::new(dst)?.connect().await?;
                Ok(Self::new(conn))
            }
        }

        impl<T> VmManagementServiceClient<T>
        where
            T: tonic::client::GrpcService<tonic::body::BoxBody>,
            T::Error: Into<StdError>,
            T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
            <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
        {
            pub fn new(inner: T) -> Self {
                let inner = tonic::client::Grpc::new(inner);
                Self { inner }
            }

            pub async fn start_vm(
                &mut self,
                request: impl tonic::IntoRequest<super::StartVmRequest>,
            ) -> std::result::Result<tonic::Response<super::StartVmResponse>, tonic::Status> {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::unknown(format!("Service was not ready: {}", e.into()))
                })?;
                let codec = tonic::codec::ProstCodec::default();
                let path = http::uri::PathAndQuery::from_static("/api.VMManagementService/StartVM");
                let mut req = request.into_request();
                req.extensions_mut()
                    .insert(GrpcMethod::new("api.VMManagementService", "StartVM"));
                self.inner.unary(req, path, codec).await
            }
        }
    }
}

pub use proto::vm_management_service_client::VmManagementServiceClient;
pub use proto::{StartVmRequest, StartVmResponse};

/// Default address of the VM management service
pub const DEFAULT_VM_SERVER: &str = "http://localhost:50051";

/// What the VM service tells us about a started VM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmDescriptor {
    pub vm_id: String,
    pub ip_address: String,
}

impl From<StartVmResponse> for VmDescriptor {
    fn from(resp: StartVmResponse) -> Self {
        Self {
            vm_id: resp.vm_id,
            ip_address: resp.ip_address,
        }
    }
}

/// Error type for VM management calls
#[derive(Debug, Error)]
pub enum VmError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
    #[error("rpc error: {0}")]
    Rpc(#[from] tonic::Status),
}

/// Starts VMs by name
#[async_trait]
pub trait VmManager: Send + Sync {
    async fn start_vm(&self, vm_name: &str) -> Result<VmDescriptor, VmError>;
}

/// `VmManager` backed by the gRPC service
///
/// A channel is opened per call; the transport's default timeouts apply.
#[derive(Debug, Clone)]
pub struct GrpcVmManager {
    endpoint: String,
}

impl GrpcVmManager {
    /// `server` may omit the scheme (`localhost:50051`)
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            endpoint: normalize_endpoint(&server.into()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl VmManager for GrpcVmManager {
    async fn start_vm(&self, vm_name: &str) -> Result<VmDescriptor, VmError> {
        debug!(endpoint = %self.endpoint, vm_name, "Connecting to VM management service");
        let mut client = VmManagementServiceClient::connect(self.endpoint.clone()).await?;

        let response = client
            .start_vm(StartVmRequest {
                vm_name: vm_name.to_string(),
            })
            .await?;

        let descriptor = VmDescriptor::from(response.into_inner());
        info!(vm_name, vm_id = %descriptor.vm_id, ip = %descriptor.ip_address, "VM started");
        Ok(descriptor)
    }
}

fn normalize_endpoint(server: &str) -> String {
    if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("localhost:50051"), "http://localhost:50051");
        assert_eq!(normalize_endpoint("https://vm.internal:443"), "https://vm.internal:443");
        assert_eq!(GrpcVmManager::new("10.0.0.1:50051").endpoint(), "http://10.0.0.1:50051");
    }

    #[test]
    fn test_start_vm_request_wire_format() {
        let req = StartVmRequest {
            vm_name: "test".to_string(),
        };
        // field 1, wire type 2 (length-delimited), len 4, "test"
        assert_eq!(req.encode_to_vec(), vec![0x0a, 0x04, b't', b'e', b's', b't']);
    }

    #[test]
    fn test_descriptor_from_response() {
        let bytes = StartVmResponse {
            vm_id: "vm-1".to_string(),
            ip_address: "10.0.0.5".to_string(),
        }
        .encode_to_vec();
        let decoded = StartVmResponse::decode(bytes.as_slice()).unwrap();
        let descriptor = VmDescriptor::from(decoded);
        assert_eq!(descriptor.ip_address, "10.0.0.5");
        assert_eq!(
            serde_json::to_string(&descriptor).unwrap(),
            r#"{"vm_id":"vm-1","ip_address":"10.0.0.5"}"#
        );
    }
}
