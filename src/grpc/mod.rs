//! gRPC clients
//!
//! - `vm_management` - starts VMs through the VM management service

pub mod vm_management;

pub use vm_management::{GrpcVmManager, VmDescriptor, VmError, VmManager, DEFAULT_VM_SERVER};
