//! Code execution service client
//!
//! Runs user-supplied files inside a VM through the execution server that
//! lives in the guest.

pub mod client;

pub use client::{CodeExecutor, ExecuteOutput, ExecuteRequest, ExecutionError, HttpCodeExecutor};
