//! msgpack-rpc client for the simulator API servers
//!
//! This module handles:
//! - One TCP session per API server
//! - Matching responses to concurrent calls by msgid
//! - Failing in-flight calls when the session drops

mod client;

pub use client::{RpcClient, RpcConfig, RpcError};
