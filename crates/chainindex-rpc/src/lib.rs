//! Multi-endpoint JSON-RPC / REST client pool for the execution-layer (EL)
//! and checkpoint-layer (CL) upstreams (spec §4.1).
//!
//! [`RpcPool`] is the only type workers interact with; it owns endpoint
//! health tracking, selection, the single-fallback-attempt policy, and
//! chain-id verification. The `el`/`cl` modules hold the raw transports.

mod cl;
mod el;
mod endpoint;
mod error;
mod hex;
mod pool;
mod stats;

pub use cl::ClMilestone;
pub use el::{ElBlock, ElReceipt, ElTransaction};
pub use endpoint::EndpointState;
pub use error::RpcError;
pub use hex::wei_to_gwei;
pub use pool::RpcPool;
