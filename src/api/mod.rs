//! Robot-facing RPC surface.

pub mod dto;
pub mod handlers;
pub mod router;

pub use router::{create_rpc_router, AppState};
