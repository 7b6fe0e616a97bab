//! Inbound HTTP surface of the apiserver gateway.
//!
//! Exposes two routes: `/health` (static liveness answer, no backend call)
//! and `/apis/{*path}` (proxied to the API server). WebSocket upgrade
//! requests on the proxied route are handed to the relay; everything else
//! is forwarded as plain REST and optionally narrowed by the list filter.
//! Both routes sit behind a URI-keyed response cache and gzip compression.

pub mod cache;
pub mod forward;
pub mod server;

pub use cache::ResponseCache;
pub use server::{router, AppState};
