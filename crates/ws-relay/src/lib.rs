//! WebSocket relay for the apiserver gateway.
//!
//! This crate bridges client WebSocket sessions (watches, exec, log-follow)
//! to the Kubernetes-style API server behind the gateway. Browsers cannot
//! set arbitrary headers on a WebSocket handshake, so impersonated identity
//! travels inside the subprotocol negotiation and is unpacked here into the
//! `Impersonate-User` / `Impersonate-Group` headers the backend trusts from
//! the proxy.
//!
//! # Architecture
//!
//! ```text
//! Client  <--WS-->  relay  <--WSS-->  API server
//!                     |
//!            [header translation]
//!            [origin validation]
//! ```
//!
//! The relay validates the `Origin` header on each upgrade, dials the
//! backend over TLS with the translated header set, and runs two
//! directional pumps plus a keepalive ticker until either leg fails.

pub mod endpoint;
pub mod headers;
pub mod origin;
pub mod relay;
pub mod subprotocol;
pub mod tls;

// Re-export the primary public types at the crate root for convenience.
pub use endpoint::{BackendScheme, ProxyEndpoint};
pub use headers::{strip_denylisted, translate, Translation};
pub use relay::serve;
pub use tls::TlsTrustPolicy;
