//! Async Rust client for the xplex `rig` streaming-configuration API.
//!
//! The crate is organized by concern:
//! - `client`: `RigClient`, its options, and the error taxonomy.
//! - `transport`: the HTTP capability the client is built on.
//! - `session`: token providers (instance-held or key-value backed).
//! - `proto`: request bodies in rig's wire format.

/// Rig API client and error types.
pub mod client;
/// Request bodies sent to rig.
pub mod proto;
/// Session state and token providers.
pub mod session;
/// HTTP transport abstraction and the `reqwest` implementation.
pub mod transport;

pub use client::{RigClient, RigClientOptions, RigError, RIG_BASE_URL, RIG_DEV_BASE_URL};
pub use session::{
    JsonFileStore, KeyValueStore, KeyValueTokenStore, MemoryKeyValueStore, MemoryTokenStore,
    Session, StoreError, TokenStore,
};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, Transport, TransportFailure,
};
