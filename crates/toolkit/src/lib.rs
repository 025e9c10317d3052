//! Client for the remote media-processing backend.
//!
//! [`transport`] is the seam to the network, [`client`] adds per-operation
//! retry with exponential backoff ([`backoff`]) and never returns an error
//! for ordinary failures: outcomes are values.

pub mod backoff;
pub mod client;
pub mod transport;

pub use client::{DispatchOutcome, RemoteDispatchClient, RemoteHealth, ToolkitConfig};
pub use transport::{RemoteTransport, ReqwestTransport, TransportError, TransportResponse};
