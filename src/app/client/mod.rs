//! Network transport for URL fetches
//!
//! The reader talks to the network only through the [`Transport`] trait.
//! [`HttpTransport`] is the production implementation on top of reqwest;
//! tests substitute scripted transports.
//!
//! The module is organized into:
//! - `config`: HTTP client configuration and building
//! - `transport`: the transport and delegate traits with their request and
//!   outcome types
//! - `http`: the reqwest-backed transport and its runtime

pub mod config;
pub mod http;
pub mod transport;

pub use config::ClientConfig;
pub use http::HttpTransport;
pub use transport::{
    is_success_status, Transport, TransportDelegate, TransportOutcome, TransportRequest,
};
