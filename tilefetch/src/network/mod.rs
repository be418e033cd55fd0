//! Network transport abstraction
//!
//! Fetch tasks talk to the network through the [`NetworkClient`] trait so
//! tests can substitute scripted clients. [`ReqwestClient`] is the production
//! implementation.

mod http;

pub use http::{
    FetchResponse, NetworkClient, NetworkError, ReqwestClient, DEFAULT_TIMEOUT_SECS,
    DEFAULT_USER_AGENT, STATUS_NOT_FOUND,
};

#[cfg(test)]
pub use http::tests::MockNetworkClient;
