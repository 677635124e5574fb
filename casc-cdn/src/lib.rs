//! HTTP transport for version servers and CDN hosts.
//!
//! Provides plain and ranged GETs with hard timeouts, HEAD-based latency
//! probing, and a ranked host list that is tried in order until a request
//! succeeds. Hosts that never answer the probe are dropped from the
//! ranking for good.

pub mod client;
pub mod error;
pub mod ranking;

pub use client::{format_cdn_key, CdnClient};
pub use error::{Error, Result};
pub use ranking::RankedHosts;
