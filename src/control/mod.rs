//! Control-plane routing.
//!
//! - [`forward`] - Forwarding writes to the leader of their datacenter

pub mod forward;

pub use forward::{AclServiceClient, ForwardOutcome, Forwarder, ForwarderConfig, LeaderConnector};
