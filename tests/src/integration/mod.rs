//! End-to-end interaction scenarios over the mock transport.

pub mod interaction_flows;
pub mod pubsub_flows;
