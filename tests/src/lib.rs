//! # mo-mal Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── harness.rs        # Mock transport, wire codec, recording listener
//! └── integration/      # End-to-end interaction scenarios
//!     ├── interaction_flows.rs   # SUBMIT/REQUEST/INVOKE/PROGRESS
//!     └── pubsub_flows.rs        # PUBSUB lifecycle + decode failures
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mal-tests
//!
//! # By category
//! cargo test -p mal-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
