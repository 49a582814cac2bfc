//! Integration test suite for relbin
//!
//! End-to-end tests of the update pipeline against a wiremock release
//! server, plus a CLI test of the `relbin` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **end_to_end**: Empty cache to published binary
//! - **resume**: Continuing from a partial pending artifact
//! - **corruption**: Digest mismatches and restart from zero
//! - **concurrency**: Lock exclusion and pointer atomicity between "processes"
//! - **scheduler_gating**: Next-check deadline behavior
//! - **cli**: Argument forwarding and exit-code relay

// Shared test utilities (from parent tests/ directory)
#[path = "../common/mod.rs"]
mod common;

mod cli;
mod concurrency;
mod corruption;
mod end_to_end;
mod resume;
