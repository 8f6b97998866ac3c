//! Cross-crate integration tests
//!
//! This test suite validates:
//! - The full alert lifecycle driven by the scanner, on both store backends
//! - Operator actions interleaved with scan cycles
//! - Live feed delivery over WebSocket, including subscriber isolation

pub mod test_utils;

#[cfg(test)]
mod scan_lifecycle_tests;

#[cfg(test)]
mod live_feed_tests;
