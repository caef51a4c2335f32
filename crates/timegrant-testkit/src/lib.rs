//! # timegrant Testkit
//!
//! Testing utilities for timegrant.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a populated in-memory directory and a manager persisting
//!   into a temporary directory
//! - **Faults**: a directory wrapper whose calls can be made to fail
//! - **Generators**: Proptest strategies for durations and grant records
//! - **Tracing**: one-line subscriber setup for test output
//!
//! ## Test Fixtures
//!
//! ```rust
//! use timegrant_testkit::fixtures::{TestFixture, ALICE, MUTED};
//!
//! let fixture = TestFixture::new();
//! fixture.directory.grant_directly(ALICE, MUTED);
//! assert!(fixture.directory.holds(ALICE, MUTED));
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use timegrant_testkit::generators::DurationCase;
//!
//! proptest! {
//!     #[test]
//!     fn parses_generated_durations(case: DurationCase) {
//!         prop_assert_eq!(timegrant_core::parse_duration(&case.text), Ok(case.seconds));
//!     }
//! }
//! ```

pub mod faults;
pub mod fixtures;
pub mod generators;

pub use faults::{FaultyDirectory, Faults};
pub use fixtures::{populated_directory, TestFixture, TestManager};
pub use generators::{grant_record, DurationCase};

use tracing_subscriber::EnvFilter;

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to `timegrant=debug`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("timegrant=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
