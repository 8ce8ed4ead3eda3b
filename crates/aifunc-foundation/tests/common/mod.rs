//! Shared helpers for the `aifunc-foundation` integration tests.
//!
//! Declared with `mod common;` from each test file; not a test binary itself.

pub mod mock_provider;
