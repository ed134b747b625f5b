//! End-to-end test support for the Ember engine
//!
//! - [`harness`]: isolated, pre-seeded temporary knowledge stores
//! - [`mocks`]: an in-process tool registry for tool-mode tests

pub mod mocks;
