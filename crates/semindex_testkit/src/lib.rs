//! # SemIndex Testkit
//!
//! Testing utilities for SemIndex.
//!
//! This crate provides:
//! - Harnesses wiring a source, core manager, metadata store and registry
//! - Fault injecting sources for replay and poll failure scenarios
//! - Property-based test generators for entity histories
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semindex_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_index() {
//!     let harness = TestHarness::memory();
//!     harness.source.put(article("urn:a", "hello"));
//!     let index = harness.activate("idx", harness.config(TITLE_PROGRAM));
//!     index.poll_now().unwrap();
//!     assert_eq!(index.num_docs().unwrap(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
