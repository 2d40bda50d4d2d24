//! kitpack - dependency-aware component build and publish pipeline
//!
//! Builds each component of a Vue component library as its own package,
//! with sibling imports rewritten to published package references, plus one
//! aggregate package for the whole library.

pub mod analyzer;
pub mod builder;
pub mod core;
pub mod ops;
pub mod rewrite;
pub mod util;

/// Test utilities and mocks for kitpack unit tests.
///
/// Only compiled for tests. Provides a mock command runner, a fake build
/// engine and on-disk project fixtures.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{BuildContext, ComponentName};
pub use util::context::GlobalContext;
