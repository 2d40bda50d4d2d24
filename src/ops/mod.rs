//! High-level operations.
//!
//! This module contains the implementation of the `kitpack` and
//! `kitpack-release` commands.

pub mod build;
pub mod release;

pub use build::{build, parse_flag, BatchReport, BuildCommand, BuildMode, BuildOptions};
pub use release::{release, PublishCoordinator, ReleaseOptions, ReleaseReport, TargetOutcome};
