#![doc = "docs-release-core: core logic library for docs-release."]

//! This crate contains the release helpers used when shipping Flocker:
//! package version normalization and the documentation publish pipeline.
//! It performs no I/O of its own; object storage and the CDN are reached
//! through the traits in [`contract`].
//!
//! # Usage
//! Add this as a dependency for version parsing, the publish pipeline and
//! the in-memory backend used in tests.

pub mod contract;
pub mod doc_version;
pub mod error;
pub mod memory;
pub mod publish;
pub mod version;

pub use error::{PublishError, VersionError};
pub use version::{make_package_version, PackageVersion};
