//! # contract: collaborator interfaces for publishing documentation
//!
//! The publish pipeline never performs I/O itself. Every side effect is issued
//! through one of the two traits defined here:
//!
//! - [`ObjectStore`]: key listing, deletion, copying and the bucket's website
//!   routing rules.
//! - [`CdnInvalidator`]: purging cached paths from the content-delivery network.
//!
//! ## Key conventions
//! - Keys are always *relative* to the prefix they were listed or written under.
//!   `list_keys("docs", "en/1.2.3/")` returning `index.html` means the object
//!   `en/1.2.3/index.html` exists.
//! - Deleting a key that does not exist is not an error.
//! - Copying preserves the relative key under the respective prefixes.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so tests can assert the exact
//!   sequence of effects. The mocks are exported behind the
//!   `test-export-mocks` feature for use by dependent crates.
//! - [`crate::memory::InMemoryBackend`] implements both traits for end-to-end tests.

use std::collections::BTreeSet;

use async_trait::async_trait;

use mockall::automock;

/// Error type returned by collaborators (simple boxed error, propagated unchanged).
pub type CollaboratorError = Box<dyn std::error::Error + Send + Sync>;

/// Object-storage operations needed to publish a documentation build.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List all keys under `prefix` in `bucket`, relative to `prefix`.
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<BTreeSet<String>, CollaboratorError>;

    /// Delete `keys` (relative to `prefix`) from `bucket`.
    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), CollaboratorError>;

    /// Copy `keys` from `source_prefix` in `source_bucket` to
    /// `destination_prefix` in `destination_bucket`.
    async fn copy_keys(
        &self,
        source_bucket: &str,
        source_prefix: &str,
        destination_bucket: &str,
        destination_prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), CollaboratorError>;

    /// Point the routing rule matching `prefix` at `target_prefix`.
    ///
    /// Returns the previously configured target, or `None` when no rule existed.
    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, CollaboratorError>;
}

/// Content-delivery network cache invalidation.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CdnInvalidator: Send + Sync {
    /// Request a purge of `paths` on the distribution identified by `cname`.
    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &[String],
    ) -> Result<(), CollaboratorError>;
}
