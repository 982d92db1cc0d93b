//! High-level pipeline: publishes a documentation build to the public docs bucket.
//!
//! A run is a fixed sequence of effects, each awaited before the next is issued:
//!   1. List the build under `<flocker_version>/` in the development docs bucket
//!      and the published copy under `en/<doc_version>/` in the target bucket.
//!   2. Delete keys present at the destination but no longer in the build.
//!   3. Copy keys from the build to the destination (see [`CopyScope`]).
//!   4. Point the `en/devel/` or `en/latest/` routing rule at `/en/<doc_version>/`.
//!   5. Invalidate every touched path on the CDN, including the paths of the
//!      version the alias pointed at before.
//!
//! # Error Handling
//! Fail-fast and not transactional: the first collaborator error aborts the run
//! and is returned unchanged inside [`PublishError::Collaborator`]. There are no
//! retries and no rollback. Every step is idempotent, so the recovery for a
//! failed run is to run it again.
//!
//! # Navigation
//! - Main entrypoint: [`publish_docs`]
//! - Individual steps: [`copy_docs`], [`configure_routing_rule`], [`create_cdn_invalidation`]
//! - Pure helpers: [`add_index_directories`], [`invalidation_paths`]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::contract::{CdnInvalidator, ObjectStore};
use crate::doc_version::{self, Channel};
use crate::error::{PublishError, PublishResult, Step};
use crate::version::{make_package_version, PackageVersion};

/// Bucket the documentation builds are uploaded to by CI.
pub const DEFAULT_SOURCE_BUCKET: &str = "clusterhq-dev-docs";

/// Bucket documentation is published to unless told otherwise.
pub const DEFAULT_DESTINATION_BUCKET: &str = "clusterhq-staging-docs";

/// Which keys are copied from the build to the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyScope {
    /// Copy exactly the keys that were deleted as stale at the destination.
    #[default]
    StaleKeys,
    /// Copy every key of the build, so the destination mirrors the source.
    AllSourceKeys,
}

/// Everything a publish run needs, threaded in from the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Version of Flocker the documentation was built from.
    pub flocker_version: String,
    /// Version to publish the documentation as.
    pub doc_version: String,
    /// Destination bucket.
    pub bucket: String,
    /// Bucket holding the documentation builds.
    pub source_bucket: String,
    pub copy_scope: CopyScope,
}

impl PublishRequest {
    pub fn new(
        flocker_version: impl Into<String>,
        doc_version: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            flocker_version: flocker_version.into(),
            doc_version: doc_version.into(),
            bucket: bucket.into(),
            source_bucket: DEFAULT_SOURCE_BUCKET.to_string(),
            copy_scope: CopyScope::default(),
        }
    }
}

/// Source and destination locations of one publish run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub source_bucket: String,
    pub source_prefix: String,
    pub destination_bucket: String,
    pub destination_prefix: String,
}

impl SyncPlan {
    pub fn new(
        flocker_version: &str,
        doc_version: &str,
        source_bucket: &str,
        destination_bucket: &str,
    ) -> Self {
        Self {
            source_bucket: source_bucket.to_string(),
            source_prefix: format!("{flocker_version}/"),
            destination_bucket: destination_bucket.to_string(),
            destination_prefix: format!("en/{doc_version}/"),
        }
    }
}

/// Result of [`copy_docs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyOutcome {
    pub keys_to_delete: BTreeSet<String>,
    pub keys_to_copy: BTreeSet<String>,
    /// Union of the source and destination listings; scopes the invalidation.
    pub changed_keys: BTreeSet<String>,
}

/// Report of a successful publish run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    /// Normalized Flocker version; `None` when the normalizer rejects it.
    pub package_version: Option<PackageVersion>,
    pub channel: Channel,
    pub plan: SyncPlan,
    pub deleted_keys: BTreeSet<String>,
    pub copied_keys: BTreeSet<String>,
    pub old_routing_prefix: Option<String>,
    pub cname: String,
    pub invalidated_paths: Vec<String>,
}

/// Make the destination prefix consistent with the build for the stale key set.
pub async fn copy_docs<S>(store: &S, plan: &SyncPlan, scope: CopyScope) -> PublishResult<CopyOutcome>
where
    S: ObjectStore + ?Sized,
{
    let source_keys = store
        .list_keys(&plan.source_bucket, &plan.source_prefix)
        .await
        .map_err(|e| {
            error!(error = %e, bucket = %plan.source_bucket, prefix = %plan.source_prefix, "[PUBLISH][ERROR] Listing source keys failed");
            PublishError::collaborator(Step::ListSource, e)
        })?;
    info!(count = source_keys.len(), prefix = %plan.source_prefix, "[PUBLISH] Listed source keys");

    let destination_keys = store
        .list_keys(&plan.destination_bucket, &plan.destination_prefix)
        .await
        .map_err(|e| {
            error!(error = %e, bucket = %plan.destination_bucket, prefix = %plan.destination_prefix, "[PUBLISH][ERROR] Listing destination keys failed");
            PublishError::collaborator(Step::ListDestination, e)
        })?;
    info!(count = destination_keys.len(), prefix = %plan.destination_prefix, "[PUBLISH] Listed destination keys");

    let keys_to_delete: BTreeSet<String> =
        destination_keys.difference(&source_keys).cloned().collect();
    store
        .delete_keys(&plan.destination_bucket, &plan.destination_prefix, &keys_to_delete)
        .await
        .map_err(|e| {
            error!(error = %e, count = keys_to_delete.len(), "[PUBLISH][ERROR] Deleting stale keys failed");
            PublishError::collaborator(Step::DeleteStale, e)
        })?;
    info!(count = keys_to_delete.len(), "[PUBLISH] Deleted stale keys");
    debug!(keys = ?keys_to_delete, "[PUBLISH] Stale keys");

    let keys_to_copy = match scope {
        CopyScope::StaleKeys => keys_to_delete.clone(),
        CopyScope::AllSourceKeys => source_keys.clone(),
    };
    store
        .copy_keys(
            &plan.source_bucket,
            &plan.source_prefix,
            &plan.destination_bucket,
            &plan.destination_prefix,
            &keys_to_copy,
        )
        .await
        .map_err(|e| {
            error!(error = %e, count = keys_to_copy.len(), "[PUBLISH][ERROR] Copying keys failed");
            PublishError::collaborator(Step::Copy, e)
        })?;
    info!(count = keys_to_copy.len(), ?scope, "[PUBLISH] Copied keys");

    let changed_keys = destination_keys.union(&source_keys).cloned().collect();

    Ok(CopyOutcome {
        keys_to_delete,
        keys_to_copy,
        changed_keys,
    })
}

/// Point the alias of `channel` at `/en/<doc_version>/`, returning the previous target.
pub async fn configure_routing_rule<S>(
    store: &S,
    bucket: &str,
    doc_version: &str,
    channel: Channel,
) -> PublishResult<Option<String>>
where
    S: ObjectStore + ?Sized,
{
    let prefix = channel.routing_prefix();
    let target_prefix = format!("/en/{doc_version}/");
    let old_prefix = store
        .update_routing_rule(bucket, prefix, &target_prefix)
        .await
        .map_err(|e| {
            error!(error = %e, bucket, prefix, "[PUBLISH][ERROR] Updating routing rule failed");
            PublishError::collaborator(Step::UpdateRoutingRule, e)
        })?;
    info!(bucket, prefix, target = %target_prefix, old = ?old_prefix, "[PUBLISH] Updated routing rule");
    Ok(old_prefix)
}

/// Add the directory form of every `index.html` key.
///
/// Runs two passes, `index.html` then `/index.html`, so `foo/index.html`
/// contributes both `foo/` and `foo`, and a top-level `index.html` contributes
/// the empty key.
pub fn add_index_directories(keys: &mut BTreeSet<String>) {
    for index in ["index.html", "/index.html"] {
        let directories: Vec<String> = keys
            .iter()
            .filter_map(|key| key.strip_suffix(index))
            .map(str::to_string)
            .collect();
        keys.extend(directories);
    }
}

/// Paths to purge: every key under both the alias and the versioned prefix.
pub fn invalidation_paths(doc_version: &str, channel: Channel, keys: &BTreeSet<String>) -> Vec<String> {
    let mut expanded = keys.clone();
    add_index_directories(&mut expanded);

    let prefixes = [channel.path_prefix().to_string(), format!("/en/{doc_version}/")];
    expanded
        .iter()
        .flat_map(|key| prefixes.iter().map(move |prefix| format!("{prefix}{key}")))
        .collect()
}

/// CDN distribution identifier for a bucket.
pub fn distribution_cname(bucket: &str) -> String {
    format!("from_bucket{bucket}")
}

/// Purge the changed paths, plus everything published under `old_prefix`.
///
/// Returns the cname and the paths of the issued request.
pub async fn create_cdn_invalidation<S, C>(
    store: &S,
    cdn: &C,
    bucket: &str,
    doc_version: &str,
    channel: Channel,
    mut changed_keys: BTreeSet<String>,
    old_prefix: Option<&str>,
) -> PublishResult<(String, Vec<String>)>
where
    S: ObjectStore + ?Sized,
    C: CdnInvalidator + ?Sized,
{
    if let Some(old_prefix) = old_prefix.filter(|p| !p.is_empty()) {
        let list_prefix = old_prefix.strip_prefix('/').unwrap_or(old_prefix);
        let old_keys = store.list_keys(bucket, list_prefix).await.map_err(|e| {
            error!(error = %e, bucket, prefix = list_prefix, "[PUBLISH][ERROR] Listing old prefix failed");
            PublishError::collaborator(Step::ListOldPrefix, e)
        })?;
        info!(count = old_keys.len(), prefix = list_prefix, "[PUBLISH] Listed keys under old routing prefix");
        changed_keys.extend(old_keys);
    }

    let paths = invalidation_paths(doc_version, channel, &changed_keys);
    let cname = distribution_cname(bucket);
    cdn.create_invalidation(&cname, &paths).await.map_err(|e| {
        error!(error = %e, cname = %cname, "[PUBLISH][ERROR] CDN invalidation failed");
        PublishError::collaborator(Step::Invalidate, e)
    })?;
    info!(cname = %cname, paths = paths.len(), "[PUBLISH] Created CDN invalidation");
    Ok((cname, paths))
}

/// Publish a documentation build end to end.
///
/// Refuses to issue any effect unless `doc_version` is a final or weekly release.
/// The Flocker version is only normalized for the report and never blocks a run.
pub async fn publish_docs<S, C>(store: &S, cdn: &C, request: &PublishRequest) -> PublishResult<PublishReport>
where
    S: ObjectStore + ?Sized,
    C: CdnInvalidator + ?Sized,
{
    let doc_version = request.doc_version.as_str();
    if !(doc_version::is_release(doc_version) || doc_version::is_weekly_release(doc_version)) {
        error!(doc_version, "[PUBLISH][ERROR] Refusing to publish a non-release");
        return Err(PublishError::NotAPublishableVersion(doc_version.to_string()));
    }

    let package_version = match make_package_version(&request.flocker_version) {
        Ok(version) => Some(version),
        Err(e) => {
            warn!(error = %e, flocker_version = %request.flocker_version, "[PUBLISH] Flocker version has no package form");
            None
        }
    };

    let plan = SyncPlan::new(
        &request.flocker_version,
        doc_version,
        &request.source_bucket,
        &request.bucket,
    );
    let channel = Channel::for_doc_version(doc_version);
    info!(?plan, ?channel, ?package_version, "[PUBLISH] Starting documentation publish");

    let outcome = copy_docs(store, &plan, request.copy_scope).await?;
    let old_routing_prefix = configure_routing_rule(store, &request.bucket, doc_version, channel).await?;
    let (cname, invalidated_paths) = create_cdn_invalidation(
        store,
        cdn,
        &request.bucket,
        doc_version,
        channel,
        outcome.changed_keys,
        old_routing_prefix.as_deref(),
    )
    .await?;

    let report = PublishReport {
        package_version,
        channel,
        plan,
        deleted_keys: outcome.keys_to_delete,
        copied_keys: outcome.keys_to_copy,
        old_routing_prefix,
        cname,
        invalidated_paths,
    };
    match serde_json::to_string_pretty(&report) {
        Ok(json) => debug!(json = %json, "[PUBLISH][DEBUG] Publish report as JSON"),
        Err(e) => error!(error = ?e, "[PUBLISH][DEBUG] Failed to serialize publish report as JSON"),
    }
    info!("[PUBLISH] Documentation publish complete");
    Ok(report)
}
