#![doc = "Filesystem backend for the publish pipeline: buckets are directories under a storage root."]
//
//! # Local storage backend
//!
//! Implements [`ObjectStore`] and [`CdnInvalidator`] from `docs-release-core`
//! on a plain directory tree, so a publish run can be performed and inspected
//! without network access:
//!
//! ```text
//! <root>/<bucket>/<key>            objects
//! <root>/<bucket>.routing.json     routing rules, alias prefix -> target prefix
//! <root>/invalidations.jsonl       one JSON record per invalidation request
//! ```
//!
//! Deleting a missing object is a no-op. Copying an object that is missing
//! from the source is skipped with a warning. Keys containing `..` or an
//! absolute path are rejected.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use docs_release_core::contract::{CdnInvalidator, CollaboratorError, ObjectStore};
use serde::{Deserialize, Serialize};

/// One line of the invalidation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationRecord {
    pub id: String,
    pub cname: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        tracing::info!(root = %root.display(), "Initialized local storage backend");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, CollaboratorError> {
        Ok(self.root.join(checked_relative(bucket)?))
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, CollaboratorError> {
        Ok(self.bucket_dir(bucket)?.join(checked_relative(key)?))
    }

    fn routing_file(&self, bucket: &str) -> Result<PathBuf, CollaboratorError> {
        checked_relative(bucket)?;
        Ok(self.root.join(format!("{bucket}.routing.json")))
    }

    fn invalidation_log(&self) -> PathBuf {
        self.root.join("invalidations.jsonl")
    }

    pub fn read_routing_rules(&self, bucket: &str) -> Result<BTreeMap<String, String>, CollaboratorError> {
        match fs::read_to_string(self.routing_file(bucket)?) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Box::new(e)),
        }
    }

    pub fn read_invalidations(&self) -> Result<Vec<InvalidationRecord>, CollaboratorError> {
        let file = match fs::File::open(self.invalidation_log()) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Box::new(e)),
        };
        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                records.push(serde_json::from_str(&line)?);
            }
        }
        Ok(records)
    }
}

/// Reject names that would escape the storage root.
fn checked_relative(name: &str) -> Result<&Path, CollaboratorError> {
    let path = Path::new(name);
    let escapes = name.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        tracing::error!(name, "Rejected path outside the storage root");
        return Err(format!("invalid object path {name:?}").into());
    }
    Ok(path)
}

/// Recursively collect file paths under `dir` as `/`-separated keys relative to `base`.
fn collect_keys(dir: &Path, base: &Path, out: &mut BTreeSet<String>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_keys(&path, base, out)?;
        } else if let Ok(relative) = path.strip_prefix(base) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.insert(key);
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for LocalBackend {
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<BTreeSet<String>, CollaboratorError> {
        let dir = self.bucket_dir(bucket)?;
        let mut all = BTreeSet::new();
        if dir.is_dir() {
            collect_keys(&dir, &dir, &mut all)?;
        }
        let keys: BTreeSet<String> = all
            .iter()
            .filter_map(|key| key.strip_prefix(prefix))
            .map(str::to_string)
            .collect();
        tracing::info!(bucket, prefix, count = keys.len(), "Listed local keys");
        Ok(keys)
    }

    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), CollaboratorError> {
        for key in keys {
            let path = self.object_path(bucket, &format!("{prefix}{key}"))?;
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Deleted local object"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "Local object already absent")
                }
                Err(e) => {
                    tracing::error!(error = ?e, path = %path.display(), "Failed to delete local object");
                    return Err(Box::new(e));
                }
            }
        }
        tracing::info!(bucket, prefix, count = keys.len(), "Deleted local keys");
        Ok(())
    }

    async fn copy_keys(
        &self,
        source_bucket: &str,
        source_prefix: &str,
        destination_bucket: &str,
        destination_prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), CollaboratorError> {
        let mut copied = 0usize;
        for key in keys {
            let from = self.object_path(source_bucket, &format!("{source_prefix}{key}"))?;
            let to = self.object_path(destination_bucket, &format!("{destination_prefix}{key}"))?;
            if !from.is_file() {
                tracing::warn!(path = %from.display(), "Copy source missing, skipping");
                continue;
            }
            if let Some(parent) = to.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&from, &to).map_err(|e| {
                tracing::error!(error = ?e, from = %from.display(), to = %to.display(), "Failed to copy local object");
                e
            })?;
            copied += 1;
        }
        tracing::info!(
            source_bucket,
            destination_bucket,
            count = copied,
            skipped = keys.len() - copied,
            "Copied local keys"
        );
        Ok(())
    }

    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        let mut rules = self.read_routing_rules(bucket)?;
        let old = rules.insert(prefix.to_string(), target_prefix.to_string());
        fs::create_dir_all(&self.root)?;
        fs::write(self.routing_file(bucket)?, serde_json::to_string_pretty(&rules)?)?;
        tracing::info!(bucket, prefix, target_prefix, old = ?old, "Updated local routing rule");
        Ok(old)
    }
}

#[async_trait]
impl CdnInvalidator for LocalBackend {
    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &[String],
    ) -> Result<(), CollaboratorError> {
        let record = InvalidationRecord {
            id: uuid::Uuid::new_v4().to_string(),
            cname: cname.to_string(),
            paths: paths.to_vec(),
        };
        fs::create_dir_all(&self.root)?;
        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.invalidation_log())?;
        writeln!(log, "{}", serde_json::to_string(&record)?)?;
        tracing::info!(id = %record.id, cname, paths = paths.len(), "Recorded invalidation");
        Ok(())
    }
}
