//! In-memory [`ObjectStore`] and [`CdnInvalidator`] used for tests and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::contract::{CdnInvalidator, CollaboratorError, ObjectStore};

/// A recorded CDN invalidation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invalidation {
    pub cname: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Default)]
struct State {
    /// bucket -> full key -> contents
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    /// (bucket, prefix) -> target prefix
    routing_rules: BTreeMap<(String, String), String>,
    invalidations: Vec<Invalidation>,
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn put_object(&self, bucket: &str, key: &str, contents: impl Into<Vec<u8>>) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), contents.into());
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }

    pub fn set_routing_rule(&self, bucket: &str, prefix: &str, target_prefix: &str) {
        self.state().routing_rules.insert(
            (bucket.to_string(), prefix.to_string()),
            target_prefix.to_string(),
        );
    }

    pub fn routing_rule(&self, bucket: &str, prefix: &str) -> Option<String> {
        self.state()
            .routing_rules
            .get(&(bucket.to_string(), prefix.to_string()))
            .cloned()
    }

    pub fn invalidations(&self) -> Vec<Invalidation> {
        self.state().invalidations.clone()
    }

    fn keys_under(state: &State, bucket: &str, prefix: &str) -> BTreeSet<String> {
        state
            .buckets
            .get(bucket)
            .map(|objects| {
                objects
                    .keys()
                    .filter_map(|key| key.strip_prefix(prefix))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryBackend {
    async fn list_keys(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<BTreeSet<String>, CollaboratorError> {
        Ok(Self::keys_under(&self.state(), bucket, prefix))
    }

    async fn delete_keys(
        &self,
        bucket: &str,
        prefix: &str,
        keys: &BTreeSet<String>,
    ) -> Result<(), CollaboratorError> {
        let mut state = self.state();
        if let Some(objects) = state.buckets.get_mut(bucket) {
            for key in keys {
                objects.remove(&format!("{prefix}{key}"));
            }
        }
        debug!(bucket, prefix, count = keys.len(), "[MEMORY] Deleted keys");
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
        let mut state = self.state();
        let mut copied = Vec::with_capacity(keys.len());
        for key in keys {
            let source_key = format!("{source_prefix}{key}");
            match state
                .buckets
                .get(source_bucket)
                .and_then(|objects| objects.get(&source_key))
            {
                Some(contents) => copied.push((format!("{destination_prefix}{key}"), contents.clone())),
                None => warn!(
                    bucket = source_bucket,
                    key = %source_key,
                    "[MEMORY] Copy source missing, skipping"
                ),
            }
        }
        let count = copied.len();
        state
            .buckets
            .entry(destination_bucket.to_string())
            .or_default()
            .extend(copied);
        debug!(source_bucket, destination_bucket, count, "[MEMORY] Copied keys");
        Ok(())
    }

    async fn update_routing_rule(
        &self,
        bucket: &str,
        prefix: &str,
        target_prefix: &str,
    ) -> Result<Option<String>, CollaboratorError> {
        Ok(self.state().routing_rules.insert(
            (bucket.to_string(), prefix.to_string()),
            target_prefix.to_string(),
        ))
    }
}

#[async_trait]
impl CdnInvalidator for InMemoryBackend {
    async fn create_invalidation(
        &self,
        cname: &str,
        paths: &[String],
    ) -> Result<(), CollaboratorError> {
        self.state().invalidations.push(Invalidation {
            cname: cname.to_string(),
            paths: paths.to_vec(),
        });
        Ok(())
    }
}
