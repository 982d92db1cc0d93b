use std::collections::BTreeSet;

use docs_release_core::contract::{MockCdnInvalidator, MockObjectStore, ObjectStore};
use docs_release_core::doc_version::{get_doc_version, Channel};
use docs_release_core::error::{PublishError, Step};
use docs_release_core::memory::InMemoryBackend;
use docs_release_core::publish::{
    copy_docs, publish_docs, CopyScope, PublishRequest, SyncPlan, DEFAULT_SOURCE_BUCKET,
};
use mockall::Sequence;

const BUCKET: &str = "clusterhq-docs";

fn keys(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Source build `1.2.3/{a, b, index.html}`, published copy `en/1.2.0/{a, old.html}`.
fn seeded_backend() -> InMemoryBackend {
    let backend = InMemoryBackend::new();
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3/a", "a-new");
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3/b", "b-new");
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3/index.html", "index");
    backend.put_object(BUCKET, "en/1.2.0/a", "a-old");
    backend.put_object(BUCKET, "en/1.2.0/old.html", "old");
    backend
}

#[tokio::test]
async fn test_publish_deletes_and_copies_the_stale_key_set() {
    let backend = seeded_backend();
    let request = PublishRequest::new("1.2.3", "1.2.0", BUCKET);

    let report = publish_docs(&backend, &backend, &request)
        .await
        .expect("publish should succeed");

    assert_eq!(report.deleted_keys, keys(&["old.html"]));
    assert_eq!(report.copied_keys, report.deleted_keys);
    assert_eq!(report.channel, Channel::Latest);
    assert_eq!(report.old_routing_prefix, None);
    assert_eq!(
        backend.routing_rule(BUCKET, "en/latest/").as_deref(),
        Some("/en/1.2.0/")
    );

    let invalidations = backend.invalidations();
    assert_eq!(invalidations.len(), 1, "exactly one invalidation request");
    assert_eq!(invalidations[0].cname, "from_bucketclusterhq-docs");
    assert_eq!(invalidations[0].paths, report.invalidated_paths);
    for path in [
        "/en/latest/a",
        "/en/1.2.0/a",
        "/en/latest/b",
        "/en/latest/old.html",
        "/en/latest/index.html",
        "/en/latest/",
        "/en/1.2.0/",
    ] {
        assert!(
            report.invalidated_paths.iter().any(|p| p == path),
            "missing {path} in {:?}",
            report.invalidated_paths
        );
    }
}

#[tokio::test]
async fn test_second_run_has_nothing_to_delete_or_copy() {
    let backend = seeded_backend();
    let request = PublishRequest::new("1.2.3", "1.2.0", BUCKET);

    publish_docs(&backend, &backend, &request)
        .await
        .expect("first publish should succeed");
    let second = publish_docs(&backend, &backend, &request)
        .await
        .expect("second publish should succeed");

    assert!(second.deleted_keys.is_empty());
    assert!(second.copied_keys.is_empty());
    assert_eq!(second.old_routing_prefix.as_deref(), Some("/en/1.2.0/"));
}

#[tokio::test]
async fn test_all_source_keys_scope_mirrors_the_build() {
    let backend = seeded_backend();
    let mut request = PublishRequest::new("1.2.3", "1.2.0", BUCKET);
    request.copy_scope = CopyScope::AllSourceKeys;

    let report = publish_docs(&backend, &backend, &request)
        .await
        .expect("publish should succeed");

    let source = backend
        .list_keys(DEFAULT_SOURCE_BUCKET, "1.2.3/")
        .await
        .unwrap();
    let destination = backend.list_keys(BUCKET, "en/1.2.0/").await.unwrap();
    assert_eq!(destination, source);
    assert_eq!(destination, keys(&["a", "b", "index.html"]));
    assert_eq!(backend.get_object(BUCKET, "en/1.2.0/a"), Some(b"a-new".to_vec()));
    assert_eq!(report.deleted_keys, keys(&["old.html"]));
}

#[tokio::test]
async fn test_old_routing_prefix_keys_are_invalidated() {
    let backend = seeded_backend();
    backend.set_routing_rule(BUCKET, "en/latest/", "/en/1.1.0/");
    backend.put_object(BUCKET, "en/1.1.0/only-in-old.html", "x");
    backend.put_object(BUCKET, "en/1.1.0/guide/index.html", "x");

    let report = publish_docs(&backend, &backend, &PublishRequest::new("1.2.3", "1.2.0", BUCKET))
        .await
        .expect("publish should succeed");

    assert_eq!(report.old_routing_prefix.as_deref(), Some("/en/1.1.0/"));
    for path in [
        "/en/latest/only-in-old.html",
        "/en/1.2.0/only-in-old.html",
        "/en/latest/guide/index.html",
        "/en/latest/guide/",
        "/en/latest/guide",
    ] {
        assert!(
            report.invalidated_paths.iter().any(|p| p == path),
            "missing {path} in {:?}",
            report.invalidated_paths
        );
    }
}

#[tokio::test]
async fn test_weekly_release_moves_the_devel_alias() {
    let backend = InMemoryBackend::new();
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.3.0dev2/index.html", "x");

    let report = publish_docs(
        &backend,
        &backend,
        &PublishRequest::new("1.3.0dev2", "1.3.0dev2", BUCKET),
    )
    .await
    .expect("weekly releases are publishable");

    assert_eq!(report.channel, Channel::Devel);
    assert_eq!(
        backend.routing_rule(BUCKET, "en/devel/").as_deref(),
        Some("/en/1.3.0dev2/")
    );
    assert_eq!(backend.routing_rule(BUCKET, "en/latest/"), None);
    assert!(report.invalidated_paths.iter().any(|p| p == "/en/devel/index.html"));
    assert_eq!(
        report.package_version.as_ref().map(|v| v.release.as_str()),
        Some("0.dev.2")
    );
}

#[tokio::test]
async fn test_non_release_is_refused_before_any_effect() {
    // No expectations: any collaborator call panics.
    let store = MockObjectStore::new();
    let cdn = MockCdnInvalidator::new();

    for doc_version in ["1.2.3pre1", "1.2.3-4-gabcdef", "1.2.3-dirty", "garbage"] {
        let err = publish_docs(&store, &cdn, &PublishRequest::new("1.2.3", doc_version, BUCKET))
            .await
            .unwrap_err();
        assert!(
            matches!(err, PublishError::NotAPublishableVersion(ref v) if v == doc_version),
            "got {err:?}"
        );
    }
}

#[tokio::test]
async fn test_weekly_documentation_revision_is_published() {
    let backend = InMemoryBackend::new();
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3dev1+doc1/index.html", "index");
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3dev1+doc1/guide.html", "guide");
    backend.put_object(BUCKET, "en/1.2.3dev1+doc1/stale.html", "stale");

    let doc_version = get_doc_version("1.2.3dev1+doc1").expect("parses as a doc version");
    assert_eq!(doc_version, "1.2.3dev1+doc1");

    let report = publish_docs(
        &backend,
        &backend,
        &PublishRequest::new("1.2.3dev1+doc1", doc_version, BUCKET),
    )
    .await
    .expect("weekly documentation revisions are publishable");

    assert_eq!(report.package_version, None);
    assert_eq!(report.channel, Channel::Devel);
    assert_eq!(report.deleted_keys, keys(&["stale.html"]));
    assert_eq!(
        backend.routing_rule(BUCKET, "en/devel/").as_deref(),
        Some("/en/1.2.3dev1+doc1/")
    );
    assert_eq!(backend.invalidations().len(), 1);
    assert!(report
        .invalidated_paths
        .iter()
        .any(|p| p == "/en/devel/guide.html"));
}

#[tokio::test]
async fn test_pre_release_documentation_revision_publishes_over_its_release() {
    let backend = InMemoryBackend::new();
    backend.put_object(DEFAULT_SOURCE_BUCKET, "1.2.3pre1+doc1/index.html", "index");

    let report = publish_docs(
        &backend,
        &backend,
        &PublishRequest::new("1.2.3pre1+doc1", "1.2.3", BUCKET),
    )
    .await
    .expect("doc version 1.2.3 is a release");

    assert_eq!(report.package_version, None);
    assert_eq!(report.plan.source_prefix, "1.2.3pre1+doc1/");
    assert_eq!(report.channel, Channel::Latest);
    assert_eq!(
        backend.routing_rule(BUCKET, "en/latest/").as_deref(),
        Some("/en/1.2.3/")
    );
    assert_eq!(backend.invalidations().len(), 1);
}

#[tokio::test]
async fn test_effects_are_issued_in_order() {
    let mut seq = Sequence::new();
    let mut store = MockObjectStore::new();
    let mut cdn = MockCdnInvalidator::new();

    store
        .expect_list_keys()
        .withf(|bucket, prefix| bucket == DEFAULT_SOURCE_BUCKET && prefix == "1.2.3/")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(keys(&["a", "b", "index.html"])));
    store
        .expect_list_keys()
        .withf(|bucket, prefix| bucket == BUCKET && prefix == "en/1.2.0/")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(keys(&["a", "old.html"])));
    store
        .expect_delete_keys()
        .withf(|bucket, prefix, stale| {
            bucket == BUCKET && prefix == "en/1.2.0/" && *stale == keys(&["old.html"])
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(()));
    store
        .expect_copy_keys()
        .withf(|src_bucket, src_prefix, dst_bucket, dst_prefix, copied| {
            src_bucket == DEFAULT_SOURCE_BUCKET
                && src_prefix == "1.2.3/"
                && dst_bucket == BUCKET
                && dst_prefix == "en/1.2.0/"
                && *copied == keys(&["old.html"])
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _, _, _| Ok(()));
    store
        .expect_update_routing_rule()
        .withf(|bucket, prefix, target| {
            bucket == BUCKET && prefix == "en/latest/" && target == "/en/1.2.0/"
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(Some("/en/1.1.0/".to_string())));
    store
        .expect_list_keys()
        .withf(|bucket, prefix| bucket == BUCKET && prefix == "en/1.1.0/")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(keys(&["legacy.html"])));
    cdn.expect_create_invalidation()
        .withf(|cname, paths| {
            cname == "from_bucketclusterhq-docs"
                && paths.iter().any(|p| p == "/en/latest/legacy.html")
                && paths.iter().any(|p| p == "/en/1.2.0/old.html")
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let report = publish_docs(&store, &cdn, &PublishRequest::new("1.2.3", "1.2.0", BUCKET))
        .await
        .expect("publish should succeed");
    assert_eq!(report.deleted_keys, report.copied_keys);
}

#[tokio::test]
async fn test_collaborator_failure_aborts_remaining_steps() {
    let mut store = MockObjectStore::new();
    let cdn = MockCdnInvalidator::new();

    store
        .expect_list_keys()
        .times(2)
        .returning(|_, _| Ok(BTreeSet::new()));
    store.expect_delete_keys().times(1).returning(|_, _, _| Ok(()));
    store
        .expect_copy_keys()
        .times(1)
        .returning(|_, _, _, _, _| Err("copy refused".into()));
    // update_routing_rule and create_invalidation have no expectations.

    let err = publish_docs(&store, &cdn, &PublishRequest::new("1.2.3", "1.2.3", BUCKET))
        .await
        .unwrap_err();
    match err {
        PublishError::Collaborator { step, source } => {
            assert_eq!(step, Step::Copy);
            assert_eq!(source.to_string(), "copy refused");
        }
        other => panic!("expected collaborator failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_copy_docs_on_empty_locations() {
    let backend = InMemoryBackend::new();
    let plan = SyncPlan::new("9.9.9", "9.9.9", DEFAULT_SOURCE_BUCKET, BUCKET);

    let outcome = copy_docs(&backend, &plan, CopyScope::StaleKeys)
        .await
        .expect("empty copy should succeed");
    assert!(outcome.keys_to_delete.is_empty());
    assert!(outcome.keys_to_copy.is_empty());
    assert!(outcome.changed_keys.is_empty());
}
