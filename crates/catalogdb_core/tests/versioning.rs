//! Version history, release snapshots and deletion across the adaptors.

use catalogdb_codec::Document;
use catalogdb_core::adaptor::SampleUpdateParams;
use catalogdb_core::{fields, EntityAdaptor, Query};
use catalogdb_store::{DocumentStore, Filter, FindOptions};
use catalogdb_testkit::prelude::*;

fn describe(tc: &TestCatalog, id: &str, description: &str) {
    let params = SampleUpdateParams {
        description: Some(description.to_string()),
        ..SampleUpdateParams::default()
    };
    tc.samples().update(tc.study_uid, id, &params).unwrap();
}

fn sorted_by_version(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by_key(|d| d.get_i64(fields::VERSION));
    docs
}

fn all_versions(tc: &TestCatalog, collection: &str) -> Vec<Document> {
    tc.store
        .find(None, collection, &Filter::All, &FindOptions::default())
        .unwrap()
}

#[test]
fn updates_append_contiguous_versions() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    describe(&tc, "S1", "first");
    describe(&tc, "S1", "second");

    let history = tc.samples().history(tc.study_uid, "S1").unwrap();
    let versions: Vec<u32> = history.iter().map(|s| s.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
    assert_eq!(history[2].description, "second");
    assert!(history.iter().all(|s| s.uid == history[0].uid));

    let current = tc
        .store
        .count(None, "sample", &Filter::eq(fields::LAST_OF_VERSION, true))
        .unwrap();
    assert_eq!(current, 1);
    assert_eq!(tc.store.collection_len("sample"), 1);
    assert_eq!(tc.store.collection_len("sample_archive"), 2);
}

#[test]
fn unchanged_update_writes_nothing() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    describe(&tc, "S1", "same");
    describe(&tc, "S1", "same");

    let sample = tc.samples().get(tc.study_uid, "S1", None).unwrap();
    assert_eq!(sample.version, 2);
    assert_eq!(tc.store.collection_len("sample_archive"), 1);
}

#[test]
fn version_query_reaches_the_archive() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    describe(&tc, "S1", "v2");

    let first = tc
        .samples()
        .search(
            tc.study_uid,
            &Query::new().with("id", "S1").with("version", "1"),
            None,
            &FindOptions::default(),
        )
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].version, 1);
    assert_eq!(first[0].description, "");

    let every = tc
        .samples()
        .search(
            tc.study_uid,
            &Query::new().with("version", "all"),
            None,
            &FindOptions::default(),
        )
        .unwrap();
    assert_eq!(every.len(), 2);
}

#[test]
fn delete_moves_the_whole_history() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1", "S2"]);
    describe(&tc, "S1", "a");
    describe(&tc, "S1", "b");

    let is_s1 = |d: &Document| d.get_str(fields::ID) == Some("S1");
    let mut before: Vec<Document> = all_versions(&tc, "sample")
        .into_iter()
        .chain(all_versions(&tc, "sample_archive"))
        .filter(is_s1)
        .collect();
    before = sorted_by_version(before);

    let moved = tc.samples().delete(tc.study_uid, "S1", false).unwrap();
    assert_eq!(moved, 3);

    let deleted = sorted_by_version(all_versions(&tc, "sample_deleted"));
    assert_eq!(deleted.len(), 3);
    for (mut kept, mut original) in deleted.into_iter().zip(before) {
        assert_eq!(kept.get_str(fields::INTERNAL_STATUS_ID), Some("DELETED"));
        kept.remove_path(fields::INTERNAL_STATUS);
        original.remove_path(fields::INTERNAL_STATUS);
        assert_eq!(kept, original);
    }

    assert!(tc.samples().get(tc.study_uid, "S1", None).is_err());
    assert_eq!(tc.store.collection_len("sample"), 1);
    assert_eq!(tc.store.collection_len("sample_archive"), 0);
}

#[test]
fn deleted_ids_can_be_reused() {
    let tc = TestCatalog::new();
    let first = scenarios::samples(&tc, &["S1"]).remove(0);
    tc.samples().delete(tc.study_uid, "S1", false).unwrap();

    let second = scenarios::samples(&tc, &["S1"]).remove(0);
    assert_ne!(first.uid, second.uid);
    assert_eq!(second.version, 1);
}

#[test]
fn snapshots_follow_releases() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    assert_eq!(tc.increment_release(), 2);
    describe(&tc, "S1", "release two");

    let snapshot = |release: &str| {
        tc.samples()
            .search(
                tc.study_uid,
                &Query::new().with("snapshot", release),
                None,
                &FindOptions::default(),
            )
            .unwrap()
    };

    let one = snapshot("1");
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].version, 1);

    let two = snapshot("2");
    assert_eq!(two.len(), 1);
    assert_eq!(two[0].version, 2);
    assert_eq!(two[0].release, 2);

    describe(&tc, "S1", "release two again");
    let two = snapshot("2");
    assert_eq!(two.len(), 1);
    assert_eq!(two[0].version, 3);
    assert_eq!(snapshot("1")[0].version, 1);
}

#[test]
fn entities_untouched_in_a_release_stay_visible_in_it() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1", "S2"]);
    tc.increment_release();
    tc.increment_release();
    describe(&tc, "S2", "changed in three");

    let three = tc
        .samples()
        .search(
            tc.study_uid,
            &Query::new().with("snapshot", "3"),
            None,
            &FindOptions::default(),
        )
        .unwrap();
    let mut seen: Vec<(String, u32)> = three.into_iter().map(|s| (s.id, s.version)).collect();
    seen.sort();
    assert_eq!(seen, vec![("S1".to_string(), 1), ("S2".to_string(), 2)]);
}

#[test]
fn dates_come_from_the_clock() {
    let tc = TestCatalog::new();
    let sample = scenarios::samples(&tc, &["S1"]).remove(0);
    assert_eq!(sample.creation_date, "20240115090000");
    assert_eq!(sample.status.id, "READY");
    assert_eq!(sample.internal.status.id, "READY");
}
