//! Retries, atomicity and batch outcomes.

use std::thread;

use catalogdb_codec::Document;
use catalogdb_core::adaptor::{IndividualUpdateParams, SampleUpdateParams};
use catalogdb_core::model::{Individual, PinnedRef, Sex};
use catalogdb_core::{
    fields, CatalogConfig, CatalogError, EntityAdaptor, EventKind, Query, RetryConfig,
};
use catalogdb_store::{DocumentStore, Filter, Update};
use catalogdb_testkit::prelude::*;

fn described(text: &str) -> SampleUpdateParams {
    SampleUpdateParams {
        description: Some(text.to_string()),
        ..SampleUpdateParams::default()
    }
}

#[test]
fn transient_conflicts_are_retried() {
    let tc = TestCatalog::new();
    tc.store.inject_conflicts(2);

    scenarios::samples(&tc, &["S1"]);

    assert_eq!(tc.store.collection_len("sample"), 1);
    assert_eq!(tc.store.active_sessions(), 0);
}

#[test]
fn exhausted_retries_leave_nothing_behind() {
    let tc = TestCatalog::with_config(CatalogConfig::new().retry(RetryConfig::no_retry()));
    scenarios::samples(&tc, &["S1"]);
    tc.store.inject_conflicts(1);

    let err = tc
        .samples()
        .update(tc.study_uid, "S1", &described("lost"))
        .unwrap_err();
    assert!(matches!(err, CatalogError::TransientConflict { attempts: 1 }));

    let s1 = tc.samples().get(tc.study_uid, "S1", None).unwrap();
    assert_eq!(s1.version, 1);
    assert_eq!(tc.store.collection_len("sample_archive"), 0);
    assert_eq!(tc.store.active_sessions(), 0);
}

#[test]
fn failed_propagation_rolls_back_the_source() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    scenarios::i1_i2_f1(&tc);
    let i2 = tc.individuals().get(tc.study_uid, "I2", None).unwrap();

    // A member entry for I2 that cannot be read back makes the family
    // refresh fail after I2's new version is staged.
    let unreadable = Document::new()
        .with("uid", i2.uid)
        .with("id", "I2")
        .with("version", "two");
    tc.store
        .update(
            None,
            "family",
            &Filter::eq(fields::ID, "F1"),
            &Update::new().push("members", unreadable),
            false,
        )
        .unwrap();

    let params = IndividualUpdateParams {
        samples: Some(vec!["S1".to_string()]),
        ..IndividualUpdateParams::default()
    };
    let err = tc
        .individuals()
        .update(tc.study_uid, "I2", &params)
        .unwrap_err();
    assert!(matches!(err, CatalogError::Codec(_)));

    let i2 = tc.individuals().get(tc.study_uid, "I2", None).unwrap();
    assert_eq!(i2.version, 1);
    assert!(i2.samples.is_empty());
    assert_eq!(tc.store.collection_len("individual_archive"), 0);
    assert_eq!(tc.store.collection_len("family_archive"), 0);
    let s1 = tc.samples().get(tc.study_uid, "S1", None).unwrap();
    assert!(s1.individual.is_none());
    assert_eq!(tc.store.active_sessions(), 0);
}

#[test]
fn validation_failures_write_nothing() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    let mut i1 = Individual::new("I1");
    i1.samples = vec![PinnedRef {
        id: "MISSING".to_string(),
        ..PinnedRef::default()
    }];
    assert!(matches!(
        tc.individuals().create(tc.study_uid, &i1),
        Err(CatalogError::NotFound { .. })
    ));
    assert_eq!(tc.store.collection_len("individual"), 0);

    scenarios::individual(&tc, "I1", Sex::Male, None, None);
    let rename_to_taken = IndividualUpdateParams {
        id: Some("I2".to_string()),
        samples: Some(vec!["S1".to_string()]),
        ..IndividualUpdateParams::default()
    };
    scenarios::individual(&tc, "I2", Sex::Female, None, None);
    assert!(matches!(
        tc.individuals().update(tc.study_uid, "I1", &rename_to_taken),
        Err(CatalogError::AlreadyExists { .. })
    ));
    let s1 = tc.samples().get(tc.study_uid, "S1", None).unwrap();
    assert!(s1.individual.is_none());
}

#[test]
fn concurrent_updates_keep_history_contiguous() {
    let tc = TestCatalog::with_config(
        CatalogConfig::new().retry(RetryConfig::new().max_retries(200).base_delay_ms(0)),
    );
    scenarios::samples(&tc, &["S1"]);

    thread::scope(|scope| {
        for worker in 0..2 {
            let tc = &tc;
            scope.spawn(move || {
                for round in 0..5 {
                    tc.samples()
                        .update(tc.study_uid, "S1", &described(&format!("{worker}-{round}")))
                        .unwrap();
                }
            });
        }
    });

    let history = tc.samples().history(tc.study_uid, "S1").unwrap();
    let versions: Vec<u32> = history.iter().map(|s| s.version).collect();
    assert_eq!(versions, (1..=11).collect::<Vec<u32>>());
    assert_eq!(tc.store.active_sessions(), 0);
}

#[test]
fn batch_delete_reports_each_sample() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1", "S2", "S3"]);
    let mut i1 = Individual::new("I1");
    i1.samples = vec![PinnedRef {
        id: "S2".to_string(),
        ..PinnedRef::default()
    }];
    tc.individuals().create(tc.study_uid, &i1).unwrap();

    let batch = tc
        .samples()
        .delete_many(tc.study_uid, &Query::new().with("id", "S1,S2,S3"), false)
        .unwrap();
    assert_eq!(batch.success_count(), 2);
    assert_eq!(batch.error_count(), 1);
    assert!(!batch.is_complete());

    let failed: Vec<&str> = batch.failures().map(|e| e.id.as_str()).collect();
    assert_eq!(failed, vec!["S2"]);
    let event = batch.events.iter().find(|e| e.id == "S2").unwrap();
    assert_eq!(event.kind, EventKind::Error);
    assert!(event.message.contains("in use"));

    assert!(tc.samples().get(tc.study_uid, "S2", None).is_ok());
    assert_eq!(tc.store.collection_len("sample_deleted"), 2);
}

#[test]
fn batch_update_touches_every_match() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["NA1", "NA2", "HG1"]);

    let batch = tc
        .samples()
        .update_many(tc.study_uid, &Query::new().with("id", "~^NA"), &described("batch"))
        .unwrap();
    assert!(batch.is_complete());
    assert_eq!(batch.results.len(), 2);
    assert!(batch.results.iter().all(|s| s.version == 2));
    assert_eq!(tc.samples().get(tc.study_uid, "HG1", None).unwrap().version, 1);
}

#[test]
fn batch_update_warns_about_unchanged_matches() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["NA1", "NA2"]);
    tc.samples()
        .update(tc.study_uid, "NA1", &described("batch"))
        .unwrap();

    let batch = tc
        .samples()
        .update_many(tc.study_uid, &Query::new().with("id", "~^NA"), &described("batch"))
        .unwrap();
    assert!(batch.is_complete());
    assert_eq!(batch.success_count(), 2);
    assert_eq!(batch.warning_count(), 1);

    let warning = batch.events.iter().find(|e| e.id == "NA1").unwrap();
    assert_eq!(warning.kind, EventKind::Warning);
    assert_eq!(warning.message, "nothing to update");
    let versions: Vec<(String, u32)> = batch
        .results
        .iter()
        .map(|s| (s.id.clone(), s.version))
        .collect();
    assert!(versions.contains(&("NA1".to_string(), 2)));
    assert!(versions.contains(&("NA2".to_string(), 2)));
}

#[test]
fn batch_rename_must_be_unambiguous() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["NA1", "NA2"]);
    let rename = SampleUpdateParams {
        id: Some("NA".to_string()),
        ..SampleUpdateParams::default()
    };
    let err = tc
        .samples()
        .update_many(tc.study_uid, &Query::new().with("id", "~^NA"), &rename)
        .unwrap_err();
    assert!(matches!(err, CatalogError::AmbiguousUpdate { matched: 2, .. }));
    assert_eq!(tc.store.collection_len("sample_archive"), 0);
}
