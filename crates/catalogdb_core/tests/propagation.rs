//! Reference propagation between samples, individuals, families, files,
//! datasets and jobs.

use catalogdb_core::adaptor::{
    DatasetUpdateParams, FamilyUpdateParams, FileUpdateParams, IndividualUpdateParams,
    SampleUpdateParams,
};
use catalogdb_core::model::{EntityRef, Family, Individual, Job, PinnedRef, Sample, Sex};
use catalogdb_core::pedigree::Relation;
use catalogdb_core::{CatalogError, EntityAdaptor};
use catalogdb_testkit::prelude::*;

fn pinned(refs: &[PinnedRef], id: &str) -> u32 {
    refs.iter()
        .find(|r| r.id == id)
        .map(|r| r.version)
        .unwrap_or_else(|| panic!("{id} is not pinned"))
}

fn family(tc: &TestCatalog, id: &str) -> Family {
    tc.families().get(tc.study_uid, id, None).unwrap()
}

fn individual(tc: &TestCatalog, id: &str) -> Individual {
    tc.individuals().get(tc.study_uid, id, None).unwrap()
}

fn with_attribute() -> IndividualUpdateParams {
    let mut attributes = std::collections::BTreeMap::new();
    attributes.insert("x".to_string(), serde_json::json!(1));
    IndividualUpdateParams {
        attributes: Some(attributes),
        ..IndividualUpdateParams::default()
    }
}

#[test]
fn individual_update_bumps_the_family() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);

    let i2 = tc
        .individuals()
        .update(tc.study_uid, "I2", &with_attribute())
        .unwrap();
    assert_eq!(i2.version, 2);

    let f1 = family(&tc, "F1");
    assert_eq!(f1.version, 2);
    assert_eq!(pinned(&f1.members, "I2"), 2);
    assert_eq!(pinned(&f1.members, "I1"), 1);

    let history = tc.families().history(tc.study_uid, "F1").unwrap();
    assert_eq!(pinned(&history[0].members, "I2"), 1);
}

#[test]
fn locked_family_keeps_its_pins() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);
    let locked = tc.families().lock(tc.study_uid, "F1").unwrap();
    assert_eq!(locked.version, 1);
    assert!(locked.locked);

    tc.individuals()
        .update(tc.study_uid, "I2", &with_attribute())
        .unwrap();

    let f1 = family(&tc, "F1");
    assert_eq!(f1.version, 1);
    assert_eq!(pinned(&f1.members, "I2"), 1);
    assert!(matches!(
        tc.families().refresh_members(tc.study_uid, "F1"),
        Err(CatalogError::InvalidArgument { .. })
    ));

    tc.families().unlock(tc.study_uid, "F1").unwrap();
    let refreshed = tc.families().refresh_members(tc.study_uid, "F1").unwrap();
    assert_eq!(refreshed.version, 2);
    assert_eq!(pinned(&refreshed.members, "I2"), 2);
}

#[test]
fn unchanged_individual_does_not_touch_the_family() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);
    let params = IndividualUpdateParams {
        sex: Some(Sex::Female),
        ..IndividualUpdateParams::default()
    };
    let i2 = tc.individuals().update(tc.study_uid, "I2", &params).unwrap();
    assert_eq!(i2.version, 1);
    assert_eq!(family(&tc, "F1").version, 1);
}

#[test]
fn sample_change_reaches_the_family_through_the_individual() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    let mut i1 = Individual::new("I1");
    i1.samples = vec![PinnedRef {
        id: "S1".to_string(),
        ..PinnedRef::default()
    }];
    tc.individuals().create(tc.study_uid, &i1).unwrap();
    scenarios::family(&tc, "F1", &["I1"]);

    let s1 = tc.samples().get(tc.study_uid, "S1", None).unwrap();
    assert_eq!(s1.version, 1);
    assert_eq!(s1.individual.map(|r| r.id), Some("I1".to_string()));

    let params = SampleUpdateParams {
        description: Some("tumour".to_string()),
        ..SampleUpdateParams::default()
    };
    tc.samples().update(tc.study_uid, "S1", &params).unwrap();

    let i1 = individual(&tc, "I1");
    assert_eq!(i1.version, 2);
    assert_eq!(pinned(&i1.samples, "S1"), 2);
    let f1 = family(&tc, "F1");
    assert_eq!(f1.version, 2);
    assert_eq!(pinned(&f1.members, "I1"), 2);
}

#[test]
fn sample_created_for_an_individual_is_linked() {
    let tc = TestCatalog::new();
    scenarios::individual(&tc, "I1", Sex::Male, None, None);
    scenarios::family(&tc, "F1", &["I1"]);

    let mut sample = Sample::new("S1");
    sample.individual = Some(EntityRef {
        id: "I1".to_string(),
        ..EntityRef::default()
    });
    let created = tc.samples().create(tc.study_uid, &sample).unwrap();
    assert_eq!(created.individual.as_ref().map(|r| r.id.as_str()), Some("I1"));

    let i1 = individual(&tc, "I1");
    assert_eq!(i1.version, 2);
    assert_eq!(pinned(&i1.samples, "S1"), 1);
    assert_eq!(pinned(&family(&tc, "F1").members, "I1"), 2);
}

#[test]
fn sample_rename_updates_the_pin_id() {
    let tc = TestCatalog::new();
    scenarios::samples(&tc, &["S1"]);
    let mut i1 = Individual::new("I1");
    i1.samples = vec![PinnedRef {
        id: "S1".to_string(),
        ..PinnedRef::default()
    }];
    tc.individuals().create(tc.study_uid, &i1).unwrap();

    let params = SampleUpdateParams {
        id: Some("S1b".to_string()),
        ..SampleUpdateParams::default()
    };
    tc.samples().update(tc.study_uid, "S1", &params).unwrap();

    let i1 = individual(&tc, "I1");
    assert_eq!(i1.samples.len(), 1);
    assert_eq!(i1.samples[0].id, "S1b");
    assert_eq!(i1.samples[0].version, 2);
}

#[test]
fn referenced_individual_cannot_be_deleted() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);

    let err = tc.individuals().delete(tc.study_uid, "I1", false).unwrap_err();
    assert!(matches!(err, CatalogError::InUse { .. }));
    assert_eq!(individual(&tc, "I1").version, 1);
    assert_eq!(family(&tc, "F1").version, 1);
}

#[test]
fn individual_deletes_once_references_are_gone() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);

    let members = FamilyUpdateParams {
        members: Some(vec!["I2".to_string()]),
        ..FamilyUpdateParams::default()
    };
    tc.families().update(tc.study_uid, "F1", &members).unwrap();
    let orphan = IndividualUpdateParams {
        father: Some(None),
        ..IndividualUpdateParams::default()
    };
    tc.individuals().update(tc.study_uid, "I2", &orphan).unwrap();

    assert_eq!(tc.individuals().delete(tc.study_uid, "I1", false).unwrap(), 1);
    assert!(individual(&tc, "I2").father.is_none());
}

#[test]
fn forced_individual_delete_detaches_everywhere() {
    let tc = TestCatalog::new();
    scenarios::i1_i2_f1(&tc);

    tc.individuals().delete(tc.study_uid, "I1", true).unwrap();

    let i2 = individual(&tc, "I2");
    assert!(i2.father.is_none());
    assert_eq!(i2.version, 2);

    let f1 = family(&tc, "F1");
    assert_eq!(f1.members.len(), 1);
    assert_eq!(pinned(&f1.members, "I2"), 2);
    assert!(f1.roles.is_empty());
}

#[test]
fn family_roles_are_computed_between_members() {
    let tc = TestCatalog::new();
    let trio = scenarios::nuclear_family(&tc);

    let son = &trio.roles["SON"];
    assert_eq!(son["DAD"], Relation::Father);
    assert_eq!(son["MUM"], Relation::Mother);
    assert_eq!(son["DAUGHTER"], Relation::Sister);
    assert_eq!(trio.roles["DAD"]["DAUGHTER"], Relation::Daughter);
}

#[test]
fn relatives_are_nearest_first() {
    let tc = TestCatalog::new();
    scenarios::nuclear_family(&tc);

    let relatives = tc.individuals().relatives(tc.study_uid, "SON", 1).unwrap();
    let ids: Vec<&str> = relatives.iter().map(|r| r.member.id.as_str()).collect();
    assert_eq!(relatives.len(), 3);
    assert!(ids.contains(&"DAD") && ids.contains(&"MUM") && ids.contains(&"DAUGHTER"));
}

#[test]
fn file_update_refreshes_the_dataset() {
    let tc = TestCatalog::new();
    scenarios::dataset(&tc, &["a.bam", "b.bam"]);

    let params = FileUpdateParams {
        format: Some("BAM".to_string()),
        ..FileUpdateParams::default()
    };
    tc.files().update(tc.study_uid, "data/a.bam", &params).unwrap();

    let ds = tc.datasets().get(tc.study_uid, "DS", None).unwrap();
    assert_eq!(ds.version, 2);
    assert_eq!(pinned(&ds.files, "data/a.bam"), 2);
    assert_eq!(pinned(&ds.files, "data/b.bam"), 1);
}

#[test]
fn dataset_file_delete_needs_force() {
    let tc = TestCatalog::new();
    scenarios::dataset(&tc, &["a.bam", "b.bam"]);

    assert!(matches!(
        tc.files().delete(tc.study_uid, "data/a.bam", false),
        Err(CatalogError::InUse { .. })
    ));
    tc.files().delete(tc.study_uid, "data/a.bam", true).unwrap();

    let ds = tc.datasets().get(tc.study_uid, "DS", None).unwrap();
    assert_eq!(ds.version, 2);
    assert_eq!(ds.files.len(), 1);
    assert_eq!(ds.files[0].id, "data/b.bam");
}

#[test]
fn job_files_cannot_be_deleted() {
    let tc = TestCatalog::new();
    scenarios::dataset(&tc, &["a.bam"]);
    let mut job = Job::new("J1", "aligner");
    job.output = vec![EntityRef {
        id: "data/a.bam".to_string(),
        ..EntityRef::default()
    }];
    tc.jobs().create(tc.study_uid, &job).unwrap();

    assert!(matches!(
        tc.files().delete(tc.study_uid, "data/a.bam", true),
        Err(CatalogError::InUse { .. })
    ));

    tc.jobs().delete(tc.study_uid, "J1").unwrap();
    tc.files().delete(tc.study_uid, "data/a.bam", true).unwrap();
}

#[test]
fn dataset_update_repins_listed_files() {
    let tc = TestCatalog::new();
    scenarios::dataset(&tc, &["a.bam", "b.bam"]);
    let params = DatasetUpdateParams {
        files: Some(vec!["data/b.bam".to_string()]),
        ..DatasetUpdateParams::default()
    };
    let ds = tc.datasets().update(tc.study_uid, "DS", &params).unwrap();
    assert_eq!(ds.version, 2);
    assert_eq!(ds.files.len(), 1);
    tc.files().delete(tc.study_uid, "data/a.bam", false).unwrap();
}
