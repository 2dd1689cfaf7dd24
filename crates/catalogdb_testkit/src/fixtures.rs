//! Test fixtures and catalog helpers.
//!
//! Provides a seeded in-memory catalog and builders for the common
//! scenarios.

use std::sync::{Arc, Once};

use catalogdb_core::model::{Project, Study};
use catalogdb_core::{CatalogAdaptorFactory, CatalogConfig, FixedClock, RetryConfig, Uid};
use catalogdb_store::MemoryDocumentStore;
use chrono::{TimeZone, Utc};
use tracing_subscriber::EnvFilter;

/// Id of the seeded project.
pub const PROJECT: &str = "project";
/// Id of the seeded study.
pub const STUDY: &str = "study";
/// Owner of the seeded study.
pub const OWNER: &str = "owner";

static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory catalog with one project and one study.
pub struct TestCatalog {
    /// The adaptors.
    pub catalog: CatalogAdaptorFactory,
    /// The store, for inspecting collections and injecting conflicts.
    pub store: Arc<MemoryDocumentStore>,
    /// The clock stamping every date.
    pub clock: Arc<FixedClock>,
    /// Uid of the seeded study.
    pub study_uid: Uid,
}

impl TestCatalog {
    /// Creates a catalog whose retries never sleep.
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::new().retry(RetryConfig::new().base_delay_ms(0)))
    }

    /// Creates a catalog with the given configuration.
    pub fn with_config(config: CatalogConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryDocumentStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0)
                .single()
                .expect("valid start time"),
        ));
        let catalog = CatalogAdaptorFactory::with_clock(store.clone(), config, clock.clone());
        catalog
            .projects()
            .create(&Project::new(PROJECT))
            .expect("Failed to create project");
        let study = catalog
            .studies()
            .create(PROJECT, &Study::new(STUDY, OWNER))
            .expect("Failed to create study");

        Self {
            catalog,
            store,
            clock,
            study_uid: study.uid,
        }
    }

    /// Starts the next release of the seeded project.
    pub fn increment_release(&self) -> u32 {
        self.catalog
            .projects()
            .increment_release(PROJECT)
            .expect("Failed to increment release")
    }
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestCatalog {
    type Target = CatalogAdaptorFactory;

    fn deref(&self) -> &Self::Target {
        &self.catalog
    }
}

/// Runs a test with a fresh seeded catalog.
pub fn with_catalog<F, R>(f: F) -> R
where
    F: FnOnce(&TestCatalog) -> R,
{
    let tc = TestCatalog::new();
    f(&tc)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use catalogdb_core::model::{
        Dataset, EntityRef, Family, File, Individual, PinnedRef, Sample, Sex,
    };

    fn by_id(id: &str) -> PinnedRef {
        PinnedRef {
            id: id.to_string(),
            ..PinnedRef::default()
        }
    }

    fn parent(id: &str) -> Option<EntityRef> {
        Some(EntityRef {
            uid: Uid::default(),
            id: id.to_string(),
        })
    }

    /// Creates an individual with optional parents.
    pub fn individual(
        tc: &TestCatalog,
        id: &str,
        sex: Sex,
        father: Option<&str>,
        mother: Option<&str>,
    ) -> Individual {
        let mut individual = Individual::new(id);
        individual.sex = sex;
        individual.father = father.and_then(parent);
        individual.mother = mother.and_then(parent);
        tc.individuals()
            .create(tc.study_uid, &individual)
            .expect("Failed to create individual")
    }

    /// Creates a family pinning the given members.
    pub fn family(tc: &TestCatalog, id: &str, members: &[&str]) -> Family {
        let mut family = Family::new(id);
        family.members = members.iter().map(|m| by_id(m)).collect();
        tc.families()
            .create(tc.study_uid, &family)
            .expect("Failed to create family")
    }

    /// Individual `I1`, its child `I2`, and family `F1` pinning both.
    pub fn i1_i2_f1(tc: &TestCatalog) -> Family {
        individual(tc, "I1", Sex::Male, None, None);
        individual(tc, "I2", Sex::Female, Some("I1"), None);
        family(tc, "F1", &["I1", "I2"])
    }

    /// Father, mother and two children, plus a family `TRIO` pinning all
    /// four.
    pub fn nuclear_family(tc: &TestCatalog) -> Family {
        individual(tc, "DAD", Sex::Male, None, None);
        individual(tc, "MUM", Sex::Female, None, None);
        individual(tc, "SON", Sex::Male, Some("DAD"), Some("MUM"));
        individual(tc, "DAUGHTER", Sex::Female, Some("DAD"), Some("MUM"));
        family(tc, "TRIO", &["DAD", "MUM", "SON", "DAUGHTER"])
    }

    /// Creates samples with the given ids.
    pub fn samples(tc: &TestCatalog, ids: &[&str]) -> Vec<Sample> {
        ids.iter()
            .map(|id| {
                tc.samples()
                    .create(tc.study_uid, &Sample::new(*id))
                    .expect("Failed to create sample")
            })
            .collect()
    }

    /// Registers files under `data/` and a dataset `DS` pinning them.
    pub fn dataset(tc: &TestCatalog, names: &[&str]) -> Dataset {
        let mut dataset = Dataset::new("DS");
        for name in names {
            let file = tc
                .files()
                .create(tc.study_uid, &File::new(format!("data/{name}")))
                .expect("Failed to create file");
            dataset.files.push(by_id(&file.id));
        }
        tc.datasets()
            .create(tc.study_uid, &dataset)
            .expect("Failed to create dataset")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogdb_core::EntityAdaptor;

    #[test]
    fn seeded_catalog_has_a_study() {
        let tc = TestCatalog::new();
        let study = tc.studies().get(tc.study_uid).unwrap();
        assert_eq!(study.id, STUDY);
        assert_eq!(tc.studies().current_release(tc.study_uid).unwrap(), 1);
    }

    #[test]
    fn i1_i2_f1_pins_first_versions() {
        with_catalog(|tc| {
            let family = scenarios::i1_i2_f1(tc);
            assert_eq!(family.members.len(), 2);
            assert!(family.members.iter().all(|m| m.version == 1));
            let i2 = tc.individuals().get(tc.study_uid, "I2", None).unwrap();
            assert_eq!(i2.father.unwrap().id, "I1");
        });
    }
}
