//! Composition of the adaptors and their propagation edges.

use std::fmt;
use std::sync::Arc;

use catalogdb_store::DocumentStore;
use tracing::debug;

use super::{
    DatasetAdaptor, FamilyAdaptor, FileAdaptor, IndividualAdaptor, JobAdaptor, ProjectAdaptor,
    SampleAdaptor, StudyAdaptor,
};
use crate::config::CatalogConfig;
use crate::propagation::{ReferenceHolder, ReferencePropagator};
use crate::types::EntityKind;
use crate::utils::{CatalogUtils, Clock, SystemClock};

/// Builds every adaptor over one store.
///
/// Holders are built before the kinds they reference, so the propagation
/// graph is fixed and acyclic: sample to individual to family, file to
/// dataset and job.
pub struct CatalogAdaptorFactory {
    store: Arc<dyn DocumentStore>,
    config: CatalogConfig,
    projects: ProjectAdaptor,
    studies: StudyAdaptor,
    samples: SampleAdaptor,
    individuals: Arc<IndividualAdaptor>,
    families: Arc<FamilyAdaptor>,
    files: FileAdaptor,
    datasets: Arc<DatasetAdaptor>,
    jobs: Arc<JobAdaptor>,
}

impl CatalogAdaptorFactory {
    /// Adaptors stamping dates from the system clock.
    pub fn new(store: Arc<dyn DocumentStore>, config: CatalogConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Adaptors stamping dates from `clock`.
    pub fn with_clock(
        store: Arc<dyn DocumentStore>,
        config: CatalogConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let utils = CatalogUtils::new(clock);

        let families = Arc::new(FamilyAdaptor::new(&store, &utils, &config));
        let individuals = Arc::new(IndividualAdaptor::new(
            &store,
            &utils,
            &config,
            ReferencePropagator::new()
                .with_edge(EntityKind::Individual, families.clone() as Arc<dyn ReferenceHolder>),
        ));
        let samples = SampleAdaptor::new(
            &store,
            &utils,
            &config,
            ReferencePropagator::new()
                .with_edge(EntityKind::Sample, individuals.clone() as Arc<dyn ReferenceHolder>),
            individuals.clone(),
        );

        let datasets = Arc::new(DatasetAdaptor::new(&store, &utils, &config));
        let jobs = Arc::new(JobAdaptor::new(&store, &utils, &config));
        let files = FileAdaptor::new(
            &store,
            &utils,
            &config,
            ReferencePropagator::new()
                .with_edge(EntityKind::File, datasets.clone() as Arc<dyn ReferenceHolder>)
                .with_edge(EntityKind::File, jobs.clone() as Arc<dyn ReferenceHolder>),
        );

        let studies = StudyAdaptor::new(&store, &utils, &config);
        let projects = ProjectAdaptor::new(&store, &utils, &config);
        debug!(target: "catalogdb::adaptor", ?config, "adaptors composed");

        Self {
            store,
            config,
            projects,
            studies,
            samples,
            individuals,
            families,
            files,
            datasets,
            jobs,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// The configuration every adaptor was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Project adaptor.
    pub fn projects(&self) -> &ProjectAdaptor {
        &self.projects
    }

    /// Study adaptor.
    pub fn studies(&self) -> &StudyAdaptor {
        &self.studies
    }

    /// Sample adaptor.
    pub fn samples(&self) -> &SampleAdaptor {
        &self.samples
    }

    /// Individual adaptor.
    pub fn individuals(&self) -> &IndividualAdaptor {
        &self.individuals
    }

    /// Family adaptor.
    pub fn families(&self) -> &FamilyAdaptor {
        &self.families
    }

    /// File adaptor.
    pub fn files(&self) -> &FileAdaptor {
        &self.files
    }

    /// Dataset adaptor.
    pub fn datasets(&self) -> &DatasetAdaptor {
        &self.datasets
    }

    /// Job adaptor.
    pub fn jobs(&self) -> &JobAdaptor {
        &self.jobs
    }
}

impl fmt::Debug for CatalogAdaptorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogAdaptorFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
