//! Tests for the ML Integration module

use super::*;
use crate::config::Settings;
use crate::error::{InferenceError, RegistryError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn passenger(pclass: i64, sex: &str, age: f64) -> PassengerRecord {
    PassengerRecord {
        pclass: Some(pclass),
        sex: Some(sex.to_string()),
        age: Some(age),
        sibsp: Some(0),
        parch: Some(0),
        fare: Some(10.0 + age),
        embarked: Some("S".to_string()),
    }
}

/// Every woman survives, every man does not.
fn dataset() -> TitanicDataset {
    let mut records = Vec::new();
    let mut labels = Vec::new();
    for i in 0..30 {
        let pclass = 1 + (i % 3);
        records.push(passenger(pclass, "female", 18.0 + i as f64));
        labels.push(1);
        records.push(passenger(pclass, "male", 18.0 + i as f64));
        labels.push(0);
    }
    TitanicDataset::new(records, labels).unwrap()
}

fn settings() -> Settings {
    Settings {
        model_name: "titanic-test".to_string(),
        n_estimators: 51,
        ..Settings::default()
    }
}

fn request(sex: &str) -> PredictRequest {
    PredictRequest {
        pclass: 1,
        sex: sex.to_string(),
        age: 25.0,
        sibsp: 0,
        parch: 0,
        fare: 50.0,
        embarked: None,
    }
}

/// Counts registry lookups made by the resolver.
struct CountingRegistry {
    inner: InMemoryRegistry,
    lookups: AtomicUsize,
}

impl CountingRegistry {
    fn new() -> Self {
        Self {
            inner: InMemoryRegistry::new(Arc::new(InMemoryArtifactStore::new())),
            lookups: AtomicUsize::new(0),
        }
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelRegistry for CountingRegistry {
    async fn get_by_name(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_name(name).await
    }

    async fn create(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        self.inner.create(name).await
    }

    async fn add_version(
        &self,
        name: &str,
        artifact: &ArtifactRef,
        run_id: &str,
    ) -> Result<ModelVersion, RegistryError> {
        self.inner.add_version(name, artifact, run_id).await
    }

    async fn set_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_others: bool,
    ) -> Result<(), RegistryError> {
        self.inner.set_stage(name, version, stage, archive_others).await
    }

    async fn get_version_by_stage(
        &self,
        name: &str,
        stage: ModelStage,
    ) -> Result<Option<ModelVersion>, RegistryError> {
        self.inner.get_version_by_stage(name, stage).await
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        self.inner.list_versions(name).await
    }

    async fn load_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> Result<SurvivalPipeline, RegistryError> {
        self.inner.load_artifact(artifact).await
    }
}

async fn trained(settings: &Settings, runs: usize) -> Arc<CountingRegistry> {
    let registry = Arc::new(CountingRegistry::new());
    let workflow = TrainingWorkflow::new(
        settings,
        Arc::clone(&registry) as Arc<dyn ModelRegistry>,
        registry.inner.artifacts(),
    );
    for _ in 0..runs {
        workflow.run_with_dataset(&dataset()).await.unwrap();
    }
    registry.lookups.store(0, Ordering::SeqCst);
    registry
}

/// Test the resolver serves predictions from the promoted pipeline
#[tokio::test]
async fn test_resolver_serves_production_version() {
    let settings = settings();
    let registry = trained(&settings, 1).await;
    let resolver = ModelResolver::new(registry, Duration::ZERO);

    let model = resolver.resolve(&settings.model_name).await.unwrap();
    assert_eq!(model.version, 1);

    let female = resolver
        .predict(&settings.model_name, &request("FEMALE"))
        .await
        .unwrap();
    let male = resolver
        .predict(&settings.model_name, &request("male"))
        .await
        .unwrap();
    assert_eq!((female.survived, male.survived), (1, 0));
}

/// Test an unknown model name is reported as not registered
#[tokio::test]
async fn test_resolver_unknown_model() {
    let resolver = ModelResolver::new(Arc::new(CountingRegistry::new()), Duration::ZERO);
    assert!(matches!(
        resolver.resolve("missing").await,
        Err(InferenceError::ModelNotRegistered(_))
    ));
}

/// Test a registered model without a Production version is unavailable
#[tokio::test]
async fn test_resolver_without_production_version() {
    let registry = Arc::new(CountingRegistry::new());
    registry.create("m").await.unwrap();
    registry
        .add_version("m", &ArtifactRef::new("r1", "model"), "r1")
        .await
        .unwrap();

    let resolver = ModelResolver::new(registry, Duration::ZERO);
    let err = resolver.predict("m", &request("male")).await.unwrap_err();
    assert!(matches!(err, InferenceError::NoProductionVersion(_)));
    assert!(!err.is_client_error());
}

/// Test a Production version whose artifact is gone fails to load
#[tokio::test]
async fn test_resolver_missing_artifact() {
    let registry = Arc::new(CountingRegistry::new());
    registry.create("m").await.unwrap();
    registry
        .add_version("m", &ArtifactRef::new("gone", "model"), "gone")
        .await
        .unwrap();
    registry
        .set_stage("m", 1, ModelStage::Production, true)
        .await
        .unwrap();

    let resolver = ModelResolver::new(registry, Duration::ZERO);
    assert!(matches!(
        resolver.resolve("m").await,
        Err(InferenceError::ModelLoad { .. })
    ));
}

/// Test invalid input is rejected before the registry is consulted
#[tokio::test]
async fn test_invalid_request_skips_registry() {
    let registry = Arc::new(CountingRegistry::new());
    let resolver = ModelResolver::new(Arc::clone(&registry) as Arc<dyn ModelRegistry>, Duration::ZERO);

    let err = resolver.predict("m", &request("invalid")).await.unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(registry.lookups(), 0);
}

/// Test cached pipelines are reused only within the TTL
#[tokio::test(start_paused = true)]
async fn test_cache_expires_after_ttl() {
    let settings = settings();
    let registry = trained(&settings, 1).await;
    let resolver = ModelResolver::new(
        Arc::clone(&registry) as Arc<dyn ModelRegistry>,
        Duration::from_secs(30),
    );

    resolver.resolve(&settings.model_name).await.unwrap();
    resolver.resolve(&settings.model_name).await.unwrap();
    assert_eq!(registry.lookups(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    resolver.resolve(&settings.model_name).await.unwrap();
    assert_eq!(registry.lookups(), 2);
}

/// Test a zero TTL resolves the registry on every call
#[tokio::test]
async fn test_zero_ttl_disables_cache() {
    let settings = settings();
    let registry = trained(&settings, 1).await;
    let resolver = ModelResolver::new(Arc::clone(&registry) as Arc<dyn ModelRegistry>, Duration::ZERO);

    for _ in 0..3 {
        resolver.resolve(&settings.model_name).await.unwrap();
    }
    assert_eq!(registry.lookups(), 3);
}

/// Test a newer promotion is visible once the cache is invalidated
#[tokio::test]
async fn test_new_promotion_visible_after_invalidate() {
    let settings = settings();
    let registry = trained(&settings, 1).await;
    let resolver = ModelResolver::new(
        Arc::clone(&registry) as Arc<dyn ModelRegistry>,
        Duration::from_secs(300),
    );
    assert_eq!(resolver.resolve(&settings.model_name).await.unwrap().version, 1);

    let workflow = TrainingWorkflow::new(
        &settings,
        Arc::clone(&registry) as Arc<dyn ModelRegistry>,
        registry.inner.artifacts(),
    );
    workflow.run_with_dataset(&dataset()).await.unwrap();
    assert_eq!(resolver.resolve(&settings.model_name).await.unwrap().version, 1);

    resolver.invalidate().await;
    assert_eq!(resolver.resolve(&settings.model_name).await.unwrap().version, 2);
}
