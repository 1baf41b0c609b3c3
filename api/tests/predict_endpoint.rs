//! Inference endpoint integration tests
//!
//! Drive the router with `oneshot` against in-memory registries; no sockets.

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use titanic_api::{router, ApiState};
use titanic_core::config::Settings;
use titanic_core::error::RegistryError;
use titanic_core::ml_integration::{
    ArtifactRef, ArtifactStore, InMemoryArtifactStore, InMemoryRegistry, ModelRegistry,
    ModelResolver, ModelStage, ModelVersion, PassengerRecord, RegisteredModel, SurvivalPipeline,
    TitanicDataset, TrainingWorkflow,
};

const MODEL: &str = "titanic-api-test";
const FEMALE_QUERY: &str =
    "/predict/?pclass=1&sex=FEMALE&age=25&sibsp=0&parch=0&fare=50&embarked=";
const MALE_QUERY: &str = "/predict/?pclass=3&sex=male&age=30&sibsp=0&parch=0&fare=8&embarked=s";

/// Registry that counts every call it receives.
struct CountingRegistry {
    inner: InMemoryRegistry,
    calls: AtomicUsize,
}

impl CountingRegistry {
    fn new() -> Self {
        Self {
            inner: InMemoryRegistry::new(Arc::new(InMemoryArtifactStore::new())),
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelRegistry for CountingRegistry {
    async fn get_by_name(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        self.hit();
        self.inner.get_by_name(name).await
    }

    async fn create(&self, name: &str) -> Result<RegisteredModel, RegistryError> {
        self.hit();
        self.inner.create(name).await
    }

    async fn add_version(
        &self,
        name: &str,
        artifact: &ArtifactRef,
        run_id: &str,
    ) -> Result<ModelVersion, RegistryError> {
        self.hit();
        self.inner.add_version(name, artifact, run_id).await
    }

    async fn set_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_others: bool,
    ) -> Result<(), RegistryError> {
        self.hit();
        self.inner.set_stage(name, version, stage, archive_others).await
    }

    async fn get_version_by_stage(
        &self,
        name: &str,
        stage: ModelStage,
    ) -> Result<Option<ModelVersion>, RegistryError> {
        self.hit();
        self.inner.get_version_by_stage(name, stage).await
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        self.hit();
        self.inner.list_versions(name).await
    }

    async fn load_artifact(
        &self,
        artifact: &ArtifactRef,
    ) -> Result<SurvivalPipeline, RegistryError> {
        self.hit();
        self.inner.load_artifact(artifact).await
    }
}

fn dataset() -> TitanicDataset {
    let mut records = Vec::new();
    let mut labels = Vec::new();
    for i in 0..30 {
        for (sex, label) in [("female", 1), ("male", 0)] {
            records.push(PassengerRecord {
                pclass: Some(1 + (i % 3)),
                sex: Some(sex.to_string()),
                age: Some(18.0 + i as f64),
                sibsp: Some(0),
                parch: Some(0),
                fare: Some(10.0 + i as f64),
                embarked: Some("S".to_string()),
            });
            labels.push(label);
        }
    }
    TitanicDataset::new(records, labels).unwrap()
}

async fn trained_registry() -> Arc<CountingRegistry> {
    let registry = Arc::new(CountingRegistry::new());
    let settings = Settings {
        model_name: MODEL.to_string(),
        n_estimators: 51,
        ..Settings::default()
    };
    let artifacts: Arc<dyn ArtifactStore> = registry.inner.artifacts();
    TrainingWorkflow::new(
        &settings,
        Arc::clone(&registry) as Arc<dyn ModelRegistry>,
        artifacts,
    )
    .run_with_dataset(&dataset())
    .await
    .unwrap();
    registry.calls.store(0, Ordering::SeqCst);
    registry
}

fn app(registry: Arc<CountingRegistry>) -> axum::Router {
    let resolver = ModelResolver::new(registry, Duration::ZERO);
    router(Arc::new(ApiState::new(Arc::new(resolver), MODEL).unwrap()))
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_reports_service_name() {
    let (status, body) = get(app(Arc::new(CountingRegistry::new())), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "titanic-api");
}

#[tokio::test]
async fn test_predicts_with_the_production_model() {
    let registry = trained_registry().await;

    let (status, body) = get(app(Arc::clone(&registry)), FEMALE_QUERY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "survived": 1 }));

    let (status, body) = get(app(registry), MALE_QUERY).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!({ "survived": 0 }));
}

#[tokio::test]
async fn test_embarked_may_be_omitted() {
    let registry = trained_registry().await;
    let (status, body) = get(
        app(registry),
        "/predict/?pclass=2&sex=female&age=40&sibsp=1&parch=1&fare=20",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["survived"], 1);
}

#[tokio::test]
async fn test_invalid_sex_is_rejected_without_registry_access() {
    let registry = trained_registry().await;
    let (status, body) = get(
        app(Arc::clone(&registry)),
        "/predict/?pclass=1&sex=invalid&age=25&sibsp=0&parch=0&fare=50",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("sex must be"));
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_query_is_a_bad_request() {
    let registry = Arc::new(CountingRegistry::new());
    let (status, body) = get(
        app(Arc::clone(&registry)),
        "/predict/?pclass=first&sex=male&age=25&sibsp=0&parch=0&fare=50",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_production_version_is_a_server_error() {
    let registry = Arc::new(CountingRegistry::new());
    registry.inner.create(MODEL).await.unwrap();
    registry
        .inner
        .add_version(MODEL, &ArtifactRef::new("r1", "model"), "r1")
        .await
        .unwrap();

    let (status, body) = get(app(registry), FEMALE_QUERY).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("Production"));
}

#[tokio::test]
async fn test_unregistered_model_is_a_server_error() {
    let (status, body) = get(app(Arc::new(CountingRegistry::new())), MALE_QUERY).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains(MODEL));
}

#[tokio::test]
async fn test_metrics_count_requests_by_route_and_status() {
    let app = app(trained_registry().await);
    assert_eq!(get(app.clone(), FEMALE_QUERY).await.0, StatusCode::OK);
    assert_eq!(get(app.clone(), MALE_QUERY).await.0, StatusCode::OK);
    assert_eq!(
        get(app.clone(), "/predict/?pclass=1&sex=other&age=1&sibsp=0&parch=0&fare=1")
            .await
            .0,
        StatusCode::BAD_REQUEST
    );

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains(r#"http_requests_total{handler="/predict/",method="GET",status="200"} 2"#));
    assert!(text.contains(r#"http_requests_total{handler="/predict/",method="GET",status="400"} 1"#));
    assert!(text.contains(r#"http_request_duration_seconds_count{handler="/predict/",method="GET"} 3"#));
}
