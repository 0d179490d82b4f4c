use crate::helpers::*;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use visa_pipeline::serving::{router, ModelPredictor, PredictionRequest, PredictionResponse};
use visa_pipeline::store::Document;

fn request_for(document: &Document) -> PredictionRequest {
    let text = |field: &str| document[field].as_str().unwrap().to_string();
    let number = |field: &str| document[field].as_f64().unwrap();
    PredictionRequest {
        continent: text("continent"),
        education_of_employee: text("education_of_employee"),
        has_job_experience: text("has_job_experience"),
        requires_job_training: "N".to_string(),
        no_of_employees: number("no_of_employees"),
        region_of_employment: text("region_of_employment"),
        prevailing_wage: number("prevailing_wage"),
        unit_of_wage: text("unit_of_wage"),
        full_time_position: "Y".to_string(),
        company_age: REFERENCE_YEAR as f64 - number("yr_of_estab"),
    }
}

fn predictor(objects: Arc<SpyObjectStore>) -> Arc<ModelPredictor> {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    Arc::new(ModelPredictor::new(objects, config.registry))
}

async fn post_predict(
    predictor: Arc<ModelPredictor>,
    request: &PredictionRequest,
) -> (StatusCode, Vec<u8>) {
    let response = router(predictor)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(request).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health() {
    let response = router(predictor(Arc::new(SpyObjectStore::new())))
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"ok");
}

#[tokio::test]
async fn test_promoted_model_answers_with_human_labels() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(60, 17);
    let objects = Arc::new(SpyObjectStore::new());
    objects.seed_production(&memorizing_bundle(&config, &documents));
    let predictor = predictor(objects);

    for document in documents.iter().take(10) {
        let (status, body) = post_predict(predictor.clone(), &request_for(document)).await;
        assert_eq!(status, StatusCode::OK);

        let response: PredictionResponse = serde_json::from_slice(&body).unwrap();
        let expected = match document["case_status"].as_str().unwrap() {
            "Certified" => ("Approved", 0.0),
            _ => ("Denied", 1.0),
        };
        assert_eq!((response.prediction.as_str(), response.class), expected);
    }
}

#[tokio::test]
async fn test_new_promotion_is_served_without_restart() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(60, 17);
    let denied = documents
        .iter()
        .find(|d| d["case_status"] == "Denied")
        .unwrap();
    let request = request_for(denied);

    let objects = Arc::new(SpyObjectStore::new());
    objects.seed_production(&certified_only_bundle(&config, &documents));
    let predictor = predictor(objects.clone());

    let (_, body) = post_predict(predictor.clone(), &request).await;
    let before: PredictionResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(before.prediction, "Approved");

    objects.seed_production(&memorizing_bundle(&config, &documents));

    let (status, body) = post_predict(predictor, &request).await;
    assert_eq!(status, StatusCode::OK);
    let after: PredictionResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(after.prediction, "Denied");
}

#[tokio::test]
async fn test_unchanged_model_is_decoded_once() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), 0.5);
    let documents = synthetic_documents(30, 5);
    let objects = Arc::new(SpyObjectStore::new());
    objects.seed_production(&memorizing_bundle(&config, &documents));
    let predictor = predictor(objects);

    let first = predictor.bundle().await.unwrap();
    let second = predictor.bundle().await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_missing_model_is_a_server_error() {
    let documents = synthetic_documents(1, 3);
    let (status, body) = post_predict(
        predictor(Arc::new(SpyObjectStore::new())),
        &request_for(&documents[0]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("no model has been promoted"));
}

#[tokio::test]
async fn test_malformed_request_is_rejected() {
    let response = router(predictor(Arc::new(SpyObjectStore::new())))
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/predict")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"continent": "Asia"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}
