// HttpAnalysisClient against a local axum stand-in for the analysis service.

use axum::http::{header, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use oncopredict_wizard::api::analysis::AnalysisError;
use oncopredict_wizard::api::client::{AnalysisClient, HttpAnalysisClient};
use oncopredict_wizard::models::requests::AnalysisRequest;
use oncopredict_wizard::models::responses::RiskLevel;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

async fn serve(app: Router) -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}/", addr)).unwrap()
}

fn client(base: Url) -> HttpAnalysisClient {
    HttpAnalysisClient::new(base, Duration::from_secs(5)).unwrap()
}

fn request(text: &str) -> AnalysisRequest {
    AnalysisRequest {
        clinical_data: text.to_string(),
        correlation_id: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn analyze_posts_clinical_data_and_parses_result() {
    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let seen_in_handler = seen.clone();
    let app = Router::new().route(
        "/analyze_risk",
        post(move |Json(body): Json<Value>| {
            let seen = seen_in_handler.clone();
            async move {
                *seen.lock().unwrap() = Some(body);
                // Raw body: factor keys are deliberately not in sorted order.
                (
                    [(header::CONTENT_TYPE, "application/json")],
                    r#"{
                        "risk_level": "High",
                        "risk_score": 82,
                        "risk_factors": { "TP53 Mutation": 30, "Ki-67": 25 },
                        "drug_options": ["Cetuximab"],
                        "analysis_text": "Aggressive phenotype."
                    }"#,
                )
            }
        }),
    );
    let base = serve(app).await;

    let result = client(base).analyze(&request("58M, TP53 mutated")).await.unwrap();
    assert_eq!(result.risk_level, RiskLevel::High);
    assert_eq!(result.risk_score, 82.0);
    let factors: Vec<&str> = result.risk_factors.keys().map(String::as_str).collect();
    assert_eq!(factors, ["TP53 Mutation", "Ki-67"]);
    assert!(result.major_points.is_empty());

    let body = seen.lock().unwrap().clone().unwrap();
    assert_eq!(body, json!({ "clinical_data": "58M, TP53 mutated" }));
}

#[tokio::test]
async fn server_error_is_a_request_failure() {
    let app = Router::new().route(
        "/analyze_risk",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = serve(app).await;
    let c = client(base);

    match c.analyze(&request("x")).await {
        Err(AnalysisError::RequestFailed {
            user_message,
            internal_details,
        }) => {
            assert_eq!(
                user_message,
                format!(
                    "An error occurred. Make sure the analysis service is running at {}!",
                    c.service_url()
                )
            );
            assert!(internal_details.contains("500"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_body_is_a_request_failure() {
    let app = Router::new().route(
        "/analyze_risk",
        post(|| async { Json(json!({ "risk_score": "high" })) }),
    );
    let base = serve(app).await;

    let err = client(base).analyze(&request("x")).await.unwrap_err();
    assert!(matches!(err, AnalysisError::RequestFailed { .. }));
}

#[tokio::test]
async fn unreachable_service_is_a_request_failure() {
    // Bind then drop to get a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base = Url::parse(&format!("http://{}/", addr)).unwrap();
    let err = client(base).analyze(&request("x")).await.unwrap_err();
    assert!(err.to_string().starts_with("An error occurred."));
}

#[tokio::test]
async fn probe_returns_greeting() {
    let app = Router::new().route(
        "/",
        get(|| async { Json(json!({ "message": "OncoPredict API is running" })) }),
    );
    let base = serve(app).await;

    assert_eq!(
        client(base).probe().await.unwrap(),
        "OncoPredict API is running"
    );
}
