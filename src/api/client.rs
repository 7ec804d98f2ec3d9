// Risk analysis service client
//
// AnalysisClient trait keeps the transport swappable; production uses HttpAnalysisClient,
// tests use stubs that fail, hang or count calls.

use async_trait::async_trait;
use log::{info, warn};
use std::time::Duration;
use url::Url;

use crate::models::requests::AnalysisRequest;
use crate::models::responses::ResultModel;

use super::analysis::AnalysisError;

const ANALYZE_PATH: &str = "analyze_risk";

#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Send one request and parse the reply. Non-2xx and unparsable bodies are failures.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ResultModel, AnalysisError>;

    /// Base URL shown to the user when the service cannot be reached.
    fn service_url(&self) -> String;
}

pub struct HttpAnalysisClient {
    base: Url,
    http: reqwest::Client,
}

impl HttpAnalysisClient {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, http })
    }

    fn unreachable(&self, internal_details: String) -> AnalysisError {
        AnalysisError::RequestFailed {
            user_message: unreachable_message(&self.service_url()),
            internal_details,
        }
    }

    /// `GET {base}/` reachability check. Returns the service's status message.
    pub async fn probe(&self) -> Result<String, AnalysisError> {
        let resp = self
            .http
            .get(self.base.clone())
            .send()
            .await
            .map_err(|e| self.unreachable(format!("GET {} failed: {}", self.base, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.unreachable(format!("GET {} returned HTTP {}", self.base, status)));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| self.unreachable(format!("Probe body unreadable: {}", e)))?;
        Ok(body
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("service reachable")
            .to_string())
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<ResultModel, AnalysisError> {
        let url = self
            .base
            .join(ANALYZE_PATH)
            .map_err(|e| self.unreachable(format!("Invalid analyze URL: {}", e)))?;

        info!(
            "[PHASE: analysis] [STEP: dispatch] POST {} (correlation_id={})",
            url, request.correlation_id
        );

        let resp = self
            .http
            .post(url.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.unreachable(format!("POST {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "[PHASE: analysis] [STEP: dispatch] Service answered HTTP {} (correlation_id={})",
                status, request.correlation_id
            );
            return Err(self.unreachable(format!("POST {} returned HTTP {}", url, status)));
        }

        resp.json::<ResultModel>()
            .await
            .map_err(|e| self.unreachable(format!("Response body did not parse: {}", e)))
    }

    fn service_url(&self) -> String {
        self.base.as_str().trim_end_matches('/').to_string()
    }
}

pub fn unreachable_message(service_url: &str) -> String {
    format!(
        "An error occurred. Make sure the analysis service is running at {}!",
        service_url
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_names_the_service() {
        assert_eq!(
            unreachable_message("http://localhost:8000"),
            "An error occurred. Make sure the analysis service is running at http://localhost:8000!"
        );
    }

    #[test]
    fn service_url_drops_trailing_slash() {
        let client = HttpAnalysisClient::new(
            Url::parse("http://localhost:8000/").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.service_url(), "http://localhost:8000");
    }
}
