//! `reqwest`-backed [`InventoryBackend`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use stockflow_core::{ItemId, Location, ProjectCode};
use stockflow_ledger::{LocationStock, RequiredItem};

use crate::backend::r#trait::{
    BackendError, CommitReceipt, CommitRequest, InventoryBackend, OutwardRecord,
    ProjectStockDetail,
};
use crate::config::HttpBackendConfig;
use crate::wire::{self, LocationStockResponse, RequiredItemDto};

/// HTTP client for the remote inventory service.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

/// Structured error body the backend emits on rejections.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// Map a non-success response to a [`BackendError`].
///
/// The body's `error` code is authoritative when present; otherwise the
/// status class decides. Kept free of any client state so the mapping can be
/// tested without a server.
fn classify_response(status: u16, body: &str) -> BackendError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let message = if parsed.message.is_empty() {
            parsed.error.clone()
        } else {
            parsed.message.clone()
        };
        match parsed.error.as_str() {
            "conflict" | "duplicate_document" => return BackendError::Conflict(message),
            "insufficient_stock" => return BackendError::InsufficientStock(message),
            _ => {}
        }
    }
    let message = truncate(body);
    match status {
        409 => BackendError::Conflict(message),
        404 => BackendError::NotFound(message),
        408 | 429 => BackendError::Transient(message),
        s if s >= 500 => BackendError::Transient(message),
        s => BackendError::Rejected { status: s, message },
    }
}

fn truncate(body: &str) -> String {
    const MAX: usize = 256;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

impl HttpBackend {
    pub fn new(config: &HttpBackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// GET `path`, read the body as text, then decode it.
    ///
    /// Two-step decoding keeps the raw body around for the error log when
    /// the server answers with something unexpected.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(classify_response(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(%url, body = %truncate(&body), "undecodable response body");
            BackendError::Decode(e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl InventoryBackend for HttpBackend {
    async fn fetch_location_stock(
        &self,
        item_id: ItemId,
    ) -> Result<BTreeMap<Location, LocationStock>, BackendError> {
        let body: LocationStockResponse = self
            .get_json(&format!("/inventory/{item_id}/location-stock/"))
            .await?;
        wire::into_location_stocks(body).map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn fetch_project_requirements(
        &self,
        project: &ProjectCode,
    ) -> Result<Vec<RequiredItem>, BackendError> {
        let rows: Vec<RequiredItemDto> = self
            .get_json(&format!("/project-requirements/{project}/"))
            .await?;
        Ok(rows.into_iter().map(RequiredItem::from).collect())
    }

    async fn fetch_stock_details(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<ProjectStockDetail>, BackendError> {
        self.get_json(&format!("/stock-details/{item_id}/{project}/"))
            .await
    }

    async fn fetch_outward_history(
        &self,
        item_id: ItemId,
        project: &ProjectCode,
    ) -> Result<Vec<OutwardRecord>, BackendError> {
        self.get_json(&format!("/outward-history/{item_id}/{project}/"))
            .await
    }

    async fn commit_outward(
        &self,
        request: &CommitRequest,
    ) -> Result<CommitReceipt, BackendError> {
        let url = format!("{}/process-outward-and-document/", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transient(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(classify_response(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(%url, body = %truncate(&body), "undecodable commit receipt");
            BackendError::Decode(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_in_body_wins_over_status() {
        let err = classify_response(400, r#"{"error":"insufficient_stock","message":"item X short at Sakar"}"#);
        assert_eq!(
            err,
            BackendError::InsufficientStock("item X short at Sakar".to_string())
        );

        let err = classify_response(400, r#"{"error":"duplicate_document","message":"DC-42 already exists"}"#);
        assert_eq!(err, BackendError::Conflict("DC-42 already exists".to_string()));
    }

    #[test]
    fn status_classes_map_without_a_structured_body() {
        assert!(matches!(classify_response(409, "busy"), BackendError::Conflict(_)));
        assert!(matches!(classify_response(404, ""), BackendError::NotFound(_)));
        assert!(matches!(classify_response(429, ""), BackendError::Transient(_)));
        assert!(matches!(classify_response(503, "down"), BackendError::Transient(_)));
        assert!(matches!(
            classify_response(422, "bad payload"),
            BackendError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn transient_errors_are_retryable_and_conflicts_are_not() {
        assert!(classify_response(500, "").is_transient());
        assert!(!classify_response(409, "").is_transient());
    }

    #[test]
    fn long_bodies_are_truncated_in_messages() {
        let body = "x".repeat(4096);
        match classify_response(500, &body) {
            BackendError::Transient(message) => assert!(message.len() < 300),
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
