//! REST client for the lesson endpoints.
//!
//! Both calls are bearer-authenticated with the token read from the
//! [`TokenStore`] at request time.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::models::lesson_models::LessonContentEnvelope;
use crate::token_store::{TokenStore, TokenStoreError};

/// Errors from the lesson REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Lesson API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("No authentication token found in the token store")]
    MissingToken,

    #[error("Failed to read authentication token: {0}")]
    TokenStore(#[from] TokenStoreError),
}

impl ApiError {
    /// Whether the failure means the user has to sign in again.
    pub fn is_auth_failure(&self) -> bool {
        is_auth_failure_message(&self.to_string())
    }
}

/// Auth failures are only recognisable from their message text.
pub fn is_auth_failure_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("token") || lower.contains("401")
}

/// Where lesson payloads come from. [`LessonApi`] is the production source.
#[async_trait]
pub trait LessonSource: Send + Sync {
    /// Lesson metadata, with any `data` wrapper removed.
    async fn fetch_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
    ) -> Result<Value, ApiError>;

    /// Lesson content. A lesson without content yet yields
    /// [`LessonContentEnvelope::empty`].
    async fn fetch_lesson_content(&self, lesson_id: &str)
        -> Result<LessonContentEnvelope, ApiError>;
}

pub struct LessonApi {
    client: reqwest::Client,
    api_base: String,
    tokens: Arc<TokenStore>,
}

impl LessonApi {
    /// * `api_base` - Base HTTP URL without trailing slash, e.g. `http://localhost:9000`.
    pub fn new(
        api_base: String,
        tokens: Arc<TokenStore>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, api_base, tokens))
    }

    pub fn with_client(client: reqwest::Client, api_base: String, tokens: Arc<TokenStore>) -> Self {
        Self {
            client,
            api_base,
            tokens,
        }
    }

    pub fn lesson_url(&self, course_id: &str, module_id: &str, lesson_id: &str) -> String {
        format!(
            "{}/api/course/{}/modules/{}/lesson/{}",
            self.api_base, course_id, module_id, lesson_id
        )
    }

    pub fn lesson_content_url(&self, lesson_id: &str) -> String {
        format!("{}/api/lessoncontent/{}", self.api_base, lesson_id)
    }

    async fn get(&self, url: String) -> Result<reqwest::Response, ApiError> {
        let token = self.tokens.token()?.ok_or(ApiError::MissingToken)?;
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }

    // ---- private helpers ----

    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl LessonSource for LessonApi {
    async fn fetch_lesson(
        &self,
        course_id: &str,
        module_id: &str,
        lesson_id: &str,
    ) -> Result<Value, ApiError> {
        let response = self
            .get(self.lesson_url(course_id, module_id, lesson_id))
            .await?;
        let body: Value = Self::ensure_success(response).await?.json().await?;
        Ok(unwrap_data(body))
    }

    async fn fetch_lesson_content(
        &self,
        lesson_id: &str,
    ) -> Result<LessonContentEnvelope, ApiError> {
        let response = self.get(self.lesson_content_url(lesson_id)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            log::info!("No content stored for lesson {}; using empty defaults.", lesson_id);
            return Ok(LessonContentEnvelope::empty(lesson_id));
        }
        let envelope = Self::ensure_success(response).await?.json().await?;
        Ok(envelope)
    }
}

/// Lesson payloads arrive either bare or wrapped as `{ data: {...} }`.
pub fn unwrap_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").map_or(false, Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn api(dir: &tempfile::TempDir) -> LessonApi {
        let store = TokenStore::open(&dir.path().join("t.redb")).unwrap();
        LessonApi::new(
            "http://localhost:9000".to_string(),
            Arc::new(store),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_urls() {
        let dir = tempfile::tempdir().unwrap();
        let api = api(&dir);
        assert_eq!(
            api.lesson_url("c1", "m2", "l3"),
            "http://localhost:9000/api/course/c1/modules/m2/lesson/l3"
        );
        assert_eq!(
            api.lesson_content_url("l3"),
            "http://localhost:9000/api/lessoncontent/l3"
        );
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let dir = tempfile::tempdir().unwrap();
        let err = api(&dir).fetch_lesson_content("l3").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingToken));
        assert!(err.is_auth_failure());
    }

    #[test]
    fn unauthorized_status_is_an_auth_failure() {
        let err = ApiError::Status {
            status: 401,
            body: "expired".into(),
        };
        assert!(err.is_auth_failure());

        let err = ApiError::Status {
            status: 500,
            body: "boom".into(),
        };
        assert!(!err.is_auth_failure());
    }

    #[test]
    fn request_error_display() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = ApiError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
    }

    #[test]
    fn data_wrapper_is_removed() {
        assert_eq!(
            unwrap_data(json!({"data": {"title": "T"}, "success": true})),
            json!({"title": "T"})
        );
        assert_eq!(unwrap_data(json!({"title": "T"})), json!({"title": "T"}));
        assert_eq!(unwrap_data(json!({"data": null, "title": "T"})), json!({"data": null, "title": "T"}));
    }
}
