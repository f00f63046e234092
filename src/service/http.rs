use super::RecordService;
use crate::batch::{error_message, CompositeRequest, CompositeResponse};
use crate::config::AppSettings;
use crate::error::SubmitError;
use crate::types::UserRecord;
use crate::Result;
use async_trait::async_trait;
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Directory REST API client.
pub struct HttpRecordService {
    client: reqwest::Client,
    base_url: Url,
    access_token: Option<String>,
    timeout: Duration,
}

impl HttpRecordService {
    /// Request timeout comes from `BULK_HTTP_TIMEOUT_SECS` (default 30).
    pub fn new(base_url: &str, access_token: Option<String>) -> Result<Self> {
        let timeout_secs = env::var("BULK_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(30);
        Self::with_timeout(base_url, access_token, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(
        base_url: &str,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        // Url::join drops the last path segment unless it ends with a slash.
        let mut base = base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;

        // Bulk jobs open many connections to one host at once.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("BULK_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(256),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()?;

        Ok(Self {
            client,
            base_url,
            access_token,
            timeout,
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self> {
        Self::new(&settings.service_url, settings.access_token.clone())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, SubmitError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| SubmitError::from_http(e, self.timeout))?;
        Self::check(response).await
    }

    fn unreadable(&self, what: &str, e: reqwest::Error) -> SubmitError {
        if e.is_timeout() {
            SubmitError::Timeout(self.timeout)
        } else {
            SubmitError::Transport(format!("unreadable {} response: {}", what, e))
        }
    }

    fn endpoint(&self, path: &str) -> std::result::Result<Url, SubmitError> {
        self.base_url
            .join(path)
            .map_err(|e| SubmitError::InvalidRecord(format!("bad endpoint {}: {}", path, e)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Turn a non-success response into a rejection carrying the service's
    /// own error message when it sent one.
    async fn check(
        response: reqwest::Response,
    ) -> std::result::Result<reqwest::Response, SubmitError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();
        let message = error_message(parsed.as_ref()).unwrap_or(body);
        Err(SubmitError::rejected(status.as_u16(), message))
    }
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn create(&self, record: &UserRecord) -> std::result::Result<UserRecord, SubmitError> {
        let url = self.endpoint("users")?;
        let created = self
            .send(self.client.post(url).json(record))
            .await?
            .json::<UserRecord>()
            .await
            .map_err(|e| self.unreadable("create", e))?;
        debug!(id = ?created.id, "record created");
        Ok(created)
    }

    async fn create_batch(
        &self,
        request: &CompositeRequest,
    ) -> std::result::Result<CompositeResponse, SubmitError> {
        let url = self.endpoint("$batch")?;
        self.send(self.client.post(url).json(request))
            .await?
            .json::<CompositeResponse>()
            .await
            .map_err(|e| self.unreadable("batch", e))
    }

    async fn update(&self, record: &UserRecord) -> std::result::Result<(), SubmitError> {
        let id = record
            .id
            .as_deref()
            .ok_or_else(|| SubmitError::InvalidRecord("update needs an object id".into()))?;
        let url = self.endpoint(&format!("users/{}", id))?;
        self.send(self.client.patch(url).json(&record.update_patch())).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_version_segment() {
        let service = HttpRecordService::new("https://graph.example.com/v1.0", None).unwrap();
        assert_eq!(
            service.endpoint("users").unwrap().as_str(),
            "https://graph.example.com/v1.0/users"
        );
        assert_eq!(
            service.endpoint("$batch").unwrap().as_str(),
            "https://graph.example.com/v1.0/$batch"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpRecordService::new("not a url", None).is_err());
    }
}
