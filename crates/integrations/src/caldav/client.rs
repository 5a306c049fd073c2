//! HTTP client for CalDAV operations.
//!
//! Basic authentication over HTTPS is the only supported scheme.

use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use tracing::trace;

use crate::auth::BasicCredentials;
use crate::error::{ProviderError, ProviderResult};

/// Whether a PUT created a new resource or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutResult {
    Created,
    Updated,
}

pub struct CalDavClient {
    client: Client,
}

impl CalDavClient {
    pub fn new() -> ProviderResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// PROPFIND with the given depth; used for discovery
    pub async fn propfind(
        &self,
        url: &str,
        body: &str,
        depth: u8,
        credentials: &BasicCredentials,
    ) -> ProviderResult<String> {
        self.xml_request("PROPFIND", url, body, Some(depth), credentials)
            .await
    }

    /// REPORT; used for calendar-query
    pub async fn report(
        &self,
        url: &str,
        body: &str,
        credentials: &BasicCredentials,
    ) -> ProviderResult<String> {
        self.xml_request("REPORT", url, body, Some(1), credentials)
            .await
    }

    /// PUT one iCalendar resource
    pub async fn put_ics(
        &self,
        url: &str,
        ics: String,
        credentials: &BasicCredentials,
    ) -> ProviderResult<PutResult> {
        trace!(url = %url, "PUT calendar resource");
        let response = self
            .client
            .put(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header("Content-Type", "text/calendar; charset=utf-8")
            .body(ics)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::CREATED => Ok(PutResult::Created),
            s if s.is_success() => Ok(PutResult::Updated),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(Self::map_error(s, body))
            }
        }
    }

    /// DELETE one iCalendar resource
    pub async fn delete(&self, url: &str, credentials: &BasicCredentials) -> ProviderResult<()> {
        trace!(url = %url, "DELETE calendar resource");
        let response = self
            .client
            .delete(url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::map_error(status, body))
    }

    async fn xml_request(
        &self,
        method: &str,
        url: &str,
        body: &str,
        depth: Option<u8>,
        credentials: &BasicCredentials,
    ) -> ProviderResult<String> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| ProviderError::InvalidResponse(format!("bad method {}", method)))?;

        let mut request = self
            .client
            .request(method.clone(), url)
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(body.to_string());
        if let Some(depth) = depth {
            request = request.header("Depth", depth.to_string());
        }

        trace!(method = %method, url = %url, "sending CalDAV request");
        let response = request.send().await?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => Ok(response.text().await?),
            s => {
                let body = response.text().await.unwrap_or_default();
                Err(Self::map_error(s, body))
            }
        }
    }

    fn map_error(status: StatusCode, body: String) -> ProviderError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ProviderError::Authentication("invalid CalDAV credentials".to_string())
            }
            StatusCode::NOT_FOUND => {
                ProviderError::NotFound("calendar or resource not found".to_string())
            }
            StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
            s => ProviderError::Api {
                status: s.as_u16(),
                message: body,
            },
        }
    }
}
