//! HTTP plumbing shared by the compute API client
//!
//! Wraps reqwest with authentication, pagination and status mapping.

use crate::error::CloudError;
use crate::models::PaginatedResponse;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// HTTP client wrapper with authentication
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Fetch all pages of a paginated response
    pub async fn fetch_all_pages<T: for<'de> Deserialize<'de>>(
        &self,
        mut url: String,
    ) -> Result<Vec<T>, CloudError> {
        let mut all_results = Vec::new();

        loop {
            debug!("Fetching page: {}", url);

            let response = self
                .client
                .get(&url)
                .header("Authorization", self.auth_header())
                .header("Accept", "application/json")
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(status_error("GET", &url, status, body));
            }

            let response_text = response.text().await?;
            let page: PaginatedResponse<T> = serde_json::from_str(&response_text).map_err(|e| {
                CloudError::Api(format!(
                    "error decoding response body: {} - Response (first 500 chars): {}",
                    e,
                    response_text.chars().take(500).collect::<String>()
                ))
            })?;
            all_results.extend(page.results);

            match page.next {
                Some(next_url) => url = self.build_url(&next_url),
                None => break,
            }
        }

        Ok(all_results)
    }

    /// Make a DELETE request
    ///
    /// 404 maps to `CloudError::NotFound` so callers can decide whether a
    /// missing target counts as success.
    pub async fn delete(&self, path: &str) -> Result<(), CloudError> {
        let url = self.build_url(path);
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error("DELETE", path, status, body));
        }

        Ok(())
    }

    /// Build query string from filters
    pub fn build_query_string(&self, filters: &[(String, String)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn status_error(method: &str, path: &str, status: StatusCode, body: String) -> CloudError {
    match status {
        StatusCode::NOT_FOUND => {
            CloudError::NotFound(format!("{} {} - {}", method, path, body))
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            CloudError::Authentication(format!("{} {}: {} - {}", method, path, status, body))
        }
        StatusCode::BAD_REQUEST => {
            CloudError::InvalidRequest(format!("{} {}: {}", method, path, body))
        }
        _ => CloudError::Api(format!("{} {} failed: {} - {}", method, path, status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http() -> HttpClient {
        HttpClient::new(Client::new(), "http://cloud-api:8080/".to_string(), "t".to_string())
    }

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let http = http();
        assert_eq!(http.base_url(), "http://cloud-api:8080");
        assert_eq!(http.build_url("/api/v1/instances"), "http://cloud-api:8080/api/v1/instances");
        assert_eq!(http.build_url("http://other/page2"), "http://other/page2");
    }

    #[test]
    fn test_build_query_string_encodes() {
        let query = http().build_query_string(&[(
            "tag:kubernetes.io/cluster/test".to_string(),
            "owned".to_string(),
        )]);
        assert_eq!(query, "tag%3Akubernetes.io%2Fcluster%2Ftest=owned");
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(status_error("DELETE", "/x", StatusCode::NOT_FOUND, String::new()).is_not_found());
        assert!(matches!(
            status_error("GET", "/x", StatusCode::FORBIDDEN, String::new()),
            CloudError::Authentication(_)
        ));
        assert!(matches!(
            status_error("GET", "/x", StatusCode::BAD_GATEWAY, String::new()),
            CloudError::Api(_)
        ));
    }
}
