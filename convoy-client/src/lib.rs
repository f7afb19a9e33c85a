//! Convoy Release Client
//!
//! Typed access to the remote CI/SCM platform (GitLab API v4) for the
//! operations the release orchestrator needs: cutting tags, resolving the
//! pipeline a tag triggered, and reading pipeline and job state.
//!
//! The orchestrator only depends on the [`ReleaseClient`] trait, so tests and
//! alternative platforms can plug in their own implementation through a
//! [`ClientFactory`].
//!
//! # Example
//!
//! ```no_run
//! use convoy_client::{GitLabClient, ReleaseClient};
//! use convoy_core::dto::remote::RemoteTarget;
//!
//! #[tokio::main]
//! async fn main() -> convoy_client::Result<()> {
//!     let client = GitLabClient::new(&RemoteTarget::new("git.example.com", "token"))?;
//!     let tag = client.create_tag(42, "main", "release").await?;
//!     let pipeline_id = client.pipeline_id_by_tag(42, &tag).await?;
//!     println!("{tag} triggered pipeline {pipeline_id}");
//!     Ok(())
//! }
//! ```

mod branches;
pub mod error;
mod pipelines;
mod release;
mod tags;

pub use error::{ClientError, Result};
pub use release::{ClientFactory, GitLabClientFactory, ReleaseClient};
pub use tags::tag_name;

use chrono::{FixedOffset, Offset, Utc};
use convoy_core::dto::remote::RemoteTarget;
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Offset used for tag timestamps when none is configured (UTC+8)
pub const DEFAULT_TAG_OFFSET_HOURS: i32 = 8;

/// HTTP client for the GitLab v4 API
#[derive(Debug, Clone)]
pub struct GitLabClient {
    /// API root, e.g. "https://git.example.com/api/v4"
    base_url: String,
    /// Bearer token sent with every request
    token: String,
    /// HTTP client instance
    client: Client,
    /// Timezone used when naming tags
    tag_offset: FixedOffset,
}

impl GitLabClient {
    /// Create a client for the given remote
    ///
    /// Fails when the host is empty or the scheme is not http/https.
    pub fn new(target: &RemoteTarget) -> Result<Self> {
        Self::with_client(target, Client::new())
    }

    /// Create a client reusing a configured reqwest `Client`
    ///
    /// This allows sharing one connection pool between clients and setting
    /// timeouts, proxies or TLS options.
    pub fn with_client(target: &RemoteTarget, client: Client) -> Result<Self> {
        let host = target.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(ClientError::InvalidRequest("remote host is empty".to_string()));
        }
        if target.scheme != "http" && target.scheme != "https" {
            return Err(ClientError::InvalidRequest(format!(
                "unsupported scheme: {}",
                target.scheme
            )));
        }

        Ok(Self {
            base_url: format!("{}://{}/api/v4", target.scheme, host),
            token: target.token.clone(),
            client,
            tag_offset: offset_from_hours(DEFAULT_TAG_OFFSET_HOURS),
        })
    }

    /// Name tags using the given UTC offset instead of the default
    pub fn with_tag_offset_hours(mut self, hours: i32) -> Self {
        self.tag_offset = offset_from_hours(hours);
        self
    }

    /// Get the API root URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn project_url(&self, project_id: i64, path: &str) -> String {
        format!("{}/projects/{}{}", self.base_url, project_id, path)
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code and deserialize the JSON body
    async fn handle_response<T: DeserializeOwned>(
        &self,
        url: &str,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("GitLab {} {} :: {}", status.as_u16(), url, error_text);
            return Err(ClientError::api_error(status.as_u16(), url, error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_api_root() {
        let client = GitLabClient::new(&RemoteTarget::new("git.example.com", "t")).unwrap();
        assert_eq!(client.base_url(), "https://git.example.com/api/v4");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let target = RemoteTarget::new("git.example.com/", "t").with_scheme("http");
        let client = GitLabClient::new(&target).unwrap();
        assert_eq!(client.base_url(), "http://git.example.com/api/v4");
    }

    #[test]
    fn test_client_rejects_bad_target() {
        assert!(GitLabClient::new(&RemoteTarget::new("", "t")).is_err());
        let ftp = RemoteTarget::new("git.example.com", "t").with_scheme("ftp");
        assert!(matches!(
            GitLabClient::new(&ftp),
            Err(ClientError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_project_url() {
        let client = GitLabClient::new(&RemoteTarget::new("git.example.com", "t")).unwrap();
        assert_eq!(
            client.project_url(12, "/pipelines"),
            "https://git.example.com/api/v4/projects/12/pipelines"
        );
    }

    #[test]
    fn test_out_of_range_offset_falls_back_to_utc() {
        assert_eq!(offset_from_hours(99), Utc.fix());
        assert_eq!(offset_from_hours(8).local_minus_utc(), 8 * 3600);
    }
}
