//! Release client seam
//!
//! The orchestrator drives projects through these operations only. The GitLab
//! implementation lives in this crate; tests provide scripted fakes.

use async_trait::async_trait;
use convoy_core::dto::remote::{RemoteJob, RemotePipeline, RemoteTarget};
use reqwest::Client;
use std::sync::Arc;

use crate::GitLabClient;
use crate::error::Result;

/// Operations the orchestrator needs from the remote CI/SCM platform
#[async_trait]
pub trait ReleaseClient: Send + Sync {
    /// Cut a timestamp-qualified tag on `branch` and return its name
    async fn create_tag(&self, project_id: i64, branch: &str, tag_prefix: &str) -> Result<String>;

    /// Resolve the pipeline triggered by `tag`
    ///
    /// Fails with a not-found error while the remote side has not indexed
    /// the pipeline yet.
    async fn pipeline_id_by_tag(&self, project_id: i64, tag: &str) -> Result<i64>;

    /// Current state of a pipeline
    async fn pipeline_detail(&self, project_id: i64, pipeline_id: i64) -> Result<RemotePipeline>;

    /// All jobs of a pipeline, retries included
    async fn jobs_by_pipeline(&self, project_id: i64, pipeline_id: i64) -> Result<Vec<RemoteJob>>;

    /// Branch names of a project, optionally filtered by a search term
    async fn query_branches(&self, project_id: i64, search: Option<&str>) -> Result<Vec<String>>;
}

#[async_trait]
impl ReleaseClient for GitLabClient {
    async fn create_tag(&self, project_id: i64, branch: &str, tag_prefix: &str) -> Result<String> {
        self.post_tag(project_id, branch, tag_prefix).await
    }

    async fn pipeline_id_by_tag(&self, project_id: i64, tag: &str) -> Result<i64> {
        self.find_pipeline_id(project_id, tag).await
    }

    async fn pipeline_detail(&self, project_id: i64, pipeline_id: i64) -> Result<RemotePipeline> {
        self.fetch_pipeline(project_id, pipeline_id).await
    }

    async fn jobs_by_pipeline(&self, project_id: i64, pipeline_id: i64) -> Result<Vec<RemoteJob>> {
        self.fetch_jobs(project_id, pipeline_id).await
    }

    async fn query_branches(&self, project_id: i64, search: Option<&str>) -> Result<Vec<String>> {
        self.list_branches(project_id, search).await
    }
}

/// Builds a release client for a remote host and credential
pub trait ClientFactory: Send + Sync {
    fn connect(&self, target: &RemoteTarget) -> Result<Arc<dyn ReleaseClient>>;
}

/// Factory producing [`GitLabClient`]s that share one connection pool
#[derive(Debug, Clone)]
pub struct GitLabClientFactory {
    http: Client,
    tag_offset_hours: i32,
}

impl GitLabClientFactory {
    pub fn new(tag_offset_hours: i32) -> Self {
        Self {
            http: Client::new(),
            tag_offset_hours,
        }
    }
}

impl Default for GitLabClientFactory {
    fn default() -> Self {
        Self::new(crate::DEFAULT_TAG_OFFSET_HOURS)
    }
}

impl ClientFactory for GitLabClientFactory {
    fn connect(&self, target: &RemoteTarget) -> Result<Arc<dyn ReleaseClient>> {
        let client = GitLabClient::with_client(target, self.http.clone())?
            .with_tag_offset_hours(self.tag_offset_hours);
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_empty_host() {
        let factory = GitLabClientFactory::default();
        assert!(factory.connect(&RemoteTarget::new(" ", "t")).is_err());
    }

    #[test]
    fn test_factory_connects() {
        let factory = GitLabClientFactory::new(0);
        assert!(factory.connect(&RemoteTarget::new("git.example.com", "t")).is_ok());
    }
}
