//! Pipeline and job lookups

use convoy_core::dto::remote::{RemoteJob, RemotePipeline};

use crate::GitLabClient;
use crate::error::{ClientError, Result};

#[derive(Debug, serde::Deserialize)]
struct PipelineRef {
    id: i64,
}

impl GitLabClient {
    /// Newest pipeline whose ref is `tag`
    pub(crate) async fn find_pipeline_id(&self, project_id: i64, tag: &str) -> Result<i64> {
        let url = self.project_url(project_id, "/pipelines");
        tracing::debug!(project_id, tag, "Fetching pipeline ID by tag");

        let response = self.get(&url).query(&[("ref", tag)]).send().await?;
        let pipelines: Vec<PipelineRef> = self.handle_response(&url, response).await?;

        match pipelines.first() {
            Some(pipeline) => Ok(pipeline.id),
            None => {
                tracing::warn!(project_id, tag, "No pipeline found for tag");
                Err(ClientError::NotFound(format!(
                    "no pipeline for tag {} in project {}",
                    tag, project_id
                )))
            }
        }
    }

    pub(crate) async fn fetch_pipeline(
        &self,
        project_id: i64,
        pipeline_id: i64,
    ) -> Result<RemotePipeline> {
        let url = self.project_url(project_id, &format!("/pipelines/{}", pipeline_id));
        tracing::debug!(project_id, pipeline_id, "Fetching pipeline detail");

        let response = self.get(&url).send().await?;
        self.handle_response(&url, response).await
    }

    pub(crate) async fn fetch_jobs(
        &self,
        project_id: i64,
        pipeline_id: i64,
    ) -> Result<Vec<RemoteJob>> {
        let url = self.project_url(project_id, &format!("/pipelines/{}/jobs", pipeline_id));
        tracing::debug!(project_id, pipeline_id, "Fetching jobs by pipeline");

        let response = self.get(&url).send().await?;
        self.handle_response(&url, response).await
    }
}
