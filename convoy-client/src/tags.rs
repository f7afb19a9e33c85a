//! Tag creation

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::GitLabClient;
use crate::error::{ClientError, Result};

/// Build a timestamp-qualified tag name: `<prefix>-<yyyyMMddHHmm>`
pub fn tag_name<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}", prefix, at.format("%Y%m%d%H%M"))
}

#[derive(Debug, Serialize)]
struct CreateTagRequest<'a> {
    tag_name: &'a str,
    #[serde(rename = "ref")]
    git_ref: &'a str,
}

impl GitLabClient {
    /// Cut a new tag on `branch` and return its name
    pub(crate) async fn post_tag(
        &self,
        project_id: i64,
        branch: &str,
        tag_prefix: &str,
    ) -> Result<String> {
        let now = Utc::now().with_timezone(&self.tag_offset);
        let name = tag_name(tag_prefix, &now);
        tracing::info!(project_id, branch, tag = %name, "Creating tag");

        let url = self.project_url(project_id, "/repository/tags");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&CreateTagRequest {
                tag_name: &name,
                git_ref: branch,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::api_error(status.as_u16(), url, body));
        }

        Ok(name)
    }
}
