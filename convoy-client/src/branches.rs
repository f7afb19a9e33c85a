//! Branch search

use crate::GitLabClient;
use crate::error::Result;

#[derive(Debug, serde::Deserialize)]
struct Branch {
    #[serde(default)]
    name: Option<String>,
}

impl GitLabClient {
    pub(crate) async fn list_branches(
        &self,
        project_id: i64,
        search: Option<&str>,
    ) -> Result<Vec<String>> {
        let url = self.project_url(project_id, "/repository/branches");

        let request = match search {
            Some(term) => self.get(&url).query(&[("search", term)]),
            None => self.get(&url).query(&[("per_page", "100")]),
        };
        let response = request.send().await?;
        let branches: Vec<Branch> = self.handle_response(&url, response).await?;

        Ok(branches.into_iter().filter_map(|b| b.name).collect())
    }
}
