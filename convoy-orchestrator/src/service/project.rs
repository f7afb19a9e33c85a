//! Project Service
//!
//! Registry passthroughs and branch search against the remote platform.

use convoy_client::ReleaseClient;
use convoy_core::domain::RegistryProject;

use crate::engine::{EngineError, EngineResult};
use crate::store::DeployStore;

/// Remote group listed when the caller names none
pub const DEFAULT_GROUP_ID: i64 = 75;

pub async fn list_projects(
    store: &dyn DeployStore,
    group_id: i64,
) -> EngineResult<Vec<RegistryProject>> {
    Ok(store.list_registry_projects(group_id).await?)
}

pub async fn register_project(
    store: &dyn DeployStore,
    project: RegistryProject,
) -> EngineResult<RegistryProject> {
    if project.name.trim().is_empty() {
        return Err(EngineError::Validation("project name is empty".to_string()));
    }
    store.insert_registry_project(&project).await?;
    tracing::info!(project_id = project.id, group_id = project.group_id, "Project registered");
    Ok(project)
}

pub async fn delete_project(store: &dyn DeployStore, id: i64) -> EngineResult<()> {
    if !store.delete_registry_project(id).await? {
        return Err(EngineError::NotFound(format!("project {}", id)));
    }
    tracing::info!(project_id = id, "Project removed from registry");
    Ok(())
}

pub async fn update_alias(store: &dyn DeployStore, id: i64, alias: &str) -> EngineResult<()> {
    if !store.update_registry_alias(id, alias).await? {
        return Err(EngineError::NotFound(format!("project {}", id)));
    }
    Ok(())
}

/// Branch names of a remote project, optionally filtered
pub async fn list_branches(
    client: &dyn ReleaseClient,
    project_id: i64,
    search: Option<&str>,
) -> EngineResult<Vec<String>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    Ok(client.query_branches(project_id, search).await?)
}

/// The subset of `project_ids` that has a branch named exactly `branch`
pub async fn projects_with_branch(
    client: &dyn ReleaseClient,
    project_ids: &[i64],
    branch: &str,
) -> EngineResult<Vec<i64>> {
    let mut found = Vec::new();
    for &project_id in project_ids {
        match client.query_branches(project_id, Some(branch)).await {
            Ok(branches) if branches.iter().any(|b| b == branch) => found.push(project_id),
            Ok(_) => {}
            Err(err) if err.is_not_found() => {
                tracing::warn!(project_id, "Project unknown to remote: {}", err);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::ScriptedReleaseClient;
    use crate::store::MemoryDeployStore;

    fn registry(id: i64, group_id: i64) -> RegistryProject {
        RegistryProject {
            id,
            group_id,
            name: format!("svc-{}", id),
            alias: String::new(),
            full_path: format!("platform/svc-{}", id),
        }
    }

    #[tokio::test]
    async fn test_registry_passthroughs() {
        let store = MemoryDeployStore::new();
        register_project(&store, registry(1, DEFAULT_GROUP_ID)).await.unwrap();
        register_project(&store, registry(2, 80)).await.unwrap();

        update_alias(&store, 1, "payments").await.unwrap();
        let listed = list_projects(&store, DEFAULT_GROUP_ID).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].alias, "payments");

        delete_project(&store, 1).await.unwrap();
        assert!(matches!(
            delete_project(&store, 1).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            register_project(&store, registry(2, 80)).await,
            Err(EngineError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_projects_with_branch_needs_exact_match() {
        let client = ScriptedReleaseClient::new();
        client
            .branches(1, &["main", "release/2.0"])
            .branches(2, &["release/2.0-hotfix"])
            .branches(3, &["release/2.0"]);

        let found = projects_with_branch(&client, &[1, 2, 3, 4], "release/2.0")
            .await
            .unwrap();
        assert_eq!(found, vec![1, 3]);

        let all = list_branches(&client, 1, Some("  ")).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
