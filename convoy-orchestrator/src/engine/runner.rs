//! Project Runner
//!
//! Drives a single project through tag -> pipeline -> job seed.

use convoy_client::{ClientError, ReleaseClient};
use convoy_core::domain::{DeployProject, JobRecord, PipelineRecord};
use convoy_core::dto::remote::RemotePipeline;

use super::{EngineError, EngineResult};
use crate::config::EngineConfig;
use crate::store::DeployStore;

/// Cut (or reuse) the project's tag, resolve its pipeline and mirror it
///
/// Returns the pipeline id stored on the project row.
pub async fn run_one_project(
    client: &dyn ReleaseClient,
    store: &dyn DeployStore,
    config: &EngineConfig,
    project: &DeployProject,
) -> EngineResult<i64> {
    let tag = match &project.actual_tag {
        Some(tag) => tag.clone(),
        None => {
            client
                .create_tag(project.project_id, &project.branch, &project.tag_prefix)
                .await?
        }
    };
    tracing::info!(
        deploy_id = project.deploy_id,
        project_id = project.project_id,
        %tag,
        "Tag ready"
    );

    let pipeline_id = resolve_pipeline_id(client, config, project.project_id, &tag).await?;
    store
        .record_project_release(project.id, &tag, pipeline_id)
        .await?;

    mirror_pipeline(client, store, project.deploy_id, project.project_id, pipeline_id).await?;

    Ok(pipeline_id)
}

/// The remote side indexes pipelines of fresh tags with some delay
async fn resolve_pipeline_id(
    client: &dyn ReleaseClient,
    config: &EngineConfig,
    project_id: i64,
    tag: &str,
) -> EngineResult<i64> {
    let attempts = config.pipeline_retry_attempts.max(1);
    let mut last_error: Option<ClientError> = None;

    for attempt in 1..=attempts {
        match client.pipeline_id_by_tag(project_id, tag).await {
            Ok(id) => return Ok(id),
            // Credentials or permissions do not heal by waiting
            Err(err) if err.is_client_error() && !err.is_not_found() => {
                tracing::error!(project_id, tag, attempt, "Pipeline lookup rejected: {}", err);
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(project_id, tag, attempt, "Pipeline lookup failed: {}", err);
                last_error = Some(err);
            }
        }
        if attempt < attempts {
            tokio::time::sleep(config.pipeline_retry_delay).await;
        }
    }

    tracing::error!(project_id, tag, attempts, "Failed to get pipeline ID after retries");
    Err(EngineError::RetryExhausted {
        attempts,
        source: last_error
            .unwrap_or_else(|| ClientError::NotFound(format!("pipeline for tag {}", tag))),
    })
}

/// Refresh the local cache of one pipeline and all of its jobs
pub(crate) async fn mirror_pipeline(
    client: &dyn ReleaseClient,
    store: &dyn DeployStore,
    deploy_id: i64,
    project_id: i64,
    pipeline_id: i64,
) -> EngineResult<RemotePipeline> {
    let detail = client.pipeline_detail(project_id, pipeline_id).await?;
    store
        .upsert_pipeline(&PipelineRecord {
            id: pipeline_id,
            deploy_id,
            project_id,
            status: detail.status.clone(),
            user_name: detail.user_name().to_string(),
            created_at: detail.created_at,
            updated_at: detail.updated_at,
        })
        .await?;

    let jobs = client.jobs_by_pipeline(project_id, pipeline_id).await?;
    for job in &jobs {
        store
            .upsert_job(&JobRecord {
                id: job.id,
                deploy_id,
                project_id,
                pipeline_id,
                name: job.name.clone(),
                stage: job.stage.clone(),
                status: job.status.clone(),
                created_at: job.created_at,
                updated_at: job.last_change(),
                web_url: job.web_url.clone(),
            })
            .await?;
    }
    tracing::debug!(deploy_id, project_id, pipeline_id, jobs = jobs.len(), "Pipeline mirrored");

    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ScriptedReleaseClient, Snapshot};
    use crate::store::{MemoryDeployStore, NewDeployRecord, NewProjectRecord};
    use convoy_core::domain::DeployStatus;

    async fn seeded(store: &MemoryDeployStore, project_id: i64) -> DeployProject {
        let deploy_id = store
            .insert_full_deploy(NewDeployRecord {
                description: String::new(),
                body: String::new(),
                groups: vec![],
                projects: vec![NewProjectRecord {
                    group_index: 0,
                    project_id,
                    project_name: "web".to_string(),
                    branch: "main".to_string(),
                    tag_prefix: "web".to_string(),
                }],
            })
            .await
            .unwrap();
        store.list_projects(deploy_id).await.unwrap().remove(0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_records_release_and_seeds_jobs() {
        let store = MemoryDeployStore::new();
        let client = ScriptedReleaseClient::new();
        client.script(
            5,
            vec![Snapshot::new("running")
                .job(501, "compile", "build", "success")
                .job(502, "rollout", "deploy", "pending")],
        );
        client.fail_pipeline_lookup(5, 2);
        let project = seeded(&store, 5).await;

        let pipeline_id = run_one_project(&client, &store, &EngineConfig::default(), &project)
            .await
            .unwrap();

        let stored = store.list_projects(project.deploy_id).await.unwrap().remove(0);
        assert_eq!(stored.pipeline_id, Some(pipeline_id));
        assert_eq!(stored.status, DeployStatus::Running);
        assert!(stored.actual_tag.unwrap().starts_with("web-"));
        assert_eq!(client.pipeline_lookups(5), 3);

        let pipelines = store.list_pipelines(project.deploy_id).await.unwrap();
        assert_eq!(pipelines.len(), 1);
        assert_eq!(pipelines[0].user_name, "release-bot");
        assert_eq!(store.list_jobs(project.deploy_id).await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_existing_tag_is_reused() {
        let store = MemoryDeployStore::new();
        let client = ScriptedReleaseClient::new();
        let mut project = seeded(&store, 6).await;
        project.actual_tag = Some("web-202401010000".to_string());

        run_one_project(&client, &store, &EngineConfig::default(), &project)
            .await
            .unwrap();

        assert_eq!(client.tags_created(6), 0);
        let stored = store.list_projects(project.deploy_id).await.unwrap().remove(0);
        assert_eq!(stored.actual_tag.as_deref(), Some("web-202401010000"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_gives_up_after_budget() {
        let store = MemoryDeployStore::new();
        let client = ScriptedReleaseClient::new();
        client.fail_pipeline_lookup(7, 5);
        let project = seeded(&store, 7).await;

        let err = run_one_project(&client, &store, &EngineConfig::default(), &project)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::RetryExhausted { attempts: 5, .. }));
        assert_eq!(client.pipeline_lookups(7), 5);
        let stored = store.list_projects(project.deploy_id).await.unwrap().remove(0);
        assert_eq!(stored.pipeline_id, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_lookup_is_not_retried() {
        let store = MemoryDeployStore::new();
        let client = ScriptedReleaseClient::new();
        client.reject_pipeline_lookup(8, 403);
        let project = seeded(&store, 8).await;

        let err = run_one_project(&client, &store, &EngineConfig::default(), &project)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EngineError::Remote(ClientError::ApiError { status: 403, .. })
        ));
        assert_eq!(client.pipeline_lookups(8), 1);
    }
}
