//! Dependency Waiter
//!
//! Blocks a group until the gating stage of its dependency group passed on
//! every project. Reads only the local job cache, which the project runner and
//! the status poller keep fresh.

use convoy_core::domain::{DependType, JobRecord, RemoteState};
use std::collections::HashMap;

use super::EngineResult;
use crate::config::EngineConfig;
use crate::store::DeployStore;

/// State of a gating stage on one project
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageVerdict {
    Passed,
    Pending,
    Failed,
}

/// Keep only the latest job (highest id) for every job name
///
/// A remote retry creates a new job with the same name, so older attempts
/// must not decide the stage.
pub fn latest_per_name(jobs: Vec<JobRecord>) -> Vec<JobRecord> {
    let mut latest: HashMap<String, JobRecord> = HashMap::new();
    for job in jobs {
        match latest.get(&job.name) {
            Some(existing) if existing.id >= job.id => {}
            _ => {
                latest.insert(job.name.clone(), job);
            }
        }
    }

    let mut jobs: Vec<JobRecord> = latest.into_values().collect();
    jobs.sort_by_key(|j| j.id);
    jobs
}

/// Judge a stage from its already collapsed jobs
pub fn stage_verdict(jobs: &[JobRecord]) -> StageVerdict {
    // No jobs yet means the pipeline has not reached the stage
    if jobs.is_empty() {
        return StageVerdict::Pending;
    }

    let states: Vec<RemoteState> = jobs.iter().map(|j| RemoteState::normalize(&j.status)).collect();
    if states.iter().any(|s| s.is_failure()) {
        StageVerdict::Failed
    } else if states.iter().all(|s| *s == RemoteState::Success) {
        StageVerdict::Passed
    } else {
        StageVerdict::Pending
    }
}

/// Wait until group `group_index` of the deploy passed its gating stage
///
/// Returns `false` as soon as a gating job failed or once the round budget is
/// spent. A group without projects passes immediately.
pub async fn wait_depend_group_ok(
    store: &dyn DeployStore,
    config: &EngineConfig,
    deploy_id: i64,
    group_index: i32,
    depend_type: DependType,
) -> EngineResult<bool> {
    let stage = depend_type.gating_stage();
    let rounds = config.max_depend_rounds.max(1);

    for round in 1..=rounds {
        let projects = store.list_group_projects(deploy_id, group_index).await?;
        if projects.is_empty() {
            return Ok(true);
        }

        let mut all_ok = true;
        for project in &projects {
            let Some(pipeline_id) = project.pipeline_id else {
                all_ok = false;
                break;
            };

            let jobs = store.list_stage_jobs(deploy_id, pipeline_id, stage).await?;
            match stage_verdict(&latest_per_name(jobs)) {
                StageVerdict::Passed => {}
                // Keep scanning, a later project may already have failed
                StageVerdict::Pending => all_ok = false,
                StageVerdict::Failed => {
                    tracing::warn!(
                        deploy_id,
                        group_index,
                        project_id = project.project_id,
                        stage,
                        "Dependency stage failed"
                    );
                    return Ok(false);
                }
            }
        }

        if all_ok {
            return Ok(true);
        }

        tracing::debug!(deploy_id, group_index, stage, round, "Waiting for dependency group");
        if round < rounds {
            tokio::time::sleep(config.depend_interval).await;
        }
    }

    tracing::warn!(deploy_id, group_index, stage, rounds, "Dependency wait exhausted");
    Ok(false)
}
