//! End-to-end runs of the deploy engine against the in-memory store and a
//! scripted release client. Time is paused, so every backoff completes
//! instantly on the virtual clock.

use std::sync::Arc;
use std::time::Duration;

use convoy_core::domain::{DependType, DeployStatus};
use convoy_core::dto::deploy::{NewFullDeploy, NewGroup, NewProject, PollOutcome};
use convoy_core::dto::event::DeployEvent;
use convoy_core::dto::remote::RemoteTarget;
use convoy_orchestrator::config::EngineConfig;
use convoy_orchestrator::engine::{EngineError, Orchestrator};
use convoy_orchestrator::fakes::{
    RecordingNotifier, ScriptedReleaseClient, Snapshot, StaticClientFactory,
};
use convoy_orchestrator::store::{DeployStore, MemoryDeployStore};

struct Harness {
    store: Arc<MemoryDeployStore>,
    client: Arc<ScriptedReleaseClient>,
    notifier: Arc<RecordingNotifier>,
    orchestrator: Orchestrator,
}

fn harness_with(config: EngineConfig) -> Harness {
    let store = Arc::new(MemoryDeployStore::new());
    let client = Arc::new(ScriptedReleaseClient::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(StaticClientFactory::new(client.clone())),
        notifier.clone(),
        config,
    );
    Harness {
        store,
        client,
        notifier,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(EngineConfig::default())
}

fn target() -> RemoteTarget {
    RemoteTarget::new("gitlab.example.test", "glpat-test")
}

fn group(index: i32, depend: Option<(i32, DependType)>) -> NewGroup {
    NewGroup {
        group_index: index,
        depend_group_index: depend.map(|(i, _)| i),
        depend_type: depend.map(|(_, t)| t),
    }
}

fn project(group_index: i32, project_id: i64) -> NewProject {
    NewProject {
        group_index,
        project_id,
        project_name: Some(format!("svc-{}", project_id)),
        branch: "main".to_string(),
        tag_prefix: format!("svc{}", project_id),
    }
}

/// Group 0 runs project 10, group 1 runs project 20 once group 0 deployed
fn two_group_deploy() -> NewFullDeploy {
    NewFullDeploy {
        description: Some("two groups".to_string()),
        groups: vec![
            group(0, None),
            group(1, Some((0, DependType::PreDeployAll))),
        ],
        projects: vec![project(0, 10), project(1, 20)],
    }
}

async fn project_status(
    store: &MemoryDeployStore,
    deploy_id: i64,
    project_id: i64,
) -> DeployStatus {
    store
        .list_projects(deploy_id)
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.project_id == project_id)
        .map(|p| p.status)
        .unwrap()
}

async fn deploy_status(store: &MemoryDeployStore, deploy_id: i64) -> DeployStatus {
    store.get_deploy(deploy_id).await.unwrap().unwrap().status
}

#[tokio::test(start_paused = true)]
async fn test_dependent_group_runs_after_gate_passes() {
    let h = harness();
    h.client.script(
        10,
        vec![
            Snapshot::new("running")
                .job(1, "compile", "build", "success")
                .job(2, "rollout", "deploy", "running"),
            Snapshot::new("success")
                .job(1, "compile", "build", "success")
                .job(2, "rollout", "deploy", "success"),
        ],
    );
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Success);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Success);
    assert_eq!(project_status(&h.store, id, 10).await, DeployStatus::Success);
    assert_eq!(project_status(&h.store, id, 20).await, DeployStatus::Success);
    assert_eq!(h.client.tags_created(10), 1);
    assert_eq!(h.client.tags_created(20), 1);

    // Group 0 had its pipeline and jobs before group 1 started waiting
    let events = h.notifier.events_for(id);
    let started_10 = events
        .iter()
        .position(|e| *e == DeployEvent::ProjectStarted { project_id: 10 })
        .unwrap();
    let group_1 = events
        .iter()
        .position(|e| *e == DeployEvent::GroupStarted { group_index: 1 })
        .unwrap();
    let started_20 = events
        .iter()
        .position(|e| *e == DeployEvent::ProjectStarted { project_id: 20 })
        .unwrap();
    assert!(started_10 < group_1 && group_1 < started_20);
    assert_eq!(events.first(), Some(&DeployEvent::DeployStarted));
    assert_eq!(events.last(), Some(&DeployEvent::DeploySucceeded));

    let detail_jobs = h.store.list_jobs(id).await.unwrap();
    assert!(detail_jobs.iter().any(|j| j.id == 2 && j.status == "success"));
}

#[tokio::test(start_paused = true)]
async fn test_groups_run_in_ascending_index_order() {
    let h = harness();
    let payload = NewFullDeploy {
        description: Some("out of order".to_string()),
        groups: vec![group(2, None), group(0, None), group(1, None)],
        projects: vec![project(2, 30), project(0, 10), project(1, 20)],
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();
    assert_eq!(status, DeployStatus::Success);

    let events = h.notifier.events_for(id);
    let groups: Vec<i32> = events
        .iter()
        .filter_map(|e| match e {
            DeployEvent::GroupStarted { group_index } => Some(*group_index),
            _ => None,
        })
        .collect();
    let projects: Vec<i64> = events
        .iter()
        .filter_map(|e| match e {
            DeployEvent::ProjectStarted { project_id } => Some(*project_id),
            _ => None,
        })
        .collect();

    assert_eq!(groups, vec![0, 1, 2]);
    assert_eq!(projects, vec![10, 20, 30]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_gate_stage_stops_dependent_group() {
    let h = harness();
    h.client.script(
        10,
        vec![
            Snapshot::new("running").job(2, "rollout", "deploy", "running"),
            Snapshot::new("failed").job(2, "rollout", "deploy", "failed"),
        ],
    );
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Failed);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Failed);
    assert_eq!(project_status(&h.store, id, 10).await, DeployStatus::Failed);
    assert_eq!(project_status(&h.store, id, 20).await, DeployStatus::Pending);
    assert_eq!(h.client.tags_created(20), 0);
    assert!(
        !h.notifier
            .events_for(id)
            .contains(&DeployEvent::ProjectStarted { project_id: 20 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_retried_job_counts_by_latest_attempt() {
    let h = harness();
    h.client.script(
        10,
        vec![Snapshot::new("success")
            .job(3, "rollout", "deploy", "failed")
            .job(4, "rollout", "deploy", "success")],
    );
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Success);
    assert_eq!(h.client.tags_created(20), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dependency_on_empty_group_is_satisfied() {
    let h = harness();
    let payload = NewFullDeploy {
        description: None,
        groups: vec![
            group(0, None),
            group(1, Some((0, DependType::PreBuildAll))),
        ],
        projects: vec![project(1, 20)],
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Success);
    assert_eq!(h.client.tags_created(20), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_lookup_exhaustion_fails_deploy() {
    let h = harness();
    h.client.fail_pipeline_lookup(10, 5);
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Failed);
    assert_eq!(h.client.pipeline_lookups(10), 5);
    assert_eq!(project_status(&h.store, id, 10).await, DeployStatus::Failed);
    assert_eq!(project_status(&h.store, id, 20).await, DeployStatus::Pending);

    let failure = h
        .notifier
        .events_for(id)
        .into_iter()
        .find_map(|e| match e {
            DeployEvent::DeployFailed { reason } => Some(reason),
            _ => None,
        })
        .unwrap();
    assert!(failure.contains("gave up after 5 attempts"), "{}", failure);
}

#[tokio::test(start_paused = true)]
async fn test_tag_failure_abandons_remaining_projects() {
    let h = harness();
    h.client.fail_create_tag(11);
    let payload = NewFullDeploy {
        description: None,
        groups: vec![group(0, None), group(1, None)],
        projects: vec![project(0, 10), project(0, 11), project(0, 12), project(1, 20)],
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Failed);
    assert_eq!(project_status(&h.store, id, 11).await, DeployStatus::Failed);
    assert_eq!(h.client.tags_created(12), 0);
    assert_eq!(h.client.tags_created(20), 0);
    // Already released projects keep their tag and pipeline
    let first = h.store.list_projects(id).await.unwrap().remove(0);
    assert!(first.actual_tag.is_some());
    assert!(first.pipeline_id.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_polling_budget_exhaustion_fails_deploy() {
    let h = harness_with(EngineConfig {
        max_poll_rounds: 3,
        ..EngineConfig::default()
    });
    h.client
        .script(10, vec![Snapshot::new("running").job(5, "compile", "build", "running")]);
    let payload = NewFullDeploy {
        description: None,
        groups: vec![group(0, None)],
        projects: vec![project(0, 10)],
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();

    assert_eq!(status, DeployStatus::Failed);
    let rounds = h
        .notifier
        .events_for(id)
        .into_iter()
        .filter(|e| matches!(e, DeployEvent::PollingUpdate { .. }))
        .count();
    assert_eq!(rounds, 3);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_without_projects_succeeds() {
    let h = harness();
    let payload = NewFullDeploy {
        description: None,
        groups: vec![group(0, None)],
        projects: vec![],
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();

    let status = h.orchestrator.run_deploy(id, &target()).await.unwrap();
    assert_eq!(status, DeployStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_is_not_overwritten_by_running_deploy() {
    let h = harness();
    h.client
        .script(10, vec![Snapshot::new("running").job(6, "rollout", "deploy", "running")]);
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();

    let orchestrator = h.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.run_deploy(id, &target()).await });

    tokio::time::sleep(Duration::from_secs(12)).await;
    h.orchestrator.cancel_deploy(id).await.unwrap();

    let status = run.await.unwrap().unwrap();
    assert_eq!(status, DeployStatus::Canceled);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Canceled);
    assert_eq!(project_status(&h.store, id, 20).await, DeployStatus::Canceled);
    assert_eq!(h.client.tags_created(20), 0);
    assert!(h.notifier.events_for(id).contains(&DeployEvent::DeployCanceled));
}

#[tokio::test(start_paused = true)]
async fn test_canceled_deploy_cannot_run() {
    let h = harness();
    let id = h.orchestrator.add_full_deploy(two_group_deploy()).await.unwrap();
    h.orchestrator.cancel_deploy(id).await.unwrap();

    let err = h.orchestrator.run_deploy(id, &target()).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(h.client.tags_created(10), 0);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Canceled);
}

// =============================================================================
// Retry fetch
// =============================================================================

/// Insert a one-group deploy and attach a scripted pipeline to each project
async fn released(h: &Harness, project_ids: &[i64]) -> i64 {
    let payload = NewFullDeploy {
        description: None,
        groups: vec![group(0, None)],
        projects: project_ids.iter().map(|id| project(0, *id)).collect(),
    };
    let id = h.orchestrator.add_full_deploy(payload).await.unwrap();
    for p in h.store.list_projects(id).await.unwrap() {
        let tag = format!("svc{}-202401010000", p.project_id);
        let pipeline_id = {
            use convoy_client::ReleaseClient;
            h.client.pipeline_id_by_tag(p.project_id, &tag).await.unwrap()
        };
        h.store
            .record_project_release(p.id, &tag, pipeline_id)
            .await
            .unwrap();
    }
    id
}

#[tokio::test]
async fn test_retry_fetch_short_circuits_on_failure() {
    let h = harness();
    h.client
        .script(1, vec![Snapshot::new("running")])
        .script(2, vec![Snapshot::new("failed")])
        .script(3, vec![Snapshot::new("success")]);
    let id = released(&h, &[1, 2, 3]).await;

    let outcome = h.orchestrator.retry_fetch(id, &target()).await.unwrap();

    assert_eq!(outcome, PollOutcome::Fail);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Failed);
    assert_eq!(project_status(&h.store, id, 2).await, DeployStatus::Failed);
    assert_eq!(h.client.detail_calls(3), 0);
}

#[tokio::test]
async fn test_retry_fetch_needs_every_project_successful() {
    let h = harness();
    h.client
        .script(1, vec![Snapshot::new("success")])
        .script(2, vec![Snapshot::new("running")]);
    let id = released(&h, &[1, 2]).await;

    let outcome = h.orchestrator.retry_fetch(id, &target()).await.unwrap();

    assert_eq!(outcome, PollOutcome::Next);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Pending);
    assert_eq!(project_status(&h.store, id, 1).await, DeployStatus::Success);
    assert_eq!(project_status(&h.store, id, 2).await, DeployStatus::Running);
}

#[tokio::test]
async fn test_retry_fetch_marks_success() {
    let h = harness();
    h.client
        .script(1, vec![Snapshot::new("SUCCESS")])
        .script(2, vec![Snapshot::new("success")]);
    let id = released(&h, &[1, 2]).await;

    let outcome = h.orchestrator.retry_fetch(id, &target()).await.unwrap();

    assert_eq!(outcome, PollOutcome::Success);
    assert_eq!(deploy_status(&h.store, id).await, DeployStatus::Success);
    assert!(h.notifier.events_for(id).contains(&DeployEvent::DeploySucceeded));
}

#[tokio::test]
async fn test_retry_fetch_unknown_deploy() {
    let h = harness();
    assert!(h.orchestrator.retry_fetch(404, &target()).await.is_err());
}
