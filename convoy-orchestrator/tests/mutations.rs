//! Deploy mutations: submission, copy, group change and cancel.

use std::sync::Arc;

use convoy_core::domain::{DependType, DeployStatus, RegistryProject};
use convoy_core::dto::deploy::{
    ChangeProject, GroupDeployChange, NewFullDeploy, NewGroup, NewProject,
};
use convoy_core::dto::remote::RemoteTarget;
use convoy_orchestrator::config::EngineConfig;
use convoy_orchestrator::engine::{EngineError, Orchestrator};
use convoy_orchestrator::fakes::{RecordingNotifier, ScriptedReleaseClient, StaticClientFactory};
use convoy_orchestrator::service::query_service;
use convoy_orchestrator::store::{DeployStore, MemoryDeployStore};

fn setup() -> (Arc<MemoryDeployStore>, Orchestrator) {
    let store = Arc::new(MemoryDeployStore::new());
    let orchestrator = Orchestrator::new(
        store.clone(),
        Arc::new(StaticClientFactory::new(Arc::new(ScriptedReleaseClient::new()))),
        Arc::new(RecordingNotifier::new()),
        EngineConfig::default(),
    );
    (store, orchestrator)
}

fn submission() -> NewFullDeploy {
    NewFullDeploy {
        description: Some("weekly release".to_string()),
        groups: vec![
            NewGroup {
                group_index: 0,
                depend_group_index: None,
                depend_type: None,
            },
            NewGroup {
                group_index: 1,
                depend_group_index: Some(0),
                depend_type: Some(DependType::PreBuildAll),
            },
        ],
        projects: vec![
            NewProject {
                group_index: 0,
                project_id: 10,
                project_name: Some("caller-name".to_string()),
                branch: "main".to_string(),
                tag_prefix: "core".to_string(),
            },
            NewProject {
                group_index: 1,
                project_id: 20,
                project_name: Some("gateway".to_string()),
                branch: "release/3".to_string(),
                tag_prefix: "gw".to_string(),
            },
            NewProject {
                group_index: 1,
                project_id: 30,
                project_name: None,
                branch: "main".to_string(),
                tag_prefix: "ui".to_string(),
            },
        ],
    }
}

fn change_project(project_id: i64, branch: &str) -> ChangeProject {
    ChangeProject {
        project_id,
        project_name: None,
        branch: branch.to_string(),
        tag_prefix: "t".to_string(),
    }
}

#[tokio::test]
async fn test_submission_resolves_registry_names() {
    let (store, orchestrator) = setup();
    store
        .insert_registry_project(&RegistryProject {
            id: 10,
            group_id: 75,
            name: "core-service".to_string(),
            alias: String::new(),
            full_path: "platform/core-service".to_string(),
        })
        .await
        .unwrap();

    let id = orchestrator.add_full_deploy(submission()).await.unwrap();

    let deploy = store.get_deploy(id).await.unwrap().unwrap();
    assert_eq!(deploy.status, DeployStatus::Pending);
    assert_eq!(deploy.description, "weekly release");
    let body: NewFullDeploy = serde_json::from_str(&deploy.body).unwrap();
    assert_eq!(body.projects.len(), 3);

    let names: Vec<String> = store
        .list_projects(id)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.project_name)
        .collect();
    assert_eq!(names, vec!["core-service", "gateway", ""]);
    assert_eq!(store.list_groups(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_submission_writes_nothing() {
    let (store, orchestrator) = setup();
    let mut payload = submission();
    payload.projects[1].group_index = 7;

    let err = orchestrator.add_full_deploy(payload).await.unwrap_err();

    assert!(matches!(err, EngineError::Validation(_)));
    assert!(store.list_deploys(0, 50).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_copy_resets_runtime_fields() {
    let (store, orchestrator) = setup();
    let from = orchestrator.add_full_deploy(submission()).await.unwrap();
    for project in store.list_projects(from).await.unwrap() {
        store
            .record_project_release(project.id, "core-202405011200", 900 + project.project_id)
            .await
            .unwrap();
        store
            .set_project_status(project.id, DeployStatus::Success)
            .await
            .unwrap();
    }
    store.set_deploy_status(from, DeployStatus::Success).await.unwrap();

    let copy = orchestrator.copy_deploy_from_old(from, None).await.unwrap();

    assert_ne!(copy, from);
    let old = store.get_deploy(from).await.unwrap().unwrap();
    let new = store.get_deploy(copy).await.unwrap().unwrap();
    assert_eq!(new.status, DeployStatus::Pending);
    assert_eq!(new.description, old.description);
    assert_eq!(new.body, old.body);

    let old_groups = store.list_groups(from).await.unwrap();
    let new_groups = store.list_groups(copy).await.unwrap();
    assert_eq!(old_groups.len(), new_groups.len());
    for (a, b) in old_groups.iter().zip(&new_groups) {
        assert_eq!(a.group_index, b.group_index);
        assert_eq!(a.depend_group_index, b.depend_group_index);
        assert_eq!(a.depend_type, b.depend_type);
    }

    let old_projects = store.list_projects(from).await.unwrap();
    let new_projects = store.list_projects(copy).await.unwrap();
    assert_eq!(old_projects.len(), new_projects.len());
    for (a, b) in old_projects.iter().zip(&new_projects) {
        assert_eq!(a.project_id, b.project_id);
        assert_eq!(a.group_index, b.group_index);
        assert_eq!(a.branch, b.branch);
        assert_eq!(a.tag_prefix, b.tag_prefix);
        assert_eq!(b.actual_tag, None);
        assert_eq!(b.pipeline_id, None);
        assert_eq!(b.status, DeployStatus::Pending);
    }
}

#[tokio::test]
async fn test_copy_with_new_description() {
    let (store, orchestrator) = setup();
    let from = orchestrator.add_full_deploy(submission()).await.unwrap();

    let copy = orchestrator
        .copy_deploy_from_old(from, Some("hotfix rerun".to_string()))
        .await
        .unwrap();

    let new = store.get_deploy(copy).await.unwrap().unwrap();
    assert_eq!(new.description, "hotfix rerun");
    assert!(matches!(
        orchestrator.copy_deploy_from_old(999, None).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_group_change_without_identity_conflicts_on_taken_index() {
    let (store, orchestrator) = setup();
    let id = orchestrator.add_full_deploy(submission()).await.unwrap();

    let err = orchestrator
        .change_deploy_group_info(GroupDeployChange {
            deploy_id: id,
            group_id: None,
            group_index: 1,
            depend_group_index: None,
            depend_type: None,
            description: None,
            projects: vec![change_project(40, "main")],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(store.list_groups(id).await.unwrap().len(), 2);
    assert_eq!(store.list_projects(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_group_change_reconciles_only_its_group() {
    let (store, orchestrator) = setup();
    let id = orchestrator.add_full_deploy(submission()).await.unwrap();
    let group = store.find_group(id, 1).await.unwrap().unwrap();

    let group_id = orchestrator
        .change_deploy_group_info(GroupDeployChange {
            deploy_id: id,
            group_id: Some(group.id),
            group_index: 2,
            depend_group_index: Some(0),
            depend_type: Some(DependType::PreDeployAll),
            description: Some("reshuffled".to_string()),
            projects: vec![change_project(20, "release/4"), change_project(40, "main")],
        })
        .await
        .unwrap();

    assert_eq!(group_id, group.id);
    let updated = store.get_group(group.id).await.unwrap().unwrap();
    assert_eq!(updated.group_index, 2);
    assert_eq!(updated.depend_type, Some(DependType::PreDeployAll));

    let projects = store.list_projects(id).await.unwrap();
    let summary: Vec<(i64, i32, &str)> = projects
        .iter()
        .map(|p| (p.project_id, p.group_index, p.branch.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![(10, 0, "main"), (20, 2, "release/4"), (40, 2, "main")]
    );

    let deploy = store.get_deploy(id).await.unwrap().unwrap();
    assert_eq!(deploy.description, "reshuffled");
}

#[tokio::test]
async fn test_group_change_creates_new_group() {
    let (store, orchestrator) = setup();
    let id = orchestrator.add_full_deploy(submission()).await.unwrap();

    let group_id = orchestrator
        .change_deploy_group_info(GroupDeployChange {
            deploy_id: id,
            group_id: None,
            group_index: 5,
            depend_group_index: Some(1),
            depend_type: Some(DependType::PreBuildAll),
            description: None,
            projects: vec![change_project(50, "main")],
        })
        .await
        .unwrap();

    let created = store.get_group(group_id).await.unwrap().unwrap();
    assert_eq!(created.group_index, 5);
    let added = store.list_group_projects(id, 5).await.unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].status, DeployStatus::Pending);
}

#[tokio::test]
async fn test_group_change_empty_target_clears_group() {
    let (store, orchestrator) = setup();
    let id = orchestrator.add_full_deploy(submission()).await.unwrap();
    let group = store.find_group(id, 1).await.unwrap().unwrap();

    orchestrator
        .change_deploy_group_info(GroupDeployChange {
            deploy_id: id,
            group_id: Some(group.id),
            group_index: 1,
            depend_group_index: Some(0),
            depend_type: Some(DependType::PreBuildAll),
            description: None,
            projects: vec![],
        })
        .await
        .unwrap();

    assert!(store.list_group_projects(id, 1).await.unwrap().is_empty());
    assert_eq!(store.list_group_projects(id, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_group_change_rejects_foreign_group() {
    let (store, orchestrator) = setup();
    let first = orchestrator.add_full_deploy(submission()).await.unwrap();
    let second = orchestrator.add_full_deploy(submission()).await.unwrap();
    let foreign = store.find_group(first, 0).await.unwrap().unwrap();

    let err = orchestrator
        .change_deploy_group_info(GroupDeployChange {
            deploy_id: second,
            group_id: Some(foreign.id),
            group_index: 0,
            depend_group_index: None,
            depend_type: None,
            description: None,
            projects: vec![],
        })
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_cascades_to_projects() {
    let (store, orchestrator) = setup();
    let id = orchestrator.add_full_deploy(submission()).await.unwrap();

    orchestrator.cancel_deploy(id).await.unwrap();

    let detail = query_service::deploy_detail(store.as_ref(), id).await.unwrap();
    assert_eq!(detail.deploy.status, DeployStatus::Canceled);
    assert!(detail.projects.iter().all(|p| p.status == DeployStatus::Canceled));
    assert!(matches!(
        orchestrator.cancel_deploy(12345).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_deploy_run_is_not_found() {
    let (_store, orchestrator) = setup();
    let target = RemoteTarget::new("gitlab.example.test", "glpat-test");

    assert!(matches!(
        orchestrator.run_deploy(77, &target).await,
        Err(EngineError::NotFound(_))
    ));
}
