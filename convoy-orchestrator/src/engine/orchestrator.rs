//! Deploy Orchestrator
//!
//! Top-level state machine of a deploy plus the mutating operations exposed
//! to the HTTP layer.

use convoy_client::{ClientFactory, ReleaseClient};
use convoy_core::domain::{DeployStatus, Group};
use convoy_core::dto::deploy::{GroupDeployChange, NewFullDeploy, PollOutcome};
use convoy_core::dto::event::DeployEvent;
use convoy_core::dto::remote::RemoteTarget;
use std::sync::Arc;

use super::plan::{self, group_record};
use super::poller::{self, PollLoopEnd, PollTask};
use super::{EngineError, EngineResult, Notifier, runner, waiter};
use crate::config::EngineConfig;
use crate::store::{DeployStore, GroupWrite, NewDeployRecord, NewGroupRecord, NewProjectRecord};

/// Drives deploys against the store, a remote platform and a notifier
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn DeployStore>,
    clients: Arc<dyn ClientFactory>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

/// How group dispatch ended
enum Dispatch {
    /// Every group ran; the deploy now waits on the poller
    Completed,
    /// A dependency or project failed; the deploy fails with this reason
    Halted(String),
    /// The poller concluded while groups were still being dispatched
    PollerEnded(PollLoopEnd),
    /// The deploy was canceled between two groups
    Canceled,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn DeployStore>,
        clients: Arc<dyn ClientFactory>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            clients,
            notifier,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn DeployStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a release client for a remote host
    pub fn connect(&self, target: &RemoteTarget) -> EngineResult<Arc<dyn ReleaseClient>> {
        Ok(self.clients.connect(target)?)
    }

    // =========================================================================
    // Running
    // =========================================================================

    /// Run a deploy to its terminal status
    ///
    /// Groups are dispatched in ascending `group_index` order. The status
    /// poller starts once the first project has a pipeline and decides the
    /// final status; a failed dependency or project fails the deploy at once.
    /// Remote failures are recorded on the deploy, not returned.
    ///
    /// Cancel is final. A canceled deploy cannot be run again and yields
    /// `Conflict`; copy it instead. A cancel that lands mid-run is picked up
    /// before the next group and by the poller, and the run ends `canceled`
    /// without interrupting remote calls already in flight.
    pub async fn run_deploy(
        &self,
        deploy_id: i64,
        target: &RemoteTarget,
    ) -> EngineResult<DeployStatus> {
        let deploy = self
            .store
            .get_deploy(deploy_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("deploy {}", deploy_id)))?;
        if deploy.status == DeployStatus::Canceled {
            return Err(EngineError::Conflict(format!(
                "deploy {} was canceled",
                deploy_id
            )));
        }

        let client = self.connect(target)?;

        self.store
            .set_deploy_status(deploy_id, DeployStatus::Running)
            .await?;
        self.notifier.notify(deploy_id, DeployEvent::DeployStarted);
        tracing::info!(deploy_id, host = %target.host, "Deploy started");

        let mut poller: Option<PollTask> = None;
        let dispatched = self.dispatch_groups(deploy_id, &client, &mut poller).await;

        match dispatched {
            Ok(Dispatch::Completed) => {
                let task = poller.unwrap_or_else(|| self.spawn_poller(&client, deploy_id));
                let end = task.join().await;
                self.conclude(deploy_id, end).await
            }
            Ok(Dispatch::PollerEnded(end)) => self.conclude(deploy_id, end).await,
            Ok(Dispatch::Canceled) => {
                if let Some(task) = poller {
                    task.stop().await;
                }
                tracing::info!(deploy_id, "Deploy canceled, remaining groups skipped");
                Ok(DeployStatus::Canceled)
            }
            Ok(Dispatch::Halted(reason)) => {
                if let Some(task) = poller {
                    task.stop().await;
                }
                self.finish(deploy_id, DeployStatus::Failed, &reason).await
            }
            Err(err) => {
                if let Some(task) = poller {
                    task.stop().await;
                }
                tracing::error!(deploy_id, "Deploy aborted: {}", err);
                self.finish(deploy_id, DeployStatus::Failed, &err.to_string())
                    .await?;
                Err(err)
            }
        }
    }

    async fn dispatch_groups(
        &self,
        deploy_id: i64,
        client: &Arc<dyn ReleaseClient>,
        poller: &mut Option<PollTask>,
    ) -> EngineResult<Dispatch> {
        let groups = self.store.list_groups(deploy_id).await?;

        for group in &groups {
            if let Some(task) = poller.take_if(|task| task.is_finished()) {
                return Ok(Dispatch::PollerEnded(task.join().await));
            }
            if self.is_canceled(deploy_id).await? {
                return Ok(Dispatch::Canceled);
            }

            self.notifier.notify(
                deploy_id,
                DeployEvent::GroupStarted {
                    group_index: group.group_index,
                },
            );
            tracing::info!(deploy_id, group_index = group.group_index, "Group started");

            match self.gate(deploy_id, group, poller).await? {
                Gate::Open => {}
                Gate::Shut => {
                    tracing::error!(
                        deploy_id,
                        group_index = group.group_index,
                        "Dependency group failed"
                    );
                    return Ok(Dispatch::Halted(format!(
                        "dependency of group {} failed",
                        group.group_index
                    )));
                }
                Gate::PollerEnded(end) => {
                    *poller = None;
                    return Ok(Dispatch::PollerEnded(end));
                }
            }

            let projects = self
                .store
                .list_group_projects(deploy_id, group.group_index)
                .await?;
            for project in &projects {
                self.notifier.notify(
                    deploy_id,
                    DeployEvent::ProjectStarted {
                        project_id: project.project_id,
                    },
                );
                tracing::info!(
                    deploy_id,
                    project_id = project.project_id,
                    "Starting project deploy"
                );

                let result = runner::run_one_project(
                    client.as_ref(),
                    self.store.as_ref(),
                    &self.config,
                    project,
                )
                .await;

                if let Err(err) = result {
                    // Store failures are not a project outcome
                    if let EngineError::Store(_) = err {
                        return Err(err);
                    }
                    tracing::error!(
                        deploy_id,
                        project_id = project.project_id,
                        "Project deploy failed: {}",
                        err
                    );
                    self.store
                        .set_project_status(project.id, DeployStatus::Failed)
                        .await?;
                    self.notifier.notify(
                        deploy_id,
                        DeployEvent::ProjectCompleted {
                            project_id: project.project_id,
                            status: DeployStatus::Failed,
                        },
                    );
                    return Ok(Dispatch::Halted(format!(
                        "project {} failed: {}",
                        project.project_id, err
                    )));
                }

                if poller.is_none() {
                    *poller = Some(self.spawn_poller(client, deploy_id));
                }
            }
        }

        Ok(Dispatch::Completed)
    }

    /// Wait for the group's dependency, unless the poller finishes first
    async fn gate(
        &self,
        deploy_id: i64,
        group: &Group,
        poller: &mut Option<PollTask>,
    ) -> EngineResult<Gate> {
        let Some(depend_type) = group.depend_type else {
            return Ok(Gate::Open);
        };
        let Some(depend_index) = group.depend_group_index else {
            tracing::warn!(
                deploy_id,
                group_index = group.group_index,
                "Group has a depend_type but no dependency group, not waiting"
            );
            return Ok(Gate::Open);
        };

        let wait = waiter::wait_depend_group_ok(
            self.store.as_ref(),
            &self.config,
            deploy_id,
            depend_index,
            depend_type,
        );

        let satisfied = match poller.as_mut() {
            Some(task) => tokio::select! {
                ok = wait => ok?,
                end = task.finished() => return Ok(Gate::PollerEnded(end)),
            },
            None => wait.await?,
        };

        Ok(if satisfied { Gate::Open } else { Gate::Shut })
    }

    fn spawn_poller(&self, client: &Arc<dyn ReleaseClient>, deploy_id: i64) -> PollTask {
        PollTask::spawn(
            Arc::clone(client),
            Arc::clone(&self.store),
            Arc::clone(&self.notifier),
            self.config.clone(),
            deploy_id,
        )
    }

    async fn conclude(&self, deploy_id: i64, end: PollLoopEnd) -> EngineResult<DeployStatus> {
        match end {
            PollLoopEnd::Succeeded => self.finish(deploy_id, DeployStatus::Success, "").await,
            PollLoopEnd::Failed => {
                self.finish(deploy_id, DeployStatus::Failed, "pipeline failed")
                    .await
            }
            PollLoopEnd::TimedOut => {
                self.finish(deploy_id, DeployStatus::Failed, "polling timed out")
                    .await
            }
            PollLoopEnd::Canceled => Ok(DeployStatus::Canceled),
            PollLoopEnd::Stopped => {
                self.finish(deploy_id, DeployStatus::Failed, "polling stopped")
                    .await
            }
            PollLoopEnd::Crashed(reason) => {
                self.finish(deploy_id, DeployStatus::Failed, &reason).await
            }
        }
    }

    async fn is_canceled(&self, deploy_id: i64) -> EngineResult<bool> {
        let deploy = self.store.get_deploy(deploy_id).await?;
        Ok(matches!(deploy, Some(d) if d.status == DeployStatus::Canceled))
    }

    /// Write a terminal status unless the deploy was canceled meanwhile
    async fn finish(
        &self,
        deploy_id: i64,
        status: DeployStatus,
        reason: &str,
    ) -> EngineResult<DeployStatus> {
        if self.is_canceled(deploy_id).await? {
            tracing::info!(deploy_id, "Deploy was canceled, keeping canceled status");
            return Ok(DeployStatus::Canceled);
        }

        self.store.set_deploy_status(deploy_id, status).await?;
        match status {
            DeployStatus::Success => {
                tracing::info!(deploy_id, "Deploy succeeded");
                self.notifier.notify(deploy_id, DeployEvent::DeploySucceeded);
            }
            DeployStatus::Failed => {
                tracing::error!(deploy_id, reason, "Deploy failed");
                self.notifier.notify(
                    deploy_id,
                    DeployEvent::DeployFailed {
                        reason: reason.to_string(),
                    },
                );
            }
            _ => {}
        }
        Ok(status)
    }

    /// Run one poll pass now and apply its outcome to the deploy
    ///
    /// `next` leaves the deploy status untouched.
    pub async fn retry_fetch(
        &self,
        deploy_id: i64,
        target: &RemoteTarget,
    ) -> EngineResult<PollOutcome> {
        self.store
            .get_deploy(deploy_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("deploy {}", deploy_id)))?;

        let client = self.connect(target)?;
        let outcome = poller::poll_and_update_projects(
            client.as_ref(),
            self.store.as_ref(),
            self.notifier.as_ref(),
            deploy_id,
        )
        .await?;

        match outcome {
            PollOutcome::Fail => {
                self.finish(deploy_id, DeployStatus::Failed, "retry fetch found a failed pipeline")
                    .await?;
            }
            PollOutcome::Success => {
                self.finish(deploy_id, DeployStatus::Success, "").await?;
            }
            PollOutcome::Next => {
                tracing::info!(deploy_id, "Retry fetch: deploy still in progress");
            }
        }
        Ok(outcome)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Validate and store a new pending deploy; returns its id
    pub async fn add_full_deploy(&self, payload: NewFullDeploy) -> EngineResult<i64> {
        plan::validate_submission(&payload.groups, &payload.projects)?;

        let body = serde_json::to_string(&payload)
            .map_err(|e| EngineError::Validation(format!("unserializable submission: {}", e)))?;

        let mut ids: Vec<i64> = payload.projects.iter().map(|p| p.project_id).collect();
        ids.sort_unstable();
        ids.dedup();
        let names = self.store.project_names(&ids).await?;

        let record = NewDeployRecord {
            description: payload.description.clone().unwrap_or_default(),
            body,
            groups: payload
                .groups
                .iter()
                .map(|g| group_record(g.group_index, g.depend_group_index, g.depend_type))
                .collect(),
            projects: payload
                .projects
                .iter()
                .map(|p| NewProjectRecord {
                    group_index: p.group_index,
                    project_id: p.project_id,
                    project_name: plan::resolve_name(
                        &names,
                        p.project_id,
                        p.project_name.as_deref(),
                    ),
                    branch: p.branch.clone(),
                    tag_prefix: p.tag_prefix.clone(),
                })
                .collect(),
        };

        let id = self.store.insert_full_deploy(record).await?;
        tracing::info!(
            deploy_id = id,
            groups = payload.groups.len(),
            projects = payload.projects.len(),
            "Deploy created"
        );
        Ok(id)
    }

    /// Clone a deploy into a fresh pending one with runtime fields reset
    pub async fn copy_deploy_from_old(
        &self,
        from_id: i64,
        description: Option<String>,
    ) -> EngineResult<i64> {
        let old = self
            .store
            .get_deploy(from_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("deploy {}", from_id)))?;
        let groups = self.store.list_groups(from_id).await?;
        let projects = self.store.list_projects(from_id).await?;

        let record = NewDeployRecord {
            description: description.unwrap_or(old.description),
            body: old.body,
            groups: groups
                .iter()
                .map(|g| NewGroupRecord {
                    group_index: g.group_index,
                    depend_group_index: g.depend_group_index,
                    depend_type: g.depend_type,
                })
                .collect(),
            projects: projects
                .into_iter()
                .map(|p| NewProjectRecord {
                    group_index: p.group_index,
                    project_id: p.project_id,
                    project_name: p.project_name,
                    branch: p.branch,
                    tag_prefix: p.tag_prefix,
                })
                .collect(),
        };

        let id = self.store.insert_full_deploy(record).await?;
        tracing::info!(deploy_id = id, from_id, "Deploy copied");
        Ok(id)
    }

    /// Upsert one group and reconcile its projects; returns the group id
    pub async fn change_deploy_group_info(&self, change: GroupDeployChange) -> EngineResult<i64> {
        let deploy_id = change.deploy_id;
        self.store
            .get_deploy(deploy_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("deploy {}", deploy_id)))?;

        plan::validate_dependency(
            change.group_index,
            change.depend_group_index,
            change.depend_type,
        )?;
        plan::validate_change_projects(&change.projects)?;

        if let Some(description) = &change.description {
            self.store
                .update_deploy_description(deploy_id, description)
                .await?;
        }

        let record = group_record(
            change.group_index,
            change.depend_group_index,
            change.depend_type,
        );
        let (write, current_index) = match change.group_id {
            Some(id) => {
                let existing = self
                    .store
                    .get_group(id)
                    .await?
                    .filter(|g| g.deploy_id == deploy_id)
                    .ok_or_else(|| EngineError::NotFound(format!("group {}", id)))?;
                (
                    GroupWrite::Update { id, group: record },
                    existing.group_index,
                )
            }
            None => {
                if self
                    .store
                    .find_group(deploy_id, change.group_index)
                    .await?
                    .is_some()
                {
                    return Err(EngineError::Conflict(format!(
                        "group index {} already exists for deploy {}",
                        change.group_index, deploy_id
                    )));
                }
                (GroupWrite::Create(record), change.group_index)
            }
        };

        let current = self
            .store
            .list_group_projects(deploy_id, current_index)
            .await?;
        let ids: Vec<i64> = change.projects.iter().map(|p| p.project_id).collect();
        let names = self.store.project_names(&ids).await?;

        let plan = plan::plan_group_change(deploy_id, write, &current, &change.projects, &names);
        tracing::debug!(
            deploy_id,
            insert = plan.insert.len(),
            update = plan.update.len(),
            delete = plan.delete.len(),
            "Applying group change"
        );
        let group_id = self.store.apply_group_change(plan).await?;

        tracing::info!(deploy_id, group_id, group_index = change.group_index, "Group changed");
        Ok(group_id)
    }

    /// Mark the deploy and all its projects canceled
    ///
    /// Remote pipelines that already run are left alone.
    pub async fn cancel_deploy(&self, deploy_id: i64) -> EngineResult<()> {
        if !self.store.cancel_deploy(deploy_id).await? {
            return Err(EngineError::NotFound(format!("deploy {}", deploy_id)));
        }
        self.notifier.notify(deploy_id, DeployEvent::DeployCanceled);
        tracing::info!(deploy_id, "Deploy canceled");
        Ok(())
    }
}

enum Gate {
    Open,
    Shut,
    PollerEnded(PollLoopEnd),
}
