//! Status Poller
//!
//! One pass mirrors every in-flight pipeline of a deploy and derives the
//! deploy outcome. [`PollTask`] repeats passes in the background until the
//! deploy converged, the round budget is spent or the task is stopped.

use convoy_client::ReleaseClient;
use convoy_core::domain::{DeployStatus, RemoteState};
use convoy_core::dto::deploy::PollOutcome;
use convoy_core::dto::event::DeployEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::runner::mirror_pipeline;
use super::{EngineResult, Notifier};
use crate::config::EngineConfig;
use crate::store::DeployStore;

/// Poll every project of the deploy once and update its status
///
/// The first failed or canceled pipeline ends the pass with
/// [`PollOutcome::Fail`]; later projects are not looked at. `Success` needs
/// every project to be successful in this same pass.
pub async fn poll_and_update_projects(
    client: &dyn ReleaseClient,
    store: &dyn DeployStore,
    notifier: &dyn Notifier,
    deploy_id: i64,
) -> EngineResult<PollOutcome> {
    let projects = store.list_projects(deploy_id).await?;
    let mut all_success = true;

    for project in &projects {
        let Some(pipeline_id) = project.pipeline_id else {
            all_success = false;
            continue;
        };

        let pipeline =
            mirror_pipeline(client, store, deploy_id, project.project_id, pipeline_id).await?;

        let status = match RemoteState::normalize(&pipeline.status) {
            RemoteState::Success => DeployStatus::Success,
            state if state.is_failure() => DeployStatus::Failed,
            _ => DeployStatus::Running,
        };
        store.set_project_status(project.id, status).await?;

        if status != project.status && status.is_terminal() {
            notifier.notify(
                deploy_id,
                DeployEvent::ProjectCompleted {
                    project_id: project.project_id,
                    status,
                },
            );
        }

        match status {
            DeployStatus::Failed => {
                tracing::warn!(
                    deploy_id,
                    project_id = project.project_id,
                    pipeline_id,
                    pipeline_status = %pipeline.status,
                    "Pipeline failed"
                );
                return Ok(PollOutcome::Fail);
            }
            DeployStatus::Success => {}
            _ => all_success = false,
        }
    }

    Ok(if all_success {
        PollOutcome::Success
    } else {
        PollOutcome::Next
    })
}

/// Why a background poll loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollLoopEnd {
    Succeeded,
    Failed,
    /// Round budget spent without convergence
    TimedOut,
    /// The deploy was canceled while polling
    Canceled,
    /// Stopped by its owner
    Stopped,
    /// The task panicked or lost its deploy
    Crashed(String),
}

/// Handle on a background poll loop
///
/// The loop keeps running only while this handle is alive; dropping it stops
/// the loop at its next suspension point.
#[derive(Debug)]
pub struct PollTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<PollLoopEnd>,
}

impl PollTask {
    pub fn spawn(
        client: Arc<dyn ReleaseClient>,
        store: Arc<dyn DeployStore>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
        deploy_id: i64,
    ) -> Self {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            poll_loop(
                client.as_ref(),
                store.as_ref(),
                notifier.as_ref(),
                &config,
                deploy_id,
                stop_rx,
            )
            .await
        });
        tracing::info!(deploy_id, "Deploy polling started");
        Self { stop, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to end on its own
    pub async fn join(self) -> PollLoopEnd {
        let PollTask { stop, handle } = self;
        let end = joined(handle.await);
        drop(stop);
        end
    }

    /// Wait for the loop without consuming the handle
    ///
    /// Must not be awaited again once it returned.
    pub async fn finished(&mut self) -> PollLoopEnd {
        joined((&mut self.handle).await)
    }

    /// Ask the loop to stop and wait until it did
    pub async fn stop(self) -> PollLoopEnd {
        let PollTask { stop, handle } = self;
        // A loop that already ended dropped its receiver
        let _ = stop.send(true);
        joined(handle.await)
    }
}

fn joined(result: Result<PollLoopEnd, tokio::task::JoinError>) -> PollLoopEnd {
    result.unwrap_or_else(|err| PollLoopEnd::Crashed(err.to_string()))
}

async fn poll_loop(
    client: &dyn ReleaseClient,
    store: &dyn DeployStore,
    notifier: &dyn Notifier,
    config: &EngineConfig,
    deploy_id: i64,
    mut stop: watch::Receiver<bool>,
) -> PollLoopEnd {
    let rounds = config.max_poll_rounds.max(1);

    for round in 1..=rounds {
        if *stop.borrow() {
            return PollLoopEnd::Stopped;
        }

        match store.get_deploy(deploy_id).await {
            Ok(Some(deploy)) if deploy.status == DeployStatus::Canceled => {
                tracing::info!(deploy_id, round, "Deploy canceled, polling stops");
                return PollLoopEnd::Canceled;
            }
            Ok(Some(_)) => {}
            Ok(None) => return PollLoopEnd::Crashed(format!("deploy {} vanished", deploy_id)),
            Err(err) => tracing::warn!(deploy_id, round, "Failed to load deploy: {}", err),
        }

        tracing::debug!(deploy_id, round, "Deploy polling round");
        let outcome = match poll_and_update_projects(client, store, notifier, deploy_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(deploy_id, round, "Poll round failed: {}", err);
                PollOutcome::Next
            }
        };
        notifier.notify(deploy_id, DeployEvent::PollingUpdate { round, outcome });

        match outcome {
            PollOutcome::Success => return PollLoopEnd::Succeeded,
            PollOutcome::Fail => return PollLoopEnd::Failed,
            PollOutcome::Next => {}
        }

        if round < rounds {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                _ = stop.changed() => return PollLoopEnd::Stopped,
            }
        }
    }

    tracing::warn!(deploy_id, rounds, "Deploy polling exhausted");
    PollLoopEnd::TimedOut
}
