//! In-memory fakes for the engine's collaborators (testing only)
//!
//! `ScriptedReleaseClient` plays back a scripted pipeline history per project,
//! `StaticClientFactory` hands it out for any remote target and
//! `RecordingNotifier` keeps every event for later assertions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use convoy_client::{ClientError, ClientFactory, ReleaseClient, tag_name};
use convoy_core::dto::event::{DeployEvent, DeployEventEnvelope};
use convoy_core::dto::remote::{RemoteJob, RemotePipeline, RemoteTarget, RemoteUser};

use crate::engine::Notifier;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// RecordingNotifier
// ---------------------------------------------------------------------------

/// Notifier that remembers every event in order
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<DeployEventEnvelope>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DeployEventEnvelope> {
        lock(&self.events).clone()
    }

    /// Events of one deploy, without the envelope
    pub fn events_for(&self, deploy_id: i64) -> Vec<DeployEvent> {
        lock(&self.events)
            .iter()
            .filter(|e| e.deploy_id == deploy_id)
            .map(|e| e.event.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, deploy_id: i64, event: DeployEvent) {
        lock(&self.events).push(DeployEventEnvelope { deploy_id, event });
    }
}

// ---------------------------------------------------------------------------
// ScriptedReleaseClient
// ---------------------------------------------------------------------------

/// State of a remote pipeline at one point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub status: String,
    pub jobs: Vec<RemoteJob>,
}

impl Snapshot {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            jobs: Vec::new(),
        }
    }

    /// Add a job; ids must be unique across the whole script
    pub fn job(mut self, id: i64, name: &str, stage: &str, status: &str) -> Self {
        let now = Utc::now();
        self.jobs.push(RemoteJob {
            id,
            name: name.to_string(),
            stage: stage.to_string(),
            status: status.to_string(),
            created_at: Some(now),
            updated_at: Some(now),
            finished_at: None,
            web_url: format!("https://ci.example.test/jobs/{}", id),
        });
        self
    }
}

#[derive(Debug)]
struct ScriptedPipeline {
    project_id: i64,
    snapshots: Vec<Snapshot>,
    served: Option<usize>,
}

impl ScriptedPipeline {
    fn current(&self) -> &Snapshot {
        &self.snapshots[self.served.unwrap_or(0)]
    }
}

#[derive(Debug, Default)]
struct Script {
    next_pipeline_id: i64,
    histories: HashMap<i64, Vec<Snapshot>>,
    lookup_failures: HashMap<i64, u32>,
    lookup_rejections: HashMap<i64, u16>,
    failing_tags: Vec<i64>,
    branches: HashMap<i64, Vec<String>>,
    pipelines: HashMap<i64, ScriptedPipeline>,
    by_tag: HashMap<(i64, String), i64>,
    tags_created: HashMap<i64, u32>,
    lookups: HashMap<i64, u32>,
    detail_calls: HashMap<i64, u32>,
}

/// Release client replaying scripted pipeline histories
///
/// Every `pipeline_detail` call moves that pipeline one snapshot forward and
/// stays on the last one; `jobs_by_pipeline` reports the jobs of the snapshot
/// served last. Projects without a script get a pipeline that succeeds at
/// once.
#[derive(Debug, Default)]
pub struct ScriptedReleaseClient {
    script: Mutex<Script>,
}

impl ScriptedReleaseClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline history of the next pipeline created for `project_id`
    pub fn script(&self, project_id: i64, snapshots: Vec<Snapshot>) -> &Self {
        lock(&self.script).histories.insert(project_id, snapshots);
        self
    }

    /// Let the next `times` pipeline lookups of `project_id` fail
    pub fn fail_pipeline_lookup(&self, project_id: i64, times: u32) -> &Self {
        lock(&self.script).lookup_failures.insert(project_id, times);
        self
    }

    /// Answer every pipeline lookup of `project_id` with HTTP `status`
    pub fn reject_pipeline_lookup(&self, project_id: i64, status: u16) -> &Self {
        lock(&self.script).lookup_rejections.insert(project_id, status);
        self
    }

    /// Reject every tag creation for `project_id`
    pub fn fail_create_tag(&self, project_id: i64) -> &Self {
        lock(&self.script).failing_tags.push(project_id);
        self
    }

    pub fn branches(&self, project_id: i64, names: &[&str]) -> &Self {
        lock(&self.script)
            .branches
            .insert(project_id, names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn tags_created(&self, project_id: i64) -> u32 {
        lock(&self.script).tags_created.get(&project_id).copied().unwrap_or(0)
    }

    pub fn pipeline_lookups(&self, project_id: i64) -> u32 {
        lock(&self.script).lookups.get(&project_id).copied().unwrap_or(0)
    }

    /// How often the pipelines of `project_id` were fetched
    pub fn detail_calls(&self, project_id: i64) -> u32 {
        lock(&self.script).detail_calls.get(&project_id).copied().unwrap_or(0)
    }

    fn pipeline<'a>(
        script: &'a mut Script,
        project_id: i64,
        pipeline_id: i64,
    ) -> Result<&'a mut ScriptedPipeline, ClientError> {
        script
            .pipelines
            .get_mut(&pipeline_id)
            .filter(|p| p.project_id == project_id)
            .ok_or_else(|| {
                ClientError::api_error(404, format!("pipelines/{}", pipeline_id), "404 Not found")
            })
    }
}

#[async_trait]
impl ReleaseClient for ScriptedReleaseClient {
    async fn create_tag(
        &self,
        project_id: i64,
        _branch: &str,
        tag_prefix: &str,
    ) -> convoy_client::Result<String> {
        let mut script = lock(&self.script);
        if script.failing_tags.contains(&project_id) {
            return Err(ClientError::api_error(
                400,
                format!("projects/{}/repository/tags", project_id),
                "Tag already exists",
            ));
        }
        *script.tags_created.entry(project_id).or_default() += 1;
        Ok(tag_name(tag_prefix, &Utc::now()))
    }

    async fn pipeline_id_by_tag(&self, project_id: i64, tag: &str) -> convoy_client::Result<i64> {
        let mut script = lock(&self.script);
        *script.lookups.entry(project_id).or_default() += 1;

        if let Some(status) = script.lookup_rejections.get(&project_id) {
            return Err(ClientError::api_error(*status, "pipelines", "rejected"));
        }

        if let Some(left) = script.lookup_failures.get_mut(&project_id) {
            if *left > 0 {
                *left -= 1;
                return Err(ClientError::NotFound(format!("no pipeline for tag {}", tag)));
            }
        }

        let key = (project_id, tag.to_string());
        if let Some(id) = script.by_tag.get(&key) {
            return Ok(*id);
        }

        script.next_pipeline_id += 1;
        let id = 1000 + script.next_pipeline_id;
        let snapshots = script
            .histories
            .remove(&project_id)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| vec![Snapshot::new("success")]);
        script.pipelines.insert(
            id,
            ScriptedPipeline {
                project_id,
                snapshots,
                served: None,
            },
        );
        script.by_tag.insert(key, id);
        Ok(id)
    }

    async fn pipeline_detail(
        &self,
        project_id: i64,
        pipeline_id: i64,
    ) -> convoy_client::Result<RemotePipeline> {
        let mut script = lock(&self.script);
        *script.detail_calls.entry(project_id).or_default() += 1;

        let pipeline = Self::pipeline(&mut script, project_id, pipeline_id)?;
        let last = pipeline.snapshots.len() - 1;
        let next = pipeline.served.map(|i| (i + 1).min(last)).unwrap_or(0);
        pipeline.served = Some(next);

        let now = Utc::now();
        Ok(RemotePipeline {
            id: pipeline_id,
            status: pipeline.current().status.clone(),
            user: Some(RemoteUser {
                username: "release-bot".to_string(),
            }),
            created_at: Some(now),
            updated_at: Some(now),
        })
    }

    async fn jobs_by_pipeline(
        &self,
        project_id: i64,
        pipeline_id: i64,
    ) -> convoy_client::Result<Vec<RemoteJob>> {
        let mut script = lock(&self.script);
        let pipeline = Self::pipeline(&mut script, project_id, pipeline_id)?;
        Ok(pipeline.current().jobs.clone())
    }

    async fn query_branches(
        &self,
        project_id: i64,
        search: Option<&str>,
    ) -> convoy_client::Result<Vec<String>> {
        let script = lock(&self.script);
        let branches = script.branches.get(&project_id).cloned().unwrap_or_default();
        Ok(match search {
            Some(term) => branches.into_iter().filter(|b| b.contains(term)).collect(),
            None => branches,
        })
    }
}

// ---------------------------------------------------------------------------
// StaticClientFactory
// ---------------------------------------------------------------------------

/// Hands out the same client for every remote target
pub struct StaticClientFactory {
    client: Arc<dyn ReleaseClient>,
}

impl StaticClientFactory {
    pub fn new(client: Arc<dyn ReleaseClient>) -> Self {
        Self { client }
    }
}

impl ClientFactory for StaticClientFactory {
    fn connect(&self, _target: &RemoteTarget) -> convoy_client::Result<Arc<dyn ReleaseClient>> {
        Ok(Arc::clone(&self.client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshots_advance_and_stick() {
        let client = ScriptedReleaseClient::new();
        client.script(
            7,
            vec![
                Snapshot::new("running").job(1, "build", "build", "running"),
                Snapshot::new("success").job(1, "build", "build", "success"),
            ],
        );

        let pipeline_id = client.pipeline_id_by_tag(7, "v-1").await.unwrap();
        assert_eq!(client.pipeline_id_by_tag(7, "v-1").await.unwrap(), pipeline_id);

        assert_eq!(client.pipeline_detail(7, pipeline_id).await.unwrap().status, "running");
        assert_eq!(client.jobs_by_pipeline(7, pipeline_id).await.unwrap()[0].status, "running");
        assert_eq!(client.pipeline_detail(7, pipeline_id).await.unwrap().status, "success");
        assert_eq!(client.pipeline_detail(7, pipeline_id).await.unwrap().status, "success");
        assert_eq!(client.jobs_by_pipeline(7, pipeline_id).await.unwrap()[0].status, "success");
    }

    #[tokio::test]
    async fn test_lookup_failures_run_out() {
        let client = ScriptedReleaseClient::new();
        client.fail_pipeline_lookup(3, 2);

        assert!(client.pipeline_id_by_tag(3, "t").await.unwrap_err().is_not_found());
        assert!(client.pipeline_id_by_tag(3, "t").await.is_err());
        assert!(client.pipeline_id_by_tag(3, "t").await.is_ok());
        assert_eq!(client.pipeline_lookups(3), 3);
    }

    #[test]
    fn test_recording_notifier_filters_by_deploy() {
        let notifier = RecordingNotifier::new();
        notifier.notify(1, DeployEvent::DeployStarted);
        notifier.notify(2, DeployEvent::DeployCanceled);

        assert_eq!(notifier.events().len(), 2);
        assert_eq!(notifier.events_for(2), vec![DeployEvent::DeployCanceled]);
    }
}
