//! In-memory deploy store
//!
//! Backs tests and single-process setups. All state lives behind one mutex;
//! composite writes validate first and mutate afterwards while holding it, so
//! no caller can observe a half-applied change.

use async_trait::async_trait;
use chrono::Utc;
use convoy_core::domain::{
    Deploy, DeployProject, DeployStatus, Group, JobRecord, PipelineRecord, RegistryProject,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{
    DeployStore, GroupChangePlan, GroupWrite, NewDeployRecord, NewProjectRecord, StoreError,
    StoreResult,
};

#[derive(Debug, Default)]
struct State {
    next_deploy_id: i64,
    next_group_id: i64,
    next_project_id: i64,
    deploys: BTreeMap<i64, Deploy>,
    groups: BTreeMap<i64, Group>,
    projects: BTreeMap<i64, DeployProject>,
    pipelines: BTreeMap<i64, PipelineRecord>,
    jobs: BTreeMap<i64, JobRecord>,
    registry: BTreeMap<i64, RegistryProject>,
}

impl State {
    fn next_group(&mut self) -> i64 {
        self.next_group_id += 1;
        self.next_group_id
    }

    fn push_project(&mut self, deploy_id: i64, project: NewProjectRecord) {
        self.next_project_id += 1;
        let id = self.next_project_id;
        self.projects.insert(
            id,
            DeployProject {
                id,
                deploy_id,
                group_index: project.group_index,
                project_id: project.project_id,
                project_name: project.project_name,
                branch: project.branch,
                tag_prefix: project.tag_prefix,
                actual_tag: None,
                pipeline_id: None,
                status: DeployStatus::Pending,
            },
        );
    }

    fn index_taken(&self, deploy_id: i64, group_index: i32, except: Option<i64>) -> bool {
        self.groups.values().any(|g| {
            g.deploy_id == deploy_id && g.group_index == group_index && Some(g.id) != except
        })
    }

    fn touch_deploy(&mut self, id: i64) {
        if let Some(deploy) = self.deploys.get_mut(&id) {
            deploy.updated_at = Utc::now();
        }
    }
}

/// Deploy store kept entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryDeployStore {
    state: Mutex<State>,
}

impl MemoryDeployStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock cannot leave a half-applied write
        // behind because mutations only start after validation.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DeployStore for MemoryDeployStore {
    async fn insert_full_deploy(&self, new: NewDeployRecord) -> StoreResult<i64> {
        let mut state = self.lock();

        let mut seen = Vec::with_capacity(new.groups.len());
        for group in &new.groups {
            if seen.contains(&group.group_index) {
                return Err(StoreError::Conflict(format!(
                    "group index {} repeated",
                    group.group_index
                )));
            }
            seen.push(group.group_index);
        }

        state.next_deploy_id += 1;
        let deploy_id = state.next_deploy_id;
        let now = Utc::now();
        state.deploys.insert(
            deploy_id,
            Deploy {
                id: deploy_id,
                status: DeployStatus::Pending,
                description: new.description,
                body: new.body,
                created_at: now,
                updated_at: now,
            },
        );

        for group in new.groups {
            let id = state.next_group();
            state.groups.insert(
                id,
                Group {
                    id,
                    deploy_id,
                    group_index: group.group_index,
                    depend_group_index: group.depend_group_index,
                    depend_type: group.depend_type,
                },
            );
        }

        for project in new.projects {
            state.push_project(deploy_id, project);
        }

        Ok(deploy_id)
    }

    async fn get_deploy(&self, id: i64) -> StoreResult<Option<Deploy>> {
        Ok(self.lock().deploys.get(&id).cloned())
    }

    async fn list_deploys(&self, offset: i64, limit: i64) -> StoreResult<Vec<Deploy>> {
        let state = self.lock();
        Ok(state
            .deploys
            .values()
            .rev()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn set_deploy_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.deploys.get_mut(&id) {
            Some(deploy) => {
                deploy.status = status;
                deploy.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_deploy_description(&self, id: i64, description: &str) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.deploys.get_mut(&id) {
            Some(deploy) => {
                deploy.description = description.to_string();
                deploy.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_deploy(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.lock();
        let Some(deploy) = state.deploys.get_mut(&id) else {
            return Ok(false);
        };
        deploy.status = DeployStatus::Canceled;
        deploy.updated_at = Utc::now();

        for project in state.projects.values_mut().filter(|p| p.deploy_id == id) {
            project.status = DeployStatus::Canceled;
        }
        Ok(true)
    }

    async fn list_groups(&self, deploy_id: i64) -> StoreResult<Vec<Group>> {
        let state = self.lock();
        let mut groups: Vec<Group> = state
            .groups
            .values()
            .filter(|g| g.deploy_id == deploy_id)
            .cloned()
            .collect();
        groups.sort_by_key(|g| (g.group_index, g.id));
        Ok(groups)
    }

    async fn get_group(&self, id: i64) -> StoreResult<Option<Group>> {
        Ok(self.lock().groups.get(&id).cloned())
    }

    async fn find_group(&self, deploy_id: i64, group_index: i32) -> StoreResult<Option<Group>> {
        let state = self.lock();
        Ok(state
            .groups
            .values()
            .find(|g| g.deploy_id == deploy_id && g.group_index == group_index)
            .cloned())
    }

    async fn apply_group_change(&self, plan: GroupChangePlan) -> StoreResult<i64> {
        let mut state = self.lock();
        let deploy_id = plan.deploy_id;

        if !state.deploys.contains_key(&deploy_id) {
            return Err(StoreError::NotFound(format!("deploy {}", deploy_id)));
        }

        // Validate everything before the first mutation.
        match &plan.group {
            GroupWrite::Create(group) => {
                if state.index_taken(deploy_id, group.group_index, None) {
                    return Err(StoreError::Conflict(format!(
                        "group index {} already exists for deploy {}",
                        group.group_index, deploy_id
                    )));
                }
            }
            GroupWrite::Update { id, group } => {
                match state.groups.get(id) {
                    Some(existing) if existing.deploy_id == deploy_id => {}
                    _ => return Err(StoreError::NotFound(format!("group {}", id))),
                }
                if state.index_taken(deploy_id, group.group_index, Some(*id)) {
                    return Err(StoreError::Conflict(format!(
                        "group index {} already exists for deploy {}",
                        group.group_index, deploy_id
                    )));
                }
            }
        }
        for update in &plan.update {
            if !state.projects.contains_key(&update.id) {
                return Err(StoreError::NotFound(format!("project row {}", update.id)));
            }
        }

        let group_id = match plan.group {
            GroupWrite::Create(group) => {
                let id = state.next_group();
                state.groups.insert(
                    id,
                    Group {
                        id,
                        deploy_id,
                        group_index: group.group_index,
                        depend_group_index: group.depend_group_index,
                        depend_type: group.depend_type,
                    },
                );
                id
            }
            GroupWrite::Update { id, group } => {
                if let Some(existing) = state.groups.get_mut(&id) {
                    existing.group_index = group.group_index;
                    existing.depend_group_index = group.depend_group_index;
                    existing.depend_type = group.depend_type;
                }
                id
            }
        };

        for project in plan.insert {
            state.push_project(deploy_id, project);
        }
        for update in plan.update {
            if let Some(project) = state.projects.get_mut(&update.id) {
                project.group_index = update.group_index;
                project.branch = update.branch;
                project.tag_prefix = update.tag_prefix;
            }
        }
        for id in plan.delete {
            state.projects.remove(&id);
        }
        state.touch_deploy(deploy_id);

        Ok(group_id)
    }

    async fn list_projects(&self, deploy_id: i64) -> StoreResult<Vec<DeployProject>> {
        let state = self.lock();
        Ok(state
            .projects
            .values()
            .filter(|p| p.deploy_id == deploy_id)
            .cloned()
            .collect())
    }

    async fn list_group_projects(
        &self,
        deploy_id: i64,
        group_index: i32,
    ) -> StoreResult<Vec<DeployProject>> {
        let state = self.lock();
        Ok(state
            .projects
            .values()
            .filter(|p| p.deploy_id == deploy_id && p.group_index == group_index)
            .cloned()
            .collect())
    }

    async fn record_project_release(
        &self,
        id: i64,
        actual_tag: &str,
        pipeline_id: i64,
    ) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.projects.get_mut(&id) {
            Some(project) => {
                project.actual_tag = Some(actual_tag.to_string());
                project.pipeline_id = Some(pipeline_id);
                project.status = DeployStatus::Running;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_project_status(&self, id: i64, status: DeployStatus) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.projects.get_mut(&id) {
            Some(project) => {
                project.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_pipeline(&self, pipeline: &PipelineRecord) -> StoreResult<()> {
        self.lock().pipelines.insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn list_pipelines(&self, deploy_id: i64) -> StoreResult<Vec<PipelineRecord>> {
        let state = self.lock();
        Ok(state
            .pipelines
            .values()
            .filter(|p| p.deploy_id == deploy_id)
            .cloned()
            .collect())
    }

    async fn upsert_job(&self, job: &JobRecord) -> StoreResult<()> {
        self.lock().jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn list_jobs(&self, deploy_id: i64) -> StoreResult<Vec<JobRecord>> {
        let state = self.lock();
        Ok(state
            .jobs
            .values()
            .filter(|j| j.deploy_id == deploy_id)
            .cloned()
            .collect())
    }

    async fn list_stage_jobs(
        &self,
        deploy_id: i64,
        pipeline_id: i64,
        stage_like: &str,
    ) -> StoreResult<Vec<JobRecord>> {
        let state = self.lock();
        Ok(state
            .jobs
            .values()
            .filter(|j| {
                j.deploy_id == deploy_id
                    && j.pipeline_id == pipeline_id
                    && j.stage.contains(stage_like)
            })
            .cloned()
            .collect())
    }

    async fn project_names(&self, ids: &[i64]) -> StoreResult<HashMap<i64, String>> {
        let state = self.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.registry.get(id).map(|p| (*id, p.name.clone())))
            .collect())
    }

    async fn list_registry_projects(&self, group_id: i64) -> StoreResult<Vec<RegistryProject>> {
        let state = self.lock();
        Ok(state
            .registry
            .values()
            .filter(|p| p.group_id == group_id)
            .cloned()
            .collect())
    }

    async fn insert_registry_project(&self, project: &RegistryProject) -> StoreResult<()> {
        let mut state = self.lock();
        if state.registry.contains_key(&project.id) {
            return Err(StoreError::Conflict(format!("project {}", project.id)));
        }
        state.registry.insert(project.id, project.clone());
        Ok(())
    }

    async fn delete_registry_project(&self, id: i64) -> StoreResult<bool> {
        Ok(self.lock().registry.remove(&id).is_some())
    }

    async fn update_registry_alias(&self, id: i64, alias: &str) -> StoreResult<bool> {
        let mut state = self.lock();
        match state.registry.get_mut(&id) {
            Some(project) => {
                project.alias = alias.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
