//! Submission checks and write planning
//!
//! Pure functions: they decide what to write, the orchestrator writes it.

use convoy_core::domain::{DependType, DeployProject};
use convoy_core::dto::deploy::{ChangeProject, NewGroup, NewProject};
use std::collections::{HashMap, HashSet};

use super::{EngineError, EngineResult};
use crate::store::{GroupChangePlan, GroupWrite, NewGroupRecord, NewProjectRecord, ProjectUpdate};

/// Reject a deploy submission that could never run as intended
pub fn validate_submission(groups: &[NewGroup], projects: &[NewProject]) -> EngineResult<()> {
    let mut indexes = HashSet::new();
    for group in groups {
        if !indexes.insert(group.group_index) {
            return Err(EngineError::Validation(format!(
                "group index {} appears more than once",
                group.group_index
            )));
        }
        validate_dependency(group.group_index, group.depend_group_index, group.depend_type)?;
    }

    for project in projects {
        if !indexes.contains(&project.group_index) {
            return Err(EngineError::Validation(format!(
                "project {} references missing group {}",
                project.project_id, project.group_index
            )));
        }
        validate_release(project.project_id, &project.branch, &project.tag_prefix)?;
    }

    Ok(())
}

/// A dependency must point at an earlier group, and a gate needs a target
pub fn validate_dependency(
    group_index: i32,
    depend_group_index: Option<i32>,
    depend_type: Option<DependType>,
) -> EngineResult<()> {
    match (depend_group_index, depend_type) {
        (Some(dep), _) if dep >= group_index => Err(EngineError::Validation(format!(
            "group {} cannot depend on group {}",
            group_index, dep
        ))),
        (None, Some(depend_type)) => Err(EngineError::Validation(format!(
            "group {} has depend_type {} but no depend_group_index",
            group_index, depend_type
        ))),
        _ => Ok(()),
    }
}

fn validate_release(project_id: i64, branch: &str, tag_prefix: &str) -> EngineResult<()> {
    if branch.trim().is_empty() {
        return Err(EngineError::Validation(format!(
            "project {} has no branch",
            project_id
        )));
    }
    if tag_prefix.trim().is_empty() {
        return Err(EngineError::Validation(format!(
            "project {} has no tag prefix",
            project_id
        )));
    }
    Ok(())
}

/// Check a group change's target project list
pub fn validate_change_projects(projects: &[ChangeProject]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for project in projects {
        if !seen.insert(project.project_id) {
            return Err(EngineError::Validation(format!(
                "project {} listed twice",
                project.project_id
            )));
        }
        validate_release(project.project_id, &project.branch, &project.tag_prefix)?;
    }
    Ok(())
}

/// Registry name first, then the caller's name, then nothing
pub fn resolve_name(names: &HashMap<i64, String>, project_id: i64, given: Option<&str>) -> String {
    names
        .get(&project_id)
        .cloned()
        .or_else(|| given.map(str::to_string))
        .unwrap_or_default()
}

/// Reconcile the projects currently stored for a group against a target list
///
/// Projects are matched by `project_id`: matches are updated in place (and
/// follow the group to its new index), stored projects missing from the
/// target are deleted and new targets are inserted as pending.
pub fn plan_group_change(
    deploy_id: i64,
    group: GroupWrite,
    current: &[DeployProject],
    target: &[ChangeProject],
    names: &HashMap<i64, String>,
) -> GroupChangePlan {
    let group_index = match &group {
        GroupWrite::Create(g) => g.group_index,
        GroupWrite::Update { group: g, .. } => g.group_index,
    };

    let by_project: HashMap<i64, &DeployProject> =
        current.iter().map(|p| (p.project_id, p)).collect();
    let wanted: HashSet<i64> = target.iter().map(|p| p.project_id).collect();

    let mut insert = Vec::new();
    let mut update = Vec::new();
    for project in target {
        match by_project.get(&project.project_id) {
            Some(existing) => update.push(ProjectUpdate {
                id: existing.id,
                group_index,
                branch: project.branch.clone(),
                tag_prefix: project.tag_prefix.clone(),
            }),
            None => insert.push(NewProjectRecord {
                group_index,
                project_id: project.project_id,
                project_name: resolve_name(
                    names,
                    project.project_id,
                    project.project_name.as_deref(),
                ),
                branch: project.branch.clone(),
                tag_prefix: project.tag_prefix.clone(),
            }),
        }
    }

    let delete = current
        .iter()
        .filter(|p| !wanted.contains(&p.project_id))
        .map(|p| p.id)
        .collect();

    GroupChangePlan {
        deploy_id,
        group,
        insert,
        update,
        delete,
    }
}

/// Group row fields of a change request
pub fn group_record(
    group_index: i32,
    depend_group_index: Option<i32>,
    depend_type: Option<DependType>,
) -> NewGroupRecord {
    NewGroupRecord {
        group_index,
        depend_group_index,
        depend_type,
    }
}
