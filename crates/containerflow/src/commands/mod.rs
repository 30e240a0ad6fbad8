pub mod apply;
pub mod destroy;
pub mod import;
pub mod plan;
pub mod refresh;
pub mod show;
pub mod validate;

use crate::context::Project;
use containerflow_cloud::{GlobalState, Plan, plan_container};

/// Plan every declared container against the tracked state
pub fn build_plan(project: &Project, state: &GlobalState) -> anyhow::Result<Plan> {
    let default_folder = project.settings.folder_id.as_deref();
    let mut actions = Vec::new();
    for (key, desired) in project.document.iter() {
        let planned = plan_container(key, state.get(key), desired, default_folder)
            .map_err(|e| anyhow::anyhow!("{}: {}", key, e))?;
        actions.extend(planned);
    }
    Ok(Plan::new(actions))
}

/// Tracked keys that are no longer declared
pub fn orphans<'a>(project: &Project, state: &'a GlobalState) -> Vec<&'a str> {
    state
        .containers
        .iter()
        .filter(|(key, tracked)| project.document.get(key).is_none() && !tracked.is_absent())
        .map(|(key, _)| key.as_str())
        .collect()
}
