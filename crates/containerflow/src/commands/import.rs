use crate::context::Project;
use crate::output;
use colored::Colorize;
use containerflow_cloud::{TrackedContainer, plan_container};

pub async fn handle(project: &Project, key: &str, id: &str) -> anyhow::Result<()> {
    let manager = project.state();
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    if let Some(existing) = state.key_for_id(id) {
        let existing = existing.to_string();
        lock.release().await?;
        anyhow::bail!("{} is already tracked as {}", id, existing);
    }
    if state.get(key).is_some_and(|t| !t.is_absent()) {
        lock.release().await?;
        anyhow::bail!("{} already tracks a container", key);
    }

    let reconciler = project.reconciler()?;
    let mut tracked = TrackedContainer::existing(id);
    let record = reconciler.read(&mut tracked).await?;
    state.set(key, tracked.clone());
    manager.save(&state).await?;
    lock.release().await?;

    println!("{} imported {}", "✓".green(), key.cyan());
    output::print_record(key, &record);

    if let Some(desired) = project.document.get(key) {
        let actions = plan_container(key, Some(&tracked), desired, None)?;
        println!();
        println!("{}", "Next apply:".bold());
        for action in &actions {
            output::print_action(action);
        }
    }
    Ok(())
}
