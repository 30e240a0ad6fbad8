use crate::context::Project;
use crate::output;
use colored::Colorize;
use containerflow_cloud::plan_destroy;

pub async fn handle(project: &Project, key: &str, yes: bool) -> anyhow::Result<()> {
    let manager = project.state();
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let Some(tracked) = state.get(key) else {
        lock.release().await?;
        anyhow::bail!("{} is not tracked", key);
    };

    output::print_action(&plan_destroy(key, tracked));
    if !yes {
        println!();
        println!("{}", "→ run with --yes to delete".yellow());
        lock.release().await?;
        return Ok(());
    }

    let reconciler = project.reconciler()?;
    let outcome = reconciler.delete(state.entry(key)).await;
    if outcome.is_ok() {
        state.remove(key);
    }
    manager.save(&state).await?;
    lock.release().await?;

    outcome?;
    println!("{} {} deleted", "✓".green(), key.cyan());
    Ok(())
}
