use crate::context::Project;
use colored::Colorize;

pub async fn handle(project: &Project) -> anyhow::Result<()> {
    let manager = project.state();
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;
    let reconciler = project.reconciler()?;

    let keys: Vec<String> = state.containers.keys().cloned().collect();
    let mut vanished = Vec::new();
    for key in keys {
        let tracked = state.entry(&key);
        if tracked.is_absent() {
            continue;
        }
        match reconciler.read(tracked).await {
            Ok(record) => println!("{} {} {}", "✓".green(), key.cyan(), record.revision),
            Err(e) if e.is_not_found() => {
                println!("{} {} no longer exists", "-".red(), key.cyan());
                vanished.push(key);
            }
            Err(e) => eprintln!("{} {}: {}", "✗".red(), key.cyan(), e),
        }
    }

    for key in &vanished {
        state.remove(key);
    }
    state.prune_absent();
    manager.save(&state).await?;
    lock.release().await?;
    Ok(())
}
