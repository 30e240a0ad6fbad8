use crate::context::Project;
use crate::output;
use colored::Colorize;
use containerflow_cloud::ApplyResult;
use std::time::Instant;

pub async fn handle(project: &Project, yes: bool) -> anyhow::Result<()> {
    let manager = project.state();
    let lock = manager.acquire_lock().await?;
    let mut state = manager.load().await?;

    let plan = super::build_plan(project, &state)?;
    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        output::print_action(action);
    }
    println!();
    println!("{}", plan.summary());

    if !yes {
        println!();
        println!("{}", "→ run with --yes to apply".yellow());
        lock.release().await?;
        return Ok(());
    }

    let reconciler = project.reconciler()?;
    let started = Instant::now();
    let mut result = ApplyResult::new();

    for (key, desired) in project.document.iter() {
        println!();
        println!("{} {}", "Applying".blue(), key.cyan());

        let tracked = state.entry(key);
        match reconciler.apply(desired, tracked).await {
            Ok(record) => {
                println!("  {} {} ({})", "✓".green(), record.id, record.revision);
                result.add_success(key.as_str(), record.id.clone());
            }
            Err(e) => {
                eprintln!("  {} {}", "✗".red(), e);
                result.add_failure(key.as_str(), e.to_string());
            }
        }

        // identities assigned by a failed pass must survive too
        manager.save(&state).await?;

        if reconciler.cancellation_token().is_cancelled() {
            break;
        }
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    lock.release().await?;

    println!();
    println!(
        "{} succeeded, {} failed in {:.1}s",
        result.succeeded.len().to_string().green(),
        result.failed.len().to_string().red(),
        result.duration_ms as f64 / 1000.0
    );

    if !result.is_success() {
        anyhow::bail!("{} container(s) failed to apply", result.failed.len());
    }
    Ok(())
}
