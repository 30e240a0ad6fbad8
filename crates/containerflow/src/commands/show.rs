use crate::context::Project;
use crate::output;

pub async fn handle(project: &Project, key: Option<&str>) -> anyhow::Result<()> {
    let state = project.state().load().await?;

    if let Some(key) = key {
        let tracked = state
            .get(key)
            .ok_or_else(|| anyhow::anyhow!("{} is not tracked", key))?;
        output::print_tracked(key, tracked);
        return Ok(());
    }

    if state.containers.is_empty() {
        println!("No tracked containers");
        return Ok(());
    }
    for (key, tracked) in &state.containers {
        output::print_tracked(key, tracked);
        println!();
    }
    Ok(())
}
