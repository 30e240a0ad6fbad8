use crate::context::Project;
use crate::output;
use colored::Colorize;

pub async fn handle(project: &Project) -> anyhow::Result<()> {
    let state = project.state().load().await?;
    let plan = super::build_plan(project, &state)?;

    println!("{}", "Plan:".bold());
    for action in &plan.actions {
        output::print_action(action);
    }
    for key in super::orphans(project, &state) {
        println!(
            "  {} {} is tracked but not declared; `cflow destroy {}` removes it",
            "!".yellow().bold(),
            key.cyan(),
            key
        );
    }
    println!();
    println!("{}", plan.summary());

    Ok(())
}
