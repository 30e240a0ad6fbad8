use crate::context::Project;
use colored::Colorize;
use containerflow_cloud::build_revision_payload;
use containerflow_cloud::units::{MEMORY_GRANULARITY_MB, is_aligned_memory};

pub fn handle(project: &Project) -> anyhow::Result<()> {
    println!("{}", "Validating...".blue());
    println!("File: {}", project.file.display().to_string().cyan());

    let mut errors = 0;
    for (key, desired) in project.document.iter() {
        match build_revision_payload(desired) {
            Ok(_) => println!("  {} {} ({} MB, {})", "✓".green(), key.cyan(), desired.memory, desired.image.url),
            Err(e) => {
                errors += 1;
                eprintln!("  {} {}: {}", "✗".red(), key.cyan(), e);
            }
        }
        if !is_aligned_memory(desired.memory) {
            println!(
                "    {} memory {} MB is not a multiple of {} MB",
                "⚠".yellow(),
                desired.memory,
                MEMORY_GRANULARITY_MB
            );
        }
        if desired.folder_id.is_none() && project.settings.folder_id.is_none() {
            errors += 1;
            eprintln!(
                "  {} {}: no folder_id and no default folder configured",
                "✗".red(),
                key.cyan()
            );
        }
    }

    if errors > 0 {
        anyhow::bail!("{} problem(s) found", errors);
    }
    println!("{}", "✓ container file is valid".green().bold());
    Ok(())
}
