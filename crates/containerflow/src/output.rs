use colored::Colorize;
use containerflow_cloud::{Action, ActionType, LifecyclePhase, ObservableRecord, TrackedContainer};

pub fn print_action(action: &Action) {
    let symbol = match action.action_type {
        ActionType::Create => "+".green().bold(),
        ActionType::Replace => "±".red().bold(),
        ActionType::UpdateMetadata | ActionType::DeployRevision => "~".yellow().bold(),
        ActionType::Delete => "-".red().bold(),
        ActionType::Read => "?".cyan(),
        ActionType::NoOp => " ".normal(),
    };
    println!(
        "  {} {} {} {}",
        symbol,
        action.key.cyan(),
        format!("[{}]", action.action_type).dimmed(),
        action.description
    );
}

pub fn print_record(key: &str, record: &ObservableRecord) {
    println!("{}", key.cyan().bold());
    println!("  id:         {}", record.id);
    println!("  name:       {}", record.config.name);
    println!("  folder:     {}", record.folder_id);
    println!("  url:        {}", record.url);
    println!("  revision:   {}", record.revision);
    println!("  image:      {}", record.config.image.url);
    if let Some(digest) = &record.image_digest {
        println!("  digest:     {}", digest.dimmed());
    }
    println!("  memory:     {} MB", record.config.memory);
    if let Some(cores) = record.config.cores {
        println!(
            "  cores:      {} ({}%)",
            cores,
            record.config.core_fraction.unwrap_or(100)
        );
    }
    if let Some(timeout) = &record.config.execution_timeout {
        println!("  timeout:    {}", timeout);
    }
    if let Some(created_at) = record.created_at {
        println!("  created:    {}", created_at.to_rfc3339());
    }
}

pub fn print_tracked(key: &str, tracked: &TrackedContainer) {
    match &tracked.record {
        Some(record) => print_record(key, record),
        None => {
            println!("{}", key.cyan().bold());
            println!(
                "  id:         {}",
                tracked.id.as_deref().unwrap_or("(none)")
            );
        }
    }
    println!("  phase:      {}", phase(tracked.phase));
}

fn phase(phase: LifecyclePhase) -> colored::ColoredString {
    match phase {
        LifecyclePhase::Active => phase.to_string().green(),
        LifecyclePhase::Failed => phase.to_string().red(),
        LifecyclePhase::Absent => phase.to_string().dimmed(),
        _ => phase.to_string().yellow(),
    }
}
