//! Check command implementation

use colored::Colorize;
use webperm_core::{CheckStatus, Checker, DriftItem, Settings, StateModel};
use webperm_fs::SystemOps;

use crate::error::Result;

/// Run the check command
///
/// Compares the live site against its model without changing anything.
pub fn run_check(settings: &Settings, json: bool) -> Result<()> {
    let ops = SystemOps::new();
    let model = StateModel::build(settings.resolve(&ops)?)?;
    let report = Checker::new(&ops).check(&model)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} Checking {}...",
        "=>".blue().bold(),
        model.params.document_root.display()
    );

    match report.status {
        CheckStatus::Healthy => {
            println!("{} Site is healthy. No drift detected.", "OK".green().bold());
        }
        CheckStatus::Missing => {
            println!("{} Some managed paths are missing:", "MISSING".yellow().bold());
            print_items(&report.missing, "-");
            println!();
            println!("Run {} to repair.", "webperm apply".cyan());
        }
        CheckStatus::Drifted => {
            println!("{} Permissions have drifted:", "DRIFTED".red().bold());
            print_items(&report.drifted, "!");
            if !report.missing.is_empty() {
                println!();
                println!("{} Also missing:", "MISSING".yellow().bold());
                print_items(&report.missing, "-");
            }
            println!();
            println!("Run {} to repair.", "webperm apply".cyan());
        }
    }

    Ok(())
}

fn print_items(items: &[DriftItem], marker: &str) {
    for item in items {
        println!(
            "   {} {} ({}): {}",
            marker.yellow(),
            item.path.cyan(),
            item.class.to_string().dimmed(),
            item.description
        );
    }
}
