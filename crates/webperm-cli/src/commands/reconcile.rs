//! Apply and replay command implementations
//!
//! Both run a plan through the reconciler against the live host; apply
//! then freezes the plan into the site's repair artifact.

use std::path::{Path, PathBuf};

use colored::Colorize;
use serde::Serialize;
use webperm_core::{
    ArtifactGenerator, Plan, ReconcileOptions, ReconcileReport, Reconciler, Settings, StateModel,
    replay,
};
use webperm_fs::SystemOps;

use crate::error::Result;

#[derive(Serialize)]
struct ApplyOutput<'a> {
    report: &'a ReconcileReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
}

/// Run the apply command
///
/// Reconciles the site; a live run then writes the repair artifact.
pub fn run_apply(settings: &Settings, dry_run: bool, json: bool) -> Result<()> {
    let ops = SystemOps::new();
    let model = StateModel::build(settings.resolve(&ops)?)?;
    let options = ReconcileOptions { dry_run };

    if !json {
        println!(
            "{} Reconciling {}...",
            "=>".blue().bold(),
            model.params.document_root.display()
        );
    }

    let report = Reconciler::new(&ops).reconcile(&model, &options)?;
    let artifact = if dry_run {
        None
    } else {
        let interpreter = super::interpreter()?;
        Some(ArtifactGenerator::new(&ops).generate(&Plan::from_model(&model), &interpreter)?)
    };

    if json {
        let output = ApplyOutput {
            report: &report,
            artifact,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_report(&report);
    if let Some(path) = artifact {
        println!(
            "{} Repair artifact: {}",
            "OK".green().bold(),
            path.display().to_string().cyan()
        );
    }
    Ok(())
}

/// Run the replay command
///
/// Executes the plan embedded in a repair artifact.
pub fn run_replay(artifact: &Path, dry_run: bool, json: bool) -> Result<()> {
    let ops = SystemOps::new();
    if !json {
        println!(
            "{} Replaying {}...",
            "=>".blue().bold(),
            artifact.display()
        );
    }

    let report = replay(&ops, artifact, &ReconcileOptions { dry_run })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    for applied in &report.applied {
        if report.dry_run {
            println!(
                "   {} [dry-run] Would {} ({})",
                "~".yellow(),
                applied.action,
                applied.class.to_string().dimmed()
            );
        } else if applied.changed > 0 {
            println!(
                "   {} {} ({}, {} changed)",
                "+".green(),
                applied.action,
                applied.class.to_string().dimmed(),
                applied.changed
            );
        }
    }

    for tolerated in &report.tolerated {
        println!(
            "   {} {} ({}): {}",
            "!".yellow(),
            tolerated.path.display().to_string().cyan(),
            tolerated.class.to_string().dimmed(),
            tolerated.error
        );
    }

    if report.dry_run {
        println!(
            "{} Dry run: {} actions would run. Nothing was changed.",
            "OK".green().bold(),
            report.applied.len()
        );
    } else if report.effective_changes() == 0 && report.tolerated.is_empty() {
        println!("{} Already in desired state. No changes needed.", "OK".green().bold());
    } else if report.tolerated.is_empty() {
        println!(
            "{} Reconciled: {} entries changed.",
            "OK".green().bold(),
            report.effective_changes()
        );
    } else {
        println!(
            "{} Reconciled with {} refused ACL calls: {} entries changed.",
            "WARN".yellow().bold(),
            report.tolerated.len(),
            report.effective_changes()
        );
    }
}
