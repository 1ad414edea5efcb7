use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

use crate::audit::{self, Baseline, DiffReport, ModifiedReport, ScheduleChange, SnapshotJob};
use crate::context::CallContext;
use crate::settings::Settings;
use crate::store::ScheduleStore;

#[derive(Debug, Parser)]
#[command(name = "pfa-schedule", version, about = "Gym class schedule service and audit jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API (the default)
    Serve,
    /// List class instances modified within the last N days
    CheckModified {
        /// Days to look back; defaults to APP_MODIFIED_WINDOW_DAYS
        #[arg(long)]
        days: Option<i64>,
    },
    /// Diff the schedule against the previous snapshot, then rewrite the snapshot
    DetectChanges {
        /// Snapshot file; defaults to APP_SNAPSHOT_PATH
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
}

async fn open_store(settings: &Settings) -> anyhow::Result<ScheduleStore> {
    ScheduleStore::connect(&settings.database_url, settings.database_max_connections)
        .await
        .with_context(|| format!("failed to open database {}", settings.database_url))
}

pub async fn check_modified(settings: &Settings, days: Option<i64>) -> anyhow::Result<ModifiedReport> {
    let days = days.unwrap_or(settings.modified_window_days);
    anyhow::ensure!(days >= 0, "--days must not be negative");

    let store = open_store(settings).await?;
    let ctx = CallContext::job("check-modified");
    let report = audit::recently_modified(&store, &ctx, days, Utc::now()).await?;

    if report.instances.is_empty() {
        println!("No classes have been modified in the last {days} days.");
    } else {
        println!(
            "Found {} classes modified in the last {days} days:",
            report.instances.len()
        );
        for instance in &report.instances {
            println!("  - {instance} (last updated: {})", instance.updated.to_rfc3339());
        }
    }
    Ok(report)
}

pub async fn detect_changes(
    settings: &Settings,
    snapshot: Option<PathBuf>,
) -> anyhow::Result<DiffReport> {
    let path = snapshot.unwrap_or_else(|| PathBuf::from(&settings.snapshot_path));
    let store = open_store(settings).await?;
    let ctx = CallContext::job("detect-changes");

    println!("Running schedule change detection...");
    let report = SnapshotJob::new(path).run(&store, &ctx).await?;

    match &report.baseline {
        Baseline::Missing => println!("No previous snapshot found. Creating initial snapshot."),
        Baseline::Unreadable(err) => println!("Error comparing snapshots: {err}"),
        Baseline::Loaded => {}
    }
    for change in &report.changes {
        match change {
            ScheduleChange::Modified { id, fields } => {
                println!("Detected changes to class {id}:");
                for field in fields {
                    println!("  - {field}");
                }
            }
            other => println!("{other}"),
        }
    }
    if report.saved {
        println!("Schedule snapshot saved");
    } else {
        println!("Error saving snapshot");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["pfa-schedule", "check-modified", "--days", "3"]).unwrap();
        assert!(matches!(cli.command, Some(Command::CheckModified { days: Some(3) })));

        let cli = Cli::try_parse_from(["pfa-schedule", "detect-changes"]).unwrap();
        assert!(matches!(cli.command, Some(Command::DetectChanges { snapshot: None })));

        let cli = Cli::try_parse_from(["pfa-schedule"]).unwrap();
        assert!(cli.command.is_none());
    }
}
