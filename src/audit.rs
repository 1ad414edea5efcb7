//! Offline schedule audits: the recently-modified report and the snapshot diff.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::context::CallContext;
use crate::models::{ClassInstance, Visibility};
use crate::store::{InstanceQuery, ScheduleStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct ModifiedReport {
    pub days: i64,
    pub cutoff: DateTime<Utc>,
    pub instances: Vec<ClassInstance>,
}

/// Instances whose `updated` timestamp falls within `days` before `now`.
///
/// A window reaching outside the representable date range is a validation error.
pub async fn recently_modified(
    store: &ScheduleStore,
    ctx: &CallContext,
    days: i64,
    now: DateTime<Utc>,
) -> StoreResult<ModifiedReport> {
    let cutoff = Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| StoreError::Validation(format!("window of {days} days is out of range")))?;
    let query = InstanceQuery::new(Visibility::IncludeDeleted).updated_since(cutoff);
    let instances = store.list_instances(&query).await?;

    if instances.is_empty() {
        info!(parent: ctx.span(), days, "AUDIT: No classes have been modified in the last {days} days");
    } else {
        info!(
            parent: ctx.span(),
            days,
            count = instances.len(),
            "AUDIT: Found {} classes modified in the last {days} days",
            instances.len()
        );
        for instance in &instances {
            info!(
                parent: ctx.span(),
                instance_id = instance.id,
                "AUDIT: Class {} ({instance}) was last updated on {}",
                instance.id,
                instance.updated.to_rfc3339()
            );
        }
    }

    Ok(ModifiedReport {
        days,
        cutoff,
        instances,
    })
}

/// Key fields of one instance as written to the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub training_class: String,
    pub weekday: String,
    pub start_time: String,
    pub end_time: String,
    pub updated: String,
}

impl From<&ClassInstance> for SnapshotRecord {
    fn from(instance: &ClassInstance) -> Self {
        Self {
            training_class: instance.class_name.clone(),
            weekday: instance.weekday.to_string(),
            start_time: instance.start_time.format("%H:%M:%S").to_string(),
            end_time: instance.end_time.format("%H:%M:%S").to_string(),
            updated: instance.updated.to_rfc3339(),
        }
    }
}

/// Snapshot keyed by instance id.
pub type Snapshot = BTreeMap<String, SnapshotRecord>;

pub fn build_snapshot(instances: &[ClassInstance]) -> Snapshot {
    instances
        .iter()
        .map(|instance| (instance.id.to_string(), SnapshotRecord::from(instance)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub previous: String,
    pub current: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.previous, self.current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleChange {
    Modified {
        id: String,
        fields: Vec<FieldChange>,
    },
    Deleted {
        id: String,
        training_class: String,
    },
    Added {
        id: String,
        training_class: String,
    },
}

impl fmt::Display for ScheduleChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleChange::Modified { id, fields } => {
                let joined: Vec<String> = fields.iter().map(ToString::to_string).collect();
                write!(f, "Class {id} changed: {}", joined.join(", "))
            }
            ScheduleChange::Deleted { id, training_class } => {
                write!(f, "Class {id} ({training_class}) was deleted")
            }
            ScheduleChange::Added { id, training_class } => {
                write!(f, "New class {id} ({training_class})")
            }
        }
    }
}

/// Field-level differences between two snapshots. `updated` is not compared.
pub fn diff_snapshots(previous: &Snapshot, current: &Snapshot) -> Vec<ScheduleChange> {
    let mut changes = Vec::new();

    for (id, before) in previous {
        let Some(after) = current.get(id) else {
            changes.push(ScheduleChange::Deleted {
                id: id.clone(),
                training_class: before.training_class.clone(),
            });
            continue;
        };

        let compared = [
            ("training_class", &before.training_class, &after.training_class),
            ("weekday", &before.weekday, &after.weekday),
            ("start_time", &before.start_time, &after.start_time),
            ("end_time", &before.end_time, &after.end_time),
        ];
        let fields: Vec<FieldChange> = compared
            .into_iter()
            .filter(|(_, old, new)| old != new)
            .map(|(field, old, new)| FieldChange {
                field,
                previous: old.clone(),
                current: new.clone(),
            })
            .collect();
        if !fields.is_empty() {
            changes.push(ScheduleChange::Modified {
                id: id.clone(),
                fields,
            });
        }
    }

    for (id, after) in current {
        if !previous.contains_key(id) {
            changes.push(ScheduleChange::Added {
                id: id.clone(),
                training_class: after.training_class.clone(),
            });
        }
    }

    changes
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Baseline {
    /// First run, nothing to compare against.
    Missing,
    Loaded,
    Unreadable(String),
}

#[derive(Debug, Clone)]
pub struct DiffReport {
    pub baseline: Baseline,
    pub changes: Vec<ScheduleChange>,
    pub saved: bool,
}

/// Compares the current schedule with the snapshot left by the previous run,
/// then overwrites that snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotJob {
    path: PathBuf,
}

impl SnapshotJob {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn run(&self, store: &ScheduleStore, ctx: &CallContext) -> StoreResult<DiffReport> {
        info!(parent: ctx.span(), path = %self.path.display(), "AUDIT: Running schedule change detection");

        let instances = store
            .list_instances(&InstanceQuery::new(Visibility::IncludeDeleted))
            .await?;
        let current = build_snapshot(&instances);

        let (baseline, changes) = match self.load_previous().await {
            Ok(Some(previous)) => (Baseline::Loaded, diff_snapshots(&previous, &current)),
            Ok(None) => {
                info!(parent: ctx.span(), "AUDIT: Creating initial schedule snapshot");
                (Baseline::Missing, Vec::new())
            }
            Err(err) => {
                error!(parent: ctx.span(), error = %err, "AUDIT ERROR: Failed to compare schedule snapshots");
                (Baseline::Unreadable(err), Vec::new())
            }
        };

        for change in &changes {
            match change {
                ScheduleChange::Added { .. } => {
                    info!(parent: ctx.span(), "SCHEDULE CHANGE DETECTED: {change}")
                }
                _ => warn!(parent: ctx.span(), "SCHEDULE CHANGE DETECTED: {change}"),
            }
        }

        let saved = match self.save(&current).await {
            Ok(()) => {
                info!(parent: ctx.span(), records = current.len(), "AUDIT: Schedule snapshot saved");
                true
            }
            Err(err) => {
                error!(parent: ctx.span(), error = %err, "AUDIT ERROR: Failed to save schedule snapshot");
                false
            }
        };

        Ok(DiffReport {
            baseline,
            changes,
            saved,
        })
    }

    async fn load_previous(&self) -> Result<Option<Snapshot>, String> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(format!("failed to read {}: {err}", self.path.display())),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| format!("failed to parse {}: {err}", self.path.display()))
    }

    async fn save(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let body = serde_json::to_string_pretty(snapshot)?;
        tokio::fs::write(&self.path, body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(class: &str, start: &str) -> SnapshotRecord {
        SnapshotRecord {
            training_class: class.to_string(),
            weekday: "1".to_string(),
            start_time: start.to_string(),
            end_time: "20:00:00".to_string(),
            updated: "2025-01-06T10:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let snapshot: Snapshot = [("1".to_string(), record("BJJ", "18:00:00"))].into();
        assert!(diff_snapshots(&snapshot, &snapshot.clone()).is_empty());
    }

    #[test]
    fn test_updated_timestamp_is_ignored() {
        let previous: Snapshot = [("1".to_string(), record("BJJ", "18:00:00"))].into();
        let mut bumped = record("BJJ", "18:00:00");
        bumped.updated = "2025-02-01T10:00:00+00:00".to_string();
        let current: Snapshot = [("1".to_string(), bumped)].into();
        assert!(diff_snapshots(&previous, &current).is_empty());
    }

    #[test]
    fn test_field_deletion_and_addition() {
        let previous: Snapshot = [
            ("1".to_string(), record("BJJ", "18:00:00")),
            ("2".to_string(), record("Boxing", "09:00:00")),
        ]
        .into();
        let current: Snapshot = [
            ("1".to_string(), record("BJJ", "18:30:00")),
            ("3".to_string(), record("Yoga", "07:00:00")),
        ]
        .into();

        let changes = diff_snapshots(&previous, &current);
        assert_eq!(changes.len(), 3);
        assert_eq!(
            changes[0],
            ScheduleChange::Modified {
                id: "1".to_string(),
                fields: vec![FieldChange {
                    field: "start_time",
                    previous: "18:00:00".to_string(),
                    current: "18:30:00".to_string(),
                }],
            }
        );
        assert_eq!(
            changes[1].to_string(),
            "Class 2 (Boxing) was deleted"
        );
        assert_eq!(changes[2].to_string(), "New class 3 (Yoga)");
    }

    #[test]
    fn test_modified_display() {
        let change = ScheduleChange::Modified {
            id: "4".to_string(),
            fields: vec![
                FieldChange {
                    field: "weekday",
                    previous: "1".to_string(),
                    current: "2".to_string(),
                },
                FieldChange {
                    field: "end_time",
                    previous: "19:00:00".to_string(),
                    current: "19:30:00".to_string(),
                },
            ],
        };
        assert_eq!(
            change.to_string(),
            "Class 4 changed: weekday: 1 -> 2, end_time: 19:00:00 -> 19:30:00"
        );
    }
}
