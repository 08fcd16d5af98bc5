//! Per-record results and the summary a pass reports back to its job.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Category,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordOutcome {
    Applied {
        kind: RecordKind,
        vendor_id: i64,
        change: Change,
    },
    Failed {
        kind: RecordKind,
        vendor_id: i64,
        reason: String,
    },
}

impl RecordOutcome {
    #[must_use]
    pub fn from_result(
        kind: RecordKind,
        vendor_id: i64,
        result: Result<Change, SyncError>,
    ) -> Self {
        match result {
            Ok(change) => Self::Applied {
                kind,
                vendor_id,
                change,
            },
            Err(error) => Self::Failed {
                kind,
                vendor_id,
                reason: error.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub created: u32,
    pub updated: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl Tally {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.created + self.updated + self.unchanged + self.failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// True when the pass ended early because no store exists.
    pub skipped: bool,
    pub categories: Tally,
    pub products: Tally,
    pub pages: u32,
    pub failures: Vec<RecordOutcome>,
    pub previous_watermark: Option<DateTime<Utc>>,
    pub watermark: Option<DateTime<Utc>>,
}

impl ImportSummary {
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: RecordOutcome) {
        match &outcome {
            RecordOutcome::Applied { kind, change, .. } => {
                let tally = self.tally_mut(*kind);
                match change {
                    Change::Created => tally.created += 1,
                    Change::Updated => tally.updated += 1,
                    Change::Unchanged => tally.unchanged += 1,
                }
            }
            RecordOutcome::Failed {
                kind,
                vendor_id,
                reason,
            } => {
                tracing::warn!(?kind, vendor_id, %reason, "TagPlus record failed to import");
                self.tally_mut(*kind).failed += 1;
                self.failures.push(outcome);
            }
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn tally_mut(&mut self, kind: RecordKind) -> &mut Tally {
        match kind {
            RecordKind::Category => &mut self.categories,
            RecordKind::Product => &mut self.products,
        }
    }
}
