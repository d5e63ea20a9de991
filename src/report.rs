//! Run reports written after a pass, one JSON document per invocation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{BidsifyError, Result};
use crate::relocate::{RelocationOutcome, RelocationStage};
use crate::scanner::{ScanOutcome, SourceRecord};

#[derive(Serialize, Debug)]
pub struct RunReport<S> {
    pub processing_id: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub command: &'static str,
    pub total_records: usize,
    pub summary: S,
}

impl<S: Serialize> RunReport<S> {
    pub fn new(command: &'static str, total_records: usize, summary: S) -> Self {
        Self {
            processing_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            command,
            total_records,
            summary,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self).map_err(|source| BidsifyError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json_content).map_err(|e| BidsifyError::io("write report", path, e))
    }
}

#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub extracted: usize,
    pub source_missing: usize,
    pub conversion_dir_missing: usize,
    pub sidecar_missing: usize,
    pub sidecar_ambiguous: usize,
    pub not_a_sidecar: usize,
    pub unique_tasks: Vec<String>,
}

impl ScanSummary {
    pub fn from_records(records: &[SourceRecord]) -> Self {
        let mut summary = Self::default();
        for record in records {
            match &record.outcome {
                ScanOutcome::Extracted(facts) => {
                    summary.extracted += 1;
                    summary.unique_tasks.push(facts.protocol_name.clone());
                }
                ScanOutcome::SourceMissing => summary.source_missing += 1,
                ScanOutcome::ConversionDirMissing => summary.conversion_dir_missing += 1,
                ScanOutcome::SidecarMissing => summary.sidecar_missing += 1,
                ScanOutcome::SidecarAmbiguous { .. } => summary.sidecar_ambiguous += 1,
                ScanOutcome::NotASidecar { .. } => summary.not_a_sidecar += 1,
            }
        }
        summary.unique_tasks.sort();
        summary.unique_tasks.dedup();
        summary
    }

    /// Rows written with a sentinel instead of real metadata.
    pub fn sentinel_rows(&self) -> usize {
        self.source_missing
            + self.conversion_dir_missing
            + self.sidecar_missing
            + self.sidecar_ambiguous
            + self.not_a_sidecar
    }
}

#[derive(Serialize, Debug, Default, PartialEq, Eq)]
pub struct RelocationSummary {
    pub stages: BTreeMap<RelocationStage, usize>,
    pub patched: usize,
    pub failed: Vec<FailedRelocation>,
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct FailedRelocation {
    pub source_path: String,
    pub stage: RelocationStage,
    pub errors: Vec<String>,
}

impl RelocationSummary {
    pub fn from_outcomes(outcomes: &[RelocationOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            *summary.stages.entry(outcome.stage).or_insert(0) += 1;
            if outcome.patched {
                summary.patched += 1;
            }
            if !outcome.failures.is_empty() {
                summary.failed.push(FailedRelocation {
                    source_path: outcome.source_path.clone(),
                    stage: outcome.stage,
                    errors: outcome.failures.clone(),
                });
            }
        }
        summary
    }
}
