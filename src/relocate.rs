//! Second stage: build the BIDS tree, copy each scan into it and correct the
//! task name in the copied sidecar.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indicatif::ProgressBar;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BidsifyError, Result};
use crate::sidecar::{self, CONVERSION_DIR, NIFTI_GLOB, SIDECAR_GLOB};

static SUBJECT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sub-[0-9]{3}").expect("subject id regex"));
static SESSION_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ses-[0-9]{1}").expect("session id regex"));

const NIFTI_SUFFIXES: [&str; 2] = [".nii.gz", ".nii"];
const SIDECAR_SUFFIX: &str = ".json";

/// One row of the relocation table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelocationRecord {
    /// Folder holding the converter's `nii` output.
    #[serde(rename = "path")]
    pub source_path: String,
    /// Where the NIFTI image goes.
    #[serde(rename = "BIDS_path")]
    pub destination_path: String,
    #[serde(rename = "jsonTaskName")]
    pub corrected_task_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modality {
    Anat,
    Func,
}

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Anat => "anat",
            Modality::Func => "func",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifiers and paths derived from a destination path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsTarget {
    pub subject_id: String,
    pub session_id: String,
    pub modality: Modality,
    pub destination: PathBuf,
    /// `None` when the destination has no NIFTI suffix to swap for `.json`.
    pub destination_json: Option<PathBuf>,
}

impl BidsTarget {
    /// Relative destinations are placed under `bids_root`; absolute ones are used as given.
    pub fn derive(destination_path: &str, bids_root: &Path) -> Result<Self> {
        let subject_id = find_identifier(&SUBJECT_ID, "sub-###", destination_path)?;
        let session_id = find_identifier(&SESSION_ID, "ses-#", destination_path)?;
        let modality = if destination_path.contains("anat") {
            Modality::Anat
        } else {
            Modality::Func
        };

        Ok(Self {
            subject_id,
            session_id,
            modality,
            destination: bids_root.join(destination_path),
            destination_json: sidecar_destination(destination_path).map(|json| bids_root.join(json)),
        })
    }

    /// `sub`, `sub/ses` and `sub/ses/modality` under `bids_root`, parents first.
    pub fn directory_chain(&self, bids_root: &Path) -> [PathBuf; 3] {
        let subject_dir = bids_root.join(&self.subject_id);
        let session_dir = subject_dir.join(&self.session_id);
        let modality_dir = session_dir.join(self.modality.as_str());
        [subject_dir, session_dir, modality_dir]
    }
}

fn find_identifier(pattern: &Regex, label: &'static str, destination: &str) -> Result<String> {
    pattern
        .find(destination)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| BidsifyError::IdentifierNotFound {
            pattern: label,
            destination: destination.to_string(),
        })
}

/// Swap the NIFTI suffix of `destination` for `.json`.
pub fn sidecar_destination(destination: &str) -> Option<String> {
    NIFTI_SUFFIXES
        .iter()
        .find_map(|suffix| destination.strip_suffix(suffix))
        .map(|stem| format!("{}{}", stem, SIDECAR_SUFFIX))
}

/// Furthest point a record reached. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelocationStage {
    Pending,
    PathsDerived,
    DirectoriesEnsured,
    FilesCopied,
    MetadataPatched,
}

#[derive(Debug, Clone)]
pub struct RelocationOutcome {
    pub source_path: String,
    pub target: BidsTarget,
    pub stage: RelocationStage,
    /// Every filesystem or path error hit while placing files, in order.
    pub failures: Vec<String>,
    pub patched: bool,
}

impl RelocationOutcome {
    fn record_failure(&mut self, error: BidsifyError) {
        log::warn!("{}: {:?}: {}", self.source_path, self.stage, error);
        self.failures.push(error.to_string());
    }
}

pub struct Relocator {
    bids_root: PathBuf,
    pretty: bool,
}

impl Relocator {
    pub fn new(bids_root: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            bids_root: bids_root.into(),
            pretty,
        }
    }

    pub fn bids_root(&self) -> &Path {
        &self.bids_root
    }

    /// Place every record, then patch every copied sidecar.
    ///
    /// Filesystem failures while placing a record are recorded on its outcome
    /// and the batch moves on. A destination without subject or session ids,
    /// or a copied sidecar that cannot be parsed, stops the batch.
    pub fn relocate_all(
        &self,
        records: &[RelocationRecord],
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<RelocationOutcome>> {
        let mut outcomes = Vec::with_capacity(records.len());

        for record in records {
            if let Some(pb) = progress {
                pb.set_message(record.destination_path.clone());
            }

            outcomes.push(self.place(record)?);

            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        for (record, outcome) in records.iter().zip(outcomes.iter_mut()) {
            self.patch(record, outcome)?;
        }

        Ok(outcomes)
    }

    fn place(&self, record: &RelocationRecord) -> Result<RelocationOutcome> {
        let target = BidsTarget::derive(&record.destination_path, &self.bids_root)?;
        let mut outcome = RelocationOutcome {
            source_path: record.source_path.clone(),
            target,
            stage: RelocationStage::PathsDerived,
            failures: Vec::new(),
            patched: false,
        };

        // Without a sidecar path the json copy would land on the image itself.
        let Some(destination_json) = outcome.target.destination_json.clone() else {
            outcome.record_failure(BidsifyError::NotNiftiDestination {
                destination: record.destination_path.clone(),
            });
            return Ok(outcome);
        };

        if let Err(e) = self.ensure_directories(&outcome.target) {
            outcome.record_failure(e);
            return Ok(outcome);
        }
        outcome.stage = RelocationStage::DirectoriesEnsured;

        let conversion_dir = Path::new(&record.source_path).join(CONVERSION_DIR);
        let nifti = copy_single(&conversion_dir, NIFTI_GLOB, &outcome.target.destination);
        let json = copy_single(&conversion_dir, SIDECAR_GLOB, &destination_json);

        let mut copied = true;
        for step in [nifti, json] {
            if let Err(e) = step {
                outcome.record_failure(e);
                copied = false;
            }
        }
        if copied {
            outcome.stage = RelocationStage::FilesCopied;
            log::info!(
                "{} -> {}/{}/{}",
                record.source_path,
                outcome.target.subject_id,
                outcome.target.session_id,
                outcome.target.modality
            );
        }
        Ok(outcome)
    }

    fn ensure_directories(&self, target: &BidsTarget) -> Result<()> {
        for dir in target.directory_chain(&self.bids_root) {
            fs::create_dir_all(&dir).map_err(|e| BidsifyError::io("create directory", &dir, e))?;
        }
        Ok(())
    }

    fn patch(&self, record: &RelocationRecord, outcome: &mut RelocationOutcome) -> Result<()> {
        let Some(json_path) = outcome.target.destination_json.as_deref() else {
            return Ok(());
        };
        if !json_path.exists() {
            log::debug!("no sidecar at {:?}, skipping task name patch", json_path);
            return Ok(());
        }

        sidecar::patch_task_name(json_path, &record.corrected_task_name, self.pretty)?;
        outcome.patched = true;
        if outcome.stage == RelocationStage::FilesCopied {
            outcome.stage = RelocationStage::MetadataPatched;
        }
        Ok(())
    }
}

/// Copy the one `pattern` match in `dir` to `to`.
fn copy_single(dir: &Path, pattern: &'static str, to: &Path) -> Result<()> {
    let mut matches = sidecar::files_matching(dir, pattern)?;
    if matches.len() != 1 {
        return Err(BidsifyError::SourceFileNotUnique {
            dir: dir.to_path_buf(),
            pattern,
            count: matches.len(),
        });
    }
    let from = matches.remove(0);
    log::debug!("copy {:?} -> {:?}", from, to);
    fs::copy(&from, to).map_err(|e| BidsifyError::io("copy", to, e))?;
    Ok(())
}
