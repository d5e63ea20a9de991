//! First stage: pull task name, acquisition time and scan date out of each
//! source folder's sidecar.
//!
//! Missing folders and ambiguous sidecars are recorded per row so one bad
//! export never stops the batch. A well-formed sidecar that lacks an expected
//! key, or whose filename carries no scan date, is treated as corrupt input and
//! stops the pass.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use indicatif::ProgressBar;
use regex::Regex;

use crate::error::{BidsifyError, Result};
use crate::sidecar::{self, ACQUISITION_TIME_KEY, CONVERSION_DIR, PROTOCOL_NAME_KEY, SIDECAR_GLOB};

pub const BAD_FILEPATH: &str = "BAD_FILEPATH";
pub const NO_JSON_FILE_IN_NII_DIR: &str = "NO_JSON_FILE_IN_NII_DIR";
pub const SENTINEL_SCAN_TIME: &str = "9999";
pub const SENTINEL_DATE: &str = "9999-01-01";

static CONVERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/.+/nii/").expect("conversion prefix regex"));
static SCAN_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_201[0-9]{5}").expect("scan date regex"));

/// Facts read from a single usable sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarFacts {
    pub sidecar_path: PathBuf,
    pub protocol_name: String,
    pub acquisition_time: String,
    /// `YYYY-MM-DD`, taken from the sidecar filename.
    pub scan_date: String,
}

/// What the scanner found for one source folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Extracted(SidecarFacts),
    SourceMissing,
    ConversionDirMissing,
    SidecarMissing,
    SidecarAmbiguous { count: usize },
    /// The only glob match does not carry a `.json` extension.
    NotASidecar { file: PathBuf },
}

impl ScanOutcome {
    /// `(task_name, scan_time, date)` as written to the hand-off table.
    pub fn table_fields(&self) -> (&str, &str, &str) {
        match self {
            Self::Extracted(facts) => (
                facts.protocol_name.as_str(),
                facts.acquisition_time.as_str(),
                facts.scan_date.as_str(),
            ),
            Self::NotASidecar { .. } => (NO_JSON_FILE_IN_NII_DIR, SENTINEL_SCAN_TIME, SENTINEL_DATE),
            Self::SourceMissing
            | Self::ConversionDirMissing
            | Self::SidecarMissing
            | Self::SidecarAmbiguous { .. } => (BAD_FILEPATH, SENTINEL_SCAN_TIME, SENTINEL_DATE),
        }
    }

    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted(_))
    }
}

/// One row of the scanner output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub path: String,
    pub outcome: ScanOutcome,
}

/// Inspect one source folder.
///
/// Only unrecovered conditions come back as `Err`; everything the table can
/// express as a sentinel is an `Ok` outcome.
pub fn scan_source(path: &Path) -> Result<ScanOutcome> {
    if !path.exists() {
        return Ok(ScanOutcome::SourceMissing);
    }

    let conversion_dir = path.join(CONVERSION_DIR);
    if !conversion_dir.exists() {
        return Ok(ScanOutcome::ConversionDirMissing);
    }

    let mut matches = sidecar::files_matching(&conversion_dir, SIDECAR_GLOB)?;
    let sidecar_path = match matches.len() {
        0 => return Ok(ScanOutcome::SidecarMissing),
        1 => matches.remove(0),
        count => return Ok(ScanOutcome::SidecarAmbiguous { count }),
    };

    let is_json = sidecar_path
        .extension()
        .is_some_and(|ext| ext == "json");
    if !is_json {
        return Ok(ScanOutcome::NotASidecar { file: sidecar_path });
    }

    let document = sidecar::load(&sidecar_path)?;
    let protocol_name = sidecar::text_field(&document, PROTOCOL_NAME_KEY, &sidecar_path)?;
    let acquisition_time = sidecar::text_field(&document, ACQUISITION_TIME_KEY, &sidecar_path)?;
    let scan_date = scan_date_from_path(&sidecar_path)?;

    Ok(ScanOutcome::Extracted(SidecarFacts {
        sidecar_path,
        protocol_name,
        acquisition_time,
        scan_date,
    }))
}

/// Scan every path in order. Row count and order always match `paths`.
pub fn scan_all(paths: &[String], progress: Option<&ProgressBar>) -> Result<Vec<SourceRecord>> {
    let mut records = Vec::with_capacity(paths.len());

    for path in paths {
        if let Some(pb) = progress {
            pb.set_message(path.clone());
        }

        let outcome = scan_source(Path::new(path))?;
        match &outcome {
            ScanOutcome::Extracted(facts) => {
                log::debug!(
                    "{}: {} at {} on {} from {:?}",
                    path,
                    facts.protocol_name,
                    facts.acquisition_time,
                    facts.scan_date,
                    facts.sidecar_path.file_name().unwrap_or_default()
                );
            }
            other => log::warn!("{}: {:?}", path, other),
        }
        records.push(SourceRecord {
            path: path.clone(),
            outcome,
        });

        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(records)
}

/// Find the `_201YMMDD` token in the sidecar filename and render it as `YYYY-MM-DD`.
pub fn scan_date_from_path(sidecar_path: &Path) -> Result<String> {
    let full_path = sidecar_path.to_string_lossy();
    let file_name = CONVERSION_PREFIX.replace(&full_path, "");

    let token = SCAN_DATE
        .find(&file_name)
        .ok_or_else(|| BidsifyError::DateNotFound {
            file: file_name.to_string(),
        })?;

    Ok(format_scan_date(token.as_str().trim_start_matches('_')))
}

/// `"20150614"` becomes `"2015-06-14"`.
///
/// Slices are cut at fixed offsets; the day slice runs to offset 9 and is
/// clamped to the input length.
pub fn format_scan_date(digits: &str) -> String {
    let cut = |start: usize, end: usize| {
        let end = end.min(digits.len());
        digits.get(start.min(end)..end).unwrap_or("")
    };
    format!("{}-{}-{}", cut(0, 4), cut(4, 6), cut(6, 9))
}
