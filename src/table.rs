//! Hand-off tables: the folder-path list, the scanner output and the relocation input.

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{BidsifyError, Result};
use crate::relocate::RelocationRecord;
use crate::scanner::SourceRecord;

pub const FOLDER_PATHS_FILE: &str = "dicomFolderPaths.txt";
pub const SCAN_TABLE_FILE: &str = "jsonSidecarDataProcessed.csv";
pub const RELOCATION_TABLE_FILE: &str = "bidsFilePathsV01.csv";

#[derive(Debug, Serialize, Deserialize)]
struct FolderPathRow {
    path: String,
}

#[derive(Debug, Serialize)]
struct ScanRow<'a> {
    path: &'a str,
    task_name: &'a str,
    scan_time: &'a str,
    date: &'a str,
}

/// Replace a leading `.` with `study_root`, turning `./SB001/rest/dicom`
/// into `<study_root>/SB001/rest/dicom`.
pub fn rewrite_root(path: &str, study_root: &str) -> String {
    match path.strip_prefix('.') {
        Some(rest) => format!("{}{}", study_root, rest),
        None => path.to_string(),
    }
}

/// Read the tab-separated folder list. The first line is a header and is
/// discarded whatever it says.
pub fn read_folder_paths(path: &Path) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| BidsifyError::table(path, e))?;

    let mut paths = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BidsifyError::table(path, e))?;
        if let Some(folder) = record.get(0) {
            paths.push(folder.to_string());
        }
    }
    Ok(paths)
}

pub fn write_folder_paths(path: &Path, folders: &[String]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| BidsifyError::table(path, e))?;

    for folder in folders {
        writer
            .serialize(FolderPathRow {
                path: folder.clone(),
            })
            .map_err(|e| BidsifyError::table(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| BidsifyError::io("flush folder list", path, e))
}

/// Write the scanner output with columns `path,task_name,scan_time,date`.
pub fn write_scan_table(path: &Path, records: &[SourceRecord]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .map_err(|e| BidsifyError::table(path, e))?;

    for record in records {
        let (task_name, scan_time, date) = record.outcome.table_fields();
        writer
            .serialize(ScanRow {
                path: &record.path,
                task_name,
                scan_time,
                date,
            })
            .map_err(|e| BidsifyError::table(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| BidsifyError::io("flush scan table", path, e))
}

/// Read `(path, BIDS_path, jsonTaskName)` rows. Other columns are ignored.
pub fn read_relocation_table(path: &Path) -> Result<Vec<RelocationRecord>> {
    let mut reader = ReaderBuilder::new()
        .from_path(path)
        .map_err(|e| BidsifyError::table(path, e))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<RelocationRecord>, _>>()
        .map_err(|e| BidsifyError::table(path, e))
}
