//! Reading, matching and rewriting the JSON sidecars written next to each NIFTI image.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use glob::MatchOptions;
use serde_json::{Map, Value};

use crate::error::{BidsifyError, Result};

/// Folder the DICOM converter writes its NIFTI and sidecar output into.
pub const CONVERSION_DIR: &str = "nii";
pub const PROTOCOL_NAME_KEY: &str = "ProtocolName";
pub const ACQUISITION_TIME_KEY: &str = "AcquisitionTime";
/// Key BIDS validators read the task label from.
pub const TASK_NAME_KEY: &str = "TaskName";

/// Glob suffix used to find sidecars in a conversion folder.
pub const SIDECAR_GLOB: &str = "*json";
/// Glob suffix used to find compressed NIFTI images in a conversion folder.
pub const NIFTI_GLOB: &str = "*nii.gz";

/// A parsed sidecar. Key order is kept so a rewrite only changes what was patched.
pub type Sidecar = Map<String, Value>;

pub fn load(path: &Path) -> Result<Sidecar> {
    let file = File::open(path).map_err(|e| BidsifyError::io("open sidecar", path, e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| BidsifyError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(BidsifyError::SidecarNotObject {
            path: path.to_path_buf(),
        }),
    }
}

/// Overwrites `path` with the full sidecar document.
///
/// The document is serialized before the file is truncated, so a serialization
/// failure leaves the previous content in place.
pub fn save(path: &Path, sidecar: &Sidecar, pretty: bool) -> Result<()> {
    let json_content = if pretty {
        serde_json::to_vec_pretty(sidecar)
    } else {
        serde_json::to_vec(sidecar)
    }
    .map_err(|source| BidsifyError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    fs::write(path, json_content).map_err(|e| BidsifyError::io("write sidecar", path, e))
}

/// Reads `key` as table text: strings verbatim, `null` as an empty cell,
/// anything else in its JSON form.
pub fn text_field(sidecar: &Sidecar, key: &'static str, path: &Path) -> Result<String> {
    match sidecar.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(other) => Ok(other.to_string()),
        None => Err(BidsifyError::MissingKey {
            path: path.to_path_buf(),
            key,
        }),
    }
}

/// Load, replace the task name, and write the whole document back.
pub fn patch_task_name(path: &Path, task_name: &str, pretty: bool) -> Result<()> {
    let mut sidecar = load(path)?;
    sidecar.insert(TASK_NAME_KEY.to_string(), Value::String(task_name.to_string()));
    save(path, &sidecar, pretty)
}

/// Entries of `dir` matching `*<suffix>`, sorted by name. Hidden files are skipped.
pub fn files_matching(dir: &Path, glob_suffix: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        glob_suffix
    );
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };

    let paths = glob::glob_with(&pattern, options).map_err(|source| BidsifyError::Glob {
        pattern: pattern.clone(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => log::warn!("glob error under {:?}: {}", dir, e),
        }
    }
    Ok(files)
}
