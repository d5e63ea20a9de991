//! Find the source folders under a study tree: every directory the DICOM
//! converter left a `nii` folder in.

use std::path::{Component, Path};

use walkdir::WalkDir;

use crate::error::{BidsifyError, Result};
use crate::sidecar::CONVERSION_DIR;

/// Source folders under `study_root` as `./`-relative paths, sorted.
pub fn discover_sources(study_root: &Path, max_depth: usize) -> Result<Vec<String>> {
    if !study_root.is_dir() {
        return Err(BidsifyError::StudyRootMissing {
            path: study_root.to_path_buf(),
        });
    }

    let mut folders = Vec::new();
    for entry in WalkDir::new(study_root).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("skipping unreadable entry under {:?}: {}", study_root, e);
                continue;
            }
        };
        if !entry.file_type().is_dir() || entry.file_name() != CONVERSION_DIR {
            continue;
        }
        if let Some(source) = entry.path().parent() {
            folders.push(dot_relative(source, study_root));
        }
    }

    folders.sort();
    folders.dedup();
    Ok(folders)
}

fn dot_relative(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut rendered = String::from(".");
    for component in relative.components() {
        if let Component::Normal(part) = component {
            rendered.push('/');
            rendered.push_str(&part.to_string_lossy());
        }
    }
    rendered
}
