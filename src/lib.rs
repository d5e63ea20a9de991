//! Extract scan metadata from NIFTI sidecars and relocate scans into a BIDS tree.
//!
//! The pipeline runs in two independent passes joined by CSV tables:
//! [`scanner`] reads each source folder's sidecar into a row of
//! `jsonSidecarDataProcessed.csv`, and [`relocate`] takes the externally
//! derived `bidsFilePathsV01.csv`, copies every scan into place and corrects
//! the task name in the copied sidecar.

pub mod discover;
pub mod error;
pub mod relocate;
pub mod report;
pub mod scanner;
pub mod sidecar;
pub mod table;

pub use error::{BidsifyError, Result};
pub use relocate::{BidsTarget, Modality, RelocationOutcome, RelocationRecord, RelocationStage, Relocator};
pub use report::{RelocationSummary, RunReport, ScanSummary};
pub use scanner::{ScanOutcome, SidecarFacts, SourceRecord};
