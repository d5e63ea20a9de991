use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn bidsify() -> Command {
    Command::cargo_bin("bidsify").unwrap()
}

fn make_scan(study: &Path, folder: &str, files: &[(&str, &str)]) {
    let nii = study.join(folder).join("nii");
    fs::create_dir_all(&nii).unwrap();
    for (name, body) in files {
        fs::write(nii.join(name), body).unwrap();
    }
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    bidsify()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    bidsify()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("bidsify"));
}

// =============================================================================
// SCAN
// =============================================================================

#[test]
fn test_scan_writes_one_row_per_folder() {
    let tmp = tempfile::tempdir().unwrap();
    let study = tmp.path().join("study");
    make_scan(
        &study,
        "SB001/rest/dicom",
        &[
            ("rest1_20150614093215.nii.gz", ""),
            (
                "rest1_20150614093215.json",
                r#"{"ProtocolName":"rest1","AcquisitionTime":"093215"}"#,
            ),
        ],
    );
    make_scan(&study, "SB002/rest/dicom", &[("notes_json", "")]);
    make_scan(&study, "SB003/rest/dicom", &[]);

    let list = tmp.path().join("dicomFolderPaths.txt");
    fs::write(
        &list,
        "path\n./SB001/rest/dicom\n./SB002/rest/dicom\n./SB003/rest/dicom\n./SB004/rest/dicom\n",
    )
    .unwrap();
    let out = tmp.path().join("jsonSidecarDataProcessed.csv");
    let report = tmp.path().join("scan-report.json");

    bidsify()
        .arg("scan")
        .arg("--input")
        .arg(&list)
        .arg("--output")
        .arg(&out)
        .arg("--study-root")
        .arg(&study)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let root = study.to_string_lossy();
    let expected = format!(
        "path,task_name,scan_time,date\n\
         {root}/SB001/rest/dicom,rest1,093215,2015-06-14\n\
         {root}/SB002/rest/dicom,NO_JSON_FILE_IN_NII_DIR,9999,9999-01-01\n\
         {root}/SB003/rest/dicom,BAD_FILEPATH,9999,9999-01-01\n\
         {root}/SB004/rest/dicom,BAD_FILEPATH,9999,9999-01-01\n"
    );
    let first_run = fs::read_to_string(&out).unwrap();
    assert_eq!(first_run, expected);

    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(parsed["command"], "scan");
    assert_eq!(parsed["total_records"], 4);
    assert_eq!(parsed["summary"]["extracted"], 1);

    bidsify()
        .arg("scan")
        .arg("--input")
        .arg(&list)
        .arg("--output")
        .arg(&out)
        .arg("--study-root")
        .arg(&study)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&out).unwrap(), first_run);
}

#[test]
fn test_scan_halts_on_missing_key_without_writing_table() {
    let tmp = tempfile::tempdir().unwrap();
    let study = tmp.path().join("study");
    make_scan(
        &study,
        "SB001/rest/dicom",
        &[("rest1_20150614.json", r#"{"AcquisitionTime":"093215"}"#)],
    );
    let list = tmp.path().join("dicomFolderPaths.txt");
    fs::write(&list, "path\n./SB001/rest/dicom\n").unwrap();
    let out = tmp.path().join("out.csv");

    bidsify()
        .arg("scan")
        .arg("--input")
        .arg(&list)
        .arg("--output")
        .arg(&out)
        .arg("--study-root")
        .arg(&study)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ProtocolName"));

    assert!(!out.exists());
}

// =============================================================================
// DISCOVER
// =============================================================================

#[test]
fn test_discover_feeds_scan() {
    let tmp = tempfile::tempdir().unwrap();
    let study = tmp.path().join("study");
    make_scan(&study, "SB002/T1/dicom", &[]);
    make_scan(&study, "SB001/rest/dicom", &[]);
    let list = tmp.path().join("dicomFolderPaths.txt");

    bidsify()
        .arg("discover")
        .arg("--root")
        .arg(&study)
        .arg("--output")
        .arg(&list)
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(&list).unwrap(),
        "path\n./SB001/rest/dicom\n./SB002/T1/dicom\n"
    );
}

// =============================================================================
// RELOCATE
// =============================================================================

#[test]
fn test_relocate_builds_tree_and_patches_task_name() {
    let tmp = tempfile::tempdir().unwrap();
    let study = tmp.path().join("study");
    make_scan(
        &study,
        "SB003/rest/dicom",
        &[
            ("rest1_20150614.nii.gz", "image"),
            (
                "rest1_20150614.json",
                r#"{"ProtocolName":"rest1","AcquisitionTime":"093215","RepetitionTime":2.0}"#,
            ),
        ],
    );
    let bids = tmp.path().join("bids");
    let table = tmp.path().join("bidsFilePathsV01.csv");
    fs::write(
        &table,
        format!(
            "path,BIDS_path,jsonTaskName\n\
             {src},sub-003/ses-1/func/sub-003_ses-1_task-rest_bold.nii.gz,rest\n\
             {missing},sub-004/ses-1/func/sub-004_ses-1_task-rest_bold.nii.gz,rest\n",
            src = study.join("SB003/rest/dicom").display(),
            missing = study.join("SB004/rest/dicom").display(),
        ),
    )
    .unwrap();

    bidsify()
        .arg("relocate")
        .arg("--input")
        .arg(&table)
        .arg("--bids-root")
        .arg(&bids)
        .assert()
        .success();

    let func = bids.join("sub-003/ses-1/func");
    assert_eq!(
        fs::read_to_string(func.join("sub-003_ses-1_task-rest_bold.nii.gz")).unwrap(),
        "image"
    );
    let sidecar: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(func.join("sub-003_ses-1_task-rest_bold.json")).unwrap())
            .unwrap();
    assert_eq!(sidecar["TaskName"], "rest");
    assert_eq!(sidecar["ProtocolName"], "rest1");
    assert_eq!(sidecar["RepetitionTime"], 2.0);

    assert!(bids.join("sub-004/ses-1/func").is_dir());
    assert!(!bids.join("sub-004/ses-1/func/sub-004_ses-1_task-rest_bold.json").exists());
}

#[test]
fn test_relocate_requires_bids_root() {
    bidsify()
        .arg("relocate")
        .env_remove("BIDSIFY_BIDS_ROOT")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--bids-root"));
}
