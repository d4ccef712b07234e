//! End-to-end engine tests against a real (temporary) filesystem.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::tempdir;

use disk_eraser::config::{EraseConfig, FillMode, PassSpec};
use disk_eraser::pattern::FillData;
use disk_eraser::report::RunLog;
use disk_eraser::status::RunState;
use disk_eraser::writer::temp_file_name;
use disk_eraser::{verifier, writer, Eraser};

fn erase_files_in(folder: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.len() == 12 && n.ends_with(".DAT"))
        .collect();
    names.sort();
    names
}

fn build_eraser(config: EraseConfig) -> Eraser {
    Eraser::new(config, Arc::new(RunLog::quiet())).unwrap()
}

#[test]
fn exact_caps_scenario_reports_complete() {
    // Three files of 1000, 1000, and 500 bytes: the pass-size cap lands
    // exactly on the file-count cap, and the pass is still complete.
    let dir = tempdir().unwrap();
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::constant(0x00)]);
    config.buffer_sizes = vec![500];
    config.max_file_count = 3;
    config.max_file_size = 1000;
    config.max_pass_size = 2500;

    let eraser = build_eraser(config);
    let log = eraser.log();
    let summary = eraser.run();

    assert!(!summary.cancelled);
    assert_eq!(summary.total_errors, 0);
    let pass = &summary.passes[0];
    assert_eq!(pass.files_created, 3);
    assert_eq!(pass.bytes_written, 2500);
    assert_eq!(pass.files_deleted, 3);

    let lines = log.lines().join("\n");
    assert!(lines.contains("ERASE001.DAT - 1,000 bytes written"));
    assert!(lines.contains("ERASE002.DAT - 1,000 bytes written"));
    assert!(lines.contains("ERASE003.DAT - 500 bytes written"));
    assert!(lines.contains("Created three temporary files with 2,500 bytes."));
    assert!(!lines.contains("limit reached"));
    assert!(erase_files_in(dir.path()).is_empty());
}

#[test]
fn file_count_cap_with_room_left_warns() {
    let dir = tempdir().unwrap();
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::constant(0xFF)]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 2;
    config.max_file_size = 1024;
    // pass cap far beyond what two files can hold
    config.max_pass_size = 1 << 20;

    let eraser = build_eraser(config);
    let log = eraser.log();
    let summary = eraser.run();

    assert_eq!(summary.passes[0].files_created, 2);
    assert_eq!(summary.passes[0].bytes_written, 2048);
    let lines = log.lines().join("\n");
    assert!(lines.contains("Temporary file limit reached"));
}

#[test]
fn zero_fill_verifies_clean() {
    let dir = tempdir().unwrap();
    let mut pass = PassSpec::constant(0x00);
    pass.verify = true;
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![pass]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 2;
    config.max_file_size = 2048;
    config.max_pass_size = 4096;

    let eraser = build_eraser(config);
    let summary = eraser.run();

    let pass = &summary.passes[0];
    assert_eq!(pass.bytes_written, 4096);
    assert_eq!(pass.bytes_verified, 4096);
    assert_eq!(pass.verify_errors, 0);
    assert_eq!(pass.verified_clean, Some(true));
    assert_eq!(summary.total_errors, 0);
}

#[test]
fn random_pool_verifies_clean() {
    let dir = tempdir().unwrap();
    let mut config =
        EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::random(true, false)]);
    config.buffer_sizes = vec![1024];
    config.max_file_count = 3;
    config.max_file_size = 4096;
    config.max_pass_size = 12288;

    let summary = build_eraser(config).run();
    let pass = &summary.passes[0];
    assert_eq!(pass.bytes_written, 12288);
    assert_eq!(pass.verified_clean, Some(true));
    assert_eq!(summary.total_errors, 0);
}

#[test]
fn fresh_random_verifies_clean() {
    let dir = tempdir().unwrap();
    let mut config =
        EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::random(true, false)]);
    config.buffer_sizes = vec![1024];
    config.max_file_count = 2;
    config.max_file_size = 2048;
    config.max_pass_size = 4096;
    config.reuse_random_pool = false;

    let summary = build_eraser(config).run();
    assert_eq!(summary.passes[0].verified_clean, Some(true));
    assert_eq!(summary.total_errors, 0);
}

#[test]
fn multi_pass_run_accumulates_totals() {
    let dir = tempdir().unwrap();
    let mut ones = PassSpec::constant(0xFF);
    ones.label = "Writing all ones (0xFF)...".to_string();
    let mut zeros = PassSpec::constant(0x00);
    zeros.label = "Writing all zeros (0x00)...".to_string();
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![ones, zeros]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 2;
    config.max_file_size = 1024;
    config.max_pass_size = 2048;

    let summary = build_eraser(config).run();
    assert_eq!(summary.passes.len(), 2);
    assert_eq!(summary.total_bytes, 4096);
    assert_eq!(summary.total_errors, 0);
    assert!(erase_files_in(dir.path()).is_empty());
}

/// Write a small file set without the orchestrator, so the test can
/// corrupt bytes on disk before verification.
fn write_two_files(
    config: &EraseConfig,
    fill: &mut FillData,
    base: i64,
    state: &RunState,
    log: &RunLog,
) -> u32 {
    let outcome = writer::write_files(config, fill, base, state, log);
    assert_eq!(outcome.files_created, 2);
    outcome.files_created
}

fn corruption_config(folder: &Path) -> EraseConfig {
    let mut config = EraseConfig::new(folder.to_path_buf(), vec![PassSpec::constant(0x00)]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 2;
    config.max_file_size = 2048;
    config.max_pass_size = 4096;
    config
}

#[test]
fn single_mismatch_is_tolerated_and_counted() {
    let dir = tempdir().unwrap();
    let config = corruption_config(dir.path());
    let state = RunState::new();
    let log = RunLog::quiet();
    let mut fill = FillData::constant(0x00, 512);
    let files = write_two_files(&config, &mut fill, 7, &state, &log);

    // flip one byte in the middle of the first file
    let path = dir.path().join(temp_file_name(1));
    let mut data = fs::read(&path).unwrap();
    data[700] = 0xAA;
    fs::write(&path, &data).unwrap();

    state.begin_pass_phase();
    let verify = verifier::verify_files(&config, &mut fill, 7, files, &state, &log);
    assert!(verify.any_mismatch);
    assert_eq!(verify.correct_bytes, 4096 - 1);
    assert_eq!(state.total_errors(), 1);
    let lines = log.lines().join("\n");
    assert!(lines.contains("byte at 0x2BC is 0xAA but should be 0x0"));
}

#[test]
fn error_ceiling_aborts_one_file_but_not_the_next() {
    let dir = tempdir().unwrap();
    let mut config = corruption_config(dir.path());
    config.error_limit = 3;
    let state = RunState::new();
    let log = RunLog::quiet();
    let mut fill = FillData::constant(0x00, 512);
    let files = write_two_files(&config, &mut fill, 11, &state, &log);

    // three consecutive bad bytes trip the ceiling
    let path = dir.path().join(temp_file_name(1));
    let mut data = fs::read(&path).unwrap();
    for b in &mut data[100..103] {
        *b = 0x55;
    }
    fs::write(&path, &data).unwrap();

    state.begin_pass_phase();
    let verify = verifier::verify_files(&config, &mut fill, 11, files, &state, &log);
    assert!(verify.any_mismatch);
    let lines = log.lines().join("\n");
    assert!(lines.contains("ERASE001.DAT - too many errors, stopping after 103 bytes"));
    // the second file is still verified in full
    assert!(lines.contains("ERASE002.DAT - 2,048 bytes correct"));
    assert_eq!(state.total_errors(), 3);
}

#[test]
fn verify_failure_is_reported_not_fatal() {
    let dir = tempdir().unwrap();
    let mut pass = PassSpec::constant(0x00);
    pass.verify = true;
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![pass]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 1;
    config.max_file_size = 1024;
    config.max_pass_size = 1024;

    // A second writer dirties the file between write and verify. Run the
    // phases by hand to get in between them.
    let state = RunState::new();
    let log = RunLog::quiet();
    let mut fill = FillData::constant(0x00, 512);
    state.begin_pass_phase();
    let outcome = writer::write_files(&config, &mut fill, 3, &state, &log);
    let path = dir.path().join(temp_file_name(1));
    let mut data = fs::read(&path).unwrap();
    data[0] = 0x01;
    fs::write(&path, &data).unwrap();

    state.begin_pass_phase();
    let verify = verifier::verify_files(&config, &mut fill, 3, outcome.files_created, &state, &log);
    assert!(verify.correct_bytes < outcome.bytes_written);
    assert!(verify.any_mismatch);
}

#[test]
fn cancel_leaves_no_temp_files_behind() {
    let dir = tempdir().unwrap();
    let mut config =
        EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::random(false, false)]);
    config.buffer_sizes = vec![4096];
    config.max_file_count = 16;
    config.max_file_size = 1 << 20;
    config.max_pass_size = 8 << 20;

    let eraser = build_eraser(config);
    let state = eraser.state();
    let folder = dir.path().to_path_buf();

    let handle = thread::spawn(move || eraser.run());
    thread::sleep(Duration::from_millis(20));
    state.request_cancel(true);
    let summary = handle.join().unwrap();

    // Whether the cancel landed mid-write or after the pass finished, the
    // deletion stage must have removed every file it created.
    assert!(erase_files_in(&folder).is_empty());
    assert_eq!(summary.total_errors, 0);
}

#[test]
fn cancel_before_run_does_nothing() {
    let dir = tempdir().unwrap();
    let config = EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::constant(0x00)]);
    let eraser = build_eraser(config);
    eraser.state().request_cancel(true);
    let summary = eraser.run();
    assert!(summary.cancelled);
    assert!(summary.passes.is_empty());
    assert!(erase_files_in(dir.path()).is_empty());
}

#[test]
fn keep_files_skips_deletion() {
    let dir = tempdir().unwrap();
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::constant(0xFF)]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 2;
    config.max_file_size = 512;
    config.max_pass_size = 1024;

    let eraser = build_eraser(config);
    eraser.state().set_delete_temp_files(false);
    let summary = eraser.run();
    assert_eq!(summary.passes[0].files_deleted, 0);
    assert_eq!(
        erase_files_in(dir.path()),
        vec!["ERASE001.DAT".to_string(), "ERASE002.DAT".to_string()]
    );
    // the files really contain the fill byte
    let data = fs::read(dir.path().join("ERASE001.DAT")).unwrap();
    assert_eq!(data.len(), 512);
    assert!(data.iter().all(|&b| b == 0xFF));
}

#[test]
fn summary_json_shape() {
    let dir = tempdir().unwrap();
    let mut config = EraseConfig::new(dir.path().to_path_buf(), vec![PassSpec::constant(0x00)]);
    config.buffer_sizes = vec![512];
    config.max_file_count = 1;
    config.max_file_size = 512;
    config.max_pass_size = 512;

    let summary = build_eraser(config).run();
    let v = summary.to_json();
    assert_eq!(v["total_errors"], 0);
    assert_eq!(v["cancelled"], false);
    assert_eq!(v["passes"][0]["files_created"], 1);
    assert_eq!(v["passes"][0]["bytes_written"], 512);
    assert!(v["passes"][0]["verified_clean"].is_null());
}

#[test]
fn pass_uses_constant_and_random_fill_modes() {
    // sanity on the config surface itself
    let ones = PassSpec::constant(0xFF);
    assert_eq!(ones.fill, FillMode::Constant(0xFF));
    assert!(!ones.verify);
    let random = PassSpec::random(true, true);
    assert_eq!(random.fill, FillMode::PseudoRandom);
    assert!(random.verify);
    assert!(random.prompt_before_verify);
}
