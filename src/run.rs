//! Pass orchestration: write, optionally verify, then delete, for each
//! configured pass in order.
//!
//! The whole run executes on one worker thread. The front end holds the
//! same `Arc<RunState>` and only polls snapshots and sets the cancel and
//! pause signals.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::json;

use crate::config::{ConfigError, EraseConfig, FillMode, PassSpec};
use crate::pattern::FillData;
use crate::report::{
    format_clock, format_comma, format_hours, format_speed, pretty_plural, RunLog,
};
use crate::status::{Action, RunState};
use crate::verifier::verify_files;
use crate::writer::{temp_file_name, write_files};

/// Durations at or below this are too close to zero for meaningful speed
/// arithmetic.
const SMALL_MILLIS: u128 = 499;

/// Aggregate result of one pass. Per-file detail lives only in the log.
#[derive(Debug, Clone)]
pub struct PassResult {
    pub label: String,
    pub files_created: u32,
    pub bytes_written: u64,
    /// Bytes confirmed correct by the verify phase (zero if not verified).
    pub bytes_verified: u64,
    pub verify_errors: u64,
    /// `None` when the pass did not verify.
    pub verified_clean: Option<bool>,
    pub files_deleted: u32,
    pub write_elapsed: Duration,
    pub read_elapsed: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub passes: Vec<PassResult>,
    pub total_bytes: u64,
    pub total_errors: u64,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "passes": self.passes.iter().map(|p| json!({
                "label": p.label,
                "files_created": p.files_created,
                "bytes_written": p.bytes_written,
                "bytes_verified": p.bytes_verified,
                "verify_errors": p.verify_errors,
                "verified_clean": p.verified_clean,
                "files_deleted": p.files_deleted,
                "write_seconds": p.write_elapsed.as_secs_f64(),
                "read_seconds": p.read_elapsed.map(|d| d.as_secs_f64()),
            })).collect::<Vec<_>>(),
            "total_bytes": self.total_bytes,
            "total_errors": self.total_errors,
            "elapsed_seconds": self.elapsed.as_secs_f64(),
            "cancelled": self.cancelled,
        })
    }
}

/// The erase engine. Owns the validated configuration; shares its state
/// and log with the presentation side.
pub struct Eraser {
    config: EraseConfig,
    state: Arc<RunState>,
    log: Arc<RunLog>,
}

impl Eraser {
    pub fn new(config: EraseConfig, log: Arc<RunLog>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Eraser {
            config,
            state: Arc::new(RunState::new()),
            log,
        })
    }

    /// Shared handle for polling progress and signalling cancel/pause.
    pub fn state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    pub fn log(&self) -> Arc<RunLog> {
        Arc::clone(&self.log)
    }

    pub fn config(&self) -> &EraseConfig {
        &self.config
    }

    /// Execute every configured pass. Returns cleanly on cancellation.
    pub fn run(&self) -> RunSummary {
        let state = &*self.state;
        state.job_clock.restart();
        self.log
            .put(format!("Erasing in drive folder {}", self.config.folder.display()));

        let mut passes = Vec::with_capacity(self.config.passes.len());
        for spec in &self.config.passes {
            if state.cancelled() {
                break;
            }
            passes.push(self.run_pass(spec));
        }

        state.set_action(Action::Idle);
        state.set_file_name(None);

        let elapsed = state.job_clock.elapsed();
        let cancelled = state.cancelled();
        let total_errors = state.total_errors();
        let total_bytes = state.total_bytes_done();

        if cancelled {
            self.log.put("Erase cancelled before completion.");
        } else {
            self.log.put("");
            if total_errors != 0 {
                self.log
                    .put("There were errors. See previous messages (above).");
            }
            self.log.put(format!(
                "Done in {} ({}).",
                format_hours(elapsed),
                format_clock(elapsed)
            ));
            if elapsed.as_millis() > SMALL_MILLIS {
                self.log.put(format!(
                    "Total data was {} bytes at {},",
                    format_comma(total_bytes),
                    format_speed(total_bytes as f64 / elapsed.as_secs_f64())
                ));
                self.log
                    .put("which includes some overhead (deleting files, etc).");
            } else {
                self.log.put(format!(
                    "Total data was {} bytes in the blink of an eye.",
                    format_comma(total_bytes)
                ));
            }
            if total_errors == 0 {
                self.log.put("No errors were detected by this program.");
            }
        }

        RunSummary {
            passes,
            total_bytes,
            total_errors,
            elapsed,
            cancelled,
        }
    }

    /// One pass: write all files, optionally verify them, then delete.
    fn run_pass(&self, spec: &PassSpec) -> PassResult {
        let state = &*self.state;
        let log = &*self.log;
        let size_limit = self.config.largest_buffer();

        log.put("");
        log.put(&spec.label);

        let mut fill = match spec.fill {
            FillMode::Constant(value) => FillData::constant(value, size_limit),
            FillMode::PseudoRandom => {
                if self.config.reuse_random_pool {
                    FillData::pooled_random(size_limit)
                } else {
                    FillData::fresh_random(size_limit)
                }
            }
        };
        // All of this pass's per-file streams derive from one base seed.
        let random_base: i64 = rand::thread_rng().gen();

        state.begin_pass_phase();
        let outcome = write_files(&self.config, &mut fill, random_base, state, log);
        let write_elapsed = state.pass_clock.elapsed();
        let saved_write_bytes = outcome.bytes_written;

        if !state.cancelled() {
            // Reaching the pass-size cap means the requested work was all
            // done; only a file-count stop with room to spare is suspect.
            if outcome.hit_file_count && !outcome.hit_pass_cap {
                log.put("Temporary file limit reached; erase may not be complete.");
            }
            log.put(format!(
                "Created {} with {} bytes.",
                pretty_plural(outcome.files_created as u64, "temporary file"),
                format_comma(saved_write_bytes)
            ));
            if saved_write_bytes > 0 {
                state.note_pass_est_max(saved_write_bytes);
            }
            if write_elapsed.as_millis() > SMALL_MILLIS {
                log.put(format!(
                    "Average write speed was {} over {}.",
                    format_speed(saved_write_bytes as f64 / write_elapsed.as_secs_f64()),
                    format_hours(write_elapsed)
                ));
            }
        }

        let mut bytes_verified = 0u64;
        let mut verify_errors = 0u64;
        let mut verified_clean = None;
        let mut read_elapsed = None;

        if spec.verify && !state.cancelled() && saved_write_bytes > 0 {
            if spec.prompt_before_verify {
                log.put("If your disk is on removable media: remove (eject) it, reinsert it, then resume to start the verify.");
                state.begin_self_pause();
            }
            if !state.cancelled() {
                log.put("Reading file data to verify...");
                let errors_before = state.total_errors();
                state.begin_pass_phase();
                let verify = verify_files(
                    &self.config,
                    &mut fill,
                    random_base,
                    outcome.files_created,
                    state,
                    log,
                );
                let elapsed = state.pass_clock.elapsed();
                read_elapsed = Some(elapsed);
                bytes_verified = verify.correct_bytes;
                verify_errors = state.total_errors() - errors_before;

                if !state.cancelled() {
                    let clean =
                        verify.correct_bytes == saved_write_bytes && !verify.any_mismatch;
                    verified_clean = Some(clean);
                    if clean {
                        log.put(format!(
                            "Verified {} with {} bytes.",
                            pretty_plural(outcome.files_created as u64, "temporary file"),
                            format_comma(verify.bytes_read)
                        ));
                    } else {
                        log.put(format!(
                            "Verify failed with {} bytes written but only {} bytes correct.",
                            format_comma(saved_write_bytes),
                            format_comma(verify.correct_bytes)
                        ));
                    }
                    if elapsed.as_millis() > SMALL_MILLIS {
                        log.put(format!(
                            "Average read speed was {} over {}.",
                            format_speed(verify.bytes_read as f64 / elapsed.as_secs_f64()),
                            format_hours(elapsed)
                        ));
                    }
                }
            }
        }

        let files_deleted = self.delete_files(outcome.files_created);

        PassResult {
            label: spec.label.clone(),
            files_created: outcome.files_created,
            bytes_written: saved_write_bytes,
            bytes_verified,
            verify_errors,
            verified_clean,
            files_deleted,
            write_elapsed,
            read_elapsed,
        }
    }

    /// Delete the pass's files by id, in order. Runs even after a cancel,
    /// as long as deletion is still requested. Only names this program
    /// generates are ever touched.
    fn delete_files(&self, files_created: u32) -> u32 {
        let state = &*self.state;
        let log = &*self.log;
        if files_created == 0 || !state.delete_temp_files() {
            return 0;
        }

        state.set_action(Action::Deleting);
        state.set_file_name(None);
        let mut deleted = 0u32;
        for id in 1..=files_created {
            state.pause_point();
            if !state.delete_temp_files() {
                break; // a late cancel can still withdraw the request
            }
            let file_name = temp_file_name(id);
            state.set_file_name(Some(file_name.clone()));
            match fs::remove_file(self.config.folder.join(&file_name)) {
                Ok(()) => {
                    deleted += 1;
                    if self.config.verbose {
                        log.put(format!("{} - temporary file deleted", file_name));
                    }
                }
                Err(e) => {
                    log.put(format!("{} - failed to delete file: {}", file_name, e));
                    state.add_error();
                }
            }
        }
        log.put(format!(
            "Deleted {}.",
            pretty_plural(deleted as u64, "temporary file")
        ));
        deleted
    }
}
