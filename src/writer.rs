//! Write pass: fill the volume with sequentially numbered temporary files.
//!
//! Different file systems have different limits, so no single file can be
//! assumed to hold all free space. Every write error looks the same through
//! the standard file API, whether the disk is full, the file hit a format
//! limit (4 GB on FAT32), or something worse. The response is uniform:
//! retry the same data at the next smaller buffer size, and when the ladder
//! runs out, call the file done.

use std::fs::File;
use std::io::Write;

use crate::buffer::BufferLadder;
use crate::config::EraseConfig;
use crate::pattern::FillData;
use crate::report::{format_byte_size, format_comma, RunLog};
use crate::status::{Action, RunState};

/// Deterministic name for file `id`: an 8-character stem with the decimal
/// id overlaid on trailing zeros, plus a fixed extension. Writer, verifier
/// and deleter all regenerate names from ids; no file list is kept.
pub fn temp_file_name(id: u32) -> String {
    let digits = id.to_string();
    format!("{}{}.DAT", &"ERASE000"[..8 - digits.len()], digits)
}

/// How the write phase of one pass ended.
#[derive(Debug, Clone, Copy)]
pub struct WriteOutcome {
    pub files_created: u32,
    pub bytes_written: u64,
    /// The file-count cap stopped the outer loop.
    pub hit_file_count: bool,
    /// The aggregate pass-size cap stopped the loop.
    pub hit_pass_cap: bool,
    /// A file could not even be created; the pass's writing ended early.
    pub create_failed: bool,
}

/// Write one file's content, degrading the buffer size on failure.
///
/// The fill data is consumed in logical blocks of the largest buffer size.
/// After a failed write the same position is retried at the smaller size,
/// so random content generated for the large block is never regenerated or
/// skipped. Once below the largest size, every write is flushed so each
/// smaller piece persists on its own. Returns bytes successfully written.
pub fn write_file_data<W: Write>(
    out: &mut W,
    fill: &mut FillData,
    ladder: &mut BufferLadder<'_>,
    max_file_size: u64,
    max_pass_size: u64,
    state: &RunState,
    log: &RunLog,
    file_name: &str,
    verbose: bool,
) -> u64 {
    let size_limit = ladder.largest();
    let mut data_index = 0usize;
    let mut data_left = 0usize;
    let mut file_bytes = 0u64;

    while !state.cancelled()
        && file_bytes < max_file_size
        && state.pass_bytes_done() < max_pass_size
    {
        state.pause_point();

        if data_left == 0 {
            fill.begin_block();
            data_index = 0;
            data_left = size_limit;
        }

        let this_size = ladder.current().min(data_left);
        let chunk = &fill.block()[data_index..data_index + this_size];
        let result = out.write_all(chunk).and_then(|_| {
            // Each write below the original size must persist on its own.
            if ladder.reduced() {
                out.flush()
            } else {
                Ok(())
            }
        });
        match result {
            Ok(()) => {
                data_index += this_size;
                data_left -= this_size;
                file_bytes += this_size as u64;
                state.add_bytes(this_size as u64);
            }
            Err(e) => {
                // Assume "no more room at this size" and retry smaller.
                if verbose {
                    log.put(format!("{} - {}", file_name, e));
                }
                if !ladder.shrink() {
                    break;
                }
                if verbose {
                    log.put(format!(
                        "{} - buffer size reduced to {}",
                        file_name,
                        format_byte_size(ladder.current() as u64)
                    ));
                }
            }
        }
    }
    file_bytes
}

/// Create and fill temporary files until the volume, the file-count cap, or
/// the pass-size cap is exhausted.
pub fn write_files(
    config: &EraseConfig,
    fill: &mut FillData,
    random_base: i64,
    state: &RunState,
    log: &RunLog,
) -> WriteOutcome {
    let size_limit = config.largest_buffer();
    let mut files_created = 0u32;
    let mut create_failed = false;

    state.set_action(Action::Writing);

    while !state.cancelled()
        && files_created < config.max_file_count
        && state.pass_bytes_done() < config.max_pass_size
    {
        state.pause_point();

        let id = files_created + 1;
        let file_name = temp_file_name(id);
        let path = config.folder.join(&file_name);
        let mut out = match File::create(&path) {
            Ok(f) => f,
            Err(e) => {
                log.put(format!("{} - can't create temporary file: {}", file_name, e));
                state.add_error();
                create_failed = true;
                break;
            }
        };
        files_created += 1;
        if config.verbose {
            log.put(format!("{} - temporary file created", file_name));
        }
        state.set_file_name(Some(file_name.clone()));
        state.reset_file_bytes();

        fill.reseed(random_base, id);
        let mut ladder = BufferLadder::new(&config.buffer_sizes);
        if config.verbose {
            log.put(format!(
                "{} - data buffer size is {}",
                file_name,
                format_byte_size(ladder.current() as u64)
            ));
        }

        let file_bytes = write_file_data(
            &mut out,
            fill,
            &mut ladder,
            config.max_file_size,
            config.max_pass_size,
            state,
            log,
            &file_name,
            config.verbose,
        );
        drop(out); // close errors are not interesting here

        if !state.cancelled() {
            log.put(format!(
                "{} - {} bytes written",
                file_name,
                format_comma(file_bytes)
            ));
            // Less than one full buffer means the volume is full. This is
            // the normal way a pass ends.
            if file_bytes < size_limit as u64 {
                break;
            }
            state.note_file_est_max(file_bytes);
        }
    }

    WriteOutcome {
        files_created,
        bytes_written: state.pass_bytes_done(),
        hit_file_count: files_created >= config.max_file_count,
        hit_pass_cap: state.pass_bytes_done() >= config.max_pass_size,
        create_failed,
    }
}
