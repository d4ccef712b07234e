//! Read verify: regenerate the written byte stream and compare.
//!
//! The verifier never consults a record of what was written. It reopens
//! each file by its regenerated name, reseeds the pattern source with the
//! same per-file seed, and compares byte for byte. Flaky media gets a small
//! allowance: occasional mismatches are tolerated as long as long runs of
//! correct bytes separate them.

use std::fs::File;
use std::io::{self, ErrorKind, Read};

use crate::config::EraseConfig;
use crate::pattern::FillData;
use crate::report::{format_comma, format_hex_byte, format_hex_offset, RunLog};
use crate::status::{Action, RunState};
use crate::writer::temp_file_name;

/// Mismatch tolerance for one file. Every correct byte counts toward
/// forgiving a recent error; every mismatch resets that progress. The file
/// is abandoned once too many errors stand unforgiven.
#[derive(Debug)]
pub struct ErrorBudget {
    recent_correct: u64,
    recent_errors: u64,
    limit: u64,
    reset: u64,
}

impl ErrorBudget {
    pub fn new(limit: u64, reset: u64) -> Self {
        ErrorBudget {
            recent_correct: 0,
            recent_errors: 0,
            limit,
            reset,
        }
    }

    pub fn correct(&mut self) {
        self.recent_correct += 1;
        if self.recent_correct >= self.reset {
            self.recent_correct = 0;
            if self.recent_errors > 0 {
                self.recent_errors -= 1;
            }
        }
    }

    /// Record a mismatch. Returns `true` when the ceiling is reached and
    /// this file's verification should stop.
    pub fn mismatch(&mut self) -> bool {
        self.recent_correct = 0;
        self.recent_errors += 1;
        self.recent_errors >= self.limit
    }

    pub fn recent_errors(&self) -> u64 {
        self.recent_errors
    }
}

/// Aggregate result of the verify phase of one pass.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOutcome {
    /// Bytes that matched the regenerated stream, across all files.
    pub correct_bytes: u64,
    pub bytes_read: u64,
    pub any_mismatch: bool,
}

/// Read until `buf` is full or end-of-file. A short read from the OS is not
/// end-of-file; only a zero-byte read is. Keeping each read aligned to one
/// full block keeps the regenerated pattern in step with the file content.
fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Verify files 1..=`files_created` against the regenerated pattern.
pub fn verify_files(
    config: &EraseConfig,
    fill: &mut FillData,
    random_base: i64,
    files_created: u32,
    state: &RunState,
    log: &RunLog,
) -> VerifyOutcome {
    let size_limit = config.largest_buffer();
    let mut read_buf = vec![0u8; size_limit];
    let mut correct_bytes = 0u64;
    let mut bytes_read = 0u64;
    let mut any_mismatch = false;

    state.set_action(Action::Reading);

    let mut file_id = 1u32;
    while !state.cancelled() && file_id <= files_created {
        state.pause_point();

        let file_name = temp_file_name(file_id);
        let path = config.folder.join(&file_name);
        let mut input = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                log.put(format!("{} - can't read temporary file: {}", file_name, e));
                state.add_error();
                break;
            }
        };
        if config.verbose {
            log.put(format!("{} - reading temporary file", file_name));
        }
        state.set_file_name(Some(file_name.clone()));
        state.reset_file_bytes();

        fill.reseed(random_base, file_id);
        let mut budget = ErrorBudget::new(config.error_limit, config.error_reset);
        let mut file_bytes_read = 0u64;
        let mut file_aborted = false;
        let mut file_mismatch = false;

        while !state.cancelled() && !file_aborted {
            state.pause_point();

            let this_size = match read_full(&mut input, &mut read_buf) {
                Ok(n) => n,
                Err(e) => {
                    // Read errors are bad news: give up on this file only.
                    log.put(format!("{} - {}", file_name, e));
                    state.add_error();
                    file_aborted = true;
                    break;
                }
            };
            if this_size == 0 {
                break; // end-of-file
            }

            fill.begin_block();
            let expected = fill.block();
            for i in 0..this_size {
                if read_buf[i] == expected[i] {
                    correct_bytes += 1;
                    budget.correct();
                } else {
                    log.put(format!(
                        "{} - byte at {} is {} but should be {}",
                        file_name,
                        format_hex_offset(file_bytes_read + i as u64),
                        format_hex_byte(read_buf[i]),
                        format_hex_byte(expected[i])
                    ));
                    file_mismatch = true;
                    any_mismatch = true;
                    state.add_error();
                    if budget.mismatch() {
                        log.put(format!(
                            "{} - too many errors, stopping after {} bytes",
                            file_name,
                            format_comma(file_bytes_read + i as u64 + 1)
                        ));
                        file_aborted = true;
                        break;
                    }
                }
            }
            if file_aborted {
                break;
            }
            file_bytes_read += this_size as u64;
            bytes_read += this_size as u64;
            state.add_bytes(this_size as u64);
        }
        // close errors are ignored on this path
        drop(input);

        if !state.cancelled() && !file_aborted && !file_mismatch {
            log.put(format!(
                "{} - {} bytes correct",
                file_name,
                format_comma(file_bytes_read)
            ));
        }
        file_id += 1;
    }

    VerifyOutcome {
        correct_bytes,
        bytes_read,
        any_mismatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_forgives_after_reset_run() {
        let mut budget = ErrorBudget::new(5, 100);
        assert!(!budget.mismatch());
        assert_eq!(budget.recent_errors(), 1);
        for _ in 0..100 {
            budget.correct();
        }
        assert_eq!(budget.recent_errors(), 0);
    }

    #[test]
    fn second_error_before_reset_accumulates() {
        let mut budget = ErrorBudget::new(5, 100);
        assert!(!budget.mismatch());
        for _ in 0..50 {
            budget.correct(); // not enough to forgive
        }
        assert!(!budget.mismatch());
        assert_eq!(budget.recent_errors(), 2);
        // the mismatch reset the correct counter, so forgiveness needs a
        // full fresh run
        for _ in 0..99 {
            budget.correct();
        }
        assert_eq!(budget.recent_errors(), 2);
        budget.correct();
        assert_eq!(budget.recent_errors(), 1);
    }

    #[test]
    fn ceiling_aborts_at_limit() {
        let mut budget = ErrorBudget::new(3, 1000);
        assert!(!budget.mismatch());
        assert!(!budget.mismatch());
        assert!(budget.mismatch());
    }

    #[test]
    fn read_full_survives_short_reads() {
        use std::io::Read;

        /// Returns at most 3 bytes per call from an inner buffer.
        struct Dribble {
            data: Vec<u8>,
            pos: usize,
        }
        impl Read for Dribble {
            fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
                let n = buf.len().min(3).min(self.data.len() - self.pos);
                buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
                self.pos += n;
                Ok(n)
            }
        }

        let mut source = Dribble {
            data: (0..=255u8).collect(),
            pos: 0,
        };
        let mut buf = [0u8; 100];
        assert_eq!(read_full(&mut source, &mut buf).unwrap(), 100);
        assert_eq!(buf[99], 99);
        let mut rest = [0u8; 200];
        assert_eq!(read_full(&mut source, &mut rest).unwrap(), 156);
    }
}
