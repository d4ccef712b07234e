//! Run configuration and validation.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::buffer::DEFAULT_BUFFER_SIZES;

pub const FILE_COUNT_DEFAULT: u32 = 999;
pub const FILE_COUNT_LOWER: u32 = 1;
pub const FILE_COUNT_UPPER: u32 = 9999;

/// Maximum recent mismatches before a file's verification is abandoned.
pub const ERROR_LIMIT_DEFAULT: u64 = 5;
/// Consecutive correct bytes that forgive one recent mismatch.
pub const ERROR_RESET_DEFAULT: u64 = 123_456_789;

/// What one pass writes into every temporary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    Constant(u8),
    PseudoRandom,
}

/// One write pass with its optional read verify.
#[derive(Debug, Clone)]
pub struct PassSpec {
    pub label: String,
    pub fill: FillMode,
    pub verify: bool,
    /// Self-pause before the verify so removable media can be ejected and
    /// reinserted, defeating the OS read cache.
    pub prompt_before_verify: bool,
}

impl PassSpec {
    pub fn constant(value: u8) -> Self {
        PassSpec {
            label: format!("Writing pattern 0x{:02X}...", value),
            fill: FillMode::Constant(value),
            verify: false,
            prompt_before_verify: false,
        }
    }

    pub fn random(verify: bool, prompt_before_verify: bool) -> Self {
        PassSpec {
            label: "Writing pseudo-random data...".to_string(),
            fill: FillMode::PseudoRandom,
            verify,
            prompt_before_verify,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("target folder {0} does not exist: {1}")]
    FolderMissing(PathBuf, io::Error),
    #[error("target {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("target folder {0} is read-only")]
    FolderReadOnly(PathBuf),
    #[error("buffer size list is empty")]
    EmptyLadder,
    #[error("buffer size list must be strictly descending at entry {0}")]
    LadderNotDescending(usize),
    #[error("buffer size {found} at entry {entry} does not divide the previous size {previous}")]
    LadderNotDivisible {
        entry: usize,
        found: usize,
        previous: usize,
    },
    #[error("buffer size at entry {0} is zero")]
    ZeroBufferSize(usize),
    #[error("file count {0} is outside {FILE_COUNT_LOWER}..={FILE_COUNT_UPPER}")]
    BadFileCount(u32),
    #[error("maximum file size {0} is smaller than the largest buffer ({1} bytes)")]
    FileSizeTooSmall(u64, u64),
    #[error("maximum pass size {0} is smaller than the largest buffer ({1} bytes)")]
    PassSizeTooSmall(u64, u64),
    #[error("no passes requested")]
    NoPasses,
}

/// Immutable settings for one erase run.
#[derive(Debug, Clone)]
pub struct EraseConfig {
    pub folder: PathBuf,
    /// Descending write-chunk sizes; each entry divides the previous one.
    pub buffer_sizes: Vec<usize>,
    pub max_file_count: u32,
    pub max_file_size: u64,
    /// Aggregate cap across all files of one pass.
    pub max_pass_size: u64,
    pub passes: Vec<PassSpec>,
    pub error_limit: u64,
    pub error_reset: u64,
    /// Reuse one entropy-filled pool per pass instead of generating every
    /// random byte. Content stays verifiable because the offset sequence is
    /// derived from the per-file seed.
    pub reuse_random_pool: bool,
    /// Log per-file details (creation, buffer reductions, deletions).
    pub verbose: bool,
}

impl EraseConfig {
    pub fn new(folder: PathBuf, passes: Vec<PassSpec>) -> Self {
        EraseConfig {
            folder,
            buffer_sizes: DEFAULT_BUFFER_SIZES.to_vec(),
            max_file_count: FILE_COUNT_DEFAULT,
            max_file_size: u64::MAX,
            max_pass_size: u64::MAX,
            passes,
            error_limit: ERROR_LIMIT_DEFAULT,
            error_reset: ERROR_RESET_DEFAULT,
            reuse_random_pool: true,
            verbose: false,
        }
    }

    pub fn largest_buffer(&self) -> usize {
        self.buffer_sizes[0]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let meta = fs::metadata(&self.folder)
            .map_err(|e| ConfigError::FolderMissing(self.folder.clone(), e))?;
        if !meta.is_dir() {
            return Err(ConfigError::NotADirectory(self.folder.clone()));
        }
        if meta.permissions().readonly() {
            return Err(ConfigError::FolderReadOnly(self.folder.clone()));
        }
        if self.buffer_sizes.is_empty() {
            return Err(ConfigError::EmptyLadder);
        }
        for (i, &size) in self.buffer_sizes.iter().enumerate() {
            if size == 0 {
                return Err(ConfigError::ZeroBufferSize(i));
            }
            if i > 0 {
                let previous = self.buffer_sizes[i - 1];
                if size >= previous {
                    return Err(ConfigError::LadderNotDescending(i));
                }
                if previous % size != 0 {
                    return Err(ConfigError::LadderNotDivisible {
                        entry: i,
                        found: size,
                        previous,
                    });
                }
            }
        }
        if self.max_file_count < FILE_COUNT_LOWER || self.max_file_count > FILE_COUNT_UPPER {
            return Err(ConfigError::BadFileCount(self.max_file_count));
        }
        let largest = self.largest_buffer() as u64;
        if self.max_file_size < largest {
            return Err(ConfigError::FileSizeTooSmall(self.max_file_size, largest));
        }
        if self.max_pass_size < largest {
            return Err(ConfigError::PassSizeTooSmall(self.max_pass_size, largest));
        }
        if self.passes.is_empty() {
            return Err(ConfigError::NoPasses);
        }
        Ok(())
    }
}

/// Parse "4K", "2MB", "1GiB" and the like into a byte count.
pub fn parse_size_with_suffix(s: &str) -> Result<u64, String> {
    let s_trimmed = s.trim();
    if s_trimmed.is_empty() {
        return Err("Input string is empty".to_string());
    }
    let first_non_digit_idx = s_trimmed.find(|c: char| !c.is_ascii_digit());
    let (num_str, suffix_orig) = match first_non_digit_idx {
        Some(0) => {
            return Err(format!("Invalid format: missing numeric value in '{}'", s_trimmed));
        }
        Some(idx) => s_trimmed.split_at(idx),
        None => (s_trimmed, ""),
    };
    let num = num_str
        .parse::<u64>()
        .map_err(|_| format!("Invalid number: '{}' in '{}'", num_str, s_trimmed))?;
    let suffix = suffix_orig.trim_start().to_uppercase();
    match suffix.as_str() {
        "" | "B" => Ok(num),
        "K" | "KB" | "KIB" => Ok(num.saturating_mul(1024)),
        "M" | "MB" | "MIB" => Ok(num.saturating_mul(1024 * 1024)),
        "G" | "GB" | "GIB" => Ok(num.saturating_mul(1024 * 1024 * 1024)),
        "T" | "TB" | "TIB" => Ok(num.saturating_mul(1024 * 1024 * 1024 * 1024)),
        _ => Err(format!(
            "Unknown or misplaced size suffix: '{}' in '{}'",
            suffix_orig, s_trimmed
        )),
    }
}
