//! Run log and human formatting helpers.
//!
//! Every engine message goes through [`RunLog`], one complete line at a
//! time, so errors always land in the transcript with enough context to
//! diagnose after the fact (file name, hex offset, expected vs actual).

use std::fs::File;
use std::io::Write;
use std::time::Duration;

use chrono::Local;
use parking_lot::Mutex;

/// Where engine output lines end up: an in-memory transcript that the front
/// end can drain, optionally mirrored to stderr and to a log file.
pub struct RunLog {
    lines: Mutex<Vec<String>>,
    file: Option<Mutex<File>>,
    echo_stderr: bool,
}

impl RunLog {
    pub fn new(file: Option<File>, echo_stderr: bool) -> Self {
        RunLog {
            lines: Mutex::new(Vec::new()),
            file: file.map(Mutex::new),
            echo_stderr,
        }
    }

    /// Transcript-only log, used by tests and embedders.
    pub fn quiet() -> Self {
        RunLog::new(None, false)
    }

    pub fn put<S: AsRef<str>>(&self, msg: S) {
        let msg = msg.as_ref();
        let stamped = format!("[{}] {}", current_timestamp(), msg);
        if self.echo_stderr {
            eprintln!("{}", stamped);
        }
        if let Some(ref file) = self.file {
            let mut guard = file.lock();
            let _ = writeln!(*guard, "{}", stamped);
            let _ = guard.flush();
        }
        self.lines.lock().push(msg.to_string());
    }

    /// Remove and return all lines logged since the previous drain.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }
}

pub fn current_timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Digit-grouped decimal, e.g. 1234567 -> "1,234,567".
pub fn format_comma(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Exact power-of-two scaling: only shifts while the value divides evenly,
/// so "262144" renders as "256 KB" but "1000" stays "1,000 B".
pub fn format_byte_size(size: u64) -> String {
    let mut units = size;
    let mut suffix = " B";
    for next in [" KB", " MB", " GB", " TB", " PB", " EB"] {
        if units > 0 && units & 0x3FF == 0 {
            units >>= 10;
            suffix = next;
        } else {
            break;
        }
    }
    format!("{}{}", format_comma(units), suffix)
}

/// Digital-clock style elapsed time: "1d 2h 3m 4s" (days only if nonzero).
pub fn format_clock(elapsed: Duration) -> String {
    let mut time = (elapsed.as_millis() as u64 + 500) / 1000;
    let seconds = time % 60;
    time /= 60;
    let minutes = time % 60;
    time /= 60;
    let hours = time % 24;
    let days = time / 24;
    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else {
        format!("{}h {}m {}s", hours, minutes, seconds)
    }
}

/// Elapsed time in whichever single unit reads best.
pub fn format_hours(elapsed: Duration) -> String {
    let mut units = elapsed.as_secs_f64();
    let mut suffix = "seconds";
    if units > 99.4 {
        units /= 60.0;
        suffix = "minutes";
    }
    if units > 99.4 {
        units /= 60.0;
        suffix = "hours";
    }
    if units > 99.4 {
        units /= 24.0;
        suffix = "days";
    }
    format!("{:.1} {}", units, suffix)
}

/// Transfer rate scaled into B/s .. PB/s.
pub fn format_speed(bytes_per_second: f64) -> String {
    let mut units = bytes_per_second;
    let mut suffix = "B/s";
    for next in ["KB/s", "MB/s", "GB/s", "TB/s", "PB/s"] {
        if units > 1999.4 {
            units /= 1024.0;
            suffix = next;
        } else {
            break;
        }
    }
    format!("{:.1} {}", units, suffix)
}

pub fn format_hex_byte(value: u8) -> String {
    format!("0x{:X}", value)
}

pub fn format_hex_offset(value: u64) -> String {
    format!("0x{:X}", value)
}

/// "zero temporary files", "one temporary file", "12 temporary files".
pub fn pretty_plural(number: u64, singular: &str) -> String {
    let count = match number {
        0 => "zero".to_string(),
        1 => "one".to_string(),
        2 => "two".to_string(),
        n => format_comma(n),
    };
    if number == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}s", count, singular)
    }
}
