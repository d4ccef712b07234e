//! Shared state between the worker thread and whatever front end polls it.
//!
//! The worker is the only writer; the presentation side reads counters and
//! sets exactly two signals (cancel and pause). Snapshots are advisory
//! progress data, so a reader seeing fields from two different instants is
//! acceptable.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// What the worker is currently doing with the named file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Idle,
    Writing,
    Reading,
    Deleting,
    /// Blocked waiting for the user (pause button or eject/reinsert prompt).
    Waiting,
}

impl Action {
    fn from_u8(v: u8) -> Action {
        match v {
            1 => Action::Writing,
            2 => Action::Reading,
            3 => Action::Deleting,
            4 => Action::Waiting,
            _ => Action::Idle,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Action::Idle => "Idle",
            Action::Writing => "Writing",
            Action::Reading => "Reading",
            Action::Deleting => "Deleting",
            Action::Waiting => "Waiting",
        }
    }
}

/// Elapsed-time accounting that excludes paused intervals. Computed as the
/// saved duration plus time since the last resume, so repeated pauses never
/// double-count.
struct ClockInner {
    start: Instant,
    saved: Duration,
    running: bool,
}

pub struct Clock(Mutex<ClockInner>);

impl Clock {
    fn new() -> Self {
        Clock(Mutex::new(ClockInner {
            start: Instant::now(),
            saved: Duration::ZERO,
            running: true,
        }))
    }

    pub fn restart(&self) {
        let mut inner = self.0.lock();
        inner.start = Instant::now();
        inner.saved = Duration::ZERO;
        inner.running = true;
    }

    pub fn elapsed(&self) -> Duration {
        let inner = self.0.lock();
        if inner.running {
            inner.saved + inner.start.elapsed()
        } else {
            inner.saved
        }
    }

    fn pause(&self) {
        let mut inner = self.0.lock();
        if inner.running {
            let elapsed = inner.start.elapsed();
            inner.saved += elapsed;
            inner.running = false;
        }
    }

    fn resume(&self) {
        let mut inner = self.0.lock();
        if !inner.running {
            inner.start = Instant::now();
            inner.running = true;
        }
    }
}

/// Read-only view of the running counters.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub action: Action,
    pub file_name: Option<String>,
    pub file_bytes_done: u64,
    pub file_est_max: Option<u64>,
    pub pass_bytes_done: u64,
    pub pass_est_max: Option<u64>,
    pub total_bytes_done: u64,
    pub total_errors: u64,
    pub pass_elapsed: Duration,
    pub job_elapsed: Duration,
}

/// Worker-owned run state plus the two inbound signals.
pub struct RunState {
    action: AtomicU8,
    file_name: Mutex<Option<String>>,
    file_bytes_done: AtomicU64,
    file_est_max: AtomicI64,
    pass_bytes_done: AtomicU64,
    pass_est_max: AtomicI64,
    total_bytes_done: AtomicU64,
    total_errors: AtomicU64,
    pub pass_clock: Clock,
    pub job_clock: Clock,
    cancel: AtomicBool,
    delete_after: AtomicBool,
    paused: Mutex<bool>,
    pause_cv: Condvar,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        RunState {
            action: AtomicU8::new(0),
            file_name: Mutex::new(None),
            file_bytes_done: AtomicU64::new(0),
            file_est_max: AtomicI64::new(-1),
            pass_bytes_done: AtomicU64::new(0),
            pass_est_max: AtomicI64::new(-1),
            total_bytes_done: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            pass_clock: Clock::new(),
            job_clock: Clock::new(),
            cancel: AtomicBool::new(false),
            delete_after: AtomicBool::new(true),
            paused: Mutex::new(false),
            pause_cv: Condvar::new(),
        }
    }

    // ---- worker side -------------------------------------------------

    pub fn set_action(&self, action: Action) {
        self.action.store(action as u8, Ordering::Relaxed);
    }

    pub fn set_file_name(&self, name: Option<String>) {
        *self.file_name.lock() = name;
    }

    /// Account one successfully written or read chunk.
    pub fn add_bytes(&self, n: u64) {
        self.file_bytes_done.fetch_add(n, Ordering::Relaxed);
        self.pass_bytes_done.fetch_add(n, Ordering::Relaxed);
        self.total_bytes_done.fetch_add(n, Ordering::Relaxed);
    }

    pub fn reset_file_bytes(&self) {
        self.file_bytes_done.store(0, Ordering::Relaxed);
    }

    pub fn begin_pass_phase(&self) {
        self.file_bytes_done.store(0, Ordering::Relaxed);
        self.pass_bytes_done.store(0, Ordering::Relaxed);
        self.set_file_name(None);
        self.pass_clock.restart();
    }

    pub fn pass_bytes_done(&self) -> u64 {
        self.pass_bytes_done.load(Ordering::Relaxed)
    }

    pub fn file_bytes_done(&self) -> u64 {
        self.file_bytes_done.load(Ordering::Relaxed)
    }

    pub fn total_bytes_done(&self) -> u64 {
        self.total_bytes_done.load(Ordering::Relaxed)
    }

    pub fn add_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    /// First completed file becomes the estimate for all later files.
    pub fn note_file_est_max(&self, bytes: u64) {
        let _ = self.file_est_max.compare_exchange(
            -1,
            bytes as i64,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub fn note_pass_est_max(&self, bytes: u64) {
        let _ = self.pass_est_max.compare_exchange(
            -1,
            bytes as i64,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    pub fn pass_est_max(&self) -> Option<u64> {
        match self.pass_est_max.load(Ordering::Relaxed) {
            v if v >= 0 => Some(v as u64),
            _ => None,
        }
    }

    // ---- signals -----------------------------------------------------

    /// Stop the run cooperatively. `delete_temp_files` decides whether the
    /// deletion stage still runs for files created so far.
    pub fn request_cancel(&self, delete_temp_files: bool) {
        self.delete_after.store(delete_temp_files, Ordering::SeqCst);
        self.cancel.store(true, Ordering::SeqCst);
        let mut paused = self.paused.lock();
        *paused = false;
        self.pause_cv.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    pub fn delete_temp_files(&self) -> bool {
        self.delete_after.load(Ordering::SeqCst)
    }

    /// Decide up front whether temp files are removed after each pass.
    /// A later `request_cancel` overrides this.
    pub fn set_delete_temp_files(&self, delete: bool) {
        self.delete_after.store(delete, Ordering::SeqCst);
    }

    /// Flip between paused and running. Resuming wakes the worker.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = self.paused.lock();
        *paused = !*paused;
        if !*paused {
            self.pause_cv.notify_all();
        }
        *paused
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Worker-side pause for the eject/reinsert prompt: the worker parks
    /// itself and waits for `toggle_pause` or cancel.
    pub fn begin_self_pause(&self) {
        *self.paused.lock() = true;
        self.pause_point();
    }

    /// Called at every loop boundary. Blocks while paused, with the clocks
    /// stopped so waiting never counts as elapsed time.
    pub fn pause_point(&self) {
        let mut paused = self.paused.lock();
        if !*paused {
            return;
        }
        let previous = Action::from_u8(self.action.load(Ordering::Relaxed));
        self.set_action(Action::Waiting);
        self.pass_clock.pause();
        self.job_clock.pause();
        while *paused && !self.cancelled() {
            self.pause_cv.wait(&mut paused);
        }
        self.pass_clock.resume();
        self.job_clock.resume();
        self.set_action(previous);
    }

    // ---- reader side -------------------------------------------------

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            action: Action::from_u8(self.action.load(Ordering::Relaxed)),
            file_name: self.file_name.lock().clone(),
            file_bytes_done: self.file_bytes_done.load(Ordering::Relaxed),
            file_est_max: match self.file_est_max.load(Ordering::Relaxed) {
                v if v >= 0 => Some(v as u64),
                _ => None,
            },
            pass_bytes_done: self.pass_bytes_done.load(Ordering::Relaxed),
            pass_est_max: self.pass_est_max(),
            total_bytes_done: self.total_bytes_done.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            pass_elapsed: self.pass_clock.elapsed(),
            job_elapsed: self.job_clock.elapsed(),
        }
    }
}
