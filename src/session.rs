//! Per-run shared state: accumulated errors and warnings plus the progress
//! counters, mutated concurrently by worker threads.
//!
//! One session object is constructed per build invocation and handed out as
//! an `Arc`, so nothing leaks across runs and every test gets a fresh one.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// How much log output the run wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Verbose = 0,
    Normal = 1,
    Quiet = 2,
    Mute = 3,
}

pub struct BuildSession {
    pub verbosity: Verbosity,
    pub show_commands: bool,
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    total_steps: AtomicUsize,
    completed_steps: AtomicUsize,
    cancelled: AtomicBool,
}

impl BuildSession {
    pub fn new(verbosity: Verbosity, show_commands: bool) -> BuildSession {
        BuildSession {
            verbosity,
            show_commands,
            errors: Mutex::new(Vec::new()),
            warnings: Mutex::new(Vec::new()),
            total_steps: AtomicUsize::new(0),
            completed_steps: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn push_error(&self, msg: String) {
        self.errors.lock().unwrap().push(msg);
    }

    pub fn push_warning(&self, msg: String) {
        self.warnings.lock().unwrap().push(msg);
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }

    /// The run fails if anything pushed an error, no matter how many
    /// unrelated steps succeeded.
    pub fn failed(&self) -> bool {
        !self.errors.lock().unwrap().is_empty()
    }

    /// Steps are counted as soon as they are known to exist, which may be
    /// while other steps are already completing.
    pub fn add_steps(&self, n: usize) {
        self.total_steps.fetch_add(n, Ordering::SeqCst);
    }

    pub fn step_completed(&self) {
        self.completed_steps.fetch_add(1, Ordering::SeqCst);
    }

    /// (completed, total) at this instant; both may move concurrently.
    pub fn counts(&self) -> (usize, usize) {
        (
            self.completed_steps.load(Ordering::SeqCst),
            self.total_steps.load(Ordering::SeqCst),
        )
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
