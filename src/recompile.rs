//! The incremental-rebuild decision: may a build step be skipped?
//!
//! Purely advisory to the scheduler; a skipped step still exists and moves
//! straight to Succeeded, so dependency accounting and progress counters
//! stay uniform.

use dashmap::DashMap;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MTime {
    Missing,
    Stamp(SystemTime),
}

pub fn stat(path: &Path) -> std::io::Result<MTime> {
    match std::fs::metadata(path) {
        Ok(meta) => Ok(MTime::Stamp(meta.modified()?)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(MTime::Missing),
        Err(err) => Err(err),
    }
}

/// Concurrent cache of file modification times, shared by all workers for
/// the duration of one run.
#[derive(Default)]
pub struct StatCache {
    map: DashMap<PathBuf, MTime>,
}

impl StatCache {
    pub fn new() -> StatCache {
        StatCache::default()
    }

    pub fn stat(&self, path: &Path) -> std::io::Result<MTime> {
        if let Some(cached) = self.map.get(path) {
            return Ok(*cached);
        }
        let mtime = stat(path)?;
        self.map.insert(path.to_path_buf(), mtime);
        Ok(mtime)
    }

    /// Drops a cached entry; called for outputs a step just (re)wrote.
    pub fn invalidate(&self, path: &Path) {
        self.map.remove(path);
    }

    /// Stats many paths up front in parallel, so the scheduling loop mostly
    /// hits the cache.
    pub fn prime(&self, paths: &[PathBuf]) {
        paths.par_iter().for_each(|path| {
            if let Ok(mtime) = stat(path) {
                self.map.insert(path.clone(), mtime);
            }
        });
    }
}

/// True when every output exists and is strictly newer than every input.
/// Any missing output, any missing input, or an indistinguishable (equal)
/// timestamp means rebuild: correctness wins over speed.
pub fn should_skip(
    cache: &StatCache,
    inputs: &[PathBuf],
    outputs: &[PathBuf],
) -> std::io::Result<bool> {
    if outputs.is_empty() {
        return Ok(false);
    }
    let mut newest_input: Option<SystemTime> = None;
    for path in inputs {
        match cache.stat(path)? {
            MTime::Missing => return Ok(false),
            MTime::Stamp(t) => {
                newest_input = Some(match newest_input {
                    None => t,
                    Some(prev) => prev.max(t),
                });
            }
        }
    }
    for path in outputs {
        match cache.stat(path)? {
            MTime::Missing => return Ok(false),
            MTime::Stamp(t) => {
                if let Some(newest) = newest_input {
                    if t <= newest {
                        return Ok(false);
                    }
                }
            }
        }
    }
    Ok(true)
}
