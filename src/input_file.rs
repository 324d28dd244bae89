//! One source file plus the metadata derived from its location.

use rustc_hash::FxHasher;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

/// A source file awaiting build.  Created once per discovered file before
/// scheduling begins; immutable afterwards.
///
/// Intermediate objects are flattened into a single per-project directory,
/// so two sources with the same basename from different directories would
/// collide there; `dir_id` disambiguates them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InputFile {
    path: PathBuf,
    dir_id: u64,
}

impl InputFile {
    pub fn new(path: PathBuf) -> InputFile {
        let dir_id = hash_dir(path.parent().unwrap_or(Path::new("")));
        InputFile { path, dir_id }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn basename(&self) -> &str {
        self.path
            .file_name()
            .map(|n| n.to_str().unwrap_or(""))
            .unwrap_or("")
    }

    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .map(|e| e.to_str().unwrap_or(""))
            .unwrap_or("")
    }

    /// Stable id of the directory this file came from.
    pub fn dir_id(&self) -> u64 {
        self.dir_id
    }

    /// Where this file's intermediate output lands inside `int_dir`, with
    /// the directory id folded into the name to keep flattening safe.
    pub fn intermediate_path(&self, int_dir: &Path, out_ext: &str) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_str().unwrap_or("src"))
            .unwrap_or("src");
        int_dir.join(format!("{}_{:08x}{}", stem, self.dir_id as u32, out_ext))
    }
}

fn hash_dir(dir: &Path) -> u64 {
    let mut h = FxHasher::default();
    h.write(dir.to_string_lossy().as_bytes());
    h.finish()
}
