//! Shared fixtures for weave's integration and unit tests.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A source file written under the system temp directory, removed when dropped.
pub struct TempSource {
    path: PathBuf,
}

impl TempSource {
    /// Writes `contents` to a fresh file named `<name>-<n>.weave` under `std::env::temp_dir()`.
    pub fn new(name: &str, contents: &str) -> Self {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("weave-test-{name}-{n}.weave"));
        fs::write(&path, contents).expect("failed to write temp fixture");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempSource {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Asserts that `haystack` contains every string in `needles`, in order, panicking with
/// the full haystack on failure so test output stays readable.
pub fn assert_contains_in_order(haystack: &str, needles: &[&str]) {
    let mut cursor = 0usize;
    for needle in needles {
        match haystack[cursor..].find(needle) {
            Some(pos) => cursor += pos + needle.len(),
            None => panic!(
                "expected to find {needle:?} after byte {cursor} in:\n{haystack}\n---\nmissing: {needle:?}"
            ),
        }
    }
}
