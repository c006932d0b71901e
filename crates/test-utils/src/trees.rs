#![allow(dead_code)]

//! Helpers for building small source/mirror directory trees in tests,
//! grounded in the scenarios of §8 (empty tree, mixed-extension tree,
//! chunked writes, renames, deletes).

use std::io::Write;
use std::path::{Path, PathBuf};

/// A temp directory holding an `in/` and `out/` subtree, torn down when
/// dropped.
pub struct TestTree {
    _root: tempfile::TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl TestTree {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let input_dir = root.path().join("in");
        let output_dir = root.path().join("out");
        std::fs::create_dir_all(&input_dir).unwrap();

        Self {
            _root: root,
            input_dir,
            output_dir,
        }
    }

    /// Write `contents` to `rel` under the input tree, creating parent
    /// directories as needed.
    pub fn write_input(&self, rel: &str, contents: &[u8]) -> PathBuf {
        let path = self.input_dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    pub fn mirror_path(&self, rel: &str) -> PathBuf {
        self.output_dir.join(rel)
    }

    pub fn read_output(&self, rel: &str) -> Vec<u8> {
        std::fs::read(self.mirror_path(rel)).unwrap()
    }

    pub fn output_is_symlink(&self, rel: &str) -> bool {
        std::fs::symlink_metadata(self.mirror_path(rel))
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
    }
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the absolute path a correctly-created symlink should resolve
/// to, for assertions against `std::fs::read_link`.
pub fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap().join(path)
    }
}
