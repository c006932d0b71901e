// src/watch/path_utils.rs

//! Path relativization and mirror-path mapping helpers shared by the sync
//! handler, reconciler, and watcher.

use std::path::{Path, PathBuf};

/// Map a source-tree path onto its mirror counterpart:
/// `output_dir + relative(input_dir, path)` (§4.5.2 step 2).
///
/// Falls back to joining the path's file name directly under `output_dir`
/// if it cannot be related to `input_dir` (should not happen for events the
/// handler has already restricted to `input_dir`, §4.5.1 step 1).
pub fn mirror_path(input_dir: &Path, output_dir: &Path, src_path: &Path) -> PathBuf {
    match src_path.strip_prefix(input_dir) {
        Ok(rel) => output_dir.join(rel),
        Err(_) => match src_path.file_name() {
            Some(name) => output_dir.join(name),
            None => output_dir.to_path_buf(),
        },
    }
}

/// Whether `path` is rooted within `root` (§4.5.1 step 1).
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirror_path_preserves_relative_structure() {
        let out = mirror_path(
            Path::new("/src"),
            Path::new("/mirror"),
            Path::new("/src/a/b.png"),
        );
        assert_eq!(out, PathBuf::from("/mirror/a/b.png"));
    }

    #[test]
    fn is_within_rejects_paths_outside_root() {
        assert!(!is_within(Path::new("/src"), Path::new("/other/x")));
        assert!(is_within(Path::new("/src"), Path::new("/src/x")));
    }
}
