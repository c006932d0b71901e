#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;

use mirrorsync::config::TaskConfig;

/// Builder for `TaskConfig` to simplify test setup.
pub struct TaskConfigBuilder {
    name: String,
    input_dir: String,
    output_dir: String,
    extensions: HashSet<String>,
}

impl TaskConfigBuilder {
    pub fn new(input_dir: &Path, output_dir: &Path) -> Self {
        Self {
            name: "test-task".to_string(),
            input_dir: input_dir.to_string_lossy().to_string(),
            output_dir: output_dir.to_string_lossy().to_string(),
            extensions: HashSet::new(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn extension(mut self, ext: &str) -> Self {
        self.extensions.insert(ext.to_lowercase());
        self
    }

    pub fn extensions(mut self, exts: &[&str]) -> Self {
        self.extensions.extend(exts.iter().map(|s| s.to_lowercase()));
        self
    }

    pub fn build(self) -> TaskConfig {
        TaskConfig::new(
            uuid_like(&self.name),
            self.name,
            self.input_dir,
            self.output_dir,
            self.extensions,
        )
    }
}

/// A cheap, dependency-free stand-in for a unique task id in tests, where
/// stability and readability in assertion failures matter more than true
/// global uniqueness.
fn uuid_like(seed: &str) -> String {
    format!("test-{seed}")
}
