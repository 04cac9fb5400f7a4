//! Rotation policy and file naming.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::config::{LOG_SUFFIX, PREFIX_FORMAT};

/// Decides when the active file is full and names the next one.
///
/// Files are named `{prefix}{sequence:06}.log`. The prefix is the creation
/// time of the policy, so names from one instance sort in creation order and
/// never collide with names from an earlier instance in the same directory.
#[derive(Debug, Clone)]
pub struct RotationPolicy {
    threshold: u64,
    prefix: String,
    next_sequence: u64,
}

impl RotationPolicy {
    /// Create a policy with a prefix derived from the current local time.
    pub fn new(threshold: u64) -> Self {
        Self::with_prefix(Local::now().format(PREFIX_FORMAT).to_string(), threshold)
    }

    pub fn with_prefix(prefix: impl Into<String>, threshold: u64) -> Self {
        Self {
            threshold,
            prefix: prefix.into(),
            next_sequence: 0,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sequence number the next file will get.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Whether a file holding `bytes_written` bytes must be rotated before
    /// the next write.
    pub fn should_rotate(&self, bytes_written: u64) -> bool {
        bytes_written > self.threshold
    }

    /// Name of the next file. Each call consumes a sequence number, so a
    /// failed creation never hands out the same name twice.
    pub fn next_file_name(&mut self) -> String {
        let name = format!("{}{:06}{}", self.prefix, self.next_sequence, LOG_SUFFIX);
        self.next_sequence += 1;
        name
    }

    pub fn next_path(&mut self, dir: &Path) -> PathBuf {
        dir.join(self.next_file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_rotate_only_above_threshold() {
        let policy = RotationPolicy::with_prefix("p-", 100);
        assert!(!policy.should_rotate(0));
        assert!(!policy.should_rotate(100));
        assert!(policy.should_rotate(101));
    }

    #[test]
    fn test_file_names_increase() {
        let mut policy = RotationPolicy::with_prefix("2024-01-02-03-04-05-006-", 10);
        let names: Vec<String> = (0..12).map(|_| policy.next_file_name()).collect();

        assert_eq!(names[0], "2024-01-02-03-04-05-006-000000.log");
        assert_eq!(names[11], "2024-01-02-03-04-05-006-000011.log");

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(sorted, names);
        assert_eq!(policy.next_sequence(), 12);
    }

    #[test]
    fn test_default_prefix_shape() {
        let policy = RotationPolicy::new(10);
        let prefix = policy.prefix();
        // yyyy-MM-dd-HH-mm-ss-SSS-
        assert_eq!(prefix.len(), 24);
        assert!(prefix.ends_with('-'));
        assert_eq!(prefix.matches('-').count(), 7);
    }

    #[test]
    fn test_next_path_joins_dir() {
        let mut policy = RotationPolicy::with_prefix("x-", 10);
        let path = policy.next_path(Path::new("/data/logs"));
        assert_eq!(path, PathBuf::from("/data/logs/x-000000.log"));
    }
}
