// src/recipe/kitchen/config.rs

//! Configuration types for the Kitchen

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Kitchen
#[derive(Debug, Clone)]
pub struct KitchenConfig {
    /// Parent directory for per-build scratch areas (None = system temp dir)
    pub scratch_root: Option<PathBuf>,
    /// Number of parallel jobs passed to the build tool
    pub jobs: u32,
    /// Timeout for a single build command
    pub timeout: Duration,
    /// Keep the scratch area (build tree and logs) after the build
    pub keep_builddir: bool,
    /// Extra environment variables set for every build command
    pub env: Vec<(String, String)>,
}

impl Default for KitchenConfig {
    fn default() -> Self {
        let jobs = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);

        Self {
            scratch_root: None,
            jobs,
            timeout: Duration::from_secs(4 * 3600), // scientific codes compile slowly
            keep_builddir: false,
            env: Vec::new(),
        }
    }
}

impl KitchenConfig {
    pub fn with_jobs(mut self, jobs: u32) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kitchen_config_default() {
        let config = KitchenConfig::default();
        assert!(config.jobs > 0);
        assert!(!config.keep_builddir);
        assert!(config.scratch_root.is_none());
        assert_eq!(config.timeout, Duration::from_secs(14400));
    }

    #[test]
    fn test_kitchen_config_builders() {
        let config = KitchenConfig::default()
            .with_jobs(0)
            .with_scratch_root("/var/tmp/pantry")
            .with_env("OMPI_CC", "gcc")
            .with_timeout(Duration::from_secs(60));
        assert_eq!(config.jobs, 1);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.scratch_root, Some(PathBuf::from("/var/tmp/pantry")));
        assert_eq!(config.env, vec![("OMPI_CC".to_string(), "gcc".to_string())]);
    }
}
