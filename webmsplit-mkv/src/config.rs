//! Parser configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for header acceptance, navigation and the parse-ahead worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Bytes scanned for the EBML magic before the input is rejected.
    pub header_scan_limit: u64,
    /// Highest accepted DocTypeVersion.
    pub max_doc_type_version: u64,
    /// Highest accepted DocTypeReadVersion.
    pub max_doc_type_read_version: u64,
    /// Clusters one navigation search visits before asking for more data.
    /// Ignored once the segment is fully parsed.
    pub max_cluster_scan: usize,
    /// Back-off of the parse-ahead worker while the source is still filling.
    pub poll_interval_ms: u64,
    /// Consult the cue index when preloading ahead of a seek.
    pub use_cues: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            header_scan_limit: 1024,
            max_doc_type_version: 2,
            max_doc_type_read_version: 2,
            max_cluster_scan: 100,
            poll_interval_ms: 10,
            use_cues: true,
        }
    }

    /// Set the EBML magic scan limit.
    #[must_use]
    pub fn header_scan_limit(mut self, bytes: u64) -> Self {
        self.header_scan_limit = bytes;
        self
    }

    /// Set the highest accepted DocTypeVersion.
    #[must_use]
    pub fn max_doc_type_version(mut self, version: u64) -> Self {
        self.max_doc_type_version = version;
        self
    }

    /// Set the highest accepted DocTypeReadVersion.
    #[must_use]
    pub fn max_doc_type_read_version(mut self, version: u64) -> Self {
        self.max_doc_type_read_version = version;
        self
    }

    /// Set the navigation search bound.
    #[must_use]
    pub fn max_cluster_scan(mut self, clusters: usize) -> Self {
        self.max_cluster_scan = clusters.max(1);
        self
    }

    /// Set the parse-ahead back-off.
    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable cue-assisted preloading.
    #[must_use]
    pub fn use_cues(mut self, enabled: bool) -> Self {
        self.use_cues = enabled;
        self
    }

    /// Parse-ahead back-off as a duration.
    pub fn poll_interval_duration(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.header_scan_limit, 1024);
        assert_eq!(config.max_doc_type_version, 2);
        assert_eq!(config.max_cluster_scan, 100);
        assert!(config.use_cues);
    }

    #[test]
    fn test_builder() {
        let config = ParserConfig::new()
            .max_doc_type_version(4)
            .max_cluster_scan(0)
            .poll_interval(Duration::from_millis(25))
            .use_cues(false);
        assert_eq!(config.max_doc_type_version, 4);
        assert_eq!(config.max_cluster_scan, 1);
        assert_eq!(config.poll_interval_duration(), Duration::from_millis(25));
        assert!(!config.use_cues);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ParserConfig =
            serde_json::from_str(r#"{ "max_doc_type_version": 4, "use_cues": false }"#).unwrap();
        assert_eq!(config.max_doc_type_version, 4);
        assert!(!config.use_cues);
        assert_eq!(config.header_scan_limit, 1024);
        assert_eq!(config.poll_interval_ms, 10);
    }
}
