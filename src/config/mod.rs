//! Configuration management
//!
//! This module handles loading and managing configuration from
//! TOML files and CLI arguments.

pub mod profile;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{cache, files, output_formats, probe};
use crate::core::error::{Result, StageTimeError};

pub use profile::{
    BayCutoff, EnvironmentMetric, EnvironmentMetricDefinition, MetricMode, ProjectProfile,
    TimePoint,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active project profile name
    pub project: Option<String>,

    /// Unit-record source: a JSON file path or an http(s) endpoint
    pub source: Option<String>,

    /// Endpoint serving the log-server mapping list
    pub mapping_url: Option<String>,

    /// Project tag selecting log servers from the mapping list
    pub mapping_project_tag: Option<String>,

    /// Base URL of a server's log tree, with an `{address}` placeholder
    pub log_base_template: Option<String>,

    /// Failure cache file
    pub cache_file: Option<String>,

    /// Minutes before a cached failure summary goes stale
    pub cache_ttl_minutes: Option<u64>,

    /// Units probed per batch
    pub probe_batch_size: Option<usize>,

    /// Connect timeout for log directory probes, in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Total timeout for log directory probes, in milliseconds
    pub probe_timeout_ms: Option<u64>,

    /// Timeout for history log downloads, in milliseconds
    pub history_timeout_ms: Option<u64>,

    /// Custom User-Agent header
    pub user_agent: Option<String>,

    /// Output format (text, json, csv)
    pub output_format: Option<String>,

    /// Enable verbose logging
    pub verbose: Option<bool>,

    /// Extra or overriding project profiles
    pub projects: Option<Vec<ProjectProfile>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: Some("L10".to_string()),
            source: None,
            mapping_url: None,
            mapping_project_tag: Some(probe::DEFAULT_PROJECT_TAG.to_string()),
            log_base_template: Some(probe::DEFAULT_LOG_BASE_TEMPLATE.to_string()),
            cache_file: Some(cache::DEFAULT_CACHE_FILE.to_string()),
            cache_ttl_minutes: Some(cache::DEFAULT_TTL_MINUTES),
            probe_batch_size: Some(probe::DEFAULT_BATCH_SIZE),
            connect_timeout_ms: Some(probe::DEFAULT_CONNECT_TIMEOUT_MS),
            probe_timeout_ms: Some(probe::DEFAULT_PROBE_TIMEOUT_MS),
            history_timeout_ms: Some(probe::DEFAULT_HISTORY_TIMEOUT_MS),
            user_agent: None,
            output_format: Some(output_formats::DEFAULT.to_string()),
            verbose: Some(false),
            projects: None,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults for unset keys
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            StageTimeError::Config(format!(
                "Could not read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let loaded: Config = toml::from_str(&content).map_err(|e| {
            StageTimeError::Config(format!(
                "Invalid TOML in config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::default().overlay(loaded);
        config.validate()?;
        Ok(config)
    }

    /// Try to find and load a config file in standard locations
    pub fn load_from_standard_locations() -> Self {
        Self::load_from_directory(Path::new("."))
    }

    /// Look for the config file in `dir` and up to three of its parents
    pub fn load_from_directory(dir: &Path) -> Self {
        let mut candidate = dir.to_path_buf();
        for _ in 0..=files::CONFIG_SEARCH_DEPTH {
            let path = candidate.join(files::CONFIG_FILE_NAME);
            if path.is_file()
                && let Ok(config) = Self::load_from_file(&path)
            {
                return config;
            }
            candidate = candidate.join("..");
        }

        Self::default()
    }

    /// Fill every key the file left out from `self`
    fn overlay(self, file: Config) -> Self {
        Self {
            project: file.project.or(self.project),
            source: file.source.or(self.source),
            mapping_url: file.mapping_url.or(self.mapping_url),
            mapping_project_tag: file.mapping_project_tag.or(self.mapping_project_tag),
            log_base_template: file.log_base_template.or(self.log_base_template),
            cache_file: file.cache_file.or(self.cache_file),
            cache_ttl_minutes: file.cache_ttl_minutes.or(self.cache_ttl_minutes),
            probe_batch_size: file.probe_batch_size.or(self.probe_batch_size),
            connect_timeout_ms: file.connect_timeout_ms.or(self.connect_timeout_ms),
            probe_timeout_ms: file.probe_timeout_ms.or(self.probe_timeout_ms),
            history_timeout_ms: file.history_timeout_ms.or(self.history_timeout_ms),
            user_agent: file.user_agent.or(self.user_agent),
            output_format: file.output_format.or(self.output_format),
            verbose: file.verbose.or(self.verbose),
            projects: file.projects.or(self.projects),
        }
    }

    /// Merge this config with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli_config: &CliConfig) {
        if let Some(ref project) = cli_config.project {
            self.project = Some(project.clone());
        }
        if let Some(ref source) = cli_config.source {
            self.source = Some(source.clone());
        }

        // Failure probe
        if let Some(ref mapping_url) = cli_config.mapping_url {
            self.mapping_url = Some(mapping_url.clone());
        }
        if let Some(ref cache_file) = cli_config.cache_file {
            self.cache_file = Some(cache_file.clone());
        }
        if let Some(batch_size) = cli_config.batch_size {
            self.probe_batch_size = Some(batch_size);
        }

        // Output & format
        if cli_config.verbose {
            self.verbose = Some(true);
        }
        if let Some(ref output_format) = cli_config.output_format {
            self.output_format = Some(output_format.clone());
        }
    }

    /// Resolve the active project profile
    pub fn profile(&self) -> Result<ProjectProfile> {
        let name = self.project.as_deref().unwrap_or("L10");
        let configured = self.projects.as_deref().unwrap_or(&[]);
        profile::resolve_profile(name, configured)
    }

    pub fn output_format(&self) -> &str {
        self.output_format
            .as_deref()
            .unwrap_or(output_formats::DEFAULT)
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(
            self.cache_file
                .as_deref()
                .unwrap_or(cache::DEFAULT_CACHE_FILE),
        )
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        let minutes = self.cache_ttl_minutes.unwrap_or(cache::DEFAULT_TTL_MINUTES);
        i64::try_from(minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn batch_size(&self) -> usize {
        self.probe_batch_size.unwrap_or(probe::DEFAULT_BATCH_SIZE)
    }

    pub fn mapping_project_tag(&self) -> &str {
        self.mapping_project_tag
            .as_deref()
            .unwrap_or(probe::DEFAULT_PROJECT_TAG)
    }

    pub fn log_base_template(&self) -> &str {
        self.log_base_template
            .as_deref()
            .unwrap_or(probe::DEFAULT_LOG_BASE_TEMPLATE)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(
            self.connect_timeout_ms
                .unwrap_or(probe::DEFAULT_CONNECT_TIMEOUT_MS),
        )
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.unwrap_or(probe::DEFAULT_PROBE_TIMEOUT_MS))
    }

    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(
            self.history_timeout_ms
                .unwrap_or(probe::DEFAULT_HISTORY_TIMEOUT_MS),
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(batch_size) = self.probe_batch_size {
            if batch_size == 0 {
                return Err(StageTimeError::Config(
                    "Probe batch size cannot be 0. Expected a positive integer.".to_string(),
                ));
            }
            if batch_size > 1000 {
                return Err(StageTimeError::Config(format!(
                    "Probe batch size of {batch_size} is extremely high and may overwhelm the log servers. Consider using a smaller value."
                )));
            }
        }

        for (name, value) in [
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("history_timeout_ms", self.history_timeout_ms),
        ] {
            if value == Some(0) {
                return Err(StageTimeError::Config(format!(
                    "{name} cannot be 0. Expected a positive number of milliseconds."
                )));
            }
        }

        if self.cache_ttl_minutes == Some(0) {
            return Err(StageTimeError::Config(
                "cache_ttl_minutes cannot be 0. Expected a positive number of minutes."
                    .to_string(),
            ));
        }

        if let Some(ref template) = self.log_base_template
            && !template.contains(probe::ADDRESS_PLACEHOLDER)
        {
            return Err(StageTimeError::Config(format!(
                "log_base_template '{template}' must contain the {} placeholder.",
                probe::ADDRESS_PLACEHOLDER
            )));
        }

        for (name, value) in [
            ("source", &self.source),
            ("mapping_url", &self.mapping_url),
            ("cache_file", &self.cache_file),
        ] {
            if let Some(value) = value
                && value.trim().is_empty()
            {
                return Err(StageTimeError::Config(format!("{name} cannot be empty.")));
            }
        }

        // Validate output format
        if let Some(ref format) = self.output_format {
            match format.as_str() {
                f if output_formats::ALL.contains(&f) => {}
                _ => {
                    return Err(StageTimeError::Config(format!(
                        "Invalid output format '{format}'. Expected one of: {}.",
                        output_formats::ALL.join(", ")
                    )));
                }
            }
        }

        if let Some(ref projects) = self.projects {
            for profile in projects {
                profile.validate()?;
            }
        }

        Ok(())
    }
}

/// Configuration options that can come from CLI
#[derive(Debug, Default)]
pub struct CliConfig {
    pub project: Option<String>, // --project
    pub source: Option<String>,  // --source

    // Failure probe
    pub mapping_url: Option<String>, // --mapping-url
    pub cache_file: Option<String>,  // --cache-file
    pub batch_size: Option<usize>,   // --batch-size

    // Output & format
    pub quiet: bool,                   // --quiet
    pub verbose: bool,                 // --verbose
    pub output_format: Option<String>, // --format
    pub no_progress: bool,             // --no-progress

    // Configuration
    pub config_file: Option<String>, // --config
    pub no_config: bool,             // --no-config
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.project, Some("L10".to_string()));
        assert_eq!(config.cache_ttl_minutes, Some(30));
        assert_eq!(config.probe_batch_size, Some(50));
        assert_eq!(
            config.output_format,
            Some(output_formats::DEFAULT.to_string())
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_cache_ttl__saturates_when_out_of_range() {
        let config = Config {
            cache_ttl_minutes: Some(1_000_000_000_000_000),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.cache_ttl(), chrono::Duration::MAX);

        let config = Config {
            cache_ttl_minutes: Some(u64::MAX),
            ..Config::default()
        };
        assert_eq!(config.cache_ttl(), chrono::Duration::MAX);
    }

    #[test]
    fn test_config_load_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            b"project = \"L11\"\nsource = \"units.json\"\nprobe_batch_size = 10\nuser_agent = \"test-agent\"",
        )?;

        let config = Config::load_from_file(file.path())?;
        assert_eq!(config.project, Some("L11".to_string()));
        assert_eq!(config.source, Some("units.json".to_string()));
        assert_eq!(config.probe_batch_size, Some(10));
        assert_eq!(config.user_agent(), "test-agent");
        // Unset keys keep their defaults
        assert_eq!(config.cache_ttl_minutes, Some(30));
        assert_eq!(config.connect_timeout(), Duration::from_millis(1000));

        Ok(())
    }

    #[test]
    fn test_config_load_from_file_with_profiles() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            br#"
project = "L12"

[[projects]]
name = "L12"
stages = ["AA", "BB"]
reference_stage = "AA"

[[projects.environment_metrics]]
name = "Whole"
mode = "sum"
stages = ["AA", "BB"]
"#,
        )?;

        let config = Config::load_from_file(file.path())?;
        let profile = config.profile()?;
        assert_eq!(profile.name, "L12");
        assert_eq!(profile.environment_metrics.len(), 1);

        Ok(())
    }

    #[test]
    fn test_config_load_from_file_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"invalid toml content [").unwrap();

        let result = Config::load_from_file(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file_nonexistent() {
        let result = Config::load_from_file("/path/that/does/not/exist.toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_load_from_file_with_validation() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"probe_batch_size = 0")?;

        let result = Config::load_from_file(file.path());
        assert!(result.is_err());

        Ok(())
    }

    #[test]
    fn test_config_load_from_directory__finds_parent_file() -> Result<()> {
        let root = tempfile::tempdir()?;
        fs::write(
            root.path().join(files::CONFIG_FILE_NAME),
            "project = \"L11\"\n",
        )?;
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested)?;

        let config = Config::load_from_directory(&nested);
        assert_eq!(config.project, Some("L11".to_string()));

        Ok(())
    }

    #[test]
    fn test_config_load_from_directory__falls_back_to_defaults() -> Result<()> {
        let root = tempfile::tempdir()?;
        let config = Config::load_from_directory(root.path());
        assert_eq!(config.project, Some("L10".to_string()));
        Ok(())
    }

    #[test]
    fn test_config_merge_with_cli() {
        let mut config = Config::default();
        let cli_config = CliConfig {
            project: Some("L11".to_string()),
            mapping_url: Some("http://mapping.test/servers".to_string()),
            batch_size: Some(5),
            verbose: true,
            output_format: Some(output_formats::CSV.to_string()),
            ..Default::default()
        };

        config.merge_with_cli(&cli_config);

        assert_eq!(config.project, Some("L11".to_string()));
        assert_eq!(
            config.mapping_url,
            Some("http://mapping.test/servers".to_string())
        );
        assert_eq!(config.batch_size(), 5);
        assert_eq!(config.verbose, Some(true));
        assert_eq!(config.output_format(), "csv");
    }

    #[test]
    fn test_config_merge_preserves_unset_values() {
        let mut config = Config {
            source: Some("units.json".to_string()),
            probe_batch_size: Some(7),
            ..Default::default()
        };

        config.merge_with_cli(&CliConfig::default());

        assert_eq!(config.source, Some("units.json".to_string()));
        assert_eq!(config.probe_batch_size, Some(7));
    }

    #[test]
    fn test_config_validation_invalid_batch_size() {
        for batch_size in [0, 5000] {
            let config = Config {
                probe_batch_size: Some(batch_size),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    #[test]
    fn test_config_validation_zero_timeouts() {
        let config = Config {
            probe_timeout_ms: Some(0),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("probe_timeout_ms"));

        let config = Config {
            cache_ttl_minutes: Some(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_template_without_placeholder() {
        let config = Config {
            log_base_template: Some("http://10.0.0.1/logs".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_output_format() {
        let config = Config {
            output_format: Some("xml".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_profile() {
        let mut broken = ProjectProfile::l11();
        broken.stages.clear();
        let config = Config {
            projects: Some(vec![broken]),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_profile__unknown_project() {
        let config = Config {
            project: Some("L99".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.profile(),
            Err(StageTimeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_config_durations() {
        let config = Config {
            probe_timeout_ms: Some(2500),
            cache_ttl_minutes: Some(45),
            ..Default::default()
        };
        assert_eq!(config.probe_timeout(), Duration::from_millis(2500));
        assert_eq!(config.history_timeout(), Duration::from_millis(10_000));
        assert_eq!(config.cache_ttl(), chrono::Duration::minutes(45));
    }

    #[test]
    fn test_cli_config_default() {
        let cli_config = CliConfig::default();
        assert_eq!(cli_config.project, None);
        assert_eq!(cli_config.batch_size, None);
        assert!(!cli_config.quiet);
        assert!(!cli_config.verbose);
        assert!(!cli_config.no_progress);
        assert!(!cli_config.no_config);
    }
}
