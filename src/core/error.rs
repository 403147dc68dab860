use std::fmt;
use std::path::PathBuf;

/// Error types for stagetime operations
#[derive(Debug)]
pub enum StageTimeError {
    /// IO error (cache file, source file, etc.)
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// A source or mapping endpoint could not be reached or answered badly
    Connectivity(String),

    /// Unknown project, stage, grouping key or filter value
    InvalidRequest(String),

    /// Failure cache could not be read or written
    Cache(String),

    /// Another refresh holds the run-lock
    ProbeInProgress(PathBuf),

    /// HTTP client error
    Http(reqwest::Error),

    /// JSON (de)serialization error
    Json(serde_json::Error),

    /// TOML parsing error
    TomlParsing(toml::de::Error),
}

impl fmt::Display for StageTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageTimeError::Io(err) => write!(f, "IO error: {err}"),
            StageTimeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            StageTimeError::Connectivity(msg) => write!(f, "Connectivity error: {msg}"),
            StageTimeError::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            StageTimeError::Cache(msg) => write!(f, "Cache error: {msg}"),
            StageTimeError::ProbeInProgress(path) => write!(
                f,
                "Probe in progress: lock file {} is held by another refresh",
                path.display()
            ),
            StageTimeError::Http(err) => write!(f, "HTTP error: {err}"),
            StageTimeError::Json(err) => write!(f, "JSON error: {err}"),
            StageTimeError::TomlParsing(err) => write!(f, "TOML parsing error: {err}"),
        }
    }
}

impl std::error::Error for StageTimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StageTimeError::Io(err) => Some(err),
            StageTimeError::Http(err) => Some(err),
            StageTimeError::Json(err) => Some(err),
            StageTimeError::TomlParsing(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StageTimeError {
    fn from(err: std::io::Error) -> Self {
        StageTimeError::Io(err)
    }
}

impl From<reqwest::Error> for StageTimeError {
    fn from(err: reqwest::Error) -> Self {
        StageTimeError::Http(err)
    }
}

impl From<serde_json::Error> for StageTimeError {
    fn from(err: serde_json::Error) -> Self {
        StageTimeError::Json(err)
    }
}

impl From<toml::de::Error> for StageTimeError {
    fn from(err: toml::de::Error) -> Self {
        StageTimeError::TomlParsing(err)
    }
}

/// Type alias for Results using StageTimeError
pub type Result<T> = std::result::Result<T, StageTimeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_error_display() {
        let config_error = StageTimeError::Config("Invalid batch size".to_string());
        assert_eq!(
            format!("{config_error}"),
            "Configuration error: Invalid batch size"
        );

        let request_error = StageTimeError::InvalidRequest("Unknown project 'L99'".to_string());
        assert_eq!(
            format!("{request_error}"),
            "Invalid request: Unknown project 'L99'"
        );
    }

    #[test]
    fn test_probe_in_progress_display_names_lock_file() {
        let err = StageTimeError::ProbeInProgress(PathBuf::from("/tmp/cache.json.lock"));
        assert!(err.to_string().contains("/tmp/cache.json.lock"));
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err = StageTimeError::from(io_error);

        assert!(matches!(err, StageTimeError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err = StageTimeError::from(json_error);

        assert!(matches!(err, StageTimeError::Json(_)));
        assert!(format!("{err}").contains("JSON error:"));
    }

    #[test]
    fn test_error_from_toml() {
        let toml_error = toml::from_str::<toml::Value>("invalid toml [").unwrap_err();
        let err = StageTimeError::from(toml_error);

        assert!(matches!(err, StageTimeError::TomlParsing(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_no_source_variants() {
        let errors_without_source = vec![
            StageTimeError::Config("test".to_string()),
            StageTimeError::Connectivity("test".to_string()),
            StageTimeError::InvalidRequest("test".to_string()),
            StageTimeError::Cache("test".to_string()),
            StageTimeError::ProbeInProgress(PathBuf::from("x.lock")),
        ];

        for error in errors_without_source {
            assert!(error.source().is_none());
            assert!(error.to_string().contains(':'));
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StageTimeError>();
    }
}
