/// Application-wide constants to avoid magic values throughout the codebase.
///
/// Output format constants
pub mod output_formats {
    /// Text output format - colored, aligned tables
    pub const TEXT: &str = "text";
    /// JSON output format - structured output for automation
    pub const JSON: &str = "json";
    /// CSV output format - flattened tables for spreadsheets
    pub const CSV: &str = "csv";

    /// Default output format
    pub const DEFAULT: &str = TEXT;

    /// All valid output formats
    pub const ALL: [&str; 3] = [TEXT, JSON, CSV];
}

/// Statistics constants
pub mod stats {
    /// Median rank fraction
    pub const P50: f64 = 0.50;
    /// 90th percentile rank fraction
    pub const P90: f64 = 0.90;
    /// Milliseconds in one hour
    pub const MS_PER_HOUR: f64 = 3_600_000.0;
}

/// Grouping keys with a reserved meaning
pub mod groups {
    /// Key of the single group produced when no grouping is requested
    pub const ALL: &str = "all";
    /// Reserved bucket for units without a batch label
    pub const NO_BATCH: &str = "none";
}

/// Failure probe constants
pub mod probe {
    /// Units probed per batch
    pub const DEFAULT_BATCH_SIZE: usize = 50;
    /// Per-request connect timeout for directory probes
    pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
    /// Total per-request timeout for directory probes
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;
    /// Timeout for downloading a history log
    pub const DEFAULT_HISTORY_TIMEOUT_MS: u64 = 10_000;
    /// File name suffix of the per-unit history log
    pub const HISTORY_SUFFIX: &str = "_history.log";
    /// Default base URL of a log server's log tree
    pub const DEFAULT_LOG_BASE_TEMPLATE: &str = "http://{address}:9862/opt/share/logs";
    /// Placeholder replaced by the server address
    pub const ADDRESS_PLACEHOLDER: &str = "{address}";
    /// Project tag used to select log servers from the mapping list
    pub const DEFAULT_PROJECT_TAG: &str = "mdaas";
    /// Minimum tokens on a qualifying history record
    pub const MIN_RECORD_TOKENS: usize = 7;
}

/// Failure cache constants
pub mod cache {
    /// Default cache file name
    pub const DEFAULT_CACHE_FILE: &str = "failure_cache.json";
    /// Entries older than this are stale
    pub const DEFAULT_TTL_MINUTES: u64 = 30;
    /// Suffix of the run-lock file next to the cache file
    pub const LOCK_SUFFIX: &str = ".lock";
    /// Run-locks older than this are considered abandoned
    pub const STALE_LOCK_MINUTES: i64 = 120;
    /// Timestamp layout stored in the cache entry
    pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Configuration file discovery
pub mod files {
    /// Config file name looked up in the working directory and its parents
    pub const CONFIG_FILE_NAME: &str = ".stagetime.toml";
    /// Parent directories searched for a config file
    pub const CONFIG_SEARCH_DEPTH: usize = 3;
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const NO_DATA: i32 = 2;
}

/// Display and formatting constants
pub mod display {
    /// Placeholder for a group/stage cell without data
    pub const PLACEHOLDER: &str = "-";
    /// Text shown for an environment metric without data
    pub const NO_DATA: &str = "No data";
    /// Failure rate above this is highlighted
    pub const FAILURE_RATE_WARN: f64 = 5.0;
    /// Yield at or above this is highlighted as good
    pub const YIELD_GOOD: f64 = 95.0;
}
