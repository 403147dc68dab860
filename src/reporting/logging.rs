use crate::config::Config;
use log::{debug, error, info, warn};

/// Initialize the logger with appropriate level based on verbosity
pub fn init_logger(verbose: bool, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Off // Only show structured logs in verbose mode
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    debug!("Logger initialized with level: {level:?}");
}

/// Log configuration information
pub fn log_config_info(config: &Config) {
    let project = config.project.as_deref().unwrap_or("L10");
    let source = config.source.as_deref().unwrap_or("<none>");

    info!("Configuration: project={project}, source={source}");
    info!(
        "Probe: batch_size={}, connect_timeout={}ms, probe_timeout={}ms, history_timeout={}ms",
        config.batch_size(),
        config.connect_timeout().as_millis(),
        config.probe_timeout().as_millis(),
        config.history_timeout().as_millis()
    );
    info!(
        "Cache: file={}, ttl={}min",
        config.cache_path().display(),
        config.cache_ttl().num_minutes()
    );
}

/// Log how many units survived loading and filtering
pub fn log_units_loaded(origin: &str, loaded: usize, kept: usize) {
    info!("Loaded {loaded} unit(s) from {origin}, {kept} after exclusions and filters");
}

pub fn log_probe_start(unit_count: usize, server_count: usize, batch_size: usize) {
    info!(
        "Probing {unit_count} unit(s) across {server_count} log server(s) in batches of {batch_size}"
    );
}

pub fn log_probe_batch(batch: usize, batches: usize, checked: usize, failing: usize) {
    debug!("Batch {batch}/{batches}: {checked} unit(s) checked, {failing} with failures so far");
}

/// Log individual probe results for debugging
pub fn log_probe_result(usn: &str, server: &str, found: bool) {
    if found {
        debug!("✓ {usn} -> {server}");
    } else {
        debug!("✗ {usn} -> {server}");
    }
}

pub fn log_probe_complete(total: usize, failing: usize, duration_ms: u128) {
    if failing == 0 {
        info!("✅ Probe complete: no failures among {total} unit(s) ({duration_ms}ms)");
    } else {
        warn!("❌ Probe complete: {failing}/{total} unit(s) with failures ({duration_ms}ms)");
    }
}

pub fn log_cache_status(path: &str, age_minutes: Option<i64>, fresh: bool) {
    match age_minutes {
        Some(age) if fresh => info!("Using cache {path} ({age} min old)"),
        Some(age) => info!("Cache {path} is stale ({age} min old), recomputing"),
        None => info!("No usable cache at {path}, recomputing"),
    }
}

/// Log error information
pub fn log_error(message: &str, source: Option<&dyn std::error::Error>) {
    match source {
        Some(err) => error!("{message}: {err}"),
        None => error!("{message}"),
    }
}

/// Log warning information
pub fn log_warning(message: &str) {
    warn!("{message}");
}
