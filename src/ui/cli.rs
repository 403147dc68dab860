// Command-line interface definitions and parsing for stagetime

use crate::config::CliConfig;
use crate::core::constants::output_formats;
use crate::core::error::Result;
use crate::metrics::GroupBy;
use crate::source::{StatusFilter, UnitFilter};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // Data
    /// Project profile (built-in: L10, L11)
    #[arg(short = 'p', long, global = true, value_name = "NAME", help_heading = "Data")]
    pub project: Option<String>,

    /// Unit-record source: JSON file path or http(s) endpoint
    #[arg(short = 's', long, global = true, value_name = "PATH|URL", help_heading = "Data")]
    pub source: Option<String>,

    // Output & Verbosity
    /// Output format
    #[arg(long, global = true, value_name = "FORMAT", value_parser = output_formats::ALL, help_heading = "Output & Verbosity")]
    pub format: Option<String>,

    /// Suppress progress output and logging
    #[arg(short = 'q', long, global = true, help_heading = "Output & Verbosity")]
    pub quiet: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long, global = true, help_heading = "Output & Verbosity")]
    pub verbose: bool,

    /// Disable progress bars
    #[arg(long, global = true, help_heading = "Output & Verbosity")]
    pub no_progress: bool,

    // Configuration
    /// Use specific config file
    #[arg(long, global = true, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Ignore config files
    #[arg(long, global = true, help_heading = "Configuration")]
    pub no_config: bool,
}

/// Client-side unit filters shared by the data commands
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Exact unit serial number
    #[arg(long, value_name = "USN", help_heading = "Filters")]
    pub usn: Option<String>,

    /// Current stage code, e.g. MD
    #[arg(long, value_name = "CODE", help_heading = "Filters")]
    pub stage: Option<String>,

    /// Model substring
    #[arg(long, value_name = "TEXT", help_heading = "Filters")]
    pub model: Option<String>,

    /// Exact bay label, or `all`
    #[arg(long, value_name = "BAY", help_heading = "Filters")]
    pub bay: Option<String>,

    /// Batch number, or `none` for units without a batch
    #[arg(long, value_name = "BATCH", help_heading = "Filters")]
    pub batch: Option<String>,

    /// Unit status
    #[arg(long, value_name = "STATUS", value_parser = ["pending", "completed"], help_heading = "Filters")]
    pub status: Option<String>,
}

/// Failure probe options shared by `probe` and `quality`
#[derive(Args, Debug, Clone, Default)]
pub struct ProbeArgs {
    /// Endpoint serving the log-server mapping list
    #[arg(long, value_name = "URL", help_heading = "Failure Probe")]
    pub mapping_url: Option<String>,

    /// Failure cache file
    #[arg(long, value_name = "FILE", help_heading = "Failure Probe")]
    pub cache_file: Option<String>,

    /// Units probed per batch (default: 50)
    #[arg(long, value_name = "COUNT", help_heading = "Failure Probe")]
    pub batch_size: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage-duration statistics, optionally grouped
    Stats {
        /// Grouping dimension
        #[arg(long, value_name = "KEY", default_value = "all", value_parser = ["all", "day", "batch", "bay"])]
        group_by: String,

        /// Put units without a batch into a `none` group
        #[arg(long)]
        include_no_batch: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Composite environment metrics
    Env {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Probe the log servers and refresh the failure cache
    Probe {
        #[command(flatten)]
        probe: ProbeArgs,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Failure rate and first-pass yield of the selected units
    Quality {
        #[command(flatten)]
        probe: ProbeArgs,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// List cached failing units with the logs they were found in
    Failures {
        /// Failure cache file
        #[arg(long, value_name = "FILE")]
        cache_file: Option<String>,
    },
    /// Flat per-unit table
    Units {
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Generate shell completions
    #[command(name = "completion-generate", arg_required_else_help = true)]
    CompletionGenerate {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    pub fn filters(&self) -> Option<&FilterArgs> {
        match self {
            Commands::Stats { filters, .. }
            | Commands::Env { filters }
            | Commands::Probe { filters, .. }
            | Commands::Quality { filters, .. }
            | Commands::Units { filters } => Some(filters),
            Commands::Failures { .. } | Commands::CompletionGenerate { .. } => None,
        }
    }

    fn probe_args(&self) -> Option<&ProbeArgs> {
        match self {
            Commands::Probe { probe, .. } | Commands::Quality { probe, .. } => Some(probe),
            _ => None,
        }
    }
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<UnitFilter> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<StatusFilter>)
            .transpose()?;

        Ok(UnitFilter {
            usn: self.usn.as_deref().map(str::trim).map(str::to_string),
            stage: self.stage.as_deref().map(|s| s.trim().to_uppercase()),
            model: self.model.clone(),
            bay: self.bay.clone(),
            batch: self.batch.clone(),
            status,
        })
    }
}

/// Parse the `--group-by` value.
pub fn group_by_arg(raw: &str) -> Result<GroupBy> {
    raw.parse()
}

/// Convert derive-based CLI arguments directly to CliConfig structure
pub fn cli_to_config(cli: &Cli) -> CliConfig {
    let mut cli_config = CliConfig {
        project: cli.project.clone(),
        source: cli.source.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        output_format: cli.format.clone(),
        no_progress: cli.no_progress,
        config_file: cli.config.clone(),
        no_config: cli.no_config,
        ..Default::default()
    };

    if let Some(probe) = cli.command.probe_args() {
        cli_config.mapping_url = probe.mapping_url.clone();
        cli_config.cache_file = probe.cache_file.clone();
        cli_config.batch_size = probe.batch_size;
    }

    if let Commands::Failures { ref cache_file } = cli.command {
        cli_config.cache_file = cache_file.clone();
    }

    cli_config
}
