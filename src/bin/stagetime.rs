use clap::Parser;
use stagetime::config::{CliConfig, Config};
use stagetime::core::constants::exit_codes;
use stagetime::core::error::{Result, StageTimeError};
use stagetime::probe::{
    self, CacheStore, FailureListing, FailureLogProbe, ProbeReport, ProbeSettings, cache::now_local,
};
use stagetime::reporting::logging;
use stagetime::session::Session;
use stagetime::source::{LogServer, fetch_log_servers, source_for};
use stagetime::ui::cli::group_by_arg;
use stagetime::ui::output::{self, OutputFormat};
use stagetime::ui::{Cli, Commands, FilterArgs, ProgressReporter, cli_to_config, print_completions};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Completions need neither config nor data
    if let Commands::CompletionGenerate { shell } = cli.command {
        print_completions(shell);
        std::process::exit(exit_codes::SUCCESS);
    }

    match run(&cli).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            logging::log_error("Command failed", Some(&e as &dyn std::error::Error));
            eprintln!("Error: {e}");
            std::process::exit(exit_codes::FAILURE);
        }
    }
}

/// Settings for output formatting and display
struct OutputSettings {
    format: OutputFormat,
    show_progress: bool,
}

impl OutputSettings {
    fn new(cli_config: &CliConfig, config: &Config) -> Result<Self> {
        let format: OutputFormat = config.output_format().parse()?;
        Ok(Self {
            format,
            show_progress: !cli_config.quiet
                && !cli_config.no_progress
                && format == OutputFormat::Text,
        })
    }

    fn progress(&self) -> ProgressReporter {
        ProgressReporter::new(self.show_progress)
    }
}

async fn run(cli: &Cli) -> Result<i32> {
    let cli_config = cli_to_config(cli);
    let config = load_and_merge_config(&cli_config)?;

    logging::init_logger(config.verbose.unwrap_or(false), cli_config.quiet);
    config.validate()?;
    logging::log_config_info(&config);

    let settings = OutputSettings::new(&cli_config, &config)?;
    let format = settings.format;

    match cli.command {
        Commands::Stats {
            ref group_by,
            include_no_batch,
            ref filters,
        } => {
            let group_by = group_by_arg(group_by)?;
            let session = load_session(&config, filters, &settings).await?;
            match session.aggregate(group_by, include_no_batch) {
                Some(aggregation) => emit(output::render_aggregation(&aggregation, format)?),
                None => no_data(format),
            }
        }
        Commands::Env { ref filters } => {
            let session = load_session(&config, filters, &settings).await?;
            if session.units().is_empty() {
                return no_data(format);
            }
            emit(output::render_environment(&session.environment_stats(), format)?)
        }
        Commands::Units { ref filters } => {
            let session = load_session(&config, filters, &settings).await?;
            if session.units().is_empty() {
                return no_data(format);
            }
            emit(output::render_units(
                session.units(),
                &session.profile().stages,
                format,
            )?)
        }
        Commands::Probe { ref filters, .. } => {
            let session = load_session(&config, filters, &settings).await?;
            if session.units().is_empty() {
                return no_data(format);
            }

            let servers = load_servers(&config).await?;
            let prober = FailureLogProbe::new(ProbeSettings::from_config(&config))?;
            let store = CacheStore::new(config.cache_path());

            let mut progress = settings.progress();
            progress.start_probe(session.units().len());
            let entry = probe::refresh_failure_cache(
                &prober,
                &store,
                &session.unit_ids(),
                &servers,
                Some(&progress),
            )
            .await?;
            progress.finish_probe(entry.usns_with_logs, entry.total_usns);
            progress.finish_and_clear();

            emit(output::render_cache_entry(&entry, format)?)
        }
        Commands::Quality { ref filters, .. } => {
            let session = load_session(&config, filters, &settings).await?;
            let usns = session.unit_ids();
            if usns.is_empty() {
                return no_data(format);
            }

            let store = CacheStore::new(config.cache_path());
            let report = probe::quality_for_units(&store, config.cache_ttl(), &usns, || {
                realtime_probe(&config, &settings, &usns)
            })
            .await?;

            emit(output::render_quality(&report, format)?)
        }
        Commands::Failures { .. } => {
            let store = CacheStore::new(config.cache_path());
            match store.load()? {
                Some(entry) => {
                    let listing = FailureListing::from_entry(&entry, now_local(), config.cache_ttl());
                    emit(output::render_failures(&listing, format)?)
                }
                None => no_data(format),
            }
        }
        Commands::CompletionGenerate { shell } => {
            print_completions(shell);
            Ok(exit_codes::SUCCESS)
        }
    }
}

/// Load configuration from file or standard locations and merge with CLI config
fn load_and_merge_config(cli_config: &CliConfig) -> Result<Config> {
    let mut config = if cli_config.no_config {
        Config::default()
    } else if let Some(ref config_file) = cli_config.config_file {
        Config::load_from_file(config_file)?
    } else {
        Config::load_from_standard_locations()
    };

    // CLI takes precedence
    config.merge_with_cli(cli_config);
    Ok(config)
}

fn http_client(config: &Config) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .connect_timeout(config.connect_timeout())
        .timeout(config.history_timeout())
        .user_agent(config.user_agent())
        .build()?)
}

async fn load_session(config: &Config, filters: &FilterArgs, settings: &OutputSettings) -> Result<Session> {
    let location = config.source.as_deref().ok_or_else(|| {
        StageTimeError::Config(
            "No unit source configured. Use --source or set `source` in the config file."
                .to_string(),
        )
    })?;

    let profile = config.profile()?;
    let filter = filters.to_filter()?;
    let source = source_for(location, http_client(config)?);

    let mut progress = settings.progress();
    progress.start_loading(&source.describe());
    let session = Session::load(profile, source.as_ref(), &filter).await?;
    progress.finish_loading(session.units().len());
    progress.finish_and_clear();

    Ok(session)
}

async fn load_servers(config: &Config) -> Result<Vec<LogServer>> {
    let mapping_url = config.mapping_url.as_deref().ok_or_else(|| {
        StageTimeError::Config(
            "No server mapping configured. Use --mapping-url or set `mapping_url` in the config file."
                .to_string(),
        )
    })?;

    fetch_log_servers(&http_client(config)?, mapping_url, config.mapping_project_tag()).await
}

/// Probe exactly `usns` without touching the cache.
async fn realtime_probe(
    config: &Config,
    settings: &OutputSettings,
    usns: &[String],
) -> Result<ProbeReport> {
    let servers = load_servers(config).await?;
    let prober = FailureLogProbe::new(ProbeSettings::from_config(config))?;

    let mut progress = settings.progress();
    progress.start_probe(usns.len());
    let report = prober.run(usns, &servers, Some(&progress)).await;
    progress.finish_probe(report.failing.len(), report.total_units);
    progress.finish_and_clear();

    Ok(report)
}

fn emit(rendered: String) -> Result<i32> {
    print!("{rendered}");
    Ok(exit_codes::SUCCESS)
}

fn no_data(format: OutputFormat) -> Result<i32> {
    print!("{}", output::render_no_data(format)?);
    Ok(exit_codes::NO_DATA)
}
