//! rulescan: rule-based content scanner.
//!
//! This is the main entry point for the CLI application.

use rulescan::core::config::Config;
use rulescan::core::error::{Error, Result};
use rulescan::core::types::EngineKind;
use rulescan::detection::yara::compile_rules;
use rulescan::scanner::{FileStore, ScanService};
use rulescan::ui::cli::{Cli, Commands, ConfigAction, OutputFormat, RulesAction};
use rulescan::ui::output::{render_rules, ScanReport, ValidationReport};
use rulescan::utils::logging::{init_logging, LogConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<u8> {
    let cli = Cli::parse_args();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    config.validate()?;

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::from_config(&config)
    };
    init_logging(log_config)?;

    log::debug!("rulescan v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Configuration loaded from {}", config_path.display());

    match cli.command {
        Some(Commands::Scan {
            paths,
            rules,
            fallback,
            no_default_rules,
        }) => run_scan(config, &paths, &rules, fallback, no_default_rules, cli.format),
        Some(Commands::Rules { action }) => run_rules(action, config, cli.format),
        Some(Commands::Config { action }) => run_config(action, &config, &config_path),
        Some(Commands::Info) => run_info(&config, &config_path),
        None => {
            println!("rulescan - Rule-based content scanner");
            println!();
            println!("Use --help for usage information");
            println!();
            println!("Quick start:");
            println!("  rulescan scan <path>...            Scan files or directories");
            println!("  rulescan scan -r extra.yar <path>  Scan with additional rules");
            println!("  rulescan rules validate <file>     Check a rule file");
            println!("  rulescan rules list                Show active rules");
            Ok(0)
        }
    }
}

/// Build and initialize a service, loading rule files given on the command line.
///
/// Unlike rule files named in the configuration, a bad command-line rule
/// file is an error.
fn start_service(config: &Config, extra_rules: &[PathBuf]) -> Result<ScanService> {
    let service = ScanService::from_config(config);
    service.try_initialize()?;

    for path in extra_rules {
        service.try_load_rules_from_path(path)?;
    }

    Ok(service)
}

/// Scan files and directories.
fn run_scan(
    mut config: Config,
    paths: &[PathBuf],
    extra_rules: &[PathBuf],
    fallback: bool,
    no_default_rules: bool,
    format: OutputFormat,
) -> Result<u8> {
    if fallback {
        config.engine.backend = EngineKind::Heuristic;
    }
    if no_default_rules {
        config.engine.load_default_rules = false;
    }

    let service = start_service(&config, extra_rules)?;
    let mut report = ScanReport::new(service.version(), service.loaded_rule_count());

    log::info!(
        "Scanning {} path(s) with {} rules",
        paths.len(),
        report.rules_loaded
    );

    for root in paths {
        let files = match service.files().collect_files(root) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot scan {}: {}", root.display(), e);
                report.push_error(root, &e);
                continue;
            }
        };

        for file in files {
            match service.try_scan_path(&file) {
                Ok(result) => {
                    if !result.is_safe() {
                        log::warn!("{}: {}", file.display(), result.threat_name());
                    }
                    report.push_result(&file, result);
                }
                Err(e) => {
                    log::warn!("Failed to scan {}: {}", file.display(), e);
                    report.push_error(&file, &e);
                }
            }
        }
    }

    service.shutdown();

    print!("{}", report.render(format)?);
    Ok(report.status().exit_code())
}

/// Validate or list rules.
fn run_rules(action: RulesAction, config: Config, format: OutputFormat) -> Result<u8> {
    match action {
        RulesAction::Validate { file } => {
            let report = validate_rule_file(&FileStore::from_config(&config.scan), &file);
            print!("{}", report.render(format)?);
            Ok(if report.valid { 0 } else { 1 })
        }
        RulesAction::List { rules } => {
            let service = start_service(&config, &rules)?;
            let summaries = service.scanner().rule_summaries()?;
            print!("{}", render_rules(&summaries, format)?);
            Ok(0)
        }
    }
}

fn validate_rule_file(files: &FileStore, path: &Path) -> ValidationReport {
    let checked = files
        .read_rules(path)
        .and_then(|blob| compile_rules(&blob));

    match checked {
        Ok(catalog) => ValidationReport::valid(
            path,
            catalog.names().into_iter().map(str::to_string).collect(),
        ),
        Err(e) => {
            log::debug!("Rule file {} rejected [{}]", path.display(), e.category());
            ValidationReport::invalid(path, &e)
        }
    }
}

/// Handle configuration commands.
fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> Result<u8> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigAction::Reset { yes } => {
            if !yes {
                return Err(Error::NotSupported(
                    "refusing to reset configuration without --yes".to_string(),
                ));
            }
            log::info!("Resetting configuration to defaults...");
            Config::default().save(config_path)?;
            println!("Configuration reset to defaults.");
        }
        ConfigAction::Path => {
            println!("{}", config_path.display());
        }
    }
    Ok(0)
}

/// Show application information.
fn run_info(config: &Config, config_path: &Path) -> Result<u8> {
    let service = ScanService::from_config(config);
    service.try_initialize()?;

    println!("rulescan - Rule-based content scanner");
    println!();
    println!("Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("Config Path:      {}", config_path.display());
    println!("Data Directory:   {}", Config::data_dir().display());
    println!();
    println!("Engine Settings:");
    println!("  Backend:        {}", config.engine.backend);
    println!("  Identifier:     {}", service.version());
    println!("  Default Rules:  {}", config.engine.load_default_rules);
    println!("  Active Rules:   {}", service.loaded_rule_count());
    for path in &config.engine.rule_paths {
        println!("  Rule File:      {}", path.display());
    }
    println!();
    println!("Scan Settings:");
    println!("  Max File Size:  {} MB", config.scan.max_file_size_mb);
    println!("  Follow Links:   {}", config.scan.follow_symlinks);
    println!("  Log Level:      {}", config.logging.log_level);
    Ok(0)
}
