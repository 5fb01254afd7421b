//! Configuration initialization and hierarchy management

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, info};

use crate::domain::model::{AnalyzeOptions, AppInfo};
use crate::error::{ProbeXError, ProbeXResult};
use crate::output::OutputFormat;
use crate::ports::{ConfigPort, FileSettings};
use crate::utils::logging::{LogFormat, LogLevel, LoggingConfig};

/// Environment variables and the settings they feed
pub const ENV_PARSE_SPEED: &str = "PROBEX_PARSE_SPEED";
pub const ENV_CONTINUOUS_FILE_NAMES: &str = "PROBEX_CONTINUOUS_FILE_NAMES";
pub const ENV_MAX_FILES: &str = "PROBEX_MAX_FILES";
pub const ENV_WORKERS: &str = "PROBEX_WORKERS";
pub const ENV_OUTPUT: &str = "PROBEX_OUTPUT";
pub const ENV_LOG_LEVEL: &str = "PROBEX_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "PROBEX_LOG_FORMAT";

/// Fully resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub analyze: AnalyzeOptions,
    /// Units analyzed at the same time
    pub workers: usize,
    pub output: OutputFormat,
    pub logging: LoggingConfig,
    pub app: AppInfo,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            analyze: AnalyzeOptions::default(),
            workers: num_cpus::get(),
            output: OutputFormat::default(),
            logging: LoggingConfig::default(),
            app: AppInfo::default(),
        }
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub settings: FileSettings,
}

/// Initialize configuration hierarchy following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(
    cli: &CliOverrides,
    config_port: &dyn ConfigPort,
) -> ProbeXResult<AppConfig> {
    resolve_configuration(cli, config_port, |key| std::env::var(key).ok())
}

/// Resolve the hierarchy with an explicit environment lookup
pub fn resolve_configuration<E>(
    cli: &CliOverrides,
    config_port: &dyn ConfigPort,
    env: E,
) -> ProbeXResult<AppConfig>
where
    E: Fn(&str) -> Option<String>,
{
    // Step 1: file, explicit path first
    let file = match &cli.config_path {
        Some(path) => config_port.load_file(path)?,
        None => config_port.load_default()?.unwrap_or_default(),
    };

    // Step 2: environment
    let environment = load_environment(&env)?;

    // Step 3: command line
    let settings = overlay(overlay(file, environment), cli.settings.clone());
    let config = apply(AppConfig::default(), settings)?;

    info!(
        parse_speed = config.analyze.parse_speed,
        continuous = config.analyze.test_continuous_file_names,
        workers = config.workers,
        output = %config.output,
        "configuration resolved"
    );
    Ok(config)
}

/// Read the `PROBEX_*` variables
fn load_environment<E>(env: &E) -> ProbeXResult<FileSettings>
where
    E: Fn(&str) -> Option<String>,
{
    let settings = FileSettings {
        parse_speed: parse_env(env, ENV_PARSE_SPEED)?,
        continuous_file_names: env(ENV_CONTINUOUS_FILE_NAMES)
            .map(|v| parse_flag(ENV_CONTINUOUS_FILE_NAMES, &v))
            .transpose()?,
        max_files: parse_env(env, ENV_MAX_FILES)?,
        workers: parse_env(env, ENV_WORKERS)?,
        output: env(ENV_OUTPUT),
        log_level: env(ENV_LOG_LEVEL),
        log_format: env(ENV_LOG_FORMAT),
    };
    if settings != FileSettings::default() {
        debug!(?settings, "environment overrides");
    }
    Ok(settings)
}

fn parse_env<E, T>(env: &E, key: &str) -> ProbeXResult<Option<T>>
where
    E: Fn(&str) -> Option<String>,
    T: FromStr,
{
    env(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| ProbeXError::InvalidConfig {
                message: format!("{} has an invalid value: {}", key, value),
            })
        })
        .transpose()
}

fn parse_flag(key: &str, value: &str) -> ProbeXResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProbeXError::InvalidConfig {
            message: format!("{} has an invalid value: {}", key, value),
        }),
    }
}

/// Settings from `higher` win over those from `lower`
fn overlay(lower: FileSettings, higher: FileSettings) -> FileSettings {
    FileSettings {
        parse_speed: higher.parse_speed.or(lower.parse_speed),
        continuous_file_names: higher.continuous_file_names.or(lower.continuous_file_names),
        max_files: higher.max_files.or(lower.max_files),
        workers: higher.workers.or(lower.workers),
        output: higher.output.or(lower.output),
        log_level: higher.log_level.or(lower.log_level),
        log_format: higher.log_format.or(lower.log_format),
    }
}

/// Apply merged settings over the defaults and validate the result
fn apply(mut config: AppConfig, settings: FileSettings) -> ProbeXResult<AppConfig> {
    if let Some(parse_speed) = settings.parse_speed {
        config.analyze.parse_speed = parse_speed;
    }
    if let Some(continuous) = settings.continuous_file_names {
        config.analyze.test_continuous_file_names = continuous;
    }
    if settings.max_files.is_some() {
        config.analyze.max_files = settings.max_files;
    }
    if let Some(workers) = settings.workers {
        if workers == 0 {
            return Err(ProbeXError::InvalidConfig {
                message: "workers must be at least 1".to_string(),
            });
        }
        config.workers = workers;
    }
    if let Some(output) = settings.output {
        config.output = output.parse()?;
    }
    if let Some(level) = settings.log_level {
        config.logging.level = level.parse::<LogLevel>()?;
    }
    if let Some(format) = settings.log_format {
        config.logging.format = format.parse::<LogFormat>()?;
    }
    config.analyze.validate()?;
    Ok(config)
}
