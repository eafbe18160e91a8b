/*!
Configuration, spec §6 plus the ambient loading contract in the expanded
spec §2.3: a config file of `key = value` lines, with every key overridable
by an equivalently named CLI flag.
*/
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use crate::error::RelayError;

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/bgpmon-filter.conf";
const DEFAULT_QUEUE_LENGTH: usize = 1024;
const DEFAULT_LOG_LEVEL: u8 = 6;

/// Resolved relay configuration, one field per key documented in spec §6.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub upstream_addr: String,
    pub rules_file: String,
    pub listen_addr: String,
    pub output_file: Option<String>,
    pub queue_length: usize,
    pub log_level: u8,
    pub log_file: Option<String>,
    pub debug: bool,
    pub stdout: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            upstream_addr: String::new(),
            rules_file: String::new(),
            listen_addr: "0.0.0.0:8080".to_string(),
            output_file: None,
            queue_length: DEFAULT_QUEUE_LENGTH,
            log_level: DEFAULT_LOG_LEVEL,
            log_file: None,
            debug: false,
            stdout: false,
        }
    }
}

impl RelayConfig {
    /// syslog-style 0-7 level, folded onto `log`'s four-level filter per the
    /// expanded spec §2.1. `debug` forces `Debug` regardless of `log_level`.
    pub fn log_level_filter(&self) -> LevelFilter {
        if self.debug {
            return LevelFilter::Debug;
        }
        match self.log_level {
            0..=3 => LevelFilter::Error,
            4 => LevelFilter::Warn,
            5 | 6 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

/// CLI surface, one flag per config key; any flag actually passed overrides
/// the file value, matching the teacher's derive-style `Opts` pattern.
#[derive(Parser, Debug, Default)]
#[command(name = "bgpmon-filter", about = "Streaming filter-and-fanout relay for BGP monitoring messages")]
pub struct Cli {
    /// path to the config file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config_file: PathBuf,

    #[arg(long)]
    pub upstream_addr: Option<String>,

    #[arg(long)]
    pub rules_file: Option<String>,

    #[arg(long)]
    pub listen_addr: Option<String>,

    #[arg(long)]
    pub output_file: Option<String>,

    #[arg(long)]
    pub queue_length: Option<usize>,

    #[arg(long)]
    pub log_level: Option<u8>,

    #[arg(long)]
    pub log_file: Option<String>,

    #[arg(long)]
    pub debug: bool,

    #[arg(long)]
    pub stdout: bool,
}

/// Load a `RelayConfig` from the file named by `cli.config_file` (if it
/// exists) layered under the CLI flags actually passed on the command line.
pub fn load(cli: &Cli) -> Result<RelayConfig, RelayError> {
    let mut config = if cli.config_file.exists() {
        let text = fs::read_to_string(&cli.config_file)?;
        parse_config_text(&text)?
    } else {
        RelayConfig::default()
    };

    if let Some(v) = &cli.upstream_addr {
        config.upstream_addr = v.clone();
    }
    if let Some(v) = &cli.rules_file {
        config.rules_file = v.clone();
    }
    if let Some(v) = &cli.listen_addr {
        config.listen_addr = v.clone();
    }
    if let Some(v) = &cli.output_file {
        config.output_file = Some(v.clone());
    }
    if let Some(v) = cli.queue_length {
        config.queue_length = v;
    }
    if let Some(v) = cli.log_level {
        config.log_level = v;
    }
    if let Some(v) = &cli.log_file {
        config.log_file = Some(v.clone());
    }
    if cli.debug {
        config.debug = true;
    }
    if cli.stdout {
        config.stdout = true;
    }

    if config.upstream_addr.is_empty() {
        return Err(RelayError::Config("upstream_addr is required".to_string()));
    }
    if config.rules_file.is_empty() {
        return Err(RelayError::Config("rules_file is required".to_string()));
    }

    Ok(config)
}

fn parse_config_text(text: &str) -> Result<RelayConfig, RelayError> {
    let mut config = RelayConfig::default();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = line.split_once('=').ok_or_else(|| {
            RelayError::Config(format!("line {}: expected 'key = value'", line_no + 1))
        })?;
        let key = key.trim();
        let value = value.trim();

        match key {
            "upstream_addr" => config.upstream_addr = value.to_string(),
            "rules_file" => config.rules_file = value.to_string(),
            "listen_addr" => config.listen_addr = value.to_string(),
            "output_file" => config.output_file = Some(value.to_string()),
            "queue_length" => {
                config.queue_length = value.parse().map_err(|_| {
                    RelayError::Config(format!("line {}: invalid queue_length '{value}'", line_no + 1))
                })?;
            }
            "log_level" => {
                config.log_level = value.parse().map_err(|_| {
                    RelayError::Config(format!("line {}: invalid log_level '{value}'", line_no + 1))
                })?;
            }
            "log_file" => config.log_file = Some(value.to_string()),
            "debug" => config.debug = value == "true" || value == "1",
            "stdout" => config.stdout = value == "true" || value == "1",
            other => {
                return Err(RelayError::Config(format!(
                    "line {}: unknown config key '{other}'",
                    line_no + 1
                )))
            }
        }
    }

    Ok(config)
}
