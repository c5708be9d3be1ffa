// model-sync/src/logging.rs

//! log4rs setup. A YAML file can be supplied; otherwise everything goes to
//! stderr at `MODEL_SYNC_LOG` level (info by default).

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, RawConfig, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, SyncError};

const LOG_LEVEL_ENV: &str = "MODEL_SYNC_LOG";
const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}{n}";

pub fn init_logging(config_path: Option<&Path>) -> Result<()> {
    match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                SyncError::Logging(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let raw_config = parse_log_config(&raw)?;
            log4rs::init_raw_config(raw_config)
                .map_err(|e| SyncError::Logging(e.to_string()))?;
        }
        None => {
            let config = default_config(level_from_env())?;
            log4rs::init_config(config).map_err(|e| SyncError::Logging(e.to_string()))?;
        }
    }
    Ok(())
}

pub fn parse_log_config(raw: &str) -> Result<RawConfig> {
    serde_yaml::from_str(raw)
        .map_err(|e| SyncError::Logging(format!("Invalid log4rs config: {}", e)))
}

pub fn default_config(level: LevelFilter) -> Result<Config> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| SyncError::Logging(e.to_string()))
}

fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|value| LevelFilter::from_str(value.trim()).ok())
        .unwrap_or(LevelFilter::Info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = default_config(LevelFilter::Debug).unwrap();
        assert_eq!(config.root().level(), LevelFilter::Debug);
        assert_eq!(config.appenders().len(), 1);
    }

    #[test]
    fn yaml_config_parses() {
        let raw = r#"
appenders:
  stdout:
    kind: console
root:
  level: warn
  appenders:
    - stdout
"#;
        let config = parse_log_config(raw).unwrap();
        assert_eq!(config.root().level(), LevelFilter::Warn);
    }

    #[test]
    fn malformed_yaml_is_a_logging_error() {
        let err = parse_log_config("root: [not, a, map").unwrap_err();
        assert!(matches!(err, SyncError::Logging(_)));
    }
}
