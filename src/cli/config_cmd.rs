//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, LinuxConfig};
use crate::domain::error::ConfigError;
use crate::domain::recording::{Bitrate, Duration, Framerate, QualityTier, Resolution};

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS, VALID_INDICATOR_POSITIONS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value)?;
    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    check_key(key)?;

    let config = store.load().await?;
    match get_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        let value = get_value(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn check_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Write a validated value into the config
fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let bool_value = || parse_bool(value).map_err(|_| invalid(key, "Value must be 'true' or 'false'"));

    match key {
        "ffmpeg_path" => config.ffmpeg_path = Some(value.to_string()),
        "fps" => {
            let fps = value.parse::<Framerate>().map_err(|e| invalid(key, e.to_string()))?;
            config.fps = Some(fps.as_u32());
        }
        "bitrate" => config.bitrate = Some(value.trim().to_string()),
        "resolution" => config.resolution = Some(value.trim().to_lowercase()),
        "quality" => config.quality = Some(value.trim().to_lowercase()),
        "stop_timeout" => config.stop_timeout = Some(value.to_string()),
        "max_duration" => config.max_duration = Some(value.to_string()),
        "notify" => config.notify = Some(bool_value()?),
        "linux.indicator" => {
            config.linux.get_or_insert_with(LinuxConfig::default).indicator = Some(bool_value()?);
        }
        "linux.indicator_position" => {
            config
                .linux
                .get_or_insert_with(LinuxConfig::default)
                .indicator_position = Some(value.to_string());
        }
        _ => return Err(invalid(key, "Unknown key")),
    }
    Ok(())
}

/// Read a value from the config as display text
fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    let linux = config.linux.as_ref();
    match key {
        "ffmpeg_path" => config.ffmpeg_path.clone(),
        "fps" => config.fps.map(|f| f.to_string()),
        "bitrate" => config.bitrate.clone(),
        "resolution" => config.resolution.clone(),
        "quality" => config.quality.clone(),
        "stop_timeout" => config.stop_timeout.clone(),
        "max_duration" => config.max_duration.clone(),
        "notify" => config.notify.map(|b| b.to_string()),
        "linux.indicator" => linux.and_then(|l| l.indicator).map(|b| b.to_string()),
        "linux.indicator_position" => linux.and_then(|l| l.indicator_position.clone()),
        _ => None,
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "fps" => {
            value
                .parse::<Framerate>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "bitrate" => {
            value
                .parse::<Bitrate>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "resolution" => {
            value
                .parse::<Resolution>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "quality" => {
            value
                .parse::<QualityTier>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "stop_timeout" | "max_duration" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "notify" | "linux.indicator" => {
            parse_bool(value).map_err(|_| invalid(key, "Value must be 'true' or 'false'"))?;
        }
        "linux.indicator_position" => {
            if !VALID_INDICATOR_POSITIONS.contains(&value) {
                return Err(invalid(
                    key,
                    format!(
                        "Invalid value '{}'. Valid: {}",
                        value,
                        VALID_INDICATOR_POSITIONS.join(", ")
                    ),
                ));
            }
        }
        "ffmpeg_path" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Path must not be empty"));
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Ok(true));
        assert_eq!(parse_bool("false"), Ok(false));
        assert_eq!(parse_bool("yes"), Ok(true));
        assert_eq!(parse_bool("no"), Ok(false));
        assert_eq!(parse_bool("1"), Ok(true));
        assert_eq!(parse_bool("0"), Ok(false));
        assert!(parse_bool("invalid").is_err());
    }

    #[test]
    fn validate_capture_values() {
        assert!(validate_config_value("fps", "60").is_ok());
        assert!(validate_config_value("fps", "0").is_err());
        assert!(validate_config_value("fps", "sixty").is_err());
        assert!(validate_config_value("bitrate", "4M").is_ok());
        assert!(validate_config_value("bitrate", "fast").is_err());
        assert!(validate_config_value("resolution", "1920x1080").is_ok());
        assert!(validate_config_value("resolution", "1920").is_err());
        assert!(validate_config_value("quality", "HIGH").is_ok());
        assert!(validate_config_value("quality", "ultra").is_err());
    }

    #[test]
    fn validate_durations() {
        assert!(validate_config_value("stop_timeout", "10s").is_ok());
        assert!(validate_config_value("max_duration", "1m30s").is_ok());
        assert!(validate_config_value("max_duration", "soon").is_err());
    }

    #[test]
    fn validate_indicator_position() {
        assert!(validate_config_value("linux.indicator_position", "bottom-left").is_ok());
        assert!(validate_config_value("linux.indicator_position", "middle").is_err());
    }

    #[test]
    fn set_then_get_nested_key() {
        let mut config = AppConfig::empty();
        set_value(&mut config, "linux.indicator", "yes").unwrap();
        set_value(&mut config, "fps", "25").unwrap();
        assert_eq!(get_value(&config, "linux.indicator"), Some("true".to_string()));
        assert_eq!(get_value(&config, "fps"), Some("25".to_string()));
        assert_eq!(get_value(&config, "linux.indicator_position"), None);
    }

    #[test]
    fn unknown_key_rejected() {
        let err = check_key("api_key").unwrap_err();
        assert!(err.to_string().contains("Valid keys"));
    }
}
