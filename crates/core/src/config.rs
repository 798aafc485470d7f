use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LocatorError, Result};
use crate::query::{DEFAULT_LIMIT, MAX_LIMIT};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub jaeger_base_url: String,
    pub service_name: String,
    pub fetch_timeout: Duration,
    pub default_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jaeger_base_url: "http://127.0.0.1:16686".to_string(),
            service_name: "aiai-api".to_string(),
            fetch_timeout: Duration::from_secs(30),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::default();
        let config_path = config_file_path();
        if let Some(file_overrides) = load_file_overrides(&config_path)? {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        Ok(cfg)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    jaeger_base_url: Option<String>,
    service_name: Option<String>,
    fetch_timeout: Option<String>,
    default_limit: Option<usize>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("LOCATOR_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("locator/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| LocatorError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| LocatorError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let default_limit = match env::var("LOCATOR_DEFAULT_LIMIT") {
        Ok(v) => Some(v.parse::<usize>().map_err(|e| {
            LocatorError::Config(format!("bad LOCATOR_DEFAULT_LIMIT in environment: {e}"))
        })?),
        Err(_) => None,
    };

    Ok(ConfigOverrides {
        jaeger_base_url: env::var("LOCATOR_JAEGER_BASE_URL").ok(),
        service_name: env::var("LOCATOR_SERVICE_NAME").ok(),
        fetch_timeout: env::var("LOCATOR_FETCH_TIMEOUT").ok(),
        default_limit,
    })
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(v) = overrides.jaeger_base_url {
        if v.trim().is_empty() {
            return Err(LocatorError::Config(format!(
                "jaeger_base_url in {source} cannot be empty"
            )));
        }
        cfg.jaeger_base_url = v;
    }
    if let Some(v) = overrides.service_name {
        cfg.service_name = v;
    }
    if let Some(v) = overrides.fetch_timeout {
        cfg.fetch_timeout = humantime::parse_duration(&v).map_err(|e| {
            LocatorError::Config(format!("bad fetch_timeout in {source}: {e} (value={v})"))
        })?;
    }
    if let Some(v) = overrides.default_limit {
        if !(1..=MAX_LIMIT).contains(&v) {
            return Err(LocatorError::Config(format!(
                "default_limit in {source} must be between 1 and {MAX_LIMIT} (value={v})"
            )));
        }
        cfg.default_limit = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn default_points_at_local_jaeger() {
        let cfg = Config::default();
        assert_eq!(cfg.jaeger_base_url, "http://127.0.0.1:16686");
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(30));
        assert_eq!(cfg.default_limit, 20);
    }

    #[test]
    fn file_overrides_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "jaeger_base_url = \"http://jaeger:16686\"\n\
             service_name = \"AIAssistantInfra/aiai-api\"\n\
             fetch_timeout = \"5s\"\n\
             default_limit = 50\n",
        )
        .unwrap();

        let mut cfg = Config::default();
        let overrides = load_file_overrides(&path).unwrap().unwrap();
        apply_overrides(&mut cfg, overrides, "config file").unwrap();

        assert_eq!(cfg.jaeger_base_url, "http://jaeger:16686");
        assert_eq!(cfg.service_name, "AIAssistantInfra/aiai-api");
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(5));
        assert_eq!(cfg.default_limit, 50);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            load_file_overrides(&dir.path().join("absent.toml"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg = Config::default();
        let bad_timeout = ConfigOverrides {
            fetch_timeout: Some("soon".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_timeout, "environment").is_err());

        let bad_limit = ConfigOverrides {
            default_limit: Some(500),
            ..ConfigOverrides::default()
        };
        assert!(apply_overrides(&mut cfg, bad_limit, "environment").is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_win() {
        // SAFETY: env mutation is serialized with the other env tests.
        unsafe {
            env::set_var("LOCATOR_SERVICE_NAME", "checkout");
            env::set_var("LOCATOR_FETCH_TIMEOUT", "250ms");
        }
        let overrides = load_env_overrides();
        unsafe {
            env::remove_var("LOCATOR_SERVICE_NAME");
            env::remove_var("LOCATOR_FETCH_TIMEOUT");
        }

        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides.unwrap(), "environment").unwrap();
        assert_eq!(cfg.service_name, "checkout");
        assert_eq!(cfg.fetch_timeout, Duration::from_millis(250));
    }
}
