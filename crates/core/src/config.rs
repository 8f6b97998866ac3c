//! Configuration loading helpers.
//!
//! Services describe their configuration as serde structs with defaults on
//! every field. A TOML file provides the base values and selected
//! environment variables override them.

use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

/// Load a TOML configuration file into `T`
pub fn load_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Read and parse an environment variable, `None` when unset or empty
pub fn env_override<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => parse_value(key, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_port")]
        port: u16,
        name: String,
    }

    fn default_port() -> u16 {
        4000
    }

    #[test]
    fn test_load_toml_applies_defaults() {
        let dir = std::env::temp_dir().join(format!("orbitwatch-core-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.toml");
        std::fs::write(&path, "name = \"tracker\"\n").unwrap();

        let sample: Sample = load_toml(&path).unwrap();
        assert_eq!(sample.port, 4000);
        assert_eq!(sample.name, "tracker");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_toml_missing_file() {
        let err = load_toml::<Sample, _>("/nonexistent/orbitwatch.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("PORT", "eighty").unwrap_err();
        assert!(err.to_string().contains("PORT"));
        assert_eq!(parse_value::<u16>("PORT", " 8080 ").unwrap(), 8080);
    }

    #[test]
    fn test_env_override_unset_is_none() {
        let value: Option<u16> = env_override("ORBITWATCH_TEST_SURELY_UNSET_VAR").unwrap();
        assert!(value.is_none());
    }
}
