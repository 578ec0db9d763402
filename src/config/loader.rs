// ABOUTME: Layered config loading (defaults < file < env), feature "config" only
// ABOUTME: Env vars are prefixed WIRELINK_ and override any file-provided value

#![cfg(feature = "config")]

use crate::error::{Result, WirelinkError};
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Load `T` by layering: `T::default()` < an optional config file (format
/// inferred from extension: `.toml`, `.yaml`/`.yml`, `.json`) < environment
/// variables prefixed `WIRELINK_`.
pub fn load<T>(path: Option<&str>) -> Result<T>
where
    T: DeserializeOwned + Serialize + Default,
{
    let mut figment = Figment::from(Serialized::defaults(T::default()));

    if let Some(path) = path {
        figment = match path.rsplit('.').next() {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => {
                return Err(WirelinkError::config(format!(
                    "unrecognized config file extension for '{}'",
                    path
                )))
            }
        };
    }

    figment = figment.merge(Env::prefixed("WIRELINK_"));
    figment
        .extract()
        .map_err(|e| WirelinkError::config(format!("failed to load configuration: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, Default)]
    struct Example {
        name: String,
        count: u32,
    }

    #[test]
    fn test_load_falls_back_to_defaults_with_no_file() {
        let example: Example = load(None).unwrap();
        assert_eq!(example.name, "");
        assert_eq!(example.count, 0);
    }

    #[test]
    fn test_unrecognized_extension_is_a_config_error() {
        let result: Result<Example> = load(Some("settings.ini"));
        assert!(result.is_err());
    }
}
