//! Runtime configuration, read from `.env` and the process environment.

use dotenv::dotenv;
use std::env;

use crate::api_connection::endpoints::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::recipe_image::DEFAULT_IMAGE_BASE;

pub const API_KEY_ENV_VAR: &str = "API_KEY";

pub const ENV_API_KEY_VAR_NAME: &str = "FOODSNAP_API_KEY_ENV";
pub const ENV_MODEL: &str = "FOODSNAP_MODEL";
pub const ENV_API_BASE: &str = "FOODSNAP_API_BASE";
pub const ENV_IMAGE_BASE: &str = "FOODSNAP_IMAGE_BASE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Name of the environment variable holding the API key, not the key itself.
    pub api_key_env_var: String,
    pub model: String,
    pub api_base: String,
    pub image_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            image_base: DEFAULT_IMAGE_BASE.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; blank values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, fallback: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
        };
        Self {
            api_key_env_var: get(ENV_API_KEY_VAR_NAME, defaults.api_key_env_var),
            model: get(ENV_MODEL, defaults.model),
            api_base: get(ENV_API_BASE, defaults.api_base),
            image_base: get(ENV_IMAGE_BASE, defaults.image_base),
        }
    }

    pub fn has_api_key(&self) -> bool {
        env::var(&self.api_key_env_var)
            .map(|v| !v.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.api_key_env_var, "API_KEY");
    }

    #[test]
    fn overrides_and_blank_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_MODEL, "gemini-2.0-flash"),
            (ENV_API_BASE, "  "),
            (ENV_API_KEY_VAR_NAME, "GEMINI_API_KEY"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.api_key_env_var, "GEMINI_API_KEY");
    }
}
