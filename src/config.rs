use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use crate::errors::ConfigError;

pub const DEFAULT_MODEL_PATH: &str = "model/food_resnet18.safetensors";
pub const DEFAULT_NUTRITION_API_URL: &str = "https://api.calorieninjas.com/v1/nutrition";

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: PathBuf,
    /// Where to fetch the weights from when `model_path` does not exist.
    pub model_url: Option<String>,
    pub model_download_token: Option<String>,
    pub nutrition: NutritionClientConfig,
}

/// Settings for the external nutrition lookup.
#[derive(Debug, Clone)]
pub struct NutritionClientConfig {
    /// No key means every lookup goes straight to the fallback table.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for NutritionClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_NUTRITION_API_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let body_limit_mb: usize =
            parse_var(&lookup, "BODY_LIMIT_MB", 10, "a whole number of megabytes")?;
        let port: u16 = parse_var(&lookup, "PORT", 8000, "a port number between 0 and 65535")?;
        let timeout_secs: u64 =
            parse_var(&lookup, "NUTRITION_TIMEOUT_SECS", 5, "a whole number of seconds")?;

        Ok(Self {
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            body_limit_bytes: body_limit_mb * 1024 * 1024,
            model_path: non_empty("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.into())
                .into(),
            model_url: non_empty("MODEL_URL"),
            model_download_token: non_empty("GITHUB_TOKEN"),
            nutrition: NutritionClientConfig {
                api_key: non_empty("CALORIE_NINJAS_API_KEY"),
                base_url: non_empty("NUTRITION_API_URL")
                    .unwrap_or_else(|| DEFAULT_NUTRITION_API_URL.into()),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: "HOST",
            expected: "an IP address",
            value: self.host.clone(),
        })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue {
                name,
                expected,
                value,
            }),
    }
}
