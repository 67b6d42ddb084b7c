use std::path::PathBuf;
use std::time::Duration;

use comfymcp_comfyui::poller::PollConfig;
use comfymcp_core::error::ConfigError;
use comfymcp_pipeline::GeneratorSettings;

pub const ENV_COMFYUI_HOST: &str = "COMFYUI_HOST";
pub const ENV_COMFYUI_PORT: &str = "COMFYUI_PORT";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_BASE_URL: &str = "IMAGE_APP_BASE_URL";
pub const ENV_WORKFLOW_NAME: &str = "COMFYUI_WORKFLOW_NAME";
pub const ENV_WORKING_DIR: &str = "WORKING_DIR";
pub const ENV_POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
pub const ENV_TIMEOUT_SECS: &str = "GENERATION_TIMEOUT_SECS";

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// MCP server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct McpConfig {
    pub comfyui_host: String,
    pub comfyui_port: u16,
    /// Directory generated images are written to.
    pub output_dir: PathBuf,
    /// URL prefix under which `output_dir` is served.
    pub base_url: String,
    /// Template name; resolved to `workflows/<name>.json` + `.yaml`.
    pub workflow_name: String,
    /// Root containing the `workflows/` directory.
    pub working_dir: PathBuf,
    pub poll: PollConfig,
}

impl McpConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `COMFYUI_HOST`            | --      |
    /// | `COMFYUI_PORT`            | --      |
    /// | `OUTPUT_DIR`              | --      |
    /// | `IMAGE_APP_BASE_URL`      | --      |
    /// | `COMFYUI_WORKFLOW_NAME`   | --      |
    /// | `WORKING_DIR`             | cwd     |
    /// | `POLL_INTERVAL_MS`        | `1000`  |
    /// | `GENERATION_TIMEOUT_SECS` | `600`   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// Blank values count as missing. All missing required variables are
    /// reported together.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut missing = Vec::new();
        let mut required = |key: &str| {
            get(key).unwrap_or_else(|| {
                missing.push(key.to_string());
                String::new()
            })
        };

        let comfyui_host = required(ENV_COMFYUI_HOST);
        let comfyui_port = required(ENV_COMFYUI_PORT);
        let output_dir = required(ENV_OUTPUT_DIR);
        let base_url = required(ENV_BASE_URL);
        let workflow_name = required(ENV_WORKFLOW_NAME);

        if !missing.is_empty() {
            return Err(ConfigError::MissingEnv(missing));
        }

        let comfyui_port = parse(ENV_COMFYUI_PORT, &comfyui_port)?;

        let working_dir = match get(ENV_WORKING_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().map_err(|source| ConfigError::Io {
                path: PathBuf::from("."),
                source,
            })?,
        };

        let interval_ms = match get(ENV_POLL_INTERVAL_MS) {
            Some(v) => parse(ENV_POLL_INTERVAL_MS, &v)?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };
        let timeout_secs = match get(ENV_TIMEOUT_SECS) {
            Some(v) => parse(ENV_TIMEOUT_SECS, &v)?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        positive(ENV_POLL_INTERVAL_MS, interval_ms)?;
        positive(ENV_TIMEOUT_SECS, timeout_secs)?;

        Ok(Self {
            comfyui_host,
            comfyui_port,
            output_dir: PathBuf::from(output_dir),
            base_url,
            workflow_name,
            working_dir,
            poll: PollConfig {
                interval: Duration::from_millis(interval_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    pub fn generator_settings(&self) -> GeneratorSettings {
        GeneratorSettings {
            output_dir: self.output_dir.clone(),
            base_url: self.base_url.clone(),
            poll: self.poll,
        }
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn positive(var: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidEnv {
            var,
            value: value.to_string(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            (ENV_COMFYUI_HOST, "127.0.0.1"),
            (ENV_COMFYUI_PORT, "8188"),
            (ENV_OUTPUT_DIR, "/srv/images"),
            (ENV_BASE_URL, "http://localhost:8081/view"),
            (ENV_WORKFLOW_NAME, "flux-krea"),
            (ENV_WORKING_DIR, "/opt/comfymcp"),
        ]
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let config = McpConfig::from_lookup(env(&complete())).unwrap();

        assert_eq!(config.comfyui_host, "127.0.0.1");
        assert_eq!(config.comfyui_port, 8188);
        assert_eq!(config.output_dir, PathBuf::from("/srv/images"));
        assert_eq!(config.workflow_name, "flux-krea");
        assert_eq!(config.working_dir, PathBuf::from("/opt/comfymcp"));
        assert_eq!(config.poll.interval, Duration::from_millis(1000));
        assert_eq!(config.poll.timeout, Duration::from_secs(600));
    }

    #[test]
    fn all_missing_variables_are_reported() {
        let result = McpConfig::from_lookup(env(&[(ENV_COMFYUI_HOST, "localhost")]));

        assert_matches!(result, Err(ConfigError::MissingEnv(vars)) => {
            assert_eq!(
                vars,
                vec![ENV_COMFYUI_PORT, ENV_OUTPUT_DIR, ENV_BASE_URL, ENV_WORKFLOW_NAME]
            );
        });
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = complete();
        pairs.retain(|(k, _)| *k != ENV_WORKFLOW_NAME);
        pairs.push((ENV_WORKFLOW_NAME, "   "));

        let result = McpConfig::from_lookup(env(&pairs));

        assert_matches!(result, Err(ConfigError::MissingEnv(vars)) if vars == vec![ENV_WORKFLOW_NAME]);
    }

    #[test]
    fn non_numeric_port_is_invalid() {
        let mut pairs = complete();
        pairs.retain(|(k, _)| *k != ENV_COMFYUI_PORT);
        pairs.push((ENV_COMFYUI_PORT, "eighty"));

        let result = McpConfig::from_lookup(env(&pairs));

        assert_matches!(result, Err(ConfigError::InvalidEnv { var, .. }) if var == ENV_COMFYUI_PORT);
    }

    #[test]
    fn optional_overrides_are_applied() {
        let mut pairs = complete();
        pairs.push((ENV_POLL_INTERVAL_MS, "250"));
        pairs.push((ENV_TIMEOUT_SECS, "30"));

        let config = McpConfig::from_lookup(env(&pairs)).unwrap();

        assert_eq!(config.poll.interval, Duration::from_millis(250));
        assert_eq!(config.poll.timeout, Duration::from_secs(30));
        let settings = config.generator_settings();
        assert_eq!(settings.base_url, "http://localhost:8081/view");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut pairs = complete();
        pairs.push((ENV_TIMEOUT_SECS, "0"));

        let result = McpConfig::from_lookup(env(&pairs));

        assert_matches!(result, Err(ConfigError::InvalidEnv { var, .. }) if var == ENV_TIMEOUT_SECS);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut pairs = complete();
        pairs.push((ENV_POLL_INTERVAL_MS, "0"));

        let result = McpConfig::from_lookup(env(&pairs));

        assert_matches!(result, Err(ConfigError::InvalidEnv { var, .. }) if var == ENV_POLL_INTERVAL_MS);
    }
}
