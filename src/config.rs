use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub cloudflare: CloudflareConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Credential and target record. The three identifying fields default to
/// empty so that `validate` can name whichever one is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudflareConfig {
    #[serde(default)]
    pub api_token: String,
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub record_name: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_ip_service_url")]
    pub ip_service_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_api_base() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_interval_secs() -> u64 {
    300
}

fn default_ip_service_url() -> String {
    "https://api.ipify.org".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            ip_service_url: default_ip_service_url(),
            timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            Error::config(format!("failed to parse config file {}: {}", path.display(), e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Reads the process environment, falling back to a `.env` file in the
    /// working directory for anything not exported.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with_dotenv(|key| env::var(key).ok(), Path::new(".env"))
    }

    fn from_env_with_dotenv<F>(var: F, dotenv: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = read_dotenv(dotenv)?;
        Self::from_vars(|key| var(key).or_else(|| file.get(key).cloned()))
    }

    /// Builds the configuration from `CF_API_TOKEN`, `ZONE_ID` and
    /// `RECORD_NAME`, plus the optional tuning variables, resolved through
    /// `var`.
    pub fn from_vars<F>(var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let number = |key: &str, default: u64| -> Result<u64> {
            match var(key) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    Error::config(format!("{} must be a whole number of seconds, got {:?}", key, raw))
                }),
                None => Ok(default),
            }
        };

        let config = Config {
            cloudflare: CloudflareConfig {
                api_token: var("CF_API_TOKEN").unwrap_or_default(),
                zone_id: var("ZONE_ID").unwrap_or_default(),
                record_name: var("RECORD_NAME").unwrap_or_default(),
                api_base: var("CF_API_BASE").unwrap_or_else(default_api_base),
            },
            daemon: DaemonConfig {
                interval_secs: number("CHECK_INTERVAL_SECS", default_interval_secs())?,
                ip_service_url: var("IP_CHECK_URL").unwrap_or_else(default_ip_service_url),
                timeout_secs: number("HTTP_TIMEOUT_SECS", default_timeout_secs())?,
                log_level: var("LOG_LEVEL").unwrap_or_else(default_log_level),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api_token (CF_API_TOKEN)", &self.cloudflare.api_token),
            ("zone_id (ZONE_ID)", &self.cloudflare.zone_id),
            ("record_name (RECORD_NAME)", &self.cloudflare.record_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{} is required", key)));
            }
        }

        if self.daemon.interval_secs == 0 {
            return Err(Error::config("interval_secs must be greater than zero"));
        }
        if self.daemon.timeout_secs == 0 {
            return Err(Error::config("timeout_secs must be greater than zero"));
        }

        for (key, url) in [
            ("api_base", &self.cloudflare.api_base),
            ("ip_service_url", &self.daemon.ip_service_url),
        ] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::config(format!(
                    "{} must be an http:// or https:// URL, got {:?}",
                    key, url
                )));
            }
        }

        Ok(())
    }
}

/// A missing file is not an error; a malformed one is.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => {
            return Err(Error::config(format!("failed to read {}: {}", path.display(), e)));
        }
    };

    iter.collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const COMPLETE: &[(&str, &str)] = &[
        ("CF_API_TOKEN", "t"),
        ("ZONE_ID", "z1"),
        ("RECORD_NAME", "home.example.com"),
    ];

    #[test]
    fn env_with_required_fields_uses_defaults() {
        let config = Config::from_vars(vars(COMPLETE)).unwrap();

        assert_eq!(config.cloudflare.api_token, "t");
        assert_eq!(config.cloudflare.zone_id, "z1");
        assert_eq!(config.cloudflare.record_name, "home.example.com");
        assert_eq!(config.cloudflare.api_base, "https://api.cloudflare.com/client/v4");
        assert_eq!(config.daemon.interval(), Duration::from_secs(300));
        assert_eq!(config.daemon.ip_service_url, "https://api.ipify.org");
        assert_eq!(config.daemon.timeout(), Duration::from_secs(30));
        assert_eq!(config.daemon.log_level, "info");
    }

    #[test]
    fn env_missing_any_required_field_is_config_error() {
        for missing in ["CF_API_TOKEN", "ZONE_ID", "RECORD_NAME"] {
            let pairs: Vec<_> = COMPLETE
                .iter()
                .copied()
                .filter(|(k, _)| *k != missing)
                .collect();

            let err = Config::from_vars(vars(&pairs)).unwrap_err();
            assert!(matches!(err, Error::Config(_)), "{}: {:?}", missing, err);
            assert!(err.to_string().contains(missing), "{}", err);
        }
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let err = Config::from_vars(vars(&[
            ("CF_API_TOKEN", "t"),
            ("ZONE_ID", "   "),
            ("RECORD_NAME", "home.example.com"),
        ]))
        .unwrap_err();

        assert!(matches!(err, Error::Config(ref msg) if msg.contains("zone_id")));
    }

    #[test]
    fn env_overrides_optional_settings() {
        let mut pairs = COMPLETE.to_vec();
        pairs.extend([
            ("CHECK_INTERVAL_SECS", "60"),
            ("HTTP_TIMEOUT_SECS", "5"),
            ("IP_CHECK_URL", "http://127.0.0.1:9000/ip"),
            ("CF_API_BASE", "http://127.0.0.1:9001"),
            ("LOG_LEVEL", "warn"),
        ]);

        let config = Config::from_vars(vars(&pairs)).unwrap();

        assert_eq!(config.daemon.interval_secs, 60);
        assert_eq!(config.daemon.timeout_secs, 5);
        assert_eq!(config.daemon.ip_service_url, "http://127.0.0.1:9000/ip");
        assert_eq!(config.cloudflare.api_base, "http://127.0.0.1:9001");
        assert_eq!(config.daemon.log_level, "warn");
    }

    #[test]
    fn non_numeric_interval_is_rejected() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push(("CHECK_INTERVAL_SECS", "five minutes"));

        let err = Config::from_vars(vars(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("CHECK_INTERVAL_SECS")));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push(("CHECK_INTERVAL_SECS", "0"));

        assert!(matches!(Config::from_vars(vars(&pairs)), Err(Error::Config(_))));
    }

    #[test]
    fn url_without_scheme_is_rejected() {
        let mut pairs = COMPLETE.to_vec();
        pairs.push(("IP_CHECK_URL", "api.ipify.org"));

        let err = Config::from_vars(vars(&pairs)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("ip_service_url")));
    }

    #[test]
    fn load_reads_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[cloudflare]
api_token = "t"
zone_id = "z1"
record_name = "home.example.com"

[daemon]
interval_secs = 120
log_level = "debug"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.cloudflare.zone_id, "z1");
        assert_eq!(config.daemon.interval_secs, 120);
        assert_eq!(config.daemon.log_level, "debug");
        assert_eq!(config.daemon.ip_service_url, "https://api.ipify.org");
    }

    #[test]
    fn load_file_missing_record_name_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cloudflare]\napi_token = \"t\"\nzone_id = \"z1\"\n").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("record_name")));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();

        assert!(matches!(err, Error::Config(ref msg) if msg.contains("failed to read")));
    }

    #[test]
    fn load_malformed_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cloudflare\napi_token = ").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("failed to parse")));
    }

    #[test]
    fn dotenv_file_supplies_unexported_variables() {
        let dir = tempfile::tempdir().unwrap();
        let dotenv = dir.path().join(".env");
        std::fs::write(
            &dotenv,
            "CF_API_TOKEN=from-file\nZONE_ID=z1\nRECORD_NAME=home.example.com\n",
        )
        .unwrap();

        let config =
            Config::from_env_with_dotenv(vars(&[("CF_API_TOKEN", "exported")]), &dotenv).unwrap();

        assert_eq!(config.cloudflare.api_token, "exported");
        assert_eq!(config.cloudflare.zone_id, "z1");
        assert_eq!(config.cloudflare.record_name, "home.example.com");
    }

    #[test]
    fn absent_dotenv_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();

        let config = Config::from_env_with_dotenv(vars(COMPLETE), &dir.path().join(".env")).unwrap();
        assert_eq!(config.cloudflare.zone_id, "z1");
    }

    #[test]
    fn dotenv_without_required_fields_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let dotenv = dir.path().join(".env");
        std::fs::write(&dotenv, "CF_API_TOKEN=t\nZONE_ID=z1\n").unwrap();

        let err = Config::from_env_with_dotenv(vars(&[]), &dotenv).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("RECORD_NAME")));
    }
}
