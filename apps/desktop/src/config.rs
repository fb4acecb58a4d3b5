use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use serde::Deserialize;
use shared::protocol::DEFAULT_API_URL;

pub const DEFAULT_CONFIG_FILE: &str = "doorquest.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            request_timeout: None,
            log_filter: "warn".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_url: Option<String>,
    request_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

// An explicitly requested config file must exist; the default one is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match config_path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(&path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if required => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
        Err(_) => {}
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_url {
        settings.api_url = normalize_api_url(&v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout = timeout_from_secs(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    // Later keys win.
    for key in ["REACT_APP_API_URL", "DOORQUEST_API_URL", "APP__API_URL"] {
        if let Some(v) = lookup(key) {
            settings.api_url = normalize_api_url(&v);
        }
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            settings.request_timeout = timeout_from_secs(parsed);
        }
    }

    if let Some(v) = lookup("RUST_LOG") {
        settings.log_filter = v;
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn normalize_api_url(raw_api_url: &str) -> String {
    let raw_api_url = raw_api_url.trim();

    if raw_api_url.is_empty() {
        return Settings::default().api_url;
    }

    let with_scheme = if raw_api_url.contains("://") {
        raw_api_url.to_string()
    } else {
        format!("http://{raw_api_url}")
    };

    with_scheme.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn normalizes_bare_host_and_trailing_slash() {
        assert_eq!(normalize_api_url("localhost:9000/"), "http://localhost:9000");
        assert_eq!(
            normalize_api_url(" https://api.doorquest.test/v1/ "),
            "https://api.doorquest.test/v1"
        );
        assert_eq!(normalize_api_url(""), DEFAULT_API_URL);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        apply_file(
            &mut settings,
            "api_url = \"10.0.0.5:8000\"\nrequest_timeout_secs = 5\nlog_filter = \"debug\"\n",
        )
        .expect("valid toml");

        assert_eq!(settings.api_url, "http://10.0.0.5:8000");
        assert_eq!(settings.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn environment_overrides_file_and_prefers_app_prefix() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("REACT_APP_API_URL", "http://react.test"),
            ("DOORQUEST_API_URL", "http://doorquest.test"),
            ("APP__REQUEST_TIMEOUT_SECS", "0"),
        ]);
        let mut settings = Settings {
            request_timeout: Some(Duration::from_secs(3)),
            ..Settings::default()
        };

        apply_env(&mut settings, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.api_url, "http://doorquest.test");
        assert_eq!(settings.request_timeout, None);
    }

    #[test]
    fn explicit_config_file_is_loaded() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("doorquest_config_test_{suffix}.toml"));
        fs::write(&path, "request_timeout_secs = 7\n").expect("write config");

        let settings = load_settings(Some(&path)).expect("load");

        assert_eq!(settings.request_timeout, Some(Duration::from_secs(7)));
        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let path = env::temp_dir().join("doorquest_config_test_missing/none.toml");
        assert!(load_settings(Some(&path)).is_err());
    }
}
