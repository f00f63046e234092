//! Application settings
//!
//! Loaded from `appsettings.json` (or a YAML file), then overridden by
//! `BULK_*` environment variables, then by command-line flags.

use crate::error::ErrorContext;
use crate::job::{JobConfig, UnitMode};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

fn default_service_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_users_file() -> String {
    "users.json".to_string()
}

/// Tunables of a bulk job as they appear in the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_inflight: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AppSettings {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default = "default_service_url")]
    pub service_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_users_file")]
    pub users_file_name: String,
    #[serde(default)]
    pub job: JobSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            service_url: default_service_url(),
            access_token: None,
            users_file_name: default_users_file(),
            job: JobSettings::default(),
        }
    }
}

impl AppSettings {
    /// Parse a settings file; `.yaml`/`.yml` files are read as YAML,
    /// everything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read settings: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("settings_loader"),
            )
        })?;

        let is_yaml = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("yaml") || s.eq_ignore_ascii_case("yml"))
            .unwrap_or(false);

        if is_yaml {
            Ok(serde_yaml::from_str(&content)?)
        } else {
            Ok(serde_json::from_str(&content)?)
        }
    }

    /// Load `path`, or `appsettings.json` from the working directory when it
    /// exists, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn apply_env(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `BULK_*` overrides from `lookup`. Values that do not parse are
    /// ignored.
    pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        if let Some(v) = lookup("BULK_SERVICE_URL") {
            self.service_url = v;
        }
        if let Some(v) = lookup("BULK_ACCESS_TOKEN") {
            self.access_token = Some(v);
        }
        if let Some(v) = lookup("BULK_TENANT_ID") {
            self.tenant_id = v;
        }
        if let Some(v) = parsed(&lookup, "BULK_USERS") {
            self.job.users = Some(v);
        }
        if let Some(v) = parsed(&lookup, "BULK_RATE_LIMIT") {
            self.job.rate_limit = Some(v);
        }
        if let Some(v) = parsed(&lookup, "BULK_BATCH_SIZE") {
            self.job.batch_size = Some(v);
        }
        if let Some(v) = parsed(&lookup, "BULK_MAX_INFLIGHT") {
            self.job.max_inflight = Some(v);
        }
        if let Some(v) = parsed(&lookup, "BULK_UNIT_TIMEOUT_MS") {
            self.job.unit_timeout_ms = Some(v);
        }
        self
    }

    /// Job configuration described by these settings, before defaults are
    /// substituted.
    pub fn job_config(&self, mode: UnitMode) -> JobConfig {
        let mut config = JobConfig::new().with_mode(mode);
        if let Some(users) = self.job.users {
            config = config.with_target_count(users);
        }
        if let Some(rate) = self.job.rate_limit {
            config = config.with_rate_per_interval(rate);
        }
        if let Some(size) = self.job.batch_size {
            config = config.with_batch_size(size);
        }
        if let Some(n) = self.job.max_inflight {
            config = config.with_max_inflight(n);
        }
        if let Some(ms) = self.job.unit_timeout_ms {
            config = config.with_unit_timeout(Duration::from_millis(ms));
        }
        if !self.tenant_id.is_empty() {
            config = config.with_tenant(self.tenant_id.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_file(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}", uuid::Uuid::new_v4(), name));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_json_settings() {
        let path = temp_file(
            "appsettings.json",
            r#"{"TenantId":"contoso.onmicrosoft.com","UsersFileName":"import.json","Job":{"Users":50,"RateLimit":20}}"#,
        );
        let settings = AppSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.tenant_id, "contoso.onmicrosoft.com");
        assert_eq!(settings.users_file_name, "import.json");
        assert_eq!(settings.service_url, "https://graph.microsoft.com/v1.0");
        assert_eq!(settings.job.users, Some(50));
        assert_eq!(settings.job.rate_limit, Some(20));
    }

    #[test]
    fn test_load_yaml_settings() {
        let path = temp_file(
            "settings.yaml",
            "TenantId: fabrikam\nServiceUrl: http://localhost:8080\nJob:\n  MaxInflight: 8\n",
        );
        let settings = AppSettings::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.tenant_id, "fabrikam");
        assert_eq!(settings.service_url, "http://localhost:8080");
        assert_eq!(settings.job.max_inflight, Some(8));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = AppSettings::load(Path::new("/nonexistent/appsettings.json")).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("BULK_SERVICE_URL", "http://127.0.0.1:9000/v1.0"),
            ("BULK_RATE_LIMIT", "75"),
            ("BULK_USERS", "not-a-number"),
            ("BULK_UNIT_TIMEOUT_MS", "2500"),
        ]
        .into_iter()
        .collect();

        let settings =
            AppSettings::default().apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.service_url, "http://127.0.0.1:9000/v1.0");
        assert_eq!(settings.job.rate_limit, Some(75));
        assert_eq!(settings.job.users, None);

        let config = settings.job_config(UnitMode::Batch);
        assert_eq!(config.rate_per_interval, 75);
        assert_eq!(config.unit_timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.mode, UnitMode::Batch);
    }
}
