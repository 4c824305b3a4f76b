use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path, path::PathBuf};

use crate::provider::ProviderId;

/// Configuration for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: String,

    /// Root of the geocoding API, e.g. "http://localhost:4000/v1".
    /// Required for self-hosted Pelias, optional override for openrouteservice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default provider id, e.g. "openrouteservice" or "pelias".
    pub default_provider: Option<String>,

    /// Request timeout applied to every provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Example TOML:
    /// [providers.openrouteservice]
    /// api_key = "..."
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Config {
    /// Return the default provider as a strongly-typed ProviderId.
    pub fn default_provider_id(&self) -> Result<ProviderId> {
        let s = self.default_provider.as_ref().ok_or_else(|| {
            anyhow::anyhow!(
                "No default provider configured.\n\
                 Hint: run `geocode configure <provider>` (e.g. `geocode configure openrouteservice`) first."
            )
        })?;

        ProviderId::try_from(s.as_str())
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Store default provider as string.
    pub fn set_default_provider(&mut self, id: ProviderId) {
        self.default_provider = Some(id.as_str().to_string());
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "geocode", "geocode-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key; the first configured provider becomes the default.
    /// An existing base URL is kept.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .and_modify(|cfg| cfg.api_key = api_key.clone())
            .or_insert(ProviderConfig { api_key, base_url: None });

        if self.default_provider.is_none() {
            self.default_provider = Some(provider_id.to_string());
        }
    }

    /// No-op for providers that have not been given an API key yet.
    pub fn set_provider_base_url(&mut self, provider_id: ProviderId, base_url: Option<String>) {
        if let Some(cfg) = self.providers.get_mut(provider_id.as_str()) {
            cfg.base_url = base_url;
        }
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.providers.get(provider_id.as_str()).map(|cfg| cfg.api_key.as_str())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        self.provider_api_key(provider_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderId;

    #[test]
    fn default_provider_id_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.default_provider_id().unwrap_err();

        assert!(err.to_string().contains("No default provider configured"));
    }

    #[test]
    fn set_api_key_and_default_for_provider() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "ORS_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::OpenRouteService);

        let key = cfg.provider_api_key(ProviderId::OpenRouteService);
        assert_eq!(key, Some("ORS_KEY"));
        assert!(cfg.is_provider_configured(ProviderId::OpenRouteService));
        assert!(!cfg.is_provider_configured(ProviderId::Pelias));
    }

    #[test]
    fn upsert_does_not_override_existing_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "ORS_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::Pelias, "PELIAS_KEY".into());

        let default = cfg.default_provider_id().expect("default provider must exist");

        assert_eq!(default, ProviderId::OpenRouteService);
        assert!(cfg.is_provider_configured(ProviderId::OpenRouteService));
        assert!(cfg.is_provider_configured(ProviderId::Pelias));
    }

    #[test]
    fn upsert_keeps_base_url() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::Pelias, "OLD".into());
        cfg.set_provider_base_url(ProviderId::Pelias, Some("http://localhost:4000/v1".into()));
        cfg.upsert_provider_api_key(ProviderId::Pelias, "NEW".into());

        let provider_cfg = cfg.provider_config(ProviderId::Pelias).expect("pelias configured");
        assert_eq!(provider_cfg.api_key, "NEW");
        assert_eq!(provider_cfg.base_url.as_deref(), Some("http://localhost:4000/v1"));
    }

    #[test]
    fn set_default_provider_overrides_default() {
        let mut cfg = Config::default();

        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "ORS_KEY".into());
        cfg.upsert_provider_api_key(ProviderId::Pelias, "PELIAS_KEY".into());

        cfg.set_default_provider(ProviderId::Pelias);

        let default = cfg.default_provider_id().expect("default provider must exist");
        assert_eq!(default, ProviderId::Pelias);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("geocode-config-test-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "ORS_KEY".into());
        cfg.timeout_secs = Some(15);
        cfg.save_to(&path).expect("save must succeed");

        let loaded = Config::load_from(&path).expect("load must succeed");
        assert_eq!(loaded.default_provider_id().unwrap(), ProviderId::OpenRouteService);
        assert_eq!(loaded.provider_api_key(ProviderId::OpenRouteService), Some("ORS_KEY"));
        assert_eq!(loaded.timeout_secs, Some(15));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_from_missing_file_returns_default() {
        let path = std::env::temp_dir().join("geocode-config-test-missing").join("config.toml");
        let cfg = Config::load_from(&path).expect("missing file is not an error");
        assert!(cfg.providers.is_empty());
    }

    #[test]
    fn parses_handwritten_toml() {
        let cfg: Config = toml::from_str(
            r#"
            default_provider = "pelias"

            [providers.pelias]
            api_key = ""
            base_url = "http://localhost:4000/v1"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.default_provider_id().unwrap(), ProviderId::Pelias);
        assert!(cfg.timeout_secs.is_none());
        let pelias = cfg.provider_config(ProviderId::Pelias).unwrap();
        assert_eq!(pelias.base_url.as_deref(), Some("http://localhost:4000/v1"));
    }
}
