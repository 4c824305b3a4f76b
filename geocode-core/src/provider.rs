use crate::{
    AddressCollection, Config, GeocodeQuery, ReverseQuery,
    error::Result,
    http::ReqwestHttpClient,
    provider::pelias::PeliasProvider,
};
use anyhow::Context;
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug, time::Duration};

pub mod pelias;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenRouteService,
    Pelias,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenRouteService => pelias::OPEN_ROUTE_SERVICE_NAME,
            ProviderId::Pelias => pelias::PELIAS_NAME,
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[ProviderId::OpenRouteService, ProviderId::Pelias]
    }

    /// Whether the provider has no well-known endpoint and needs `base_url`.
    pub fn requires_base_url(&self) -> bool {
        matches!(self, ProviderId::Pelias)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "openrouteservice" | "ors" => Ok(ProviderId::OpenRouteService),
            "pelias" => Ok(ProviderId::Pelias),
            _ => Err(anyhow::anyhow!(
                "Unknown provider '{value}'. Supported providers: openrouteservice, pelias."
            )),
        }
    }
}

/// Forward and reverse geocoding against one upstream service.
#[async_trait]
pub trait GeocodingProvider: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn geocode(&self, query: &GeocodeQuery) -> Result<AddressCollection>;

    async fn reverse(&self, query: &ReverseQuery) -> Result<AddressCollection>;
}

/// Construct a provider from config and explicit ProviderId.
pub fn provider_from_config(
    id: ProviderId,
    config: &Config,
) -> anyhow::Result<Box<dyn GeocodingProvider>> {
    let provider_cfg = config.provider_config(id).ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for provider '{id}'.\n\
                 Hint: run `geocode configure {id}` and enter your API key."
        )
    })?;

    let http = match config.timeout_secs {
        Some(secs) => ReqwestHttpClient::with_timeout(Duration::from_secs(secs))
            .context("Failed to build HTTP client")?,
        None => ReqwestHttpClient::new(),
    };
    let api_key = provider_cfg.api_key.clone();

    let boxed: Box<dyn GeocodingProvider> = match (id, provider_cfg.base_url.as_deref()) {
        (ProviderId::OpenRouteService, None) => {
            Box::new(PeliasProvider::open_route_service(http, api_key))
        }
        (ProviderId::OpenRouteService, Some(url)) => Box::new(
            PeliasProvider::with_name(http, pelias::OPEN_ROUTE_SERVICE_NAME, url, api_key)
                .with_context(|| format!("Invalid base URL for provider '{id}'"))?,
        ),
        (ProviderId::Pelias, Some(url)) => Box::new(
            PeliasProvider::new(http, url, api_key)
                .with_context(|| format!("Invalid base URL for provider '{id}'"))?,
        ),
        (ProviderId::Pelias, None) => {
            return Err(anyhow::anyhow!(
                "No base URL configured for provider '{id}'.\n\
                 Hint: run `geocode configure {id}` and enter the URL of your Pelias instance."
            ));
        }
    };

    Ok(boxed)
}

/// Construct the default provider from config, using `default_provider` field.
pub fn default_provider_from_config(config: &Config) -> anyhow::Result<Box<dyn GeocodingProvider>> {
    let id = config.default_provider_id()?;
    provider_from_config(id, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn provider_id_accepts_short_alias() {
        assert_eq!(ProviderId::try_from("ORS").unwrap(), ProviderId::OpenRouteService);
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(ProviderId::OpenRouteService, &cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
    }

    #[test]
    fn pelias_requires_base_url() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::Pelias, "KEY".to_string());

        let err = provider_from_config(ProviderId::Pelias, &cfg).unwrap_err();
        assert!(err.to_string().contains("No base URL configured"));

        cfg.set_provider_base_url(ProviderId::Pelias, Some("http://localhost:4000/v1".into()));
        let provider = provider_from_config(ProviderId::Pelias, &cfg).unwrap();
        assert_eq!(provider.name(), "pelias");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "KEY".to_string());
        cfg.set_provider_base_url(ProviderId::OpenRouteService, Some("::nope::".into()));

        let err = provider_from_config(ProviderId::OpenRouteService, &cfg).unwrap_err();
        assert!(err.to_string().contains("Invalid base URL"));
    }

    #[test]
    fn default_provider_from_config_errors_when_not_set() {
        let cfg = Config::default();
        let err = default_provider_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No default provider configured"));
        assert!(msg.contains("Hint: run `geocode configure"));
    }

    #[test]
    fn default_provider_from_config_works_when_set_and_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::OpenRouteService, "KEY".to_string());
        cfg.timeout_secs = Some(10);

        let provider = default_provider_from_config(&cfg).expect("provider must build");
        assert_eq!(provider.name(), "openrouteservice");
    }
}
