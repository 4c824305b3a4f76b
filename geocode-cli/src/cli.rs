use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use geocode_core::{
    AddressCollection, Config, GeocodeQuery, GeocodingProvider, ProviderId, ReverseQuery,
    provider::provider_from_config,
};
use inquire::{Password, PasswordDisplayMode, Text};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "geocode", version, about = "Forward and reverse geocoding CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openrouteservice" or "pelias".
        provider: String,
    },

    /// Resolve a free-text address to coordinates.
    Search {
        /// Address or place name.
        text: String,

        /// Preferred language of the results, e.g. "de".
        #[arg(long)]
        lang: Option<String>,

        /// Restrict results to one country, e.g. "DEU".
        #[arg(long)]
        country: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Resolve coordinates to addresses.
    Reverse {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,

        #[arg(allow_negative_numbers = true)]
        longitude: f64,

        #[arg(long)]
        lang: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Provider to use instead of the configured default.
    #[arg(long)]
    provider: Option<String>,

    /// API key for the selected provider, instead of the configured one.
    #[arg(long)]
    api_key: Option<String>,

    /// openrouteservice API key; ignored when another provider is selected.
    #[arg(long, env = "OPEN_ROUTE_SERVICE_API_KEY", hide_env_values = true)]
    ors_api_key: Option<String>,

    /// Maximum number of results.
    #[arg(long, default_value_t = geocode_core::model::DEFAULT_LIMIT)]
    limit: u32,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Search { text, lang, country, common } => {
                let mut query = GeocodeQuery::new(text).with_limit(common.limit);
                query.locale = lang;
                query.country = country;

                let provider = resolve_provider(&common)?;
                let results = provider.geocode(&query).await?;
                print_results(&results, common.json)
            }
            Command::Reverse { latitude, longitude, lang, common } => {
                let mut query =
                    ReverseQuery::from_coordinates(latitude, longitude)?.with_limit(common.limit);
                query.locale = lang;

                let provider = resolve_provider(&common)?;
                let results = provider.reverse(&query).await?;
                print_results(&results, common.json)
            }
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.upsert_provider_api_key(id, api_key);

    let current = config
        .provider_config(id)
        .and_then(|cfg| cfg.base_url.clone())
        .unwrap_or_default();
    let prompt = if id.requires_base_url() {
        "Base URL of the Pelias API (e.g. http://localhost:4000/v1):"
    } else {
        "Base URL override (leave empty for the public endpoint):"
    };
    let base_url =
        Text::new(prompt).with_initial_value(&current).prompt().context("Failed to read base URL")?;
    let base_url = Some(base_url.trim().to_string()).filter(|url| !url.is_empty());

    if id.requires_base_url() && base_url.is_none() {
        anyhow::bail!("Provider '{id}' needs a base URL.");
    }
    config.set_provider_base_url(id, base_url);
    config.save()?;

    tracing::info!(provider = %id, "provider configured");
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

fn resolve_provider(common: &CommonArgs) -> anyhow::Result<Box<dyn GeocodingProvider>> {
    let mut config = Config::load()?;
    let id = select_provider(&mut config, common)?;
    provider_from_config(id, &config)
}

/// Picks the provider and applies key overrides to `config` for this run only.
fn select_provider(config: &mut Config, common: &CommonArgs) -> anyhow::Result<ProviderId> {
    let id = match &common.provider {
        Some(name) => ProviderId::try_from(name.as_str())?,
        None if config.default_provider.is_none()
            && (common.api_key.is_some() || common.ors_api_key.is_some()) =>
        {
            ProviderId::OpenRouteService
        }
        None => config.default_provider_id()?,
    };

    let ors_key = common.ors_api_key.as_ref().filter(|_| id == ProviderId::OpenRouteService);
    if let Some(api_key) = common.api_key.as_ref().or(ors_key) {
        config.upsert_provider_api_key(id, api_key.clone());
    }

    Ok(id)
}

fn print_results(results: &AddressCollection, json: bool) -> anyhow::Result<()> {
    if json {
        let out = serde_json::to_string_pretty(results).context("Failed to serialize results")?;
        println!("{out}");
        return Ok(());
    }

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, address) in results.iter().enumerate() {
        println!(
            "{}. {} ({:.6}, {:.6})",
            i + 1,
            address,
            address.coordinates.latitude(),
            address.coordinates.longitude()
        );
        for level in address.admin_levels.iter() {
            match level.code() {
                Some(code) => println!("     level {}: {} ({code})", level.level(), level.name()),
                None => println!("     level {}: {}", level.level(), level.name()),
            }
        }
    }

    Ok(())
}
