use std::net::IpAddr;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{
    error::{GeocodeError, Result, TransportError},
    http::{HttpClient, HttpResponse, ReqwestHttpClient, redact},
    model::{
        AdminLevel, AdminLevelCollection, Address, AddressCollection, Bounds, Coordinates,
        Country, GeocodeQuery, ReverseQuery,
    },
};

use super::GeocodingProvider;

pub const OPEN_ROUTE_SERVICE_NAME: &str = "openrouteservice";
pub const OPEN_ROUTE_SERVICE_ROOT: &str = "https://api.openrouteservice.org/geocode";
pub const PELIAS_NAME: &str = "pelias";

const QUOTA_EXCEEDED: &str = "Valid request but quota exceeded.";
const INVALID_CREDENTIALS: &str = "Invalid or missing api key.";

/// Adapter for the Pelias geocoding API.
///
/// openrouteservice exposes Pelias unchanged under its own root URL, so both
/// are served by this type; only the name and root differ.
#[derive(Debug, Clone)]
pub struct PeliasProvider<C = ReqwestHttpClient> {
    name: &'static str,
    root_url: String,
    api_key: String,
    http: C,
}

impl<C: HttpClient> PeliasProvider<C> {
    /// A self-hosted or third-party Pelias instance, e.g. `http://localhost:4000/v1`.
    pub fn new(http: C, root_url: &str, api_key: String) -> Result<Self> {
        Self::with_name(http, PELIAS_NAME, root_url, api_key)
    }

    pub fn open_route_service(http: C, api_key: String) -> Self {
        Self {
            name: OPEN_ROUTE_SERVICE_NAME,
            root_url: OPEN_ROUTE_SERVICE_ROOT.to_string(),
            api_key,
            http,
        }
    }

    pub fn with_name(
        http: C,
        name: &'static str,
        root_url: &str,
        api_key: String,
    ) -> Result<Self> {
        Url::parse(root_url).map_err(|err| {
            GeocodeError::InvalidArgument(format!("invalid root URL '{root_url}': {err}"))
        })?;

        Ok(Self { name, root_url: root_url.trim_end_matches('/').to_string(), api_key, http })
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}/{path}", self.root_url);
        Url::parse_with_params(&base, params)
            .map_err(|err| GeocodeError::InvalidArgument(format!("invalid URL '{base}': {err}")))
    }

    async fn execute(&self, url: Url) -> Result<AddressCollection> {
        let endpoint = redact(&url);
        debug!(provider = self.name, %endpoint, "sending geocoding request");

        let response = self.http.get(url).await?;
        let envelope = self.decode(&response)?;
        self.classify(response.status, &envelope)?;

        let addresses = self.map_features(envelope)?;
        debug!(provider = self.name, results = addresses.len(), "geocoding response mapped");

        Ok(addresses)
    }

    fn decode(&self, response: &HttpResponse) -> Result<PeliasResponse> {
        match serde_json::from_str(&response.body) {
            Ok(envelope) => Ok(envelope),
            // An HTML error page from a proxy still deserves the status-based verdict.
            Err(_) if !response.is_success() => {
                Err(self.status_error(response.status, Some(truncate_body(&response.body))))
            }
            Err(err) => Err(TransportError::Decode(err).into()),
        }
    }

    /// The envelope's `meta.status_code` wins over the transport status.
    fn classify(&self, transport_status: u16, envelope: &PeliasResponse) -> Result<()> {
        let status = envelope.status_code().unwrap_or(transport_status);
        let (error_type, message) = envelope.upstream_error();

        if let Some(kind) = error_type.as_deref() {
            if is_quota_error(kind) {
                warn!(provider = self.name, status, error_type = kind, "geocoding quota exceeded");
                return Err(GeocodeError::QuotaExceeded(QUOTA_EXCEEDED.to_string()));
            }
            if is_key_error(kind) {
                warn!(provider = self.name, status, error_type = kind, "geocoding API key rejected");
                return Err(GeocodeError::InvalidCredentials(INVALID_CREDENTIALS.to_string()));
            }
        }

        match status {
            200..=299 => Ok(()),
            _ => Err(self.status_error(status, message)),
        }
    }

    /// Error for a non-2xx status.
    fn status_error(&self, status: u16, message: Option<String>) -> GeocodeError {
        match status {
            401 | 403 => {
                warn!(provider = self.name, status, "geocoding API key rejected");
                GeocodeError::InvalidCredentials(INVALID_CREDENTIALS.to_string())
            }
            429 => {
                warn!(provider = self.name, status, "geocoding quota exceeded");
                GeocodeError::QuotaExceeded(QUOTA_EXCEEDED.to_string())
            }
            _ => {
                warn!(provider = self.name, status, "geocoding API error");
                GeocodeError::Provider {
                    provider: self.name.to_string(),
                    status,
                    message: message.unwrap_or_else(|| format!("unexpected status code {status}")),
                }
            }
        }
    }

    fn map_features(&self, envelope: PeliasResponse) -> Result<AddressCollection> {
        if envelope.kind.as_ref().and_then(Value::as_str) != Some("FeatureCollection") {
            return Ok(AddressCollection::empty());
        }
        let features = match envelope.features {
            Some(Value::Array(features)) => features,
            _ => return Ok(AddressCollection::empty()),
        };

        let mut addresses = Vec::with_capacity(features.len());
        for (index, entry) in features.into_iter().enumerate() {
            // One malformed entry must not cost the caller the others.
            let feature = match serde_json::from_value::<PeliasFeature>(entry) {
                Ok(feature) => feature,
                Err(err) => {
                    debug!(provider = self.name, index, error = %err, "skipping malformed feature");
                    continue;
                }
            };
            match self.map_feature(feature)? {
                Some(address) => addresses.push(address),
                None => debug!(provider = self.name, index, "skipping feature without usable geometry"),
            }
        }

        Ok(AddressCollection::new(addresses))
    }

    fn map_feature(&self, feature: PeliasFeature) -> Result<Option<Address>> {
        let Some(coordinates) = feature.coordinates() else {
            return Ok(None);
        };
        let bounds = feature.bounds();

        let props = feature.properties.unwrap_or_default();
        let admin_levels = props.admin_levels()?;

        let country_name = props.text("country");
        let country_code = props.text("country_a").map(|code| code.to_uppercase());
        let country = (country_name.is_some() || country_code.is_some())
            .then(|| Country { name: country_name, code: country_code });

        Ok(Some(Address {
            provided_by: self.name.to_string(),
            coordinates,
            bounds,
            street_number: props.text("housenumber"),
            street_name: props.text("street"),
            postal_code: props.text("postalcode"),
            sub_locality: props.text("neighbourhood"),
            locality: props.text("locality"),
            admin_levels,
            country,
        }))
    }
}

#[async_trait]
impl<C: HttpClient> GeocodingProvider for PeliasProvider<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn geocode(&self, query: &GeocodeQuery) -> Result<AddressCollection> {
        let text = query.text.trim();

        if text.parse::<IpAddr>().is_ok() {
            return Err(GeocodeError::UnsupportedOperation(format!(
                "The {} provider does not support IP addresses, only street addresses.",
                self.name
            )));
        }
        if text.is_empty() {
            return Err(GeocodeError::InvalidArgument("geocode text must not be empty".into()));
        }

        let mut params = vec![
            ("text", text.to_string()),
            ("api_key", self.api_key.clone()),
            ("size", query.limit.to_string()),
        ];
        if let Some(locale) = &query.locale {
            params.push(("lang", locale.clone()));
        }
        if let Some(country) = &query.country {
            params.push(("boundary.country", country.clone()));
        }

        let url = self.endpoint("search", &params)?;
        self.execute(url).await
    }

    async fn reverse(&self, query: &ReverseQuery) -> Result<AddressCollection> {
        let mut params = vec![
            ("point.lat", query.coordinates.latitude().to_string()),
            ("point.lon", query.coordinates.longitude().to_string()),
            ("api_key", self.api_key.clone()),
            ("size", query.limit.to_string()),
        ];
        if let Some(locale) = &query.locale {
            params.push(("lang", locale.clone()));
        }

        let url = self.endpoint("reverse", &params)?;
        self.execute(url).await
    }
}

fn is_quota_error(kind: &str) -> bool {
    kind.contains("QpsExceeded") || kind.to_lowercase().contains("quota")
}

fn is_key_error(kind: &str) -> bool {
    kind == "KeyError" || kind.to_lowercase().contains("apikey")
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

/// Every field is loosely typed; an unexpected shape degrades to "absent".
#[derive(Debug, Default, Deserialize)]
struct PeliasResponse {
    meta: Option<Value>,
    #[serde(rename = "type")]
    kind: Option<Value>,
    features: Option<Value>,
    results: Option<Value>,
    error: Option<Value>,
}

impl PeliasResponse {
    /// Accepts `429` as well as `"429"`.
    fn status_code(&self) -> Option<u16> {
        match self.meta.as_ref()?.get("status_code")? {
            Value::Number(n) => n.as_u64().and_then(|code| u16::try_from(code).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// `(type, message)` from `results.error`, or from a top-level `error`.
    fn upstream_error(&self) -> (Option<String>, Option<String>) {
        let nested = self.results.as_ref().and_then(|r| r.get("error"));

        match nested.or(self.error.as_ref()) {
            Some(Value::String(message)) => (None, Some(message.clone())),
            Some(Value::Object(fields)) => {
                let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
                (text("type"), text("message"))
            }
            _ => (None, None),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeliasFeature {
    geometry: Option<PeliasGeometry>,
    properties: Option<PeliasProperties>,
    bbox: Option<Vec<Value>>,
}

impl PeliasFeature {
    /// GeoJSON order is `[lon, lat]`.
    fn coordinates(&self) -> Option<Coordinates> {
        let coordinates = self.geometry.as_ref()?.coordinates.as_ref()?;
        match coordinates.as_slice() {
            [longitude, latitude, ..] => {
                Coordinates::new(latitude.as_f64()?, longitude.as_f64()?).ok()
            }
            _ => None,
        }
    }

    /// `bbox` is `[west, south, east, north]`.
    fn bounds(&self) -> Option<Bounds> {
        let corners: Vec<f64> =
            self.bbox.as_ref()?.iter().map(Value::as_f64).collect::<Option<_>>()?;
        match corners.as_slice() {
            &[west, south, east, north] => Some(Bounds { south, west, north, east }),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeliasGeometry {
    coordinates: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
struct PeliasProperties(Map<String, Value>);

impl PeliasProperties {
    /// Trimmed text of a property. Numbers (e.g. `"postalcode": 60437`) are
    /// kept as their decimal text; null, empty and other shapes are absent.
    fn text(&self, key: &str) -> Option<String> {
        let text = match self.0.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Levels 1..=5 from broadest to most specific. Level 1 falls back to the
    /// macroregion when no region is reported. The country is kept out.
    fn admin_levels(&self) -> Result<AdminLevelCollection> {
        let top = match self.text("region") {
            Some(_) => "region",
            None => "macroregion",
        };
        let components =
            [(1, top), (2, "macrocounty"), (3, "county"), (4, "localadmin"), (5, "locality")];

        let mut levels = AdminLevelCollection::new();
        for (level, component) in components {
            if let Some(name) = self.text(component) {
                let code = self.text(&format!("{component}_a"));
                levels.insert(AdminLevel::new(level, name, code))?;
            }
        }

        Ok(levels)
    }
}
