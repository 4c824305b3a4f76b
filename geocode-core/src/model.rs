use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{GeocodeError, Result};

/// Number of results asked for when the caller does not say otherwise.
pub const DEFAULT_LIMIT: u32 = 5;

/// Admin levels are numbered 1 (broadest) to 5.
pub const MAX_ADMIN_LEVEL: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeocodeError::InvalidArgument(format!(
                "latitude must be within [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeocodeError::InvalidArgument(format!(
                "longitude must be within [-180, 180], got {longitude}"
            )));
        }

        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone)]
pub struct GeocodeQuery {
    pub text: String,
    pub limit: u32,
    /// Preferred language of the returned labels, e.g. "de".
    pub locale: Option<String>,
    /// Restrict results to one country (ISO alpha-2 or alpha-3).
    pub country: Option<String>,
}

impl GeocodeQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), limit: DEFAULT_LIMIT, locale: None, country: None }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReverseQuery {
    pub coordinates: Coordinates,
    pub limit: u32,
    pub locale: Option<String>,
}

impl ReverseQuery {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates, limit: DEFAULT_LIMIT, locale: None }
    }

    /// Validates the pair and builds a query with default options.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Result<Self> {
        Ok(Self::new(Coordinates::new(latitude, longitude)?))
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminLevel {
    level: u8,
    name: String,
    code: Option<String>,
}

impl AdminLevel {
    pub fn new(level: u8, name: impl Into<String>, code: Option<String>) -> Self {
        Self { level, name: name.into(), code }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// Administrative levels keyed by their level number.
///
/// Levels need not be contiguous: a record may carry only levels 1 and 3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminLevelCollection {
    levels: BTreeMap<u8, AdminLevel>,
}

impl AdminLevelCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, admin_level: AdminLevel) -> Result<()> {
        let level = admin_level.level;
        if !(1..=MAX_ADMIN_LEVEL).contains(&level) {
            return Err(GeocodeError::InvalidArgument(format!(
                "admin level must be within 1..={MAX_ADMIN_LEVEL}, got {level}"
            )));
        }
        if self.levels.contains_key(&level) {
            return Err(GeocodeError::InvalidArgument(format!(
                "admin level {level} is already set"
            )));
        }

        self.levels.insert(level, admin_level);
        Ok(())
    }

    pub fn get(&self, level: u8) -> Option<&AdminLevel> {
        self.levels.get(&level)
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterates from level 1 upwards.
    pub fn iter(&self) -> impl Iterator<Item = &AdminLevel> {
        self.levels.values()
    }
}

impl Serialize for AdminLevelCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.levels.values())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Country {
    pub name: Option<String>,
    /// ISO 3166-1 alpha-3, upper case.
    pub code: Option<String>,
}

/// One normalized geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Address {
    pub provided_by: String,
    pub coordinates: Coordinates,
    pub bounds: Option<Bounds>,
    pub street_number: Option<String>,
    pub street_name: Option<String>,
    /// Kept as text: "01067" must not lose its leading zero.
    pub postal_code: Option<String>,
    pub sub_locality: Option<String>,
    pub locality: Option<String>,
    pub admin_levels: AdminLevelCollection,
    pub country: Option<Country>,
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let street = match (&self.street_number, &self.street_name) {
            (Some(number), Some(name)) => Some(format!("{number} {name}")),
            (None, Some(name)) => Some(name.clone()),
            _ => None,
        };
        let place = match (&self.postal_code, &self.locality) {
            (Some(code), Some(locality)) => Some(format!("{code} {locality}")),
            (None, Some(locality)) => Some(locality.clone()),
            (Some(code), None) => Some(code.clone()),
            (None, None) => None,
        };
        let country = self.country.as_ref().and_then(|c| c.name.clone());

        let parts: Vec<String> = [street, place, country].into_iter().flatten().collect();
        if parts.is_empty() {
            write!(f, "({}, {})", self.coordinates.latitude, self.coordinates.longitude)
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Results in the order the provider returned them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AddressCollection {
    addresses: Vec<Address>,
}

impl AddressCollection {
    pub fn new(addresses: Vec<Address>) -> Self {
        Self { addresses }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn first(&self) -> Option<&Address> {
        self.addresses.first()
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.addresses.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Address> {
        self.addresses.iter()
    }
}

impl IntoIterator for AddressCollection {
    type Item = Address;
    type IntoIter = std::vec::IntoIter<Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.into_iter()
    }
}

impl<'a> IntoIterator for &'a AddressCollection {
    type Item = &'a Address;
    type IntoIter = std::slice::Iter<'a, Address>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}
