//! Core library for the `geocode` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The geocoding provider abstraction and the Pelias / openrouteservice adapter
//! - The HTTP capability providers issue their requests through
//! - Shared domain models (queries, normalized addresses) and errors
//!
//! It is used by `geocode-cli`, but can also be reused by other binaries or services.

pub mod config;
pub mod error;
pub mod http;
pub mod model;
pub mod provider;

pub use config::{Config, ProviderConfig};
pub use error::{GeocodeError, TransportError};
pub use http::{HttpClient, HttpResponse, ReqwestHttpClient};
pub use model::{
    Address, AddressCollection, AdminLevel, AdminLevelCollection, Bounds, Coordinates, Country,
    GeocodeQuery, ReverseQuery,
};
pub use provider::{GeocodingProvider, ProviderId, pelias::PeliasProvider};
