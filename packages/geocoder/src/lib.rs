#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address handling for incident registration.
//!
//! - [`address`] composes the one-line `direccion_completa` from the
//!   individual fields of a manually entered address and normalizes
//!   free-text search input.
//! - [`proxy`] talks to the backend's address endpoints: registered
//!   address search and the geocoding proxy
//!   (`GET /direcciones/geocodificar-texto`).
//! - [`debounce`] runs address searches in the background, waiting for the
//!   input to settle and dropping searches that newer input made stale.

pub mod address;
pub mod debounce;
pub mod proxy;

use citysecure_dispatch_models::Address;
use citysecure_gateway::ApiError;
use serde::Serialize;
use thiserror::Error;

/// A geocoding result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodedAddress {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Canonical address text returned by the geocoder.
    pub matched_address: Option<String>,
    /// Ubigeo district code, when the backend resolved one.
    pub ubigeo_code: Option<String>,
}

/// Errors from address operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The response did not have the expected shape.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// Backend address lookups.
#[async_trait::async_trait]
pub trait AddressLookup: Send + Sync {
    /// Searches registered addresses matching `text`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails.
    async fn search(&self, text: &str) -> Result<Vec<Address>, GeocodeError>;

    /// Geocodes free text. `Ok(None)` means the geocoder found nothing.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn geocode(&self, text: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;
}
