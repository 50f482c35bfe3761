//! Address composition and search-text normalization.
//!
//! Operators type addresses in many shapes:
//! - Street and number: `"Av. Los Próceres 123"`
//! - Block/lot housing estates: `"Mz. B Lt. 4"` inside an urbanization
//! - Prefixes typed into the wrong box: `"MZ B"` in the block field
//!
//! When no registered address matches, the form's parts become a new
//! address whose `direccion_completa` is always built in the same order:
//! street, number, block, lot, urbanization.

use std::sync::LazyLock;

use citysecure_dispatch_models::NewAddress;
use regex::Regex;

/// Runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A `Mz`/`Mza`/`Manzana` prefix the operator typed into the block field.
static BLOCK_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:manzana|mza?)\.?\s*").expect("valid regex"));

/// A `Lt`/`Lte`/`Lote` prefix the operator typed into the lot field.
static LOT_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:lote|lte?)\.?\s*").expect("valid regex"));

/// A manually entered address, one field per form input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    /// Street (including its type, e.g. `"Jr. Ica"`).
    pub calle: String,
    /// House number.
    pub numero: Option<String>,
    /// Block (`manzana`).
    pub manzana: Option<String>,
    /// Lot (`lote`).
    pub lote: Option<String>,
    /// Urbanization or neighbourhood.
    pub urbanizacion: Option<String>,
}

/// Location context attached to a newly created address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressLocation {
    pub sector_id: Option<i64>,
    pub cuadrante_id: Option<i64>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub ubigeo_code: Option<String>,
}

impl AddressParts {
    /// Whether enough was typed to create an address (a street, or a
    /// block inside an urbanization).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        !self.calle.trim().is_empty() || (has(&self.manzana) && has(&self.urbanizacion))
    }

    /// The one-line address. See [`compose_full_address`].
    #[must_use]
    pub fn full_address(&self) -> String {
        compose_full_address(self)
    }

    /// Builds the `POST /direcciones` body.
    #[must_use]
    pub fn to_new_address(&self, location: AddressLocation) -> NewAddress {
        NewAddress {
            calle: collapse(&self.calle),
            numero: clean_optional(self.numero.as_deref()),
            manzana: clean_optional(self.manzana.as_deref())
                .map(|m| strip_prefix(&BLOCK_PREFIX_RE, &m)),
            lote: clean_optional(self.lote.as_deref()).map(|l| strip_prefix(&LOT_PREFIX_RE, &l)),
            urbanizacion: clean_optional(self.urbanizacion.as_deref()),
            direccion_completa: self.full_address(),
            sector_id: location.sector_id,
            cuadrante_id: location.cuadrante_id,
            latitud: location.latitud,
            longitud: location.longitud,
            ubigeo_code: location.ubigeo_code,
        }
    }
}

/// Concatenates address parts in fixed order: street, number, block
/// (`Mz.`), lot (`Lt.`), urbanization.
///
/// Street and number share a segment (`"Jr. Ica 123"`); the remaining
/// parts are separate segments joined with `", "`. Empty parts are
/// skipped and whitespace is collapsed, so the same input always yields
/// the same text.
#[must_use]
pub fn compose_full_address(parts: &AddressParts) -> String {
    let mut segments: Vec<String> = Vec::with_capacity(4);

    let street = [Some(parts.calle.as_str()), parts.numero.as_deref()]
        .into_iter()
        .filter_map(clean_optional)
        .collect::<Vec<_>>()
        .join(" ");
    if !street.is_empty() {
        segments.push(street);
    }

    if let Some(block) = clean_optional(parts.manzana.as_deref()) {
        segments.push(format!("Mz. {}", strip_prefix(&BLOCK_PREFIX_RE, &block)));
    }
    if let Some(lot) = clean_optional(parts.lote.as_deref()) {
        segments.push(format!("Lt. {}", strip_prefix(&LOT_PREFIX_RE, &lot)));
    }
    if let Some(urbanization) = clean_optional(parts.urbanizacion.as_deref()) {
        segments.push(urbanization);
    }

    segments.join(", ")
}

/// Normalizes search input: trims and collapses whitespace. Returns `None`
/// for blank input.
#[must_use]
pub fn normalize_query(raw: &str) -> Option<String> {
    clean_optional(Some(raw))
}

fn collapse(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

fn clean_optional(value: Option<&str>) -> Option<String> {
    value.map(collapse).filter(|s| !s.is_empty())
}

fn strip_prefix(re: &Regex, value: &str) -> String {
    let stripped = re.replace(value, "");
    if stripped.is_empty() {
        value.to_string()
    } else {
        stripped.into_owned()
    }
}
