//! Backend address endpoints.
//!
//! Geocoding itself happens server-side: the backend proxies free-text
//! queries to its configured provider and answers with a single best
//! match (or nothing).
//!
//! - `GET /direcciones/search?q=`: registered addresses
//! - `GET /direcciones/geocodificar-texto?direccion=`: geocoding proxy

use citysecure_dispatch_models::Address;
use citysecure_gateway::Gateway;

use crate::{AddressLookup, GeocodeError, GeocodedAddress};

#[async_trait::async_trait]
impl AddressLookup for Gateway {
    async fn search(&self, text: &str) -> Result<Vec<Address>, GeocodeError> {
        let addresses: Option<Vec<Address>> = self
            .get_with_query("/direcciones/search", &[("q", text)])
            .await?;
        Ok(addresses.unwrap_or_default())
    }

    async fn geocode(&self, text: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let body: serde_json::Value = self
            .get_with_query("/direcciones/geocodificar-texto", &[("direccion", text)])
            .await?;
        parse_response(&body)
    }
}

/// Parses the geocoding proxy response.
///
/// Coordinates may arrive as numbers or numeric strings, under either the
/// Spanish (`latitud`/`longitud`) or the provider's own (`lat`/`lon`)
/// names. A `null` body, `"found": false`, or missing coordinates mean
/// "no match".
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    if body.is_null() {
        return Ok(None);
    }

    let obj = body.as_object().ok_or_else(|| GeocodeError::Parse {
        message: "Geocoding response is not an object".to_string(),
    })?;

    if obj.get("found").and_then(serde_json::Value::as_bool) == Some(false) {
        return Ok(None);
    }

    let coordinate = |keys: &[&str]| {
        keys.iter().find_map(|k| match obj.get(*k)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
    };

    let (Some(latitude), Some(longitude)) = (
        coordinate(&["latitud", "lat"]),
        coordinate(&["longitud", "lon", "lng"]),
    ) else {
        return Ok(None);
    };

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(GeocodeError::Parse {
            message: format!("Coordinates out of range: {latitude}, {longitude}"),
        });
    }

    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| obj.get(*k).and_then(serde_json::Value::as_str))
            .map(String::from)
    };

    Ok(Some(GeocodedAddress {
        latitude,
        longitude,
        matched_address: text(&["direccion_formateada", "display_name"]),
        ubigeo_code: text(&["ubigeo_code", "ubigeo"]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_coordinates() {
        let body = serde_json::json!({
            "latitud": -12.0464,
            "longitud": -77.0428,
            "direccion_formateada": "Jr. de la Unión 300, Lima",
            "ubigeo_code": "150101"
        });
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - -12.0464).abs() < 1e-6);
        assert!((result.longitude - -77.0428).abs() < 1e-6);
        assert_eq!(result.ubigeo_code.as_deref(), Some("150101"));
    }

    #[test]
    fn parses_string_coordinates_with_provider_names() {
        let body = serde_json::json!({
            "lat": "-12.1",
            "lon": "-77.03",
            "display_name": "Miraflores"
        });
        let result = parse_response(&body).unwrap().unwrap();
        assert!((result.latitude - -12.1).abs() < 1e-6);
        assert_eq!(result.matched_address.as_deref(), Some("Miraflores"));
    }

    #[test]
    fn no_match_cases() {
        assert!(parse_response(&serde_json::Value::Null).unwrap().is_none());
        assert!(
            parse_response(&serde_json::json!({ "found": false }))
                .unwrap()
                .is_none()
        );
        assert!(
            parse_response(&serde_json::json!({ "latitud": -12.0 }))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let body = serde_json::json!({ "latitud": 120.0, "longitud": -77.0 });
        assert!(parse_response(&body).is_err());
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_response(&serde_json::json!([1, 2])).is_err());
    }
}
