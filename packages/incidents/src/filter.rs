//! Incident listing filters and pagination.

use chrono::NaiveDate;
use citysecure_dispatch_models::{Incident, IncidentStatus, Priority};
use serde::Serialize;

use crate::RegistrationError;

/// Default page size when none is requested.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the backend accepts.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query for `GET /novedades`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentFilter {
    pub estado: Option<IncidentStatus>,
    pub prioridad: Option<Priority>,
    pub sector_id: Option<i64>,
    /// First day included.
    pub fecha_desde: Option<NaiveDate>,
    /// Last day included.
    pub fecha_hasta: Option<NaiveDate>,
    /// Free text matched against code, description and location.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl IncidentFilter {
    /// Checks the date range.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidFilter`] if `fecha_desde` is
    /// after `fecha_hasta`.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if let (Some(from), Some(to)) = (self.fecha_desde, self.fecha_hasta)
            && from > to
        {
            return Err(RegistrationError::InvalidFilter {
                message: format!("fecha_desde {from} is after fecha_hasta {to}"),
            });
        }
        Ok(())
    }

    /// 1-based page number, defaulting to the first page.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to what the backend accepts.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Query-string pairs. Pagination is always sent.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();

        if let Some(estado) = self.estado {
            pairs.push(("estado", estado.to_string()));
        }
        if let Some(prioridad) = self.prioridad {
            pairs.push(("prioridad", prioridad.to_string()));
        }
        if let Some(sector_id) = self.sector_id {
            pairs.push(("sector_id", sector_id.to_string()));
        }
        if let Some(from) = self.fecha_desde {
            pairs.push(("fecha_desde", from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = self.fecha_hasta {
            pairs.push(("fecha_hasta", to.format("%Y-%m-%d").to_string()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }

        pairs.push(("page", self.page().to_string()));
        pairs.push(("limit", self.limit().to_string()));
        pairs
    }
}

/// One page of incidents.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentPage {
    pub items: Vec<Incident>,
    /// Total matching incidents, when the backend reports it.
    pub total: Option<u64>,
    pub page: u32,
    pub limit: u32,
}

impl IncidentPage {
    /// Whether more pages follow. Without a total, a full page is assumed
    /// to have a successor.
    #[must_use]
    pub fn has_more(&self) -> bool {
        let seen = u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
            + self.items.len() as u64;
        self.total.map_or_else(
            || self.items.len() >= self.limit as usize,
            |total| seen < total,
        )
    }
}

/// Reads a listing body (after the `data` wrapper is removed).
///
/// Accepts a bare array, or an object holding the rows under `novedades`,
/// `items` or `rows` with the count under `total` or
/// `pagination.total`.
///
/// # Errors
///
/// Returns a decode message if no incident list can be found or a row does
/// not decode.
pub fn parse_page(body: serde_json::Value, filter: &IncidentFilter) -> Result<IncidentPage, String> {
    let (rows, total) = match body {
        serde_json::Value::Array(rows) => (rows, None),
        serde_json::Value::Object(mut obj) => {
            let total = obj
                .get("total")
                .or_else(|| obj.get("pagination").and_then(|p| p.get("total")))
                .and_then(serde_json::Value::as_u64);
            let rows = ["novedades", "items", "rows"]
                .iter()
                .find_map(|key| match obj.remove(*key) {
                    Some(serde_json::Value::Array(rows)) => Some(rows),
                    _ => None,
                })
                .ok_or_else(|| "listing has no incident array".to_string())?;
            (rows, total)
        }
        serde_json::Value::Null => (Vec::new(), Some(0)),
        other => return Err(format!("unexpected listing body: {other}")),
    };

    let items = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<Incident>, _>>()
        .map_err(|e| e.to_string())?;

    Ok(IncidentPage {
        items,
        total,
        page: filter.page(),
        limit: filter.limit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_only_paginates() {
        let pairs = IncidentFilter::default().to_query_pairs();
        assert_eq!(
            pairs,
            vec![("page", "1".to_string()), ("limit", "20".to_string())]
        );
    }

    #[test]
    fn full_filter() {
        let filter = IncidentFilter {
            estado: Some(IncidentStatus::Pendiente),
            prioridad: Some(Priority::Alta),
            sector_id: Some(3),
            fecha_desde: NaiveDate::from_ymd_opt(2025, 1, 1),
            fecha_hasta: NaiveDate::from_ymd_opt(2025, 1, 31),
            search: Some("  robo ".to_string()),
            page: Some(2),
            limit: Some(500),
        };
        let pairs = filter.to_query_pairs();
        assert!(pairs.contains(&("estado", "PENDIENTE".to_string())));
        assert!(pairs.contains(&("prioridad", "ALTA".to_string())));
        assert!(pairs.contains(&("fecha_desde", "2025-01-01".to_string())));
        assert!(pairs.contains(&("search", "robo".to_string())));
        assert!(pairs.contains(&("limit", "100".to_string())));
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn inverted_date_range_is_rejected() {
        let filter = IncidentFilter {
            fecha_desde: NaiveDate::from_ymd_opt(2025, 2, 1),
            fecha_hasta: NaiveDate::from_ymd_opt(2025, 1, 1),
            ..IncidentFilter::default()
        };
        assert!(matches!(
            filter.validate(),
            Err(RegistrationError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn parses_wrapped_listing() {
        let body = serde_json::json!({
            "novedades": [{ "id": 1 }, { "id": 2, "estado": "DESPACHADO" }],
            "pagination": { "total": 42, "page": 1 }
        });
        let page = parse_page(body, &IncidentFilter::default()).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total, Some(42));
        assert!(page.has_more());
    }

    #[test]
    fn parses_bare_listing() {
        let body = serde_json::json!([{ "id": 1 }]);
        let page = parse_page(body, &IncidentFilter::default()).unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(!page.has_more());
    }

    #[test]
    fn rejects_listing_without_rows() {
        assert!(parse_page(serde_json::json!({ "total": 3 }), &IncidentFilter::default()).is_err());
    }
}
