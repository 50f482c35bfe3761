//! Incident registration.
//!
//! The form is validated locally first so obviously incomplete reports
//! never reach the backend. The address is then resolved: either a match
//! picked from the address search, or a new address built from the manual
//! fields. Finally the incident is created as `PENDIENTE`.

use chrono::{DateTime, Utc};
use citysecure_dispatch_models::{
    Address, CallOrigin, Incident, IncidentStatus, NewIncident, Priority,
};
use citysecure_gateway::FieldError;
use citysecure_geocoder::address::{AddressLocation, AddressParts};
use serde::Serialize;

use crate::RegistrationError;
use crate::backend::IncidentBackend;

/// Shortest accepted description, in characters.
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// Where the incident happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AddressChoice {
    /// Only the free-text `localizacion` (or coordinates) is known.
    #[default]
    Unspecified,
    /// A registered address picked from the search results.
    Registered(Address),
    /// Typed in field by field; created on submit.
    Manual(AddressParts),
}

/// The incident registration form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationForm {
    pub tipo_novedad_id: Option<i64>,
    pub subtipo_novedad_id: Option<i64>,
    pub prioridad: Option<Priority>,
    pub origen_llamada: Option<CallOrigin>,
    pub descripcion: String,
    pub sector_id: Option<i64>,
    pub cuadrante_id: Option<i64>,
    pub localizacion: Option<String>,
    pub address: AddressChoice,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub es_anonimo: bool,
    pub reportante_nombre: Option<String>,
    pub reportante_telefono: Option<String>,
    pub reportante_doc_identidad: Option<String>,
    /// Defaults to the submission time.
    pub fecha_hora_ocurrencia: Option<DateTime<Utc>>,
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|s| s.trim().is_empty())
}

fn trimmed(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl RegistrationForm {
    /// Every client-side problem with the form, one per field.
    #[must_use]
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        let mut require = |present: bool, field: &str, message: &str| {
            if !present {
                errors.push(FieldError::new(field, message));
            }
        };

        require(self.tipo_novedad_id.is_some(), "tipo_novedad_id", "Select an incident type");
        require(
            self.subtipo_novedad_id.is_some(),
            "subtipo_novedad_id",
            "Select an incident subtype",
        );
        require(self.prioridad.is_some(), "prioridad", "Select a priority");
        require(self.origen_llamada.is_some(), "origen_llamada", "Select how it was reported");
        require(self.sector_id.is_some(), "sector_id", "Select a sector");

        let description = self.descripcion.trim();
        require(!description.is_empty(), "descripcion", "Describe the incident");
        if !description.is_empty() && description.chars().count() < MIN_DESCRIPTION_LEN {
            errors.push(FieldError::new(
                "descripcion",
                format!("Description must be at least {MIN_DESCRIPTION_LEN} characters"),
            ));
        }

        if !self.es_anonimo && blank(self.reportante_nombre.as_deref()) {
            errors.push(FieldError::new(
                "reportante_nombre",
                "Reporter name is required unless the report is anonymous",
            ));
        }

        if let AddressChoice::Manual(parts) = &self.address
            && !parts.is_complete()
        {
            errors.push(FieldError::new(
                "calle",
                "Enter a street, or a block and urbanization",
            ));
        }

        match (self.latitud, self.longitud) {
            (Some(lat), _) if !(-90.0..=90.0).contains(&lat) => {
                errors.push(FieldError::new("latitud", "Latitude out of range"));
            }
            (_, Some(lon)) if !(-180.0..=180.0).contains(&lon) => {
                errors.push(FieldError::new("longitud", "Longitude out of range"));
            }
            (Some(_), None) | (None, Some(_)) => {
                errors.push(FieldError::new("latitud", "Both coordinates are required"));
            }
            _ => {}
        }

        errors
    }

    /// # Errors
    ///
    /// Returns [`RegistrationError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        let errors = self.field_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError::Invalid(errors))
        }
    }
}

/// A registered incident and the address it was filed under.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Registration {
    pub incident: Incident,
    pub address: Option<Address>,
    /// Whether the address was created by this registration.
    pub address_created: bool,
}

/// Validates the form, resolves its address and creates the incident.
///
/// # Errors
///
/// * [`RegistrationError::Invalid`] if client-side validation fails; no
///   request is made
/// * [`RegistrationError::Api`] if creating the address or the incident
///   fails
pub async fn register_incident(
    backend: &dyn IncidentBackend,
    form: RegistrationForm,
    now: DateTime<Utc>,
) -> Result<Registration, RegistrationError> {
    form.validate()?;

    let (address, address_created) = match &form.address {
        AddressChoice::Unspecified => (None, false),
        AddressChoice::Registered(address) => (Some(address.clone()), false),
        AddressChoice::Manual(parts) => {
            let body = parts.to_new_address(AddressLocation {
                sector_id: form.sector_id,
                cuadrante_id: form.cuadrante_id,
                latitud: form.latitud,
                longitud: form.longitud,
                ubigeo_code: None,
            });
            log::info!("Creating address {:?}", body.direccion_completa);
            (Some(backend.create_address(&body).await?), true)
        }
    };

    let incident = build_incident(&form, address.as_ref(), now)?;
    let created = backend.create_incident(&incident).await?;
    log::info!(
        "Registered incident {} ({})",
        created.id,
        created.novedad_code.as_deref().unwrap_or("no code")
    );

    Ok(Registration {
        incident: created,
        address,
        address_created,
    })
}

/// Builds the `POST /novedades` body. Form values win over the address's
/// own location fields.
fn build_incident(
    form: &RegistrationForm,
    address: Option<&Address>,
    now: DateTime<Utc>,
) -> Result<NewIncident, RegistrationError> {
    let missing = |field: &str| RegistrationError::Invalid(vec![FieldError::new(field, "Required")]);

    let (reportante_nombre, reportante_telefono, reportante_doc_identidad) = if form.es_anonimo {
        (None, None, None)
    } else {
        (
            trimmed(form.reportante_nombre.as_ref()),
            trimmed(form.reportante_telefono.as_ref()),
            trimmed(form.reportante_doc_identidad.as_ref()),
        )
    };

    Ok(NewIncident {
        tipo_novedad_id: form.tipo_novedad_id.ok_or_else(|| missing("tipo_novedad_id"))?,
        subtipo_novedad_id: form
            .subtipo_novedad_id
            .ok_or_else(|| missing("subtipo_novedad_id"))?,
        prioridad: form.prioridad.ok_or_else(|| missing("prioridad"))?,
        origen_llamada: form.origen_llamada.ok_or_else(|| missing("origen_llamada"))?,
        direccion_id: address.map(|a| a.id),
        localizacion: trimmed(form.localizacion.as_ref())
            .or_else(|| address.and_then(|a| a.direccion_completa.clone())),
        sector_id: form.sector_id.ok_or_else(|| missing("sector_id"))?,
        cuadrante_id: form.cuadrante_id.or_else(|| address.and_then(|a| a.cuadrante_id)),
        latitud: form.latitud.or_else(|| address.and_then(|a| a.latitud)),
        longitud: form.longitud.or_else(|| address.and_then(|a| a.longitud)),
        ubigeo_code: address.and_then(|a| a.ubigeo_code.clone()),
        es_anonimo: form.es_anonimo,
        reportante_nombre,
        reportante_telefono,
        reportante_doc_identidad,
        descripcion: form.descripcion.trim().to_string(),
        estado: IncidentStatus::Pendiente,
        fecha_hora_ocurrencia: form.fecha_hora_ocurrencia.unwrap_or(now),
    })
}
