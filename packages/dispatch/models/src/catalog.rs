//! Catalog records used to fill dispatch selections.

use serde::{Deserialize, Serialize};

/// A patrol sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sector {
    pub id: i64,
    pub sector_code: Option<String>,
    pub nombre: String,
}

/// A patrol quadrant (`cuadrante`) inside a sector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadrant {
    pub id: i64,
    pub cuadrante_code: Option<String>,
    pub nombre: String,
    pub sector_id: Option<i64>,
}

/// A fleet vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub placa: String,
    pub codigo_vehiculo: Option<String>,
    pub estado: Option<String>,
}

/// A member of staff who can drive, ride along, or take charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Personnel {
    pub id: i64,
    pub nombres: String,
    pub apellido_paterno: Option<String>,
    pub apellido_materno: Option<String>,
    pub doc_numero: Option<String>,
}

impl Personnel {
    /// Display name: surnames first, as printed on duty rosters.
    #[must_use]
    pub fn full_name(&self) -> String {
        let surnames: Vec<&str> = [&self.apellido_paterno, &self.apellido_materno]
            .into_iter()
            .filter_map(|s| s.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect();

        if surnames.is_empty() {
            self.nombres.clone()
        } else {
            format!("{}, {}", surnames.join(" "), self.nombres)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_puts_surnames_first() {
        let person = Personnel {
            id: 1,
            nombres: "Ana".to_string(),
            apellido_paterno: Some("Quispe".to_string()),
            apellido_materno: Some("Mamani".to_string()),
            doc_numero: None,
        };
        assert_eq!(person.full_name(), "Quispe Mamani, Ana");
    }

    #[test]
    fn full_name_without_surnames() {
        let person = Personnel {
            id: 1,
            nombres: "Ana".to_string(),
            apellido_paterno: None,
            apellido_materno: Some(String::new()),
            doc_numero: None,
        };
        assert_eq!(person.full_name(), "Ana");
    }
}
