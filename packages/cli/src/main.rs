#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command line front-end for the CitySecure dispatch client.
//!
//! Results are printed to stdout as JSON; progress and errors go through
//! `log` (set `RUST_LOG=info` to follow a dispatch step by step).

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use citysecure_config::Config;
use citysecure_dispatch::{
    DispatchError, DispatchRequest, DispatchSelections, Dispatcher, ShiftState,
};
use citysecure_dispatch_models::{ActiveShift, CallOrigin, IncidentStatus, Priority, ShiftSlot};
use citysecure_gateway::{Gateway, Notification, Session};
use citysecure_geocoder::AddressLookup;
use citysecure_geocoder::address::AddressParts;
use citysecure_geocoder::debounce::DebouncedSearch;
use citysecure_incidents::{AddressChoice, IncidentBackend, IncidentFilter, RegistrationForm};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::AsyncBufReadExt;

#[derive(Parser)]
#[command(name = "citysecure", about = "CitySecure incident dispatch client")]
struct Cli {
    /// Config file (defaults to `CITYSECURE_CONFIG`, then built-in values)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the currently active work shift
    ActiveShift,
    /// Dispatch resources to an incident
    Dispatch(DispatchArgs),
    /// Geocode free text through the backend, or search registered addresses
    Geocode {
        /// Address text
        text: String,
        /// Search registered addresses instead of geocoding
        #[arg(long)]
        search: bool,
    },
    /// Search registered addresses as you type (one query per line on stdin)
    AddressSearch,
    /// Incident listings and registration
    #[command(subcommand)]
    Incidents(IncidentCommands),
    /// Catalog lookups
    #[command(subcommand)]
    Catalogs(CatalogCommands),
}

#[derive(Args)]
struct DispatchArgs {
    /// Incident id
    incident_id: i64,
    /// Vehicle to send
    #[arg(long)]
    vehicle: Option<i64>,
    /// Driver (personnel id)
    #[arg(long)]
    driver: Option<i64>,
    /// Co-pilot (personnel id)
    #[arg(long)]
    copilot: Option<i64>,
    /// Officer in charge (personnel id)
    #[arg(long)]
    officer: Option<i64>,
    /// Office unit in charge
    #[arg(long)]
    office: Option<i64>,
    /// Odometer reading when the vehicle starts the shift
    #[arg(long)]
    km: Option<f64>,
    /// Fuel level when the vehicle starts the shift (e.g. "FULL", "3/4")
    #[arg(long)]
    fuel: Option<String>,
    /// Notes stored on the assignment, link and incident
    #[arg(long)]
    notes: Option<String>,
    /// Shift slot to dispatch under (skips the active shift lookup)
    #[arg(long)]
    shift: Option<ShiftSlot>,
    /// Operator recorded on a new operational shift (defaults to
    /// `CITYSECURE_OPERATOR_ID` / `dispatch.operator_id`)
    #[arg(long)]
    operator: Option<i64>,
}

#[derive(Subcommand)]
enum IncidentCommands {
    /// List incidents
    List {
        #[arg(long)]
        estado: Option<IncidentStatus>,
        #[arg(long)]
        prioridad: Option<Priority>,
        #[arg(long)]
        sector: Option<i64>,
        /// First day included (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day included (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one incident
    Show { id: i64 },
    /// Soft-delete an incident
    Delete { id: i64 },
    /// Register a new incident
    Register(RegisterArgs),
}

#[derive(Args)]
struct RegisterArgs {
    #[arg(long)]
    tipo: i64,
    #[arg(long)]
    subtipo: i64,
    #[arg(long, default_value = "MEDIA")]
    prioridad: Priority,
    #[arg(long)]
    origen: CallOrigin,
    #[arg(long)]
    descripcion: String,
    #[arg(long)]
    sector: i64,
    #[arg(long)]
    cuadrante: Option<i64>,
    /// Free-text location reference
    #[arg(long)]
    localizacion: Option<String>,
    #[arg(long)]
    calle: Option<String>,
    #[arg(long)]
    numero: Option<String>,
    #[arg(long)]
    manzana: Option<String>,
    #[arg(long)]
    lote: Option<String>,
    #[arg(long)]
    urbanizacion: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Keep the reporter anonymous
    #[arg(long)]
    anonimo: bool,
    #[arg(long)]
    reportante: Option<String>,
    #[arg(long)]
    telefono: Option<String>,
    #[arg(long)]
    documento: Option<String>,
}

impl RegisterArgs {
    fn into_form(self) -> RegistrationForm {
        let manual = self.calle.is_some() || self.manzana.is_some();
        let address = if manual {
            AddressChoice::Manual(AddressParts {
                calle: self.calle.unwrap_or_default(),
                numero: self.numero,
                manzana: self.manzana,
                lote: self.lote,
                urbanizacion: self.urbanizacion,
            })
        } else {
            AddressChoice::Unspecified
        };

        RegistrationForm {
            tipo_novedad_id: Some(self.tipo),
            subtipo_novedad_id: Some(self.subtipo),
            prioridad: Some(self.prioridad),
            origen_llamada: Some(self.origen),
            descripcion: self.descripcion,
            sector_id: Some(self.sector),
            cuadrante_id: self.cuadrante,
            localizacion: self.localizacion,
            address,
            latitud: self.lat,
            longitud: self.lon,
            es_anonimo: self.anonimo,
            reportante_nombre: self.reportante,
            reportante_telefono: self.telefono,
            reportante_doc_identidad: self.documento,
            fecha_hora_ocurrencia: None,
        }
    }
}

#[derive(Subcommand)]
enum CatalogCommands {
    Sectors,
    Quadrants {
        /// Only quadrants of this sector
        #[arg(long)]
        sector: Option<i64>,
    },
    Vehicles,
    Personnel,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(notifications: &[Notification]) {
    for notification in notifications {
        log::error!("{notification}");
    }
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    let gateway = Gateway::from_config(&config.api, Arc::new(Session::new()))?;
    log::debug!("Using backend {}", gateway.base_url());

    match cli.command {
        Commands::ActiveShift => {
            let dispatcher = Dispatcher::new(Arc::new(gateway), &config.dispatch);
            let state = dispatcher.shifts().current().await?;
            print_json(&state)?;
        }
        Commands::Dispatch(args) => {
            let incident = gateway.get_incident(args.incident_id).await?;
            let dispatcher = Dispatcher::new(Arc::new(gateway), &config.dispatch);

            let active_shift = match args.shift {
                Some(slot) => Some(ActiveShift::from_slot(slot)),
                None => match dispatcher.shifts().current().await? {
                    ShiftState::Active(shift) => Some(shift),
                    ShiftState::NoActive { .. } => None,
                },
            };

            let request = DispatchRequest {
                incident,
                selections: DispatchSelections {
                    vehiculo_id: args.vehicle,
                    conductor_id: args.driver,
                    copiloto_id: args.copilot,
                    personal_cargo_id: args.officer,
                    unidad_oficina_id: args.office,
                    kilometraje_inicio: args.km,
                    nivel_combustible: args.fuel,
                    observaciones: args.notes,
                },
                active_shift,
                operator_id: args.operator.or(config.dispatch.operator_id),
            };

            match dispatcher.dispatch_incident(request).await {
                Ok(outcome) => print_json(&outcome)?,
                Err(e) => {
                    if let Some(api) = e.api_error() {
                        report(&api.notifications());
                    }
                    if let DispatchError::StepFailed { rollback, .. } = &e
                        && !rollback.is_clean()
                    {
                        log::error!("Rollback incomplete: {rollback}");
                    }
                    return Err(e.into());
                }
            }
        }
        Commands::Geocode { text, search } => {
            if search {
                print_json(&gateway.search(&text).await?)?;
            } else {
                match gateway.geocode(&text).await? {
                    Some(found) => print_json(&found)?,
                    None => log::warn!("No match for {text:?}"),
                }
            }
        }
        Commands::AddressSearch => {
            let settle = config.search.debounce() + config.api.timeout();
            let lookup: Arc<dyn AddressLookup> = Arc::new(gateway);
            let mut search = DebouncedSearch::spawn(
                lookup,
                config.search.debounce(),
                config.search.min_query_len,
            );
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

            loop {
                tokio::select! {
                    line = lines.next_line() => match line? {
                        Some(text) => search.push(text),
                        None => break,
                    },
                    Some(outcome) = search.next() => match outcome.result {
                        Ok(addresses) => print_json(&addresses)?,
                        Err(e) => log::error!("Search for {:?} failed: {e}", outcome.query),
                    },
                }
            }

            if let Ok(Some(outcome)) = tokio::time::timeout(settle, search.next()).await {
                print_json(&outcome.result?)?;
            }
            search.close().await;
        }
        Commands::Incidents(command) => match command {
            IncidentCommands::List {
                estado,
                prioridad,
                sector,
                from,
                to,
                search,
                page,
                limit,
            } => {
                let filter = IncidentFilter {
                    estado,
                    prioridad,
                    sector_id: sector,
                    fecha_desde: from,
                    fecha_hasta: to,
                    search,
                    page,
                    limit,
                };
                let page = citysecure_incidents::list_incidents(&gateway, &filter).await?;
                print_json(&page)?;
            }
            IncidentCommands::Show { id } => {
                print_json(&gateway.get_incident(id).await?)?;
            }
            IncidentCommands::Delete { id } => {
                gateway.soft_delete_incident(id).await?;
                log::info!("Incident {id} deleted");
            }
            IncidentCommands::Register(args) => {
                let result =
                    citysecure_incidents::register_incident(&gateway, args.into_form(), Utc::now())
                        .await;
                match result {
                    Ok(registration) => print_json(&registration)?,
                    Err(e) => {
                        report(&e.notifications());
                        return Err(Box::<dyn std::error::Error>::from(e));
                    }
                }
            }
        },
        Commands::Catalogs(command) => match command {
            CatalogCommands::Sectors => print_json(&gateway.sectors().await?)?,
            CatalogCommands::Quadrants { sector } => {
                print_json(&gateway.quadrants(sector).await?)?;
            }
            CatalogCommands::Vehicles => print_json(&gateway.vehicles().await?)?,
            CatalogCommands::Personnel => {
                let personnel = gateway.personnel().await?;
                for person in &personnel {
                    log::debug!("{}: {}", person.id, person.full_name());
                }
                print_json(&personnel)?;
            }
        },
    }

    Ok(())
}
