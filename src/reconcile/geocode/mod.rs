//! Geocoding backfill over the reconciled template sheet.
//!
//! The pass locates the latitude, longitude and address columns on the
//! template header row, collects the rows that can be completed, and resolves
//! them in one batch through a [`Geocoder`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::reconcile::error::{ReconcileError, Result};
use crate::reconcile::model::{CellValue, Sheet};
use crate::reconcile::progress::RunContext;

pub mod local;

pub use local::LocalGeocoder;

/// Header label of the latitude column.
pub const LATITUDE_HEADER: &str = "Широта";
/// Header label of the longitude column.
pub const LONGITUDE_HEADER: &str = "Долгота";
/// Header label of the address column.
pub const ADDRESS_HEADER: &str = "Адрес";

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Batch address ↔ coordinate resolver.
///
/// Each call returns exactly one entry per input, in input order.
pub trait Geocoder {
    fn coordinates(&self, addresses: &[String]) -> Result<Vec<Option<Coordinates>>>;

    fn addresses(&self, points: &[Coordinates]) -> Result<Vec<Option<String>>>;
}

/// Post-processing applied after copy and substitution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFunction {
    #[default]
    None,
    CoordsToAddress,
    AddressToCoords,
}

impl fmt::Display for PostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostFunction::None => f.write_str("none"),
            PostFunction::CoordsToAddress => f.write_str("coords_to_address"),
            PostFunction::AddressToCoords => f.write_str("address_to_coords"),
        }
    }
}

/// Outcome of a backfill pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeocodeReport {
    /// Rows sent to the resolver.
    pub requested: usize,
    /// Rows the resolver produced a result for.
    pub filled: usize,
    /// Resolver error message, when the batch failed.
    pub failure: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct GeoColumns {
    lat: u32,
    lon: u32,
    addr: u32,
}

impl GeoColumns {
    fn locate(sheet: &Sheet, header_row: u32) -> Result<Self> {
        let lat = sheet.find_column(header_row, LATITUDE_HEADER);
        let lon = sheet.find_column(header_row, LONGITUDE_HEADER);
        let addr = sheet.find_column(header_row, ADDRESS_HEADER);
        match (lat, lon, addr) {
            (Some(lat), Some(lon), Some(addr)) => Ok(Self { lat, lon, addr }),
            _ => {
                let missing = [
                    (lat, LATITUDE_HEADER),
                    (lon, LONGITUDE_HEADER),
                    (addr, ADDRESS_HEADER),
                ]
                .into_iter()
                .filter(|(column, _)| column.is_none())
                .map(|(_, label)| label.to_string())
                .collect();
                Err(ReconcileError::MissingGeoColumns { missing })
            }
        }
    }
}

/// Fills empty geocoding cells from populated ones.
///
/// Fails with [`ReconcileError::MissingGeoColumns`] before touching the sheet
/// when a required column is absent. Resolver failures are logged and
/// reported, never returned.
#[instrument(level = "info", skip(sheet, geocoder, context), fields(run_id = %context.id()))]
pub fn backfill(
    sheet: &mut Sheet,
    header_row: u32,
    mode: PostFunction,
    geocoder: &dyn Geocoder,
    context: &RunContext<'_>,
) -> Result<GeocodeReport> {
    match mode {
        PostFunction::None => Ok(GeocodeReport::default()),
        PostFunction::CoordsToAddress => {
            let columns = GeoColumns::locate(sheet, header_row)?;
            Ok(coords_to_address(sheet, header_row, columns, geocoder, context))
        }
        PostFunction::AddressToCoords => {
            let columns = GeoColumns::locate(sheet, header_row)?;
            Ok(address_to_coords(sheet, header_row, columns, geocoder, context))
        }
    }
}

fn coords_to_address(
    sheet: &mut Sheet,
    header_row: u32,
    columns: GeoColumns,
    geocoder: &dyn Geocoder,
    context: &RunContext<'_>,
) -> GeocodeReport {
    let mut rows = Vec::new();
    let mut points = Vec::new();
    for row in header_row.saturating_add(1)..=sheet.last_row() {
        if !sheet.value(row, columns.addr).is_empty() {
            continue;
        }
        let lat = sheet.value(row, columns.lat).as_number();
        let lon = sheet.value(row, columns.lon).as_number();
        if let (Some(lat), Some(lon)) = (lat, lon) {
            rows.push(row);
            points.push(Coordinates { lat, lon });
        }
    }

    let mut report = GeocodeReport {
        requested: rows.len(),
        ..GeocodeReport::default()
    };
    if rows.is_empty() {
        return report;
    }

    context.report(
        &format!("Geocoding (coordinates -> address): {} rows", rows.len()),
        90,
    );
    match geocoder.addresses(&points) {
        Ok(results) => {
            for (row, address) in rows.into_iter().zip(results) {
                if let Some(address) = address {
                    sheet.set_value(row, columns.addr, CellValue::Text(address));
                    report.filled += 1;
                }
            }
        }
        Err(error) => {
            warn!(%error, "reverse geocoding batch failed");
            report.failure = Some(error.to_string());
        }
    }

    info!(requested = report.requested, filled = report.filled, "addresses backfilled");
    report
}

fn address_to_coords(
    sheet: &mut Sheet,
    header_row: u32,
    columns: GeoColumns,
    geocoder: &dyn Geocoder,
    context: &RunContext<'_>,
) -> GeocodeReport {
    let mut rows = Vec::new();
    let mut addresses = Vec::new();
    for row in header_row.saturating_add(1)..=sheet.last_row() {
        let address = sheet.value(row, columns.addr);
        if address.is_empty()
            || !sheet.value(row, columns.lat).is_empty()
            || !sheet.value(row, columns.lon).is_empty()
        {
            continue;
        }
        rows.push(row);
        addresses.push(address.to_string());
    }

    let mut report = GeocodeReport {
        requested: rows.len(),
        ..GeocodeReport::default()
    };
    if rows.is_empty() {
        return report;
    }

    context.report(
        &format!("Geocoding (address -> coordinates): {} rows", rows.len()),
        90,
    );
    match geocoder.coordinates(&addresses) {
        Ok(results) => {
            for (row, point) in rows.into_iter().zip(results) {
                if let Some(point) = point {
                    sheet.set_value(row, columns.lat, CellValue::Number(point.lat));
                    sheet.set_value(row, columns.lon, CellValue::Number(point.lon));
                    report.filled += 1;
                }
            }
        }
        Err(error) => {
            warn!(%error, "forward geocoding batch failed");
            report.failure = Some(error.to_string());
        }
    }

    info!(requested = report.requested, filled = report.filled, "coordinates backfilled");
    report
}
