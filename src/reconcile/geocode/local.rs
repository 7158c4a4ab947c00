use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::reconcile::error::Result;
use crate::reconcile::geocode::{Coordinates, Geocoder};

#[derive(Debug, Deserialize)]
struct GeobaseRecord {
    address: String,
    latitude: f64,
    longitude: f64,
}

/// Offline geocoder backed by an `address,latitude,longitude` CSV extract.
///
/// Forward lookups require an exact address match. Reverse lookups return
/// the address of the nearest known point.
#[derive(Debug, Clone, Default)]
pub struct LocalGeocoder {
    points: Vec<(Coordinates, String)>,
    by_address: HashMap<String, Coordinates>,
}

impl LocalGeocoder {
    /// Loads a geobase CSV file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = csv::Reader::from_path(path)?;
        Self::from_csv(reader)
    }

    /// Loads a geobase from any CSV byte stream with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut geocoder = Self::default();
        for record in reader.deserialize::<GeobaseRecord>() {
            let record = record?;
            geocoder.insert(record.address, record.latitude, record.longitude);
        }
        debug!(points = geocoder.len(), "geobase loaded");
        Ok(geocoder)
    }

    /// Registers one known address. A repeated address keeps the newest point.
    pub fn insert(&mut self, address: impl Into<String>, lat: f64, lon: f64) {
        let address = address.into();
        let point = Coordinates { lat, lon };
        self.by_address.insert(address.clone(), point);
        self.points.push((point, address));
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn nearest(&self, point: Coordinates) -> Option<&str> {
        self.points
            .iter()
            .map(|(known, address)| {
                let d_lat = known.lat - point.lat;
                let d_lon = known.lon - point.lon;
                (d_lat * d_lat + d_lon * d_lon, address)
            })
            .min_by(|lhs, rhs| lhs.0.total_cmp(&rhs.0))
            .map(|(_, address)| address.as_str())
    }
}

impl Geocoder for LocalGeocoder {
    fn coordinates(&self, addresses: &[String]) -> Result<Vec<Option<Coordinates>>> {
        Ok(addresses
            .iter()
            .map(|address| self.by_address.get(address).copied())
            .collect())
    }

    fn addresses(&self, points: &[Coordinates]) -> Result<Vec<Option<String>>> {
        if self.is_empty() {
            warn!("geobase is empty, reverse lookups return nothing");
        }
        Ok(points
            .iter()
            .map(|point| self.nearest(*point).map(str::to_string))
            .collect())
    }
}
