use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db;
use crate::errors::{AppError, AppResult};

/// Longitude/latitude pair; serialized as `[longitude, latitude]` to match
/// the Mapbox wire order the rest of the system speaks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self { longitude, latitude }
    }

    pub fn is_finite(&self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

impl From<[f64; 2]> for Coordinates {
    fn from(value: [f64; 2]) -> Self {
        Self::new(value[0], value[1])
    }
}

impl From<Coordinates> for [f64; 2] {
    fn from(value: Coordinates) -> Self {
        [value.longitude, value.latitude]
    }
}

/// One permitted-driveway entry. `coordinates` stays `None` until the
/// geocoding pipeline resolves it.
#[derive(Debug, Clone, Serialize)]
pub struct AddressRecord {
    pub id: i64,
    pub address: String,
    pub street_name: String,
    pub street_no: String,
    pub date: String,
    pub coordinates: Option<Coordinates>,
}

/// Insertable shape for the one-time seed import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAddressRecord {
    pub address: String,
    pub street_name: String,
    pub street_no: String,
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchField {
    Address,
    StreetName,
}

impl SearchField {
    pub fn column(&self) -> &'static str {
        match self {
            SearchField::Address => "address",
            SearchField::StreetName => "street_name",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "address" => Ok(SearchField::Address),
            "street_name" | "street-name" | "street" => Ok(SearchField::StreetName),
            _ => Err(AppError::Config(format!("invalid search field: {value}"))),
        }
    }
}

/// Thin query layer over the address collection. Clones share one
/// connection; construct it once at process start and hand it to the
/// pipeline and search service.
#[derive(Clone)]
pub struct AddressStore {
    db: Arc<Mutex<Connection>>,
}

const RECORD_COLUMNS: &str = "id, address, street_name, street_no, date, lng, lat";

impl AddressStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    /// Seeds the collection from the static permit export. A non-empty
    /// collection is left untouched so re-running the import cannot
    /// duplicate records; returns the number of rows written.
    pub fn bulk_insert(&self, records: &[NewAddressRecord]) -> AppResult<usize> {
        let mut conn = self.db.lock();
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM addresses", [], |row| row.get(0))?;
        if existing > 0 {
            info!(existing, "address collection already seeded; skipping import");
            return Ok(0);
        }

        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO addresses (address, street_name, street_no, date)
                VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.address,
                    record.street_name,
                    record.street_no,
                    record.date
                ])?;
            }
        }
        tx.commit()?;
        info!(inserted = records.len(), "seeded address collection");
        Ok(records.len())
    }

    pub fn count(&self) -> AppResult<usize> {
        let conn = self.db.lock();
        conn.query_row("SELECT COUNT(*) FROM addresses", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|value| value as usize)
        .map_err(AppError::from)
    }

    pub fn find_missing_coordinates(&self) -> AppResult<Vec<AddressRecord>> {
        let conn = self.db.lock();
        let sql = format!("SELECT {RECORD_COLUMNS} FROM addresses WHERE lng IS NULL ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Exact prefix match as a range scan over the field's ordered index:
    /// `[prefix, prefix + maxChar)`, ordered non-decreasing by the field.
    /// An empty prefix matches nothing rather than the whole collection.
    pub fn range_query(
        &self,
        field: SearchField,
        prefix: &str,
        limit: Option<usize>,
    ) -> AppResult<Vec<AddressRecord>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }
        let column = field.column();
        let upper = prefix_upper_bound(prefix);
        let conn = self.db.lock();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM addresses
            WHERE {column} >= ?1 AND {column} < ?2
            ORDER BY {column} ASC
            LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let cap = limit.map(|n| n as i64).unwrap_or(-1);
        let rows = stmt
            .query_map(params![prefix, upper, cap], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Records that can be placed on the map, ordered by address.
    pub fn with_coordinates_only(&self, limit: usize) -> AppResult<Vec<AddressRecord>> {
        let conn = self.db.lock();
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM addresses
            WHERE lng IS NOT NULL
            ORDER BY address ASC
            LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([limit as i64], record_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Attaches coordinates to a record that does not have them yet.
    /// Returns false when the record is missing or already resolved; a
    /// resolved pair is never overwritten.
    pub fn set_coordinates(&self, id: i64, coordinates: Coordinates) -> AppResult<bool> {
        if !coordinates.is_finite() {
            return Err(AppError::Config(format!(
                "refusing to store non-finite coordinates for record {id}"
            )));
        }
        let conn = self.db.lock();
        let updated = conn.execute(
            "UPDATE addresses
            SET lng = ?1, lat = ?2, geocoded_at = ?3
            WHERE id = ?4 AND lng IS NULL",
            params![
                coordinates.longitude,
                coordinates.latitude,
                db::now_timestamp(),
                id
            ],
        )?;
        Ok(updated > 0)
    }
}

fn prefix_upper_bound(prefix: &str) -> String {
    format!("{prefix}{}", char::MAX)
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AddressRecord> {
    let lng: Option<f64> = row.get(5)?;
    let lat: Option<f64> = row.get(6)?;
    Ok(AddressRecord {
        id: row.get(0)?,
        address: row.get(1)?,
        street_name: row.get(2)?,
        street_no: row.get(3)?,
        date: row.get(4)?,
        coordinates: match (lng, lat) {
            (Some(longitude), Some(latitude)) => Some(Coordinates::new(longitude, latitude)),
            _ => None,
        },
    })
}
