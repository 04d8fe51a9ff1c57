use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::AppResult;
use crate::store::NewAddressRecord;

/// The municipal export comes either as a bare array of permit rows or
/// wrapped in a `{"results": [...]}` envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PermitExport {
    Wrapped { results: Vec<PermitRow> },
    Bare(Vec<PermitRow>),
}

#[derive(Debug, Deserialize)]
struct PermitRow {
    date: String,
    street_name: String,
    street_no: String,
    address: String,
}

pub fn load_permit_export(path: &Path) -> AppResult<Vec<NewAddressRecord>> {
    let bytes = fs::read(path)?;
    let records = parse_permit_export(&bytes)?;
    info!(path = %path.display(), rows = records.len(), "parsed permit export");
    Ok(records)
}

pub fn parse_permit_export(bytes: &[u8]) -> AppResult<Vec<NewAddressRecord>> {
    let export: PermitExport = serde_json::from_slice(bytes)?;
    let rows = match export {
        PermitExport::Wrapped { results } => results,
        PermitExport::Bare(rows) => rows,
    };
    Ok(rows.into_iter().map(normalize).collect())
}

// Stored text is uppercase; search normalization in the service relies
// on that.
fn normalize(row: PermitRow) -> NewAddressRecord {
    NewAddressRecord {
        address: row.address.trim().to_uppercase(),
        street_name: row.street_name.trim().to_uppercase(),
        street_no: row.street_no.trim().to_string(),
        date: row.date.trim().to_string(),
    }
}
