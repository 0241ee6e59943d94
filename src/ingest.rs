//! CSV upload pipeline: decode, map headers to canonical fields, and
//! upsert the mapped rows into the record store.
//!
//! Failure handling follows the row/file split used by the upload form:
//! individual rows that cannot be mapped (no identifier, malformed
//! record) are skipped silently, while a file that yields zero valid
//! rows, carries the wrong extension, or cannot be decoded fails the
//! whole request with a corrective hint.

use anyhow::{Result, anyhow};
use encoding_rs::UTF_8;
use log::{debug, warn};
use thiserror::Error;

use crate::fields::{Field, map_row};
use crate::model::Record;
use crate::store::{RecordStore, UpsertSummary};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("El archivo debe tener formato .csv")]
    InvalidExtension,
    #[error("No se pudo decodificar el archivo. Usa UTF-8.")]
    Decode,
    #[error("No se encontraron registros validos en el CSV.")]
    NoValidRows,
    #[error("No se pudo leer el CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Decodes an uploaded file body as UTF-8, tolerating a leading
/// byte-order marker.
pub fn decode_upload(bytes: &[u8]) -> Result<String, IngestError> {
    let (text, _, had_errors) = UTF_8.decode(bytes);
    if had_errors {
        return Err(IngestError::Decode);
    }
    Ok(text.into_owned())
}

/// Parses decoded CSV text into mapped records. Rows that fail to parse
/// or lack a usable `record_id` are dropped at row granularity; the
/// file as a whole fails only when nothing valid remains.
pub fn map_rows(text: &str) -> Result<Vec<Record>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut mapped = Vec::new();
    let mut skipped = 0usize;
    for (row_idx, result) in reader.records().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!("Skipping row {}: {err}", row_idx + 2);
                skipped += 1;
                continue;
            }
        };
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        match map_row(&headers, &values) {
            Some(record) => mapped.push(record),
            None => skipped += 1,
        }
    }
    debug!("Mapped {} row(s), skipped {}", mapped.len(), skipped);

    if mapped.is_empty() {
        return Err(IngestError::NoValidRows);
    }
    Ok(mapped)
}

/// Runs the full pipeline for one uploaded file. `filename`, when
/// known, must carry a `.csv` extension.
pub fn ingest_csv(
    store: &mut RecordStore,
    filename: Option<&str>,
    bytes: &[u8],
) -> Result<UpsertSummary, IngestError> {
    if let Some(name) = filename
        && !name.to_lowercase().ends_with(".csv")
    {
        return Err(IngestError::InvalidExtension);
    }
    let text = decode_upload(bytes)?;
    let records = map_rows(&text)?;
    store.upsert_batch(&records).map_err(IngestError::Store)
}

pub const TEMPLATE_FILE_NAME: &str = "avance_template.csv";

/// Downloadable starter file: the canonical header row (with the short
/// `id` spelling the synonym table accepts) plus one illustrative row.
pub fn template_csv() -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let mut headers: Vec<&str> = Field::ALL.iter().map(|field| field.as_str()).collect();
    headers[0] = "id";
    writer.write_record(&headers)?;
    writer.write_record([
        "001",
        "SEDE PRINCIPAL",
        "Centro Corporativo",
        "UPGRADE + WIN11",
        "Nombre Ejemplo",
        "OFICINA PRINCIPAL ADMINISTRATIVO",
        "HP",
        "EliteBook 840",
        "5CD3051HBZ",
        "BANCAINMOBIOP01",
        "10.10.2.15",
        "usuario@banbif.com",
        "2025-09-29",
        "REALIZADO",
        "REALIZADO",
        "PROGRAMADO",
        "2025-09-27",
        "2025-09-29",
        "Observaciones",
    ])?;
    let bytes = writer
        .into_inner()
        .map_err(|err| anyhow!("Finishing template CSV: {}", err.error()))?;
    Ok(String::from_utf8(bytes)?)
}
