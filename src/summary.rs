//! Aggregation engine behind the dashboard summary endpoint.
//!
//! Given a request-scoped [`RecordFilter`], pulls the matching records
//! (most recent first) and reduces them into the grouped counts and
//! histograms the front-end charts consume. Strictly read-only.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::fields::Field;
use crate::model::{NO_STATUS_LABEL, Record, STATUS_CHOICES, status_bucket};
use crate::store::{RecordFilter, RecordStore};

/// One filter-UI selector: the available values plus the currently
/// selected one (empty string when unfiltered).
#[derive(Debug, Serialize)]
pub struct FilterOption {
    pub options: Vec<String>,
    pub selected: String,
}

#[derive(Debug, Serialize)]
pub struct DateFilters {
    pub fecha_inicio: String,
    pub fecha_fin: String,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub status_counts: BTreeMap<String, u64>,
    pub status_buckets: BTreeMap<String, u64>,
    pub schedule: BTreeMap<String, u64>,
    pub schedule_brands: BTreeMap<String, BTreeMap<String, u64>>,
    pub recent_updates: Vec<Record>,
    pub status_catalog: Vec<String>,
    pub filters: BTreeMap<String, FilterOption>,
    pub date_filters: DateFilters,
    pub hostname_filter: String,
    pub name_filter: String,
    pub estado_filter: String,
    pub estado_options: Vec<String>,
}

/// How many records `recent_updates` carries when no name filter is
/// active. A name search returns every match so the operator can see
/// the full result of the lookup.
const RECENT_UPDATES_CAP: usize = 10;

pub fn build_summary(store: &RecordStore, filter: &RecordFilter) -> Result<Summary> {
    let records = store.query_records(filter)?;

    let total = records.len();
    let mut status_counts: BTreeMap<String, u64> = BTreeMap::new();
    let mut status_buckets: BTreeMap<String, u64> = BTreeMap::new();
    let mut schedule: BTreeMap<String, u64> = BTreeMap::new();
    let mut schedule_brands: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut recent_updates = Vec::with_capacity(total);

    for record in records {
        let estado_raw = record
            .estado
            .as_deref()
            .unwrap_or("")
            .trim()
            .to_uppercase();
        let estado_label = if estado_raw.is_empty() {
            NO_STATUS_LABEL.to_string()
        } else {
            estado_raw.clone()
        };
        *status_counts.entry(estado_label.clone()).or_insert(0) += 1;
        *status_buckets
            .entry(status_bucket(&estado_raw).to_string())
            .or_insert(0) += 1;

        if let Some(fecha) = record.fecha_estado.as_deref().filter(|f| !f.is_empty()) {
            *schedule.entry(fecha.to_string()).or_insert(0) += 1;
            let brands = schedule_brands.entry(fecha.to_string()).or_default();
            // Blank brand values still register the date, but never an
            // entry in the inner brand map.
            if let Some(marca) = record.marca.as_deref().filter(|m| !m.is_empty()) {
                *brands.entry(marca.to_string()).or_insert(0) += 1;
            }
        }

        let mut projected = record;
        projected.estado = Some(estado_label);
        recent_updates.push(projected);
    }

    if filter.nombre.is_none() {
        recent_updates.truncate(RECENT_UPDATES_CAP);
    }

    let mut filters = BTreeMap::new();
    filters.insert(
        "ubicacion".to_string(),
        FilterOption {
            options: store.distinct_values(Field::Ubicacion)?,
            selected: filter.ubicacion.clone().unwrap_or_default(),
        },
    );
    filters.insert(
        "nom_sede".to_string(),
        FilterOption {
            options: store.distinct_values(Field::NomSede)?,
            selected: filter.nom_sede.clone().unwrap_or_default(),
        },
    );
    filters.insert(
        "categoria_trab".to_string(),
        FilterOption {
            options: store.distinct_values(Field::CategoriaTrab)?,
            selected: filter.categoria_trab.clone().unwrap_or_default(),
        },
    );
    filters.insert(
        "estado".to_string(),
        FilterOption {
            options: status_catalog(),
            selected: filter.estado.clone().unwrap_or_default(),
        },
    );

    Ok(Summary {
        total,
        status_counts,
        status_buckets,
        schedule,
        schedule_brands,
        recent_updates,
        status_catalog: status_catalog(),
        filters,
        date_filters: DateFilters {
            fecha_inicio: filter.fecha_inicio.clone().unwrap_or_default(),
            fecha_fin: filter.fecha_fin.clone().unwrap_or_default(),
        },
        hostname_filter: filter.hostname.clone().unwrap_or_default(),
        name_filter: filter.nombre.clone().unwrap_or_default(),
        estado_filter: filter.estado.clone().unwrap_or_default(),
        estado_options: status_catalog(),
    })
}

fn status_catalog() -> Vec<String> {
    STATUS_CHOICES.iter().map(|s| s.to_string()).collect()
}
