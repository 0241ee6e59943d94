//! SQLite persistence for project records and dashboard users.
//!
//! All durable state lives in one database file with two tables:
//! `project_records`, keyed by the externally supplied `record_id`, and
//! `users` for dashboard credentials. The record table is only ever
//! mutated through [`RecordStore::upsert_batch`]; every read path
//! (summary aggregation, filter options) goes through the query helpers
//! here and never writes.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use itertools::Itertools;
use log::warn;
use rusqlite::{Connection, Row, ToSql, params, params_from_iter};
use serde::Serialize;

use crate::fields::Field;
use crate::model::Record;

/// Outcome of one batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub total: usize,
}

/// Request-scoped predicates for the summary query. All predicates are
/// conjunctive; `None` means "no constraint". Date bounds must already
/// be coerced to strict ISO form before they reach the store.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub ubicacion: Option<String>,
    pub nom_sede: Option<String>,
    pub categoria_trab: Option<String>,
    pub estado: Option<String>,
    pub fecha_inicio: Option<String>,
    pub fecha_fin: Option<String>,
    pub nombre: Option<String>,
    pub hostname: Option<String>,
}

/// A row from the `users` table.
#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
}

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).with_context(|| format!("Opening database {path:?}"))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Opening in-memory database")?;
        Ok(Self { conn })
    }

    /// Creates missing tables and reconciles legacy layouts: adds the
    /// `role` column to a pre-role `users` table and rebuilds
    /// `project_records` whenever its column set diverges from the
    /// canonical field list. Safe to run on every startup.
    pub fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT UNIQUE NOT NULL,
                    password_hash TEXT NOT NULL,
                    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                    role TEXT NOT NULL DEFAULT 'standard'
                );",
            )
            .context("Creating users table")?;
        self.ensure_user_role_column()?;
        self.ensure_record_schema()?;
        Ok(())
    }

    fn ensure_user_role_column(&self) -> Result<()> {
        let columns = self.table_columns("users")?;
        if !columns.contains("role") {
            self.conn
                .execute(
                    "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'standard'",
                    [],
                )
                .context("Adding role column to users table")?;
        }
        Ok(())
    }

    fn ensure_record_schema(&self) -> Result<()> {
        let existing = self.table_columns("project_records")?;
        let expected: BTreeSet<String> = ["id", "last_updated"]
            .into_iter()
            .map(String::from)
            .chain(Field::ALL.iter().map(|f| f.as_str().to_string()))
            .collect();
        if existing == expected {
            return Ok(());
        }
        if !existing.is_empty() {
            warn!("project_records column set diverged; rebuilding table");
        }
        let columns = Field::ALL
            .iter()
            .map(|field| {
                if *field == Field::RecordId {
                    format!("{} TEXT UNIQUE", field.as_str())
                } else {
                    format!("{} TEXT", field.as_str())
                }
            })
            .join(",\n    ");
        self.conn
            .execute_batch(&format!(
                "DROP TABLE IF EXISTS project_records;
                CREATE TABLE project_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    {columns},
                    last_updated TEXT DEFAULT CURRENT_TIMESTAMP
                );"
            ))
            .context("Creating project_records table")?;
        Ok(())
    }

    fn table_columns(&self, table: &str) -> Result<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({table})"))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(columns)
    }

    /// Atomic insert-or-update for a batch of mapped rows, keyed on
    /// `record_id`. An existing record has every field overwritten,
    /// including with NULL when the new row lacks a column; both paths
    /// refresh `last_updated`. The whole batch commits together.
    pub fn upsert_batch(&mut self, records: &[Record]) -> Result<UpsertSummary> {
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut summary = UpsertSummary::default();
        let tx = self.conn.transaction().context("Starting upsert batch")?;
        {
            let mut exists_stmt =
                tx.prepare("SELECT 1 FROM project_records WHERE record_id = ?1")?;
            let mut upsert_stmt = tx.prepare(&upsert_sql())?;
            for record in records {
                let exists = exists_stmt.exists(params![record.record_id])?;
                let values = record_params(record, &now);
                upsert_stmt
                    .execute(&values[..])
                    .with_context(|| format!("Upserting record '{}'", record.record_id))?;
                if exists {
                    summary.updated += 1;
                } else {
                    summary.inserted += 1;
                }
            }
        }
        tx.commit().context("Committing upsert batch")?;
        summary.total = summary.inserted + summary.updated;
        Ok(summary)
    }

    /// Retrieves all records matching every predicate of `filter`,
    /// most recently updated first.
    pub fn query_records(&self, filter: &RecordFilter) -> Result<Vec<Record>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<String> = Vec::new();

        if let Some(ubicacion) = &filter.ubicacion {
            conditions.push("ubicacion = ?");
            values.push(ubicacion.clone());
        }
        if let Some(nom_sede) = &filter.nom_sede {
            conditions.push("nom_sede = ?");
            values.push(nom_sede.clone());
        }
        if let Some(categoria) = &filter.categoria_trab {
            conditions.push("categoria_trab = ?");
            values.push(categoria.clone());
        }
        if let Some(estado) = &filter.estado {
            conditions.push("UPPER(estado) = UPPER(?)");
            values.push(estado.clone());
        }
        if let Some(inicio) = &filter.fecha_inicio {
            conditions.push("fecha_estado >= ?");
            values.push(inicio.clone());
        }
        if let Some(fin) = &filter.fecha_fin {
            conditions.push("fecha_estado <= ?");
            values.push(fin.clone());
        }
        if let Some(nombre) = &filter.nombre {
            conditions.push("UPPER(nombre_completo) LIKE UPPER(?)");
            values.push(format!("%{nombre}%"));
        }
        if let Some(hostname) = &filter.hostname {
            conditions.push("hostname LIKE ?");
            values.push(format!("%{hostname}%"));
        }

        let mut sql = format!(
            "SELECT {}, last_updated FROM project_records",
            record_column_list()
        );
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.iter().join(" AND "));
        }
        sql.push_str(" ORDER BY last_updated DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), record_from_row)?
            .collect::<rusqlite::Result<Vec<Record>>>()
            .context("Querying project records")?;
        Ok(records)
    }

    /// Distinct non-empty values of one column, sorted ascending, from
    /// the full (unfiltered) record population. Feeds the filter-UI
    /// option lists.
    pub fn distinct_values(&self, field: Field) -> Result<Vec<String>> {
        let column = field.as_str();
        let mut stmt = self.conn.prepare(&format!(
            "SELECT DISTINCT {column} FROM project_records
             WHERE {column} IS NOT NULL AND {column} <> '' ORDER BY {column}"
        ))?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<String>>>()
            .with_context(|| format!("Listing distinct values of {column}"))?;
        Ok(values)
    }

    pub fn find_user(&self, username: &str) -> Result<Option<UserRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, password_hash, role FROM users WHERE username = ?1")?;
        let user = stmt
            .query_map(params![username], user_from_row)?
            .next()
            .transpose()
            .context("Looking up user by name")?;
        Ok(user)
    }

    pub fn user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, password_hash, role FROM users WHERE id = ?1")?;
        let user = stmt
            .query_map(params![id], user_from_row)?
            .next()
            .transpose()
            .context("Looking up user by id")?;
        Ok(user)
    }

    /// Inserts a user, returning `false` when the username is already
    /// taken instead of surfacing the uniqueness violation as an error.
    pub fn insert_user(&self, username: &str, password_hash: &str, role: &str) -> Result<bool> {
        let outcome = self.conn.execute(
            "INSERT INTO users (username, password_hash, role) VALUES (?1, ?2, ?3)",
            params![username, password_hash, role],
        );
        match outcome {
            Ok(_) => Ok(true),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(false)
            }
            Err(err) => Err(err).context("Inserting user"),
        }
    }

    pub fn has_admin(&self) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM users WHERE role = 'admin' LIMIT 1")?;
        let found = stmt.exists([])?;
        Ok(found)
    }
}

fn record_column_list() -> String {
    Field::ALL.iter().map(|field| field.as_str()).join(", ")
}

fn upsert_sql() -> String {
    let columns = record_column_list();
    let placeholders = (1..=Field::ALL.len() + 1).map(|i| format!("?{i}")).join(", ");
    let updates = Field::ALL
        .iter()
        .filter(|field| **field != Field::RecordId)
        .map(|field| format!("{0}=excluded.{0}", field.as_str()))
        .join(",\n    ");
    format!(
        "INSERT INTO project_records ({columns}, last_updated) VALUES ({placeholders})
         ON CONFLICT(record_id) DO UPDATE SET
    {updates},
    last_updated=excluded.last_updated"
    )
}

fn record_params<'a>(record: &'a Record, now: &'a String) -> Vec<&'a dyn ToSql> {
    vec![
        &record.record_id,
        &record.ubicacion,
        &record.nom_sede,
        &record.categoria_trab,
        &record.nombre_completo,
        &record.perfil_imagen,
        &record.marca,
        &record.modelo,
        &record.serial_num,
        &record.hostname,
        &record.ip_equipo,
        &record.email_trabajo,
        &record.fecha_estado,
        &record.estado,
        &record.estado_coordinacion,
        &record.estado_upgrade,
        &record.fecha_programada,
        &record.fecha_ejecucion,
        &record.notas,
        now,
    ]
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        record_id: row.get(0)?,
        ubicacion: row.get(1)?,
        nom_sede: row.get(2)?,
        categoria_trab: row.get(3)?,
        nombre_completo: row.get(4)?,
        perfil_imagen: row.get(5)?,
        marca: row.get(6)?,
        modelo: row.get(7)?,
        serial_num: row.get(8)?,
        hostname: row.get(9)?,
        ip_equipo: row.get(10)?,
        email_trabajo: row.get(11)?,
        fecha_estado: row.get(12)?,
        estado: row.get(13)?,
        estado_coordinacion: row.get(14)?,
        estado_upgrade: row.get(15)?,
        fecha_programada: row.get(16)?,
        fecha_ejecucion: row.get(17)?,
        notas: row.get(18)?,
        last_updated: row.get(19)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RecordStore {
        let store = RecordStore::open_in_memory().expect("open store");
        store.init_schema().expect("init schema");
        store
    }

    fn record(id: &str, estado: Option<&str>) -> Record {
        let mut record = Record::default();
        record.record_id = id.to_string();
        record.estado = estado.map(String::from);
        record
    }

    #[test]
    fn init_schema_is_idempotent() {
        let store = store();
        store.init_schema().expect("second init");
        assert!(!store.has_admin().expect("query admins"));
    }

    #[test]
    fn init_schema_rebuilds_diverged_record_table() {
        let store = RecordStore::open_in_memory().expect("open store");
        store
            .conn
            .execute_batch("CREATE TABLE project_records (id INTEGER PRIMARY KEY, lone TEXT);")
            .expect("legacy table");
        store.init_schema().expect("init schema");
        let columns = store.table_columns("project_records").expect("columns");
        assert!(columns.contains("record_id"));
        assert!(columns.contains("last_updated"));
        assert!(!columns.contains("lone"));
    }

    #[test]
    fn upsert_counts_inserts_and_updates() {
        let mut store = store();
        let batch = vec![record("001", Some("REALIZADO")), record("002", None)];
        let first = store.upsert_batch(&batch).expect("first batch");
        assert_eq!(first.inserted, 2);
        assert_eq!(first.updated, 0);
        assert_eq!(first.total, 2);

        let second = store.upsert_batch(&batch).expect("second batch");
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 2);
        assert_eq!(second.total, 2);

        let all = store.query_records(&RecordFilter::default()).expect("query");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn upsert_overwrites_every_field() {
        let mut store = store();
        let mut full = record("001", Some("PENDIENTE"));
        full.hostname = Some("HOST01".to_string());
        full.notas = Some("primera carga".to_string());
        store.upsert_batch(&[full]).expect("first batch");

        // The second row lacks hostname and notas entirely; both must
        // come back NULL, not keep their old values.
        store
            .upsert_batch(&[record("001", Some("REALIZADO"))])
            .expect("second batch");
        let all = store.query_records(&RecordFilter::default()).expect("query");
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].estado.as_deref(), Some("REALIZADO"));
        assert_eq!(all[0].hostname, None);
        assert_eq!(all[0].notas, None);
        assert!(all[0].last_updated.is_some());
    }

    #[test]
    fn estado_filter_matches_case_insensitively() {
        let mut store = store();
        store
            .upsert_batch(&[
                record("001", Some("REALIZADO")),
                record("002", Some("PENDIENTE")),
            ])
            .expect("seed");
        let filter = RecordFilter {
            estado: Some("realizado".to_string()),
            ..RecordFilter::default()
        };
        let matched = store.query_records(&filter).expect("query");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].record_id, "001");
    }

    #[test]
    fn date_range_and_substring_filters_combine() {
        let mut store = store();
        let mut a = record("001", Some("REALIZADO"));
        a.fecha_estado = Some("2025-09-01".to_string());
        a.nombre_completo = Some("Maria Lopez".to_string());
        a.hostname = Some("BANCAOP01".to_string());
        let mut b = record("002", Some("REALIZADO"));
        b.fecha_estado = Some("2025-10-15".to_string());
        b.nombre_completo = Some("Jose Torres".to_string());
        b.hostname = Some("BANCAOP02".to_string());
        store.upsert_batch(&[a, b]).expect("seed");

        let filter = RecordFilter {
            fecha_inicio: Some("2025-09-01".to_string()),
            fecha_fin: Some("2025-09-30".to_string()),
            nombre: Some("maria".to_string()),
            hostname: Some("BANCA".to_string()),
            ..RecordFilter::default()
        };
        let matched = store.query_records(&filter).expect("query");
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].record_id, "001");
    }

    #[test]
    fn distinct_values_skips_blanks_and_sorts() {
        let mut store = store();
        let mut a = record("001", None);
        a.ubicacion = Some("SEDE B".to_string());
        let mut b = record("002", None);
        b.ubicacion = Some("SEDE A".to_string());
        let mut c = record("003", None);
        c.ubicacion = Some(String::new());
        let d = record("004", None);
        store.upsert_batch(&[a, b, c, d]).expect("seed");

        let values = store.distinct_values(Field::Ubicacion).expect("distinct");
        assert_eq!(values, vec!["SEDE A".to_string(), "SEDE B".to_string()]);
    }

    #[test]
    fn insert_user_reports_duplicates() {
        let store = store();
        assert!(store.insert_user("admin", "hash", "admin").expect("insert"));
        assert!(!store.insert_user("admin", "hash", "admin").expect("dup"));
        assert!(store.has_admin().expect("query admins"));
        let row = store.find_user("admin").expect("find").expect("present");
        assert_eq!(row.role, "admin");
        assert!(store.user_by_id(row.id).expect("by id").is_some());
    }
}
