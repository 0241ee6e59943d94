//! Canonical field vocabulary and the header-to-field mapping applied to
//! every uploaded CSV row.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::model::Record;
use crate::normalize::{normalize_date, normalize_header};

/// The 19 fixed record attributes recognized by the store, in the column
/// order of the `project_records` table and the downloadable template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RecordId,
    Ubicacion,
    NomSede,
    CategoriaTrab,
    NombreCompleto,
    PerfilImagen,
    Marca,
    Modelo,
    SerialNum,
    Hostname,
    IpEquipo,
    EmailTrabajo,
    FechaEstado,
    Estado,
    EstadoCoordinacion,
    EstadoUpgrade,
    FechaProgramada,
    FechaEjecucion,
    Notas,
}

impl Field {
    pub const ALL: [Field; 19] = [
        Field::RecordId,
        Field::Ubicacion,
        Field::NomSede,
        Field::CategoriaTrab,
        Field::NombreCompleto,
        Field::PerfilImagen,
        Field::Marca,
        Field::Modelo,
        Field::SerialNum,
        Field::Hostname,
        Field::IpEquipo,
        Field::EmailTrabajo,
        Field::FechaEstado,
        Field::Estado,
        Field::EstadoCoordinacion,
        Field::EstadoUpgrade,
        Field::FechaProgramada,
        Field::FechaEjecucion,
        Field::Notas,
    ];

    /// Status-classification fields, upper-cased after mapping.
    pub const STATUS: [Field; 3] = [Field::Estado, Field::EstadoCoordinacion, Field::EstadoUpgrade];

    /// Date-like fields, passed through the date normalizer after mapping.
    pub const DATES: [Field; 3] = [
        Field::FechaEstado,
        Field::FechaProgramada,
        Field::FechaEjecucion,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Field::RecordId => "record_id",
            Field::Ubicacion => "ubicacion",
            Field::NomSede => "nom_sede",
            Field::CategoriaTrab => "categoria_trab",
            Field::NombreCompleto => "nombre_completo",
            Field::PerfilImagen => "perfil_imagen",
            Field::Marca => "marca",
            Field::Modelo => "modelo",
            Field::SerialNum => "serial_num",
            Field::Hostname => "hostname",
            Field::IpEquipo => "ip_equipo",
            Field::EmailTrabajo => "email_trabajo",
            Field::FechaEstado => "fecha_estado",
            Field::Estado => "estado",
            Field::EstadoCoordinacion => "estado_coordinacion",
            Field::EstadoUpgrade => "estado_upgrade",
            Field::FechaProgramada => "fecha_programada",
            Field::FechaEjecucion => "fecha_ejecucion",
            Field::Notas => "notas",
        }
    }
}

/// Accepted header synonyms. Every canonical name maps to itself; the
/// remaining entries cover the spellings seen in the field so far,
/// including `estado_coordinacin`, the diacritic-stripped artifact of
/// `estado_coordinación` produced by older export tooling.
fn synonym_table() -> &'static HashMap<&'static str, Field> {
    static TABLE: OnceLock<HashMap<&'static str, Field>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for field in Field::ALL {
            table.insert(field.as_str(), field);
        }
        table.insert("id", Field::RecordId);
        table.insert("categoria", Field::CategoriaTrab);
        table.insert("nombre", Field::NombreCompleto);
        table.insert("perfil", Field::PerfilImagen);
        table.insert("serialnumber", Field::SerialNum);
        table.insert("correo", Field::EmailTrabajo);
        table.insert("estado_coordinacin", Field::EstadoCoordinacion);
        table.insert("fecha_programacion", Field::FechaProgramada);
        table.insert("fecha_upgrade", Field::FechaEjecucion);
        table
    })
}

/// Resolves a raw header to its canonical field, case- and
/// diacritic-insensitively. Unrecognized headers resolve to `None` and
/// are dropped by the mapper.
pub fn canonical_field(header: &str) -> Option<Field> {
    synonym_table()
        .get(normalize_header(header).as_str())
        .copied()
}

impl Record {
    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::RecordId => Some(self.record_id.as_str()),
            Field::Ubicacion => self.ubicacion.as_deref(),
            Field::NomSede => self.nom_sede.as_deref(),
            Field::CategoriaTrab => self.categoria_trab.as_deref(),
            Field::NombreCompleto => self.nombre_completo.as_deref(),
            Field::PerfilImagen => self.perfil_imagen.as_deref(),
            Field::Marca => self.marca.as_deref(),
            Field::Modelo => self.modelo.as_deref(),
            Field::SerialNum => self.serial_num.as_deref(),
            Field::Hostname => self.hostname.as_deref(),
            Field::IpEquipo => self.ip_equipo.as_deref(),
            Field::EmailTrabajo => self.email_trabajo.as_deref(),
            Field::FechaEstado => self.fecha_estado.as_deref(),
            Field::Estado => self.estado.as_deref(),
            Field::EstadoCoordinacion => self.estado_coordinacion.as_deref(),
            Field::EstadoUpgrade => self.estado_upgrade.as_deref(),
            Field::FechaProgramada => self.fecha_programada.as_deref(),
            Field::FechaEjecucion => self.fecha_ejecucion.as_deref(),
            Field::Notas => self.notas.as_deref(),
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::RecordId => self.record_id = value,
            Field::Ubicacion => self.ubicacion = Some(value),
            Field::NomSede => self.nom_sede = Some(value),
            Field::CategoriaTrab => self.categoria_trab = Some(value),
            Field::NombreCompleto => self.nombre_completo = Some(value),
            Field::PerfilImagen => self.perfil_imagen = Some(value),
            Field::Marca => self.marca = Some(value),
            Field::Modelo => self.modelo = Some(value),
            Field::SerialNum => self.serial_num = Some(value),
            Field::Hostname => self.hostname = Some(value),
            Field::IpEquipo => self.ip_equipo = Some(value),
            Field::EmailTrabajo => self.email_trabajo = Some(value),
            Field::FechaEstado => self.fecha_estado = Some(value),
            Field::Estado => self.estado = Some(value),
            Field::EstadoCoordinacion => self.estado_coordinacion = Some(value),
            Field::EstadoUpgrade => self.estado_upgrade = Some(value),
            Field::FechaProgramada => self.fecha_programada = Some(value),
            Field::FechaEjecucion => self.fecha_ejecucion = Some(value),
            Field::Notas => self.notas = Some(value),
        }
    }
}

/// Maps one decoded CSV row onto a `Record`. Headers with no synonym
/// entry are dropped, values are trimmed, status fields are upper-cased
/// and date fields normalized after mapping. Rows lacking a non-empty
/// `record_id` are discarded (`None`).
pub fn map_row(headers: &[String], values: &[String]) -> Option<Record> {
    let mut record = Record::default();
    for (header, value) in headers.iter().zip(values.iter()) {
        let Some(field) = canonical_field(header) else {
            continue;
        };
        record.set(field, value.trim().to_string());
    }
    if record.record_id.trim().is_empty() {
        return None;
    }
    for field in Field::STATUS {
        if let Some(value) = record.get(field) {
            let upper = value.to_uppercase();
            record.set(field, upper);
        }
    }
    for field in Field::DATES {
        if let Some(value) = record.get(field) {
            let normalized = normalize_date(value);
            record.set(field, normalized);
        }
    }
    Some(record)
}
