//! Record shape and the fixed status vocabulary of the upgrade campaign.

use serde::{Deserialize, Serialize};

/// Raw status vocabulary, as surfaced in the dashboard's status selector.
pub const STATUS_CHOICES: [&str; 9] = [
    "PROGRAMADO",
    "REPROGRAMADO",
    "EN PROCESO",
    "REALIZADO",
    "USER NO ASISTIO",
    "USER SIN RESPUESTA",
    "NO APLICA UPGRADE",
    "INCIDENCIA UPGRADE",
    "PENDIENTE",
];

pub const DONE_STATUS: [&str; 1] = ["REALIZADO"];
pub const IN_PROGRESS_STATUS: [&str; 4] =
    ["EN PROCESO", "PROGRAMADO", "REPROGRAMADO", "INCIDENCIA UPGRADE"];
pub const PENDING_STATUS: [&str; 4] = [
    "PENDIENTE",
    "USER SIN RESPUESTA",
    "USER NO ASISTIO",
    "NO APLICA UPGRADE",
];

/// Sentinel used in status counts for records with a blank status.
pub const NO_STATUS_LABEL: &str = "SIN ESTADO";

pub const BUCKET_DONE: &str = "Completado";
pub const BUCKET_IN_PROGRESS: &str = "En progreso";
pub const BUCKET_PENDING: &str = "Pendiente";
pub const BUCKET_OTHER: &str = "Otro";
pub const BUCKET_NO_STATUS: &str = "Sin estado";

/// Coarse grouping over the raw status vocabulary. Empty input gets its
/// own bucket; a non-empty status outside the three membership sets is
/// "Otro".
pub fn status_bucket(value: &str) -> &'static str {
    let upper = value.trim().to_uppercase();
    if upper.is_empty() {
        return BUCKET_NO_STATUS;
    }
    if DONE_STATUS.contains(&upper.as_str()) {
        BUCKET_DONE
    } else if IN_PROGRESS_STATUS.contains(&upper.as_str()) {
        BUCKET_IN_PROGRESS
    } else if PENDING_STATUS.contains(&upper.as_str()) {
        BUCKET_PENDING
    } else {
        BUCKET_OTHER
    }
}

/// One project/equipment-upgrade tracking entity.
///
/// `record_id` is the externally supplied identity; every other field is
/// an optional string that a CSV upload overwrites wholesale.
/// `last_updated` is assigned by the store on each insert or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub record_id: String,
    pub ubicacion: Option<String>,
    pub nom_sede: Option<String>,
    pub categoria_trab: Option<String>,
    pub nombre_completo: Option<String>,
    pub perfil_imagen: Option<String>,
    pub marca: Option<String>,
    pub modelo: Option<String>,
    pub serial_num: Option<String>,
    pub hostname: Option<String>,
    pub ip_equipo: Option<String>,
    pub email_trabajo: Option<String>,
    pub fecha_estado: Option<String>,
    pub estado: Option<String>,
    pub estado_coordinacion: Option<String>,
    pub estado_upgrade: Option<String>,
    pub fecha_programada: Option<String>,
    pub fecha_ejecucion: Option<String>,
    pub notas: Option<String>,
    pub last_updated: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bucket_covers_every_catalog_entry() {
        for status in STATUS_CHOICES {
            assert_ne!(status_bucket(status), BUCKET_OTHER, "{status} should be classified");
        }
    }

    #[test]
    fn status_bucket_membership() {
        assert_eq!(status_bucket("REALIZADO"), BUCKET_DONE);
        assert_eq!(status_bucket("EN PROCESO"), BUCKET_IN_PROGRESS);
        assert_eq!(status_bucket("PROGRAMADO"), BUCKET_IN_PROGRESS);
        assert_eq!(status_bucket("PENDIENTE"), BUCKET_PENDING);
        assert_eq!(status_bucket("NO APLICA UPGRADE"), BUCKET_PENDING);
    }

    #[test]
    fn status_bucket_is_case_insensitive_and_trims() {
        assert_eq!(status_bucket("  realizado  "), BUCKET_DONE);
        assert_eq!(status_bucket("en proceso"), BUCKET_IN_PROGRESS);
    }

    #[test]
    fn unknown_and_empty_statuses_get_their_own_buckets() {
        assert_eq!(status_bucket("EN REVISION"), BUCKET_OTHER);
        assert_eq!(status_bucket(""), BUCKET_NO_STATUS);
        assert_eq!(status_bucket("   "), BUCKET_NO_STATUS);
    }
}
