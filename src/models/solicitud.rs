use crate::entities::{SolicitudStatus, solicitud_entity as solicitudes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn solicitud_folio(id: i64) -> String {
    format!("SOL-{id:06}")
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSolicitudRequest {
    pub client_id: i64,
    #[schema(example = "Revisión de compresor, hace ruido al arrancar")]
    pub description: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewSolicitudRequest {
    /// 驳回时必填
    pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SolicitudQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<SolicitudStatus>,
    pub client_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SolicitudResponse {
    pub id: i64,
    pub folio: String,
    pub client_id: i64,
    pub description: String,
    pub status: SolicitudStatus,
    pub requested_by: i64,
    pub reviewed_by: Option<i64>,
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<solicitudes::Model> for SolicitudResponse {
    fn from(s: solicitudes::Model) -> Self {
        Self {
            id: s.id,
            folio: solicitud_folio(s.id),
            client_id: s.client_id,
            description: s.description,
            status: s.status,
            requested_by: s.requested_by,
            reviewed_by: s.reviewed_by,
            review_note: s.review_note,
            reviewed_at: s.reviewed_at,
            created_at: s.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solicitud_folio_is_zero_padded() {
        assert_eq!(solicitud_folio(7), "SOL-000007");
        assert_eq!(solicitud_folio(1234567), "SOL-1234567");
    }
}
