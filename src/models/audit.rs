use crate::entities::audit_log_entity as audit_logs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub user_id: Option<i64>,
    pub entity: Option<String>,
    pub entity_id: Option<i64>,
    /// YYYY-MM-DD
    pub from: Option<String>,
    /// YYYY-MM-DD
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub detail: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_logs::Model> for AuditLogResponse {
    fn from(a: audit_logs::Model) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            action: a.action,
            entity: a.entity,
            entity_id: a.entity_id,
            detail: a.detail,
            created_at: a.created_at,
        }
    }
}
