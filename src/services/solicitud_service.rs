use crate::entities::{SolicitudStatus, client_entity as clients, solicitud_entity as solicitudes};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::services::service_order_service::create_order_in;
use crate::utils::{optional_text, require_text};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;

/// 请求单只能 pending → authorized | rejected，authorized → converted（一次）
pub fn check_solicitud_transition(from: SolicitudStatus, to: SolicitudStatus) -> AppResult<()> {
    use SolicitudStatus::*;
    match (from, to) {
        (Pending, Authorized) | (Pending, Rejected) | (Authorized, Converted) => Ok(()),
        (Converted, Converted) => Err(AppError::Conflict(
            "Solicitud has already been converted".to_string(),
        )),
        _ => Err(AppError::Conflict(format!(
            "Cannot change solicitud status from {from} to {to}"
        ))),
    }
}

#[derive(Clone)]
pub struct SolicitudService {
    pool: DbPool,
}

impl SolicitudService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: i64, req: CreateSolicitudRequest) -> AppResult<SolicitudResponse> {
        let description = require_text("description", &req.description, 5, 2000)?;

        let txn = self.pool.begin().await?;
        let client = clients::Entity::find_by_id(req.client_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
        if !client.is_active {
            return Err(AppError::ValidationError("Client is inactive".to_string()));
        }

        let now = Utc::now();
        let sol = solicitudes::ActiveModel {
            client_id: Set(client.id),
            description: Set(description),
            status: Set(SolicitudStatus::Pending),
            requested_by: Set(user_id),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_audit(
            &txn,
            Some(user_id),
            "solicitud.create",
            "solicitud",
            Some(sol.id),
            json!({ "client_id": client.id }),
        )
        .await?;
        txn.commit().await?;

        log::info!("Solicitud {} created by user {user_id}", solicitud_folio(sol.id));
        Ok(SolicitudResponse::from(sol))
    }

    pub async fn authorize(
        &self,
        user_id: i64,
        id: i64,
        req: ReviewSolicitudRequest,
    ) -> AppResult<SolicitudResponse> {
        let note = optional_text("note", req.note.as_deref(), 1000)?;
        self.review(user_id, id, SolicitudStatus::Authorized, note).await
    }

    pub async fn reject(
        &self,
        user_id: i64,
        id: i64,
        req: ReviewSolicitudRequest,
    ) -> AppResult<SolicitudResponse> {
        let note = optional_text("note", req.note.as_deref(), 1000)?
            .ok_or_else(|| AppError::ValidationError("A note is required to reject".to_string()))?;
        self.review(user_id, id, SolicitudStatus::Rejected, Some(note)).await
    }

    async fn review(
        &self,
        user_id: i64,
        id: i64,
        to: SolicitudStatus,
        note: Option<String>,
    ) -> AppResult<SolicitudResponse> {
        let txn = self.pool.begin().await?;
        let sol = solicitudes::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Solicitud not found".to_string()))?;
        let from = sol.status;
        check_solicitud_transition(from, to)?;

        let now = Utc::now();
        let mut am = sol.into_active_model();
        am.status = Set(to);
        am.reviewed_by = Set(Some(user_id));
        am.review_note = Set(note);
        am.reviewed_at = Set(Some(now));
        am.updated_at = Set(Some(now));
        let sol = am.update(&txn).await?;

        let action = if to == SolicitudStatus::Authorized {
            "solicitud.authorize"
        } else {
            "solicitud.reject"
        };
        record_audit(&txn, Some(user_id), action, "solicitud", Some(id), json!({ "from": from, "to": to }))
            .await?;
        txn.commit().await?;

        log::info!("Solicitud {} {to} by user {user_id}", solicitud_folio(id));
        Ok(SolicitudResponse::from(sol))
    }

    /// 转为服务订单：生成 pending 订单，请求单标记为 converted
    pub async fn convert(&self, user_id: i64, id: i64) -> AppResult<ServiceOrderResponse> {
        let txn = self.pool.begin().await?;
        let sol = solicitudes::Entity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Solicitud not found".to_string()))?;
        check_solicitud_transition(sol.status, SolicitudStatus::Converted)?;

        let notes = Some(format!("{}: {}", solicitud_folio(sol.id), sol.description));
        let client_id = sol.client_id;
        let (order, lines) = create_order_in(&txn, user_id, client_id, Some(sol.id), notes, &[]).await?;

        let mut am = sol.into_active_model();
        am.status = Set(SolicitudStatus::Converted);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "solicitud.convert",
            "solicitud",
            Some(id),
            json!({ "order_id": order.id }),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Solicitud {} converted into {} by user {user_id}",
            solicitud_folio(id),
            order_folio(order.id)
        );
        Ok(ServiceOrderResponse::with_items(order, lines))
    }

    pub async fn get(&self, id: i64) -> AppResult<SolicitudResponse> {
        solicitudes::Entity::find_by_id(id)
            .one(self.pool.as_ref())
            .await?
            .map(SolicitudResponse::from)
            .ok_or_else(|| AppError::NotFound("Solicitud not found".to_string()))
    }

    pub async fn list(&self, query: &SolicitudQuery) -> AppResult<PaginatedResponse<SolicitudResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = solicitudes::Entity::find();
        if let Some(status) = query.status {
            base = base.filter(solicitudes::Column::Status.eq(status));
        }
        if let Some(client_id) = query.client_id {
            base = base.filter(solicitudes::Column::ClientId.eq(client_id));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(solicitudes::Column::CreatedAt)
            .order_by_desc(solicitudes::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(SolicitudResponse::from).collect(),
            &params,
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use SolicitudStatus::*;

    fn solicitud(status: SolicitudStatus) -> solicitudes::Model {
        solicitudes::Model {
            id: 3,
            client_id: 1,
            description: "Cambio de pantalla".to_string(),
            status,
            requested_by: 2,
            reviewed_by: None,
            review_note: None,
            reviewed_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_transition_table() {
        assert!(check_solicitud_transition(Pending, Authorized).is_ok());
        assert!(check_solicitud_transition(Pending, Rejected).is_ok());
        assert!(check_solicitud_transition(Authorized, Converted).is_ok());

        assert!(check_solicitud_transition(Pending, Converted).is_err());
        assert!(check_solicitud_transition(Rejected, Authorized).is_err());
        assert!(check_solicitud_transition(Authorized, Rejected).is_err());
        assert!(matches!(
            check_solicitud_transition(Converted, Converted),
            Err(AppError::Conflict(msg)) if msg.contains("already been converted")
        ));
    }

    #[tokio::test]
    async fn test_reject_requires_note() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = SolicitudService::new(DbPool::new(db));
        let err = svc
            .reject(1, 3, ReviewSolicitudRequest { note: Some("   ".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_convert_twice_is_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![solicitud(Converted)]])
            .into_connection();
        let svc = SolicitudService::new(DbPool::new(db));
        let err = svc.convert(1, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_authorize_pending_solicitud() {
        let mut reviewed = solicitud(Authorized);
        reviewed.reviewed_by = Some(9);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![solicitud(Pending)]])
            .append_query_results([vec![reviewed]])
            .append_exec_results([sea_orm::MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();
        let svc = SolicitudService::new(DbPool::new(db));
        let resp = svc
            .authorize(9, 3, ReviewSolicitudRequest { note: None })
            .await
            .unwrap();
        assert_eq!(resp.status, Authorized);
        assert_eq!(resp.reviewed_by, Some(9));
        assert_eq!(resp.folio, "SOL-000003");
    }
}
