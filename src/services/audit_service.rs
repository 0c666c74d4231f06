use crate::entities::audit_log_entity as audit_logs;
use crate::database::DbPool;
use crate::error::AppResult;
use crate::models::*;
use chrono::{Duration, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde_json::Value;

/// 写入一条审计记录。传入事务连接即可与业务写入一同提交。
pub async fn record_audit<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<i64>,
    action: &str,
    entity: &str,
    entity_id: Option<i64>,
    detail: Value,
) -> AppResult<()> {
    let am = audit_logs::ActiveModel {
        user_id: Set(user_id),
        action: Set(action.to_string()),
        entity: Set(entity.to_string()),
        entity_id: Set(entity_id),
        detail: Set(Some(detail)),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    audit_logs::Entity::insert(am)
        .exec_without_returning(conn)
        .await?;
    log::debug!("audit {action} {entity}#{entity_id:?} by {user_id:?}");
    Ok(())
}

#[derive(Clone)]
pub struct AuditService {
    pool: DbPool,
}

impl AuditService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, query: &AuditLogQuery) -> AppResult<PaginatedResponse<AuditLogResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let from = parse_date_filter("from", query.from.as_deref())?;
        let to = parse_date_filter("to", query.to.as_deref())?;

        let mut base = audit_logs::Entity::find();
        if let Some(user_id) = query.user_id {
            base = base.filter(audit_logs::Column::UserId.eq(user_id));
        }
        if let Some(entity) = query.entity.as_deref().filter(|e| !e.is_empty()) {
            base = base.filter(audit_logs::Column::Entity.eq(entity));
        }
        if let Some(entity_id) = query.entity_id {
            base = base.filter(audit_logs::Column::EntityId.eq(entity_id));
        }
        if let Some(from) = from {
            base = base.filter(audit_logs::Column::CreatedAt.gte(from.and_time(chrono::NaiveTime::MIN).and_utc()));
        }
        if let Some(to) = to {
            // 含当天
            let end = (to + Duration::days(1)).and_time(chrono::NaiveTime::MIN).and_utc();
            base = base.filter(audit_logs::Column::CreatedAt.lt(end));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(audit_logs::Column::CreatedAt)
            .order_by_desc(audit_logs::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(AuditLogResponse::from).collect(),
            &params,
            total,
        ))
    }
}
