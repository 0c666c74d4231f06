use crate::entities::daily_key_entity as daily_keys;
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::DailyKeyResponse;
use crate::services::audit_service::record_audit;
use crate::utils::{generate_daily_key, is_daily_key_format, normalize_daily_key};
use chrono::{Local, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde_json::json;

/// 服务器本地日期，授权码按自然日生效
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// 授权码有效 ⇔ 存在当天签发且代码一致（不区分大小写）的记录
pub async fn is_valid_daily_key<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<bool> {
    let code = normalize_daily_key(code);
    if !is_daily_key_format(&code) {
        return Ok(false);
    }
    let hits = daily_keys::Entity::find()
        .filter(daily_keys::Column::Code.eq(code))
        .filter(daily_keys::Column::ValidOn.eq(today()))
        .count(conn)
        .await?;
    Ok(hits > 0)
}

#[derive(Clone)]
pub struct DailyKeyService {
    pool: DbPool,
}

impl DailyKeyService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// 签发当天授权码，覆盖当天已签发的旧码
    pub async fn issue(&self, user_id: i64) -> AppResult<DailyKeyResponse> {
        let valid_on = today();
        let txn = self.pool.begin().await?;

        daily_keys::Entity::delete_many()
            .filter(daily_keys::Column::ValidOn.eq(valid_on))
            .exec(&txn)
            .await?;

        let key = daily_keys::ActiveModel {
            code: Set(generate_daily_key()),
            valid_on: Set(valid_on),
            issued_by: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // 审计中不记录授权码本身
        record_audit(
            &txn,
            Some(user_id),
            "daily_key.issue",
            "daily_key",
            Some(key.id),
            json!({ "valid_on": valid_on.to_string() }),
        )
        .await?;
        txn.commit().await?;

        log::info!("Daily key for {valid_on} issued by user {user_id}");
        Ok(DailyKeyResponse::from(key))
    }

    pub async fn current(&self) -> AppResult<DailyKeyResponse> {
        daily_keys::Entity::find()
            .filter(daily_keys::Column::ValidOn.eq(today()))
            .order_by_desc(daily_keys::Column::CreatedAt)
            .one(self.pool.as_ref())
            .await?
            .map(DailyKeyResponse::from)
            .ok_or_else(|| AppError::NotFound("No daily key issued for today".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_malformed_key_is_rejected_without_query() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        assert!(!is_valid_daily_key(&db, "abc").await.unwrap());
        assert!(!is_valid_daily_key(&db, "AB-123").await.unwrap());
        assert!(db.into_transaction_log().is_empty());
    }

    #[tokio::test]
    async fn test_current_without_key_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<daily_keys::Model>::new()])
            .into_connection();
        let svc = DailyKeyService::new(DbPool::new(db));
        assert!(matches!(svc.current().await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_current_returns_todays_key() {
        let key = daily_keys::Model {
            id: 1,
            code: "7KQ2ZD".to_string(),
            valid_on: today(),
            issued_by: 2,
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![key]])
            .into_connection();
        let svc = DailyKeyService::new(DbPool::new(db));
        let resp = svc.current().await.unwrap();
        assert_eq!(resp.code, "7KQ2ZD");
        assert_eq!(resp.valid_on, today());
    }
}
