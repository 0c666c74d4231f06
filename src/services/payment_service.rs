use crate::entities::{
    PaymentMethod, ServiceOrderStatus, payment_entity as payments, service_order_entity as orders,
};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::services::cash_register_service::add_cash_sale;
use crate::utils::{money_add, money_sub, optional_text};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;

/// 收款前置条件：金额为正且不超过未付余额，订单未取消/未交付
pub fn ensure_payable(order: &orders::Model, amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::ValidationError("amount must be greater than zero".to_string()));
    }
    match order.status {
        ServiceOrderStatus::Cancelled => {
            return Err(AppError::Conflict("Cannot pay a cancelled order".to_string()));
        }
        ServiceOrderStatus::Delivered => {
            return Err(AppError::Conflict("Order has already been delivered".to_string()));
        }
        _ => {}
    }
    let balance = money_sub(order.total, order.paid_total)?;
    if amount > balance {
        return Err(AppError::ValidationError(format!(
            "Payment of {amount} exceeds the balance due of {balance}"
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct PaymentService {
    pool: DbPool,
}

impl PaymentService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        user_id: i64,
        order_id: i64,
        req: CreatePaymentRequest,
    ) -> AppResult<PaymentResponse> {
        let reference = optional_text("reference", req.reference.as_deref(), 128)?;

        let txn = self.pool.begin().await?;
        let order = orders::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))?;
        ensure_payable(&order, req.amount)?;

        // 现金收款必须落在收款人当前班次
        let session_id = if req.method == PaymentMethod::Cash {
            Some(add_cash_sale(&txn, user_id, req.amount).await?)
        } else {
            None
        };

        let payment = payments::ActiveModel {
            order_id: Set(order.id),
            session_id: Set(session_id),
            amount: Set(req.amount),
            method: Set(req.method),
            reference: Set(reference),
            received_by: Set(user_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let paid_total = money_add(order.paid_total, req.amount)?;
        let mut am = order.into_active_model();
        am.paid_total = Set(paid_total);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "payment.create",
            "service_order",
            Some(order_id),
            json!({
                "payment_id": payment.id,
                "amount": payment.amount,
                "method": payment.method,
                "session_id": session_id,
            }),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Payment {} of {} ({}) recorded on {} by user {user_id}",
            payment.id,
            payment.amount,
            payment.method,
            order_folio(order_id)
        );
        Ok(PaymentResponse::from(payment))
    }

    pub async fn list_for_order(&self, order_id: i64) -> AppResult<Vec<PaymentResponse>> {
        let exists = orders::Entity::find_by_id(order_id).one(self.pool.as_ref()).await?;
        if exists.is_none() {
            return Err(AppError::NotFound("Service order not found".to_string()));
        }
        let rows = payments::Entity::find()
            .filter(payments::Column::OrderId.eq(order_id))
            .order_by_asc(payments::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(PaymentResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::cash_session_entity as sessions;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn order(status: ServiceOrderStatus, total: i64, paid_total: i64) -> orders::Model {
        orders::Model {
            id: 8,
            solicitud_id: None,
            client_id: 1,
            status,
            total,
            paid_total,
            notes: None,
            created_by: 1,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_payment_cannot_exceed_balance() {
        let o = order(ServiceOrderStatus::InProgress, 10_000, 4_000);
        assert!(ensure_payable(&o, 6_000).is_ok());
        assert!(matches!(ensure_payable(&o, 6_001), Err(AppError::ValidationError(_))));
        assert!(ensure_payable(&o, 0).is_err());
    }

    #[test]
    fn test_cancelled_or_delivered_orders_cannot_be_paid() {
        let cancelled = order(ServiceOrderStatus::Cancelled, 10_000, 0);
        assert!(matches!(ensure_payable(&cancelled, 100), Err(AppError::Conflict(_))));
        let delivered = order(ServiceOrderStatus::Delivered, 10_000, 10_000);
        assert!(matches!(ensure_payable(&delivered, 1), Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cash_payment_requires_open_session() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(ServiceOrderStatus::Completed, 5_000, 0)]])
            .append_query_results([Vec::<sessions::Model>::new()])
            .into_connection();
        let svc = PaymentService::new(DbPool::new(db));
        let err = svc
            .record(
                4,
                8,
                CreatePaymentRequest {
                    amount: 5_000,
                    method: PaymentMethod::Cash,
                    reference: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("open cash session")));
    }
}
