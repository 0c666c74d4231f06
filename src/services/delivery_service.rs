use crate::entities::{ServiceOrderStatus, delivery_entity as deliveries, service_order_entity as orders};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::utils::{optional_text, require_text};
use chrono::{Duration, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;

/// 只有已完成且已结清的订单可以交付
pub fn ensure_deliverable(order: &orders::Model) -> AppResult<()> {
    match order.status {
        ServiceOrderStatus::Completed => {}
        ServiceOrderStatus::Delivered => {
            return Err(AppError::Conflict("Order has already been delivered".to_string()));
        }
        other => {
            return Err(AppError::Conflict(format!(
                "Only completed orders can be delivered (current status: {other})"
            )));
        }
    }
    if order.paid_total < order.total {
        return Err(AppError::Conflict(format!(
            "Order has a pending balance of {}",
            order.total - order.paid_total
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct DeliveryService {
    pool: DbPool,
}

impl DeliveryService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn deliver(
        &self,
        user_id: i64,
        order_id: i64,
        req: CreateDeliveryRequest,
    ) -> AppResult<DeliveryResponse> {
        let received_by = require_text("received_by", &req.received_by, 2, 255)?;
        let notes = optional_text("notes", req.notes.as_deref(), 1000)?;

        let txn = self.pool.begin().await?;
        let order = orders::Entity::find_by_id(order_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))?;
        ensure_deliverable(&order)?;

        let delivery = deliveries::ActiveModel {
            order_id: Set(order.id),
            delivered_by: Set(user_id),
            received_by: Set(received_by),
            notes: Set(notes),
            delivered_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut am = order.into_active_model();
        am.status = Set(ServiceOrderStatus::Delivered);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "service_order.deliver",
            "service_order",
            Some(order_id),
            json!({ "delivery_id": delivery.id, "received_by": delivery.received_by }),
        )
        .await?;
        txn.commit().await?;

        log::info!("{} delivered by user {user_id}", order_folio(order_id));
        Ok(DeliveryResponse::from(delivery))
    }

    pub async fn list(&self, query: &DeliveryQuery) -> AppResult<PaginatedResponse<DeliveryResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let from = parse_date_filter("from", query.from.as_deref())?;
        let to = parse_date_filter("to", query.to.as_deref())?;

        let mut base = deliveries::Entity::find();
        if let Some(from) = from {
            base = base.filter(deliveries::Column::DeliveredAt.gte(from.and_time(NaiveTime::MIN).and_utc()));
        }
        if let Some(to) = to {
            let end = (to + Duration::days(1)).and_time(NaiveTime::MIN).and_utc();
            base = base.filter(deliveries::Column::DeliveredAt.lt(end));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(deliveries::Column::DeliveredAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(DeliveryResponse::from).collect(),
            &params,
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(status: ServiceOrderStatus, total: i64, paid_total: i64) -> orders::Model {
        orders::Model {
            id: 2,
            solicitud_id: Some(1),
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
    fn test_completed_and_paid_order_is_deliverable() {
        assert!(ensure_deliverable(&order(ServiceOrderStatus::Completed, 900, 900)).is_ok());
    }

    #[test]
    fn test_pending_balance_blocks_delivery() {
        let err = ensure_deliverable(&order(ServiceOrderStatus::Completed, 900, 500)).unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("400")));
    }

    #[test]
    fn test_only_completed_orders_are_deliverable() {
        assert!(ensure_deliverable(&order(ServiceOrderStatus::InProgress, 0, 0)).is_err());
        assert!(ensure_deliverable(&order(ServiceOrderStatus::Delivered, 0, 0)).is_err());
        assert!(ensure_deliverable(&order(ServiceOrderStatus::Cancelled, 0, 0)).is_err());
    }
}
