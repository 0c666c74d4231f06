use crate::entities::{
    ServiceOrderStatus, client_entity as clients, item_entity as items,
    service_order_entity as orders, service_order_item_entity as order_items,
};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::utils::{optional_text, require_non_negative_amount};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde_json::json;

/// 订单状态流转表。`delivered` 只能由交付流程写入。
pub fn can_transition(from: ServiceOrderStatus, to: ServiceOrderStatus) -> bool {
    use ServiceOrderStatus::*;
    matches!(
        (from, to),
        (Pending, InProgress) | (Pending, Cancelled) | (InProgress, Completed) | (InProgress, Cancelled)
    )
}

pub fn is_editable(status: ServiceOrderStatus) -> bool {
    matches!(status, ServiceOrderStatus::Pending | ServiceOrderStatus::InProgress)
}

pub fn line_total(quantity: i32, unit_price: i64) -> AppResult<i64> {
    if quantity <= 0 {
        return Err(AppError::ValidationError("quantity must be greater than zero".to_string()));
    }
    require_non_negative_amount("unit_price", unit_price)?;
    unit_price
        .checked_mul(i64::from(quantity))
        .ok_or_else(|| AppError::ValidationError("Line total is too large".to_string()))
}

/// 校验并插入一条订单行；未指定单价时取目录单价
async fn insert_line<C: ConnectionTrait>(
    conn: &C,
    order_id: i64,
    line: &OrderLineRequest,
) -> AppResult<order_items::Model> {
    let item = items::Entity::find_by_id(line.item_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item {} not found", line.item_id)))?;
    if !item.is_active {
        return Err(AppError::ValidationError(format!("Item '{}' is inactive", item.sku)));
    }
    let unit_price = line.unit_price.unwrap_or(item.unit_price);
    let total = line_total(line.quantity, unit_price)?;

    Ok(order_items::ActiveModel {
        order_id: Set(order_id),
        item_id: Set(item.id),
        description: Set(item.name),
        quantity: Set(line.quantity),
        unit_price: Set(unit_price),
        line_total: Set(total),
        ..Default::default()
    }
    .insert(conn)
    .await?)
}

/// 在给定连接（通常是事务）内创建订单及其明细。转单流程复用此函数。
pub async fn create_order_in<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    client_id: i64,
    solicitud_id: Option<i64>,
    notes: Option<String>,
    lines: &[OrderLineRequest],
) -> AppResult<(orders::Model, Vec<order_items::Model>)> {
    let client = clients::Entity::find_by_id(client_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;
    if !client.is_active {
        return Err(AppError::ValidationError("Client is inactive".to_string()));
    }

    let now = Utc::now();
    let order = orders::ActiveModel {
        solicitud_id: Set(solicitud_id),
        client_id: Set(client.id),
        status: Set(ServiceOrderStatus::Pending),
        total: Set(0),
        paid_total: Set(0),
        notes: Set(notes),
        created_by: Set(user_id),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let mut saved = Vec::with_capacity(lines.len());
    let mut total = 0i64;
    for line in lines {
        let row = insert_line(conn, order.id, line).await?;
        total = total
            .checked_add(row.line_total)
            .ok_or_else(|| AppError::ValidationError("Order total is too large".to_string()))?;
        saved.push(row);
    }

    let order = if total > 0 {
        let mut am = order.into_active_model();
        am.total = Set(total);
        am.update(conn).await?
    } else {
        order
    };

    record_audit(
        conn,
        Some(user_id),
        "service_order.create",
        "service_order",
        Some(order.id),
        json!({ "client_id": client_id, "solicitud_id": solicitud_id, "total": order.total }),
    )
    .await?;

    log::info!("Service order {} created by user {user_id}", order_folio(order.id));
    Ok((order, saved))
}

async fn lock_order<C: ConnectionTrait>(conn: &C, order_id: i64) -> AppResult<orders::Model> {
    orders::Entity::find_by_id(order_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))
}

async fn recompute_total<C: ConnectionTrait>(conn: &C, order: orders::Model) -> AppResult<orders::Model> {
    let lines = order_items::Entity::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .all(conn)
        .await?;
    let total = lines
        .iter()
        .try_fold(0i64, |acc, l| acc.checked_add(l.line_total))
        .ok_or_else(|| AppError::ValidationError("Order total is too large".to_string()))?;
    if total < order.paid_total {
        return Err(AppError::Conflict(
            "Order total cannot drop below the amount already paid".to_string(),
        ));
    }
    let mut am = order.into_active_model();
    am.total = Set(total);
    am.updated_at = Set(Some(Utc::now()));
    Ok(am.update(conn).await?)
}

#[derive(Clone)]
pub struct ServiceOrderService {
    pool: DbPool,
}

impl ServiceOrderService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        user_id: i64,
        req: CreateServiceOrderRequest,
    ) -> AppResult<ServiceOrderResponse> {
        let notes = optional_text("notes", req.notes.as_deref(), 2000)?;
        let txn = self.pool.begin().await?;
        let (order, lines) =
            create_order_in(&txn, user_id, req.client_id, None, notes, &req.items).await?;
        txn.commit().await?;
        Ok(ServiceOrderResponse::with_items(order, lines))
    }

    pub async fn add_line(
        &self,
        user_id: i64,
        order_id: i64,
        req: OrderLineRequest,
    ) -> AppResult<ServiceOrderResponse> {
        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, order_id).await?;
        if !is_editable(order.status) {
            return Err(AppError::Conflict(format!(
                "Cannot modify lines of a {} order",
                order.status
            )));
        }

        let line = insert_line(&txn, order.id, &req).await?;
        recompute_total(&txn, order).await?;

        record_audit(
            &txn,
            Some(user_id),
            "service_order.add_line",
            "service_order",
            Some(order_id),
            json!({ "line_id": line.id, "item_id": line.item_id, "line_total": line.line_total }),
        )
        .await?;
        txn.commit().await?;

        self.get(order_id).await
    }

    pub async fn remove_line(
        &self,
        user_id: i64,
        order_id: i64,
        line_id: i64,
    ) -> AppResult<ServiceOrderResponse> {
        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, order_id).await?;
        if !is_editable(order.status) {
            return Err(AppError::Conflict(format!(
                "Cannot modify lines of a {} order",
                order.status
            )));
        }

        let line = order_items::Entity::find_by_id(line_id)
            .filter(order_items::Column::OrderId.eq(order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Order line not found".to_string()))?;
        let removed_total = line.line_total;
        line.delete(&txn).await?;
        recompute_total(&txn, order).await?;

        record_audit(
            &txn,
            Some(user_id),
            "service_order.remove_line",
            "service_order",
            Some(order_id),
            json!({ "line_id": line_id, "line_total": removed_total }),
        )
        .await?;
        txn.commit().await?;

        self.get(order_id).await
    }

    pub async fn update_status(
        &self,
        user_id: i64,
        order_id: i64,
        req: UpdateOrderStatusRequest,
    ) -> AppResult<ServiceOrderResponse> {
        let txn = self.pool.begin().await?;
        let order = lock_order(&txn, order_id).await?;
        let from = order.status;
        let to = req.status;

        if !can_transition(from, to) {
            return Err(AppError::Conflict(format!(
                "Cannot change order status from {from} to {to}"
            )));
        }
        if to == ServiceOrderStatus::Cancelled && order.paid_total > 0 {
            return Err(AppError::Conflict(
                "Cannot cancel an order that has payments".to_string(),
            ));
        }
        if to == ServiceOrderStatus::Completed {
            let lines = order_items::Entity::find()
                .filter(order_items::Column::OrderId.eq(order_id))
                .count(&txn)
                .await?;
            if lines == 0 {
                return Err(AppError::ValidationError(
                    "Cannot complete an order without lines".to_string(),
                ));
            }
        }

        let mut am = order.into_active_model();
        am.status = Set(to);
        am.updated_at = Set(Some(Utc::now()));
        let order = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "service_order.status",
            "service_order",
            Some(order_id),
            json!({ "from": from, "to": to }),
        )
        .await?;
        txn.commit().await?;

        log::info!("Service order {} moved {from} -> {to} by user {user_id}", order_folio(order_id));
        Ok(ServiceOrderResponse::from(order))
    }

    pub async fn get(&self, order_id: i64) -> AppResult<ServiceOrderResponse> {
        let order = orders::Entity::find_by_id(order_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Service order not found".to_string()))?;
        let lines = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order_id))
            .order_by_asc(order_items::Column::Id)
            .all(self.pool.as_ref())
            .await?;
        Ok(ServiceOrderResponse::with_items(order, lines))
    }

    pub async fn list(
        &self,
        query: &ServiceOrderQuery,
    ) -> AppResult<PaginatedResponse<ServiceOrderResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = orders::Entity::find();
        if let Some(status) = query.status {
            base = base.filter(orders::Column::Status.eq(status));
        }
        if let Some(client_id) = query.client_id {
            base = base.filter(orders::Column::ClientId.eq(client_id));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(orders::Column::CreatedAt)
            .order_by_desc(orders::Column::Id)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(ServiceOrderResponse::from).collect(),
            &params,
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MAX_AMOUNT_CENTS;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use ServiceOrderStatus::*;

    fn order(status: ServiceOrderStatus, paid_total: i64) -> orders::Model {
        orders::Model {
            id: 5,
            solicitud_id: None,
            client_id: 1,
            status,
            total: 10_000,
            paid_total,
            notes: None,
            created_by: 1,
            created_at: None,
            updated_at: None,
        }
    }

    fn line(id: i64, line_total: i64) -> order_items::Model {
        order_items::Model {
            id,
            order_id: 5,
            item_id: 3,
            description: "Mano de obra".to_string(),
            quantity: 1,
            unit_price: line_total,
            line_total,
        }
    }

    #[test]
    fn test_transition_table() {
        assert!(can_transition(Pending, InProgress));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(InProgress, Completed));
        assert!(can_transition(InProgress, Cancelled));

        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Completed, Delivered));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Cancelled, Pending));
        assert!(!can_transition(Delivered, InProgress));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(3, 1_250).unwrap(), 3_750);
        assert!(line_total(0, 100).is_err());
        assert!(line_total(1, -1).is_err());
        assert!(line_total(i32::MAX, i64::MAX).is_err());
        assert!(line_total(1, MAX_AMOUNT_CENTS + 1).is_err());
    }

    #[tokio::test]
    async fn test_cancel_with_payments_is_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(InProgress, 2_000)]])
            .into_connection();
        let svc = ServiceOrderService::new(DbPool::new(db));
        let err = svc
            .update_status(1, 5, UpdateOrderStatusRequest { status: Cancelled })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("has payments")));
    }

    #[tokio::test]
    async fn test_invalid_transition_is_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(Pending, 0)]])
            .into_connection();
        let svc = ServiceOrderService::new(DbPool::new(db));
        let err = svc
            .update_status(1, 5, UpdateOrderStatusRequest { status: Delivered })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_lines_are_frozen_after_completion() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(Completed, 0)]])
            .into_connection();
        let svc = ServiceOrderService::new(DbPool::new(db));
        let err = svc.remove_line(1, 5, 9).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("completed")));
    }

    #[tokio::test]
    async fn test_order_total_overflow_is_rejected() {
        let item = items::Model {
            id: 3,
            category_id: 1,
            sku: "MO-01".to_string(),
            name: "Mano de obra".to_string(),
            description: None,
            unit_price: 1,
            is_active: true,
            created_at: None,
            updated_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![order(InProgress, 0)]])
            .append_query_results([vec![item]])
            .append_query_results([vec![line(2, 1)]])
            .append_query_results([vec![line(1, i64::MAX), line(2, 1)]])
            .into_connection();
        let svc = ServiceOrderService::new(DbPool::new(db));
        let err = svc
            .add_line(
                1,
                5,
                OrderLineRequest {
                    item_id: 3,
                    quantity: 1,
                    unit_price: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("too large")));
    }
}
