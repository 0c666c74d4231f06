use crate::entities::{
    ServiceOrderStatus, service_order_entity as orders, service_order_item_entity as order_items,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub fn order_folio(id: i64) -> String {
    format!("OS-{id:06}")
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineRequest {
    pub item_id: i64,
    pub quantity: i32,
    /// 不传则使用目录单价(分)
    pub unit_price: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateServiceOrderRequest {
    pub client_id: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: ServiceOrderStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceOrderQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ServiceOrderStatus>,
    pub client_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub id: i64,
    pub item_id: i64,
    pub description: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

impl From<order_items::Model> for OrderLineResponse {
    fn from(l: order_items::Model) -> Self {
        Self {
            id: l.id,
            item_id: l.item_id,
            description: l.description,
            quantity: l.quantity,
            unit_price: l.unit_price,
            line_total: l.line_total,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceOrderResponse {
    pub id: i64,
    pub folio: String,
    pub solicitud_id: Option<i64>,
    pub client_id: i64,
    pub status: ServiceOrderStatus,
    pub total: i64,
    pub paid_total: i64,
    pub balance_due: i64,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderLineResponse>>,
}

impl ServiceOrderResponse {
    pub fn with_items(order: orders::Model, lines: Vec<order_items::Model>) -> Self {
        let mut resp = Self::from(order);
        resp.items = Some(lines.into_iter().map(OrderLineResponse::from).collect());
        resp
    }
}

impl From<orders::Model> for ServiceOrderResponse {
    fn from(o: orders::Model) -> Self {
        Self {
            id: o.id,
            folio: order_folio(o.id),
            solicitud_id: o.solicitud_id,
            client_id: o.client_id,
            status: o.status,
            total: o.total,
            paid_total: o.paid_total,
            balance_due: o.total - o.paid_total,
            notes: o.notes,
            created_by: o.created_by,
            created_at: o.created_at,
            items: None,
        }
    }
}
