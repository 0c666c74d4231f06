use crate::entities::delivery_entity as deliveries;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateDeliveryRequest {
    #[schema(example = "Juan Pérez")]
    pub received_by: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// YYYY-MM-DD
    pub from: Option<String>,
    /// YYYY-MM-DD
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeliveryResponse {
    pub id: i64,
    pub order_id: i64,
    pub delivered_by: i64,
    pub received_by: String,
    pub notes: Option<String>,
    pub delivered_at: DateTime<Utc>,
}

impl From<deliveries::Model> for DeliveryResponse {
    fn from(d: deliveries::Model) -> Self {
        Self {
            id: d.id,
            order_id: d.order_id,
            delivered_by: d.delivered_by,
            received_by: d.received_by,
            notes: d.notes,
            delivered_at: d.delivered_at,
        }
    }
}
