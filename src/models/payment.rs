use crate::entities::{PaymentMethod, payment_entity as payments};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    /// 金额(分)
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaymentResponse {
    pub id: i64,
    pub order_id: i64,
    pub session_id: Option<i64>,
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub received_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<payments::Model> for PaymentResponse {
    fn from(p: payments::Model) -> Self {
        Self {
            id: p.id,
            order_id: p.order_id,
            session_id: p.session_id,
            amount: p.amount,
            method: p.method,
            reference: p.reference,
            received_by: p.received_by,
            created_at: p.created_at,
        }
    }
}
