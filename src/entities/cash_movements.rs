use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "cash_movement_kind")]
#[serde(rename_all = "snake_case")]
pub enum CashMovementKind {
    #[sea_orm(string_value = "ingress")]
    Ingress,
    #[sea_orm(string_value = "egress")]
    Egress,
}

impl CashMovementKind {
    /// 带符号金额：入账为正，出账为负
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            CashMovementKind::Ingress => amount,
            CashMovementKind::Egress => -amount,
        }
    }
}

impl std::fmt::Display for CashMovementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashMovementKind::Ingress => write!(f, "ingress"),
            CashMovementKind::Egress => write!(f, "egress"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "cash_movements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub kind: CashMovementKind,
    pub amount: i64,
    pub concept: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
