use crate::error::AppResult;
use crate::utils::{money_add, money_sub};
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "cash_session_status")]
#[serde(rename_all = "snake_case")]
pub enum CashSessionStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl std::fmt::Display for CashSessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CashSessionStatus::Open => write!(f, "open"),
            CashSessionStatus::Closed => write!(f, "closed"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "cash_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub register_id: i64,
    pub user_id: i64,
    pub status: CashSessionStatus,
    pub opening_amount: i64,
    pub sales_total: i64,
    pub expenses_total: i64,
    pub movements_net: i64,
    pub expected_amount: Option<i64>,
    pub closing_amount: Option<i64>,
    pub difference: Option<i64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Model {
    /// 开班金额 + 销售 - 支出 + 手工调整净额
    pub fn running_expected(&self) -> AppResult<i64> {
        let gross = money_add(self.opening_amount, self.sales_total)?;
        money_add(money_sub(gross, self.expenses_total)?, self.movements_net)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
