use crate::entities::{
    CashMovementKind, CashSessionStatus, cash_discrepancy_entity as discrepancies,
    cash_expense_entity as expenses, cash_movement_entity as movements,
    cash_register_entity as registers, cash_session_entity as sessions,
};
use crate::models::PaymentResponse;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------- 收银台定义 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashRegisterRequest {
    #[schema(example = "Caja 1")]
    pub name: String,
    /// 基础备用金(分)
    #[serde(default)]
    pub base_amount: i64,
    #[serde(default = "default_true")]
    pub requires_authorization: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCashRegisterRequest {
    pub name: Option<String>,
    pub base_amount: Option<i64>,
    pub requires_authorization: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct CashRegisterQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashRegisterResponse {
    pub id: i64,
    pub name: String,
    pub base_amount: i64,
    pub requires_authorization: bool,
    pub is_active: bool,
    /// 当前开着的班次
    pub open_session_id: Option<i64>,
}

impl CashRegisterResponse {
    pub fn new(r: registers::Model, open_session_id: Option<i64>) -> Self {
        Self {
            id: r.id,
            name: r.name,
            base_amount: r.base_amount,
            requires_authorization: r.requires_authorization,
            is_active: r.is_active,
            open_session_id,
        }
    }
}

// ---------- 班次 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OpenSessionRequest {
    pub register_id: i64,
    /// 开班金额(分)，不传则取收银台基础备用金
    pub opening_amount: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashSessionResponse {
    pub id: i64,
    pub register_id: i64,
    pub user_id: i64,
    pub status: CashSessionStatus,
    pub opening_amount: i64,
    pub sales_total: i64,
    pub expenses_total: i64,
    pub movements_net: i64,
    /// 开班中为实时预期金额，关班后为结算时的预期金额；超出范围时为空
    pub expected_amount: Option<i64>,
    pub closing_amount: Option<i64>,
    pub difference: Option<i64>,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<sessions::Model> for CashSessionResponse {
    fn from(s: sessions::Model) -> Self {
        let expected_amount = s.expected_amount.or_else(|| s.running_expected().ok());
        Self {
            id: s.id,
            register_id: s.register_id,
            user_id: s.user_id,
            status: s.status,
            opening_amount: s.opening_amount,
            sales_total: s.sales_total,
            expenses_total: s.expenses_total,
            movements_net: s.movements_net,
            expected_amount,
            closing_amount: s.closing_amount,
            difference: s.difference,
            opened_at: s.opened_at,
            closed_at: s.closed_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashSessionQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub register_id: Option<i64>,
    pub user_id: Option<i64>,
    pub status: Option<CashSessionStatus>,
}

// ---------- 手工调整 / 支出 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashMovementRequest {
    pub kind: CashMovementKind,
    /// 正数金额(分)，方向由 kind 决定
    pub amount: i64,
    #[schema(example = "Cambio entregado por gerencia")]
    pub concept: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashMovementResponse {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub kind: CashMovementKind,
    pub amount: i64,
    pub concept: String,
    pub created_at: DateTime<Utc>,
}

impl From<movements::Model> for CashMovementResponse {
    fn from(m: movements::Model) -> Self {
        Self {
            id: m.id,
            session_id: m.session_id,
            user_id: m.user_id,
            kind: m.kind,
            amount: m.amount,
            concept: m.concept,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashExpenseRequest {
    #[schema(example = "Papelería")]
    pub description: String,
    pub category: Option<String>,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashExpenseResponse {
    pub id: i64,
    pub session_id: i64,
    pub user_id: i64,
    pub description: String,
    pub category: Option<String>,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl From<expenses::Model> for CashExpenseResponse {
    fn from(e: expenses::Model) -> Self {
        Self {
            id: e.id,
            session_id: e.session_id,
            user_id: e.user_id,
            description: e.description,
            category: e.category,
            amount: e.amount,
            created_at: e.created_at,
        }
    }
}

// ---------- 关班 ----------

/// 主管授权：当日授权码 + 主管账号 + 说明
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloseAuthorization {
    #[schema(example = "supervisor")]
    pub supervisor_username: String,
    #[schema(example = "7KQ2ZD")]
    pub daily_key: String,
    pub justification: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CloseSessionRequest {
    /// 实点金额(分)
    pub closing_amount: i64,
    pub authorization: Option<CloseAuthorization>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashDiscrepancyResponse {
    pub id: i64,
    pub session_id: i64,
    pub expected: i64,
    pub actual: i64,
    pub difference: i64,
    pub supervisor_id: Option<i64>,
    pub justification: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<discrepancies::Model> for CashDiscrepancyResponse {
    fn from(d: discrepancies::Model) -> Self {
        Self {
            id: d.id,
            session_id: d.session_id,
            expected: d.expected,
            actual: d.actual,
            difference: d.difference,
            supervisor_id: d.supervisor_id,
            justification: d.justification,
            created_at: d.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CloseSessionResponse {
    pub session: CashSessionResponse,
    pub discrepancy: Option<CashDiscrepancyResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CashSessionDetailResponse {
    pub session: CashSessionResponse,
    pub register_name: String,
    pub movements: Vec<CashMovementResponse>,
    pub expenses: Vec<CashExpenseResponse>,
    pub payments: Vec<PaymentResponse>,
    pub discrepancy: Option<CashDiscrepancyResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DiscrepancyQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// YYYY-MM-DD
    pub from: Option<String>,
    /// YYYY-MM-DD
    pub to: Option<String>,
}

// ---------- 每日授权码 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DailyKeyResponse {
    pub code: String,
    pub valid_on: chrono::NaiveDate,
    pub issued_by: i64,
    pub created_at: DateTime<Utc>,
}

impl From<crate::entities::daily_key_entity::Model> for DailyKeyResponse {
    fn from(k: crate::entities::daily_key_entity::Model) -> Self {
        Self {
            code: k.code,
            valid_on: k.valid_on,
            issued_by: k.issued_by,
            created_at: k.created_at,
        }
    }
}
