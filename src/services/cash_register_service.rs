//! 收银台（caja）与班次生命周期：开班、手工调整、支出、关班对账。
//!
//! 预期金额 = 开班金额 + 现金销售 - 支出 + 手工调整净额。关班时实点金额与预期
//! 金额的差额超过容差即视为差异；收银台要求授权时，必须提供当日授权码和持有
//! `cash.authorize` 的主管账号，否则拒绝关班。

use crate::entities::{
    CashMovementKind, CashSessionStatus, cash_discrepancy_entity as discrepancies,
    cash_expense_entity as expenses, cash_movement_entity as movements,
    cash_register_entity as registers, cash_session_entity as sessions,
    payment_entity as payments, user_entity as users,
};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::access_service::require_permission;
use crate::services::audit_service::record_audit;
use crate::services::daily_key_service::is_valid_daily_key;
use crate::utils::{
    money_add, money_sub, optional_text, require_non_negative_amount, require_positive_amount,
    require_text,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;

/// 关班对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseAssessment {
    pub expected: i64,
    pub actual: i64,
    /// 实点 - 预期，正数为长款，负数为短款
    pub difference: i64,
    pub exceeds_tolerance: bool,
    pub requires_authorization: bool,
}

pub fn assess_close(
    expected: i64,
    actual: i64,
    tolerance: i64,
    register_requires_authorization: bool,
) -> AppResult<CloseAssessment> {
    let difference = money_sub(actual, expected)?;
    let exceeds_tolerance = difference.unsigned_abs() > tolerance.max(0).unsigned_abs();
    Ok(CloseAssessment {
        expected,
        actual,
        difference,
        exceeds_tolerance,
        requires_authorization: exceeds_tolerance && register_requires_authorization,
    })
}

/// 查找用户当前开着的班次；`for_update` 时加行锁
pub async fn find_open_session<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    for_update: bool,
) -> AppResult<Option<sessions::Model>> {
    let mut q = sessions::Entity::find()
        .filter(sessions::Column::UserId.eq(user_id))
        .filter(sessions::Column::Status.eq(CashSessionStatus::Open));
    if for_update {
        q = q.lock_exclusive();
    }
    Ok(q.one(conn).await?)
}

async fn require_open_session<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<sessions::Model> {
    find_open_session(conn, user_id, true)
        .await?
        .ok_or_else(|| AppError::Conflict("No open cash session".to_string()))
}

/// 现金收款计入班次销售额，返回班次 ID。由收款流程在同一事务内调用。
pub async fn add_cash_sale<C: ConnectionTrait>(conn: &C, user_id: i64, amount: i64) -> AppResult<i64> {
    let session = find_open_session(conn, user_id, true).await?.ok_or_else(|| {
        AppError::Conflict("Cash payments require an open cash session".to_string())
    })?;
    let session_id = session.id;
    let sales_total = money_add(session.sales_total, amount)?;
    let mut am = session.into_active_model();
    am.sales_total = Set(sales_total);
    am.update(conn).await?;
    Ok(session_id)
}

#[derive(Clone)]
pub struct CashRegisterService {
    pool: DbPool,
    tolerance_cents: i64,
}

impl CashRegisterService {
    pub fn new(pool: DbPool, tolerance_cents: i64) -> Self {
        Self {
            pool,
            tolerance_cents,
        }
    }

    // ---------- 收银台定义 ----------

    pub async fn list_registers(&self, include_inactive: bool) -> AppResult<Vec<CashRegisterResponse>> {
        let mut q = registers::Entity::find();
        if !include_inactive {
            q = q.filter(registers::Column::IsActive.eq(true));
        }
        let list = q.order_by_asc(registers::Column::Name).all(self.pool.as_ref()).await?;

        let open = sessions::Entity::find()
            .filter(sessions::Column::Status.eq(CashSessionStatus::Open))
            .all(self.pool.as_ref())
            .await?;

        Ok(list
            .into_iter()
            .map(|r| {
                let open_session_id = open.iter().find(|s| s.register_id == r.id).map(|s| s.id);
                CashRegisterResponse::new(r, open_session_id)
            })
            .collect())
    }

    pub async fn create_register(
        &self,
        user_id: i64,
        req: CashRegisterRequest,
    ) -> AppResult<CashRegisterResponse> {
        let name = require_text("name", &req.name, 1, 128)?;
        require_non_negative_amount("base_amount", req.base_amount)?;

        let txn = self.pool.begin().await?;
        let dup = registers::Entity::find()
            .filter(registers::Column::Name.eq(name.clone()))
            .count(&txn)
            .await?;
        if dup > 0 {
            return Err(AppError::Conflict(format!("Cash register '{name}' already exists")));
        }

        let now = Utc::now();
        let register = registers::ActiveModel {
            name: Set(name),
            base_amount: Set(req.base_amount),
            requires_authorization: Set(req.requires_authorization),
            is_active: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_audit(
            &txn,
            Some(user_id),
            "cash_register.create",
            "cash_register",
            Some(register.id),
            json!({ "name": register.name, "base_amount": register.base_amount }),
        )
        .await?;
        txn.commit().await?;

        log::info!("Cash register {} created by user {user_id}", register.id);
        Ok(CashRegisterResponse::new(register, None))
    }

    pub async fn update_register(
        &self,
        user_id: i64,
        register_id: i64,
        req: UpdateCashRegisterRequest,
    ) -> AppResult<CashRegisterResponse> {
        let txn = self.pool.begin().await?;
        let register = registers::Entity::find_by_id(register_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Cash register not found".to_string()))?;

        let open = sessions::Entity::find()
            .filter(sessions::Column::RegisterId.eq(register_id))
            .filter(sessions::Column::Status.eq(CashSessionStatus::Open))
            .one(&txn)
            .await?;

        let mut am = register.into_active_model();
        if let Some(name) = &req.name {
            let name = require_text("name", name, 1, 128)?;
            let dup = registers::Entity::find()
                .filter(registers::Column::Name.eq(name.clone()))
                .filter(registers::Column::Id.ne(register_id))
                .count(&txn)
                .await?;
            if dup > 0 {
                return Err(AppError::Conflict(format!("Cash register '{name}' already exists")));
            }
            am.name = Set(name);
        }
        if let Some(base) = req.base_amount {
            require_non_negative_amount("base_amount", base)?;
            am.base_amount = Set(base);
        }
        if let Some(flag) = req.requires_authorization {
            am.requires_authorization = Set(flag);
        }
        if let Some(active) = req.is_active {
            if !active && open.is_some() {
                return Err(AppError::Conflict(
                    "Cannot deactivate a cash register with an open session".to_string(),
                ));
            }
            am.is_active = Set(active);
        }
        am.updated_at = Set(Some(Utc::now()));
        let register = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "cash_register.update",
            "cash_register",
            Some(register_id),
            json!({
                "name": register.name,
                "base_amount": register.base_amount,
                "requires_authorization": register.requires_authorization,
                "is_active": register.is_active,
            }),
        )
        .await?;
        txn.commit().await?;

        Ok(CashRegisterResponse::new(register, open.map(|s| s.id)))
    }

    // ---------- 班次 ----------

    /// 开班：用户同时只能持有一个开着的班次，收银台同时只能被一个班次占用
    pub async fn open_session(
        &self,
        user_id: i64,
        req: OpenSessionRequest,
    ) -> AppResult<CashSessionResponse> {
        if let Some(amount) = req.opening_amount {
            require_non_negative_amount("opening_amount", amount)?;
        }

        let txn = self.pool.begin().await?;

        let register = registers::Entity::find_by_id(req.register_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Cash register not found".to_string()))?;
        if !register.is_active {
            return Err(AppError::Conflict("Cash register is inactive".to_string()));
        }

        if find_open_session(&txn, user_id, true).await?.is_some() {
            log::warn!("User {user_id} tried to open a second cash session");
            return Err(AppError::Conflict(
                "You already have an open cash session".to_string(),
            ));
        }

        let busy = sessions::Entity::find()
            .filter(sessions::Column::RegisterId.eq(register.id))
            .filter(sessions::Column::Status.eq(CashSessionStatus::Open))
            .one(&txn)
            .await?;
        if busy.is_some() {
            return Err(AppError::Conflict(
                "Cash register is already open by another user".to_string(),
            ));
        }

        let opening_amount = req.opening_amount.unwrap_or(register.base_amount);
        let session = sessions::ActiveModel {
            register_id: Set(register.id),
            user_id: Set(user_id),
            status: Set(CashSessionStatus::Open),
            opening_amount: Set(opening_amount),
            sales_total: Set(0),
            expenses_total: Set(0),
            movements_net: Set(0),
            expected_amount: Set(None),
            closing_amount: Set(None),
            difference: Set(None),
            opened_at: Set(Utc::now()),
            closed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_audit(
            &txn,
            Some(user_id),
            "cash_session.open",
            "cash_session",
            Some(session.id),
            json!({ "register_id": register.id, "opening_amount": opening_amount }),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Cash session {} opened on register {} by user {user_id}",
            session.id,
            register.id
        );
        Ok(CashSessionResponse::from(session))
    }

    pub async fn current_session(&self, user_id: i64) -> AppResult<Option<CashSessionResponse>> {
        Ok(find_open_session(self.pool.as_ref(), user_id, false)
            .await?
            .map(CashSessionResponse::from))
    }

    /// 手工调整：入账为正，出账为负，计入班次净额
    pub async fn record_movement(
        &self,
        user_id: i64,
        req: CashMovementRequest,
    ) -> AppResult<CashMovementResponse> {
        require_positive_amount("amount", req.amount)?;
        let concept = require_text("concept", &req.concept, 3, 255)?;

        let txn = self.pool.begin().await?;
        let session = require_open_session(&txn, user_id).await?;

        let session_id = session.id;
        let signed = req.kind.signed(req.amount);
        let available = session.running_expected()?;
        if req.kind == CashMovementKind::Egress && money_add(available, signed)? < 0 {
            return Err(AppError::ValidationError(
                "Egress exceeds the cash available in the session".to_string(),
            ));
        }

        let movement = movements::ActiveModel {
            session_id: Set(session_id),
            user_id: Set(user_id),
            kind: Set(req.kind),
            amount: Set(req.amount),
            concept: Set(concept),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let movements_net = money_add(session.movements_net, signed)?;
        let mut am = session.into_active_model();
        am.movements_net = Set(movements_net);
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "cash_session.movement",
            "cash_session",
            Some(session_id),
            json!({ "movement_id": movement.id, "kind": req.kind, "amount": req.amount }),
        )
        .await?;
        txn.commit().await?;

        Ok(CashMovementResponse::from(movement))
    }

    pub async fn record_expense(
        &self,
        user_id: i64,
        req: CashExpenseRequest,
    ) -> AppResult<CashExpenseResponse> {
        require_positive_amount("amount", req.amount)?;
        let description = require_text("description", &req.description, 3, 255)?;
        let category = optional_text("category", req.category.as_deref(), 64)?;

        let txn = self.pool.begin().await?;
        let session = require_open_session(&txn, user_id).await?;
        let session_id = session.id;

        if money_sub(session.running_expected()?, req.amount)? < 0 {
            return Err(AppError::ValidationError(
                "Expense exceeds the cash available in the session".to_string(),
            ));
        }

        let expense = expenses::ActiveModel {
            session_id: Set(session_id),
            user_id: Set(user_id),
            description: Set(description),
            category: Set(category),
            amount: Set(req.amount),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let expenses_total = money_add(session.expenses_total, req.amount)?;
        let mut am = session.into_active_model();
        am.expenses_total = Set(expenses_total);
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "cash_session.expense",
            "cash_session",
            Some(session_id),
            json!({ "expense_id": expense.id, "amount": req.amount }),
        )
        .await?;
        txn.commit().await?;

        Ok(CashExpenseResponse::from(expense))
    }

    /// 关班对账
    pub async fn close_session(
        &self,
        user_id: i64,
        req: CloseSessionRequest,
    ) -> AppResult<CloseSessionResponse> {
        require_non_negative_amount("closing_amount", req.closing_amount)?;

        let txn = self.pool.begin().await?;
        let session = require_open_session(&txn, user_id).await?;
        let register = registers::Entity::find_by_id(session.register_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Cash register not found".to_string()))?;

        let assessment = assess_close(
            session.running_expected()?,
            req.closing_amount,
            self.tolerance_cents,
            register.requires_authorization,
        )?;

        // 提交了授权就校验；差额超出容差且收银台要求时必须提交
        let mut supervisor: Option<users::Model> = None;
        let mut justification: Option<String> = None;
        match &req.authorization {
            Some(auth) => {
                let sup = self.verify_authorization(&txn, auth).await?;
                justification = Some(require_text("justification", &auth.justification, 5, 1000)?);
                supervisor = Some(sup);
            }
            None if assessment.requires_authorization => {
                log::warn!(
                    "Close of session {} rejected: difference {} exceeds tolerance without authorization",
                    session.id,
                    assessment.difference
                );
                return Err(AppError::ValidationError(format!(
                    "Difference of {} exceeds the tolerance; supervisor authorization is required",
                    assessment.difference
                )));
            }
            None => {}
        }

        let session_id = session.id;
        let mut am = session.into_active_model();
        am.status = Set(CashSessionStatus::Closed);
        am.expected_amount = Set(Some(assessment.expected));
        am.closing_amount = Set(Some(assessment.actual));
        am.difference = Set(Some(assessment.difference));
        am.closed_at = Set(Some(Utc::now()));
        let closed = am.update(&txn).await?;

        let discrepancy = if assessment.exceeds_tolerance {
            Some(
                discrepancies::ActiveModel {
                    session_id: Set(session_id),
                    expected: Set(assessment.expected),
                    actual: Set(assessment.actual),
                    difference: Set(assessment.difference),
                    supervisor_id: Set(supervisor.as_ref().map(|s| s.id)),
                    justification: Set(justification),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?,
            )
        } else {
            None
        };

        record_audit(
            &txn,
            Some(user_id),
            "cash_session.close",
            "cash_session",
            Some(session_id),
            json!({
                "expected": assessment.expected,
                "actual": assessment.actual,
                "difference": assessment.difference,
                "supervisor_id": supervisor.as_ref().map(|s| s.id),
            }),
        )
        .await?;
        txn.commit().await?;

        log::info!(
            "Cash session {session_id} closed by user {user_id} (expected {}, actual {}, difference {})",
            assessment.expected,
            assessment.actual,
            assessment.difference
        );

        Ok(CloseSessionResponse {
            session: CashSessionResponse::from(closed),
            discrepancy: discrepancy.map(CashDiscrepancyResponse::from),
        })
    }

    async fn verify_authorization<C: ConnectionTrait>(
        &self,
        conn: &C,
        auth: &CloseAuthorization,
    ) -> AppResult<users::Model> {
        if !is_valid_daily_key(conn, &auth.daily_key).await? {
            log::warn!("Invalid daily key presented for supervisor {}", auth.supervisor_username);
            return Err(AppError::ValidationError("Invalid or expired daily key".to_string()));
        }
        let sup = users::Entity::find()
            .filter(users::Column::Username.eq(auth.supervisor_username.trim()))
            .one(conn)
            .await?
            .ok_or_else(|| AppError::ValidationError("Supervisor not found".to_string()))?;
        match require_permission(conn, sup.id, Permission::CashAuthorize).await {
            Ok(user) => Ok(user),
            Err(AppError::PermissionDenied) | Err(AppError::AuthError(_)) => Err(
                AppError::ValidationError("User is not allowed to authorize discrepancies".to_string()),
            ),
            Err(e) => Err(e),
        }
    }

    // ---------- 查询 ----------

    pub async fn list_sessions(
        &self,
        query: &CashSessionQuery,
    ) -> AppResult<PaginatedResponse<CashSessionResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = sessions::Entity::find();
        if let Some(register_id) = query.register_id {
            base = base.filter(sessions::Column::RegisterId.eq(register_id));
        }
        if let Some(uid) = query.user_id {
            base = base.filter(sessions::Column::UserId.eq(uid));
        }
        if let Some(status) = query.status {
            base = base.filter(sessions::Column::Status.eq(status));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(sessions::Column::OpenedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(CashSessionResponse::from).collect(),
            &params,
            total,
        ))
    }

    /// 班次明细：本人或审计权限可见（调用方负责传入 `can_audit`）
    pub async fn session_detail(
        &self,
        user_id: i64,
        session_id: i64,
        can_audit: bool,
    ) -> AppResult<CashSessionDetailResponse> {
        let session = sessions::Entity::find_by_id(session_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Cash session not found".to_string()))?;
        if session.user_id != user_id && !can_audit {
            return Err(AppError::PermissionDenied);
        }

        let register_name = registers::Entity::find_by_id(session.register_id)
            .one(self.pool.as_ref())
            .await?
            .map(|r| r.name)
            .unwrap_or_default();
        let movement_rows = movements::Entity::find()
            .filter(movements::Column::SessionId.eq(session_id))
            .order_by_asc(movements::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;
        let expense_rows = expenses::Entity::find()
            .filter(expenses::Column::SessionId.eq(session_id))
            .order_by_asc(expenses::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;
        let payment_rows = payments::Entity::find()
            .filter(payments::Column::SessionId.eq(session_id))
            .order_by_asc(payments::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;
        let discrepancy = discrepancies::Entity::find()
            .filter(discrepancies::Column::SessionId.eq(session_id))
            .one(self.pool.as_ref())
            .await?;

        Ok(CashSessionDetailResponse {
            session: CashSessionResponse::from(session),
            register_name,
            movements: movement_rows.into_iter().map(Into::into).collect(),
            expenses: expense_rows.into_iter().map(Into::into).collect(),
            payments: payment_rows.into_iter().map(Into::into).collect(),
            discrepancy: discrepancy.map(Into::into),
        })
    }

    pub async fn list_discrepancies(
        &self,
        query: &DiscrepancyQuery,
    ) -> AppResult<PaginatedResponse<CashDiscrepancyResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let from = parse_date_filter("from", query.from.as_deref())?;
        let to = parse_date_filter("to", query.to.as_deref())?;

        let mut base = discrepancies::Entity::find();
        if let Some(from) = from {
            base = base.filter(
                discrepancies::Column::CreatedAt.gte(from.and_time(chrono::NaiveTime::MIN).and_utc()),
            );
        }
        if let Some(to) = to {
            let end = (to + chrono::Duration::days(1))
                .and_time(chrono::NaiveTime::MIN)
                .and_utc();
            base = base.filter(discrepancies::Column::CreatedAt.lt(end));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(discrepancies::Column::CreatedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(Into::into).collect(),
            &params,
            total,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::collections::BTreeMap;

    fn register(requires_authorization: bool) -> registers::Model {
        registers::Model {
            id: 1,
            name: "Caja 1".to_string(),
            base_amount: 50_000,
            requires_authorization,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn open_session(user_id: i64) -> sessions::Model {
        sessions::Model {
            id: 10,
            register_id: 1,
            user_id,
            status: CashSessionStatus::Open,
            opening_amount: 50_000,
            sales_total: 12_000,
            expenses_total: 2_000,
            movements_net: 500,
            expected_amount: None,
            closing_amount: None,
            difference: None,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    fn closed_from(s: &sessions::Model, actual: i64) -> sessions::Model {
        let expected = s.running_expected().unwrap();
        sessions::Model {
            status: CashSessionStatus::Closed,
            expected_amount: Some(expected),
            closing_amount: Some(actual),
            difference: Some(actual - expected),
            closed_at: Some(Utc::now()),
            ..s.clone()
        }
    }

    fn supervisor() -> users::Model {
        users::Model {
            id: 4,
            username: "supervisor".to_string(),
            full_name: "Ana Supervisora".to_string(),
            email: None,
            password_hash: String::new(),
            role_id: 2,
            is_active: true,
            created_at: None,
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    fn authorization(daily_key: &str) -> Option<CloseAuthorization> {
        Some(CloseAuthorization {
            supervisor_username: "supervisor".to_string(),
            daily_key: daily_key.to_string(),
            justification: "Billete faltante en el conteo".to_string(),
        })
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 1,
            rows_affected: 1,
        }
    }

    #[test]
    fn test_expected_amount_formula() {
        let s = open_session(7);
        // 50000 + 12000 - 2000 + 500
        assert_eq!(s.running_expected().unwrap(), 60_500);
    }

    #[test]
    fn test_expected_amount_out_of_range_is_an_error() {
        let s = sessions::Model {
            opening_amount: i64::MAX,
            sales_total: 0,
            expenses_total: 0,
            movements_net: 1,
            ..open_session(7)
        };
        assert!(matches!(s.running_expected(), Err(AppError::ValidationError(_))));
        assert!(CashSessionResponse::from(s).expected_amount.is_none());
        assert!(assess_close(i64::MIN, 1, 1, true).is_err());
    }

    #[test]
    fn test_difference_within_tolerance_never_requires_authorization() {
        for diff in [-1, 0, 1] {
            let a = assess_close(10_000, 10_000 + diff, 1, true).unwrap();
            assert!(!a.exceeds_tolerance);
            assert!(!a.requires_authorization);
            assert_eq!(a.difference, diff);
        }
    }

    #[test]
    fn test_difference_over_tolerance_requires_authorization_only_when_register_demands_it() {
        let short = assess_close(10_000, 9_000, 1, true).unwrap();
        assert!(short.exceeds_tolerance);
        assert!(short.requires_authorization);
        assert_eq!(short.difference, -1_000);

        let over = assess_close(10_000, 10_500, 1, false).unwrap();
        assert!(over.exceeds_tolerance);
        assert!(!over.requires_authorization);
    }

    #[test]
    fn test_zero_tolerance_flags_any_difference() {
        assert!(assess_close(100, 101, 0, true).unwrap().requires_authorization);
        assert!(!assess_close(100, 100, 0, true).unwrap().exceeds_tolerance);
    }

    #[tokio::test]
    async fn test_open_session_fails_when_user_already_has_one() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![register(true)]])
            .append_query_results([vec![open_session(7)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .open_session(
                7,
                OpenSessionRequest {
                    register_id: 1,
                    opening_amount: Some(10_000),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("already have an open")));
    }

    #[tokio::test]
    async fn test_open_session_rejects_inactive_register() {
        let mut reg = register(true);
        reg.is_active = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![reg]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .open_session(
                7,
                OpenSessionRequest {
                    register_id: 1,
                    opening_amount: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("inactive")));
    }

    #[tokio::test]
    async fn test_open_session_rejects_negative_amount_before_touching_db() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);
        let err = svc
            .open_session(
                7,
                OpenSessionRequest {
                    register_id: 1,
                    opening_amount: Some(-1),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_record_movement_without_open_session_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<sessions::Model>::new()])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .record_movement(
                7,
                CashMovementRequest {
                    kind: CashMovementKind::Ingress,
                    amount: 1_000,
                    concept: "Fondo adicional".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "No open cash session"));
    }

    #[tokio::test]
    async fn test_close_over_tolerance_without_authorization_fails_when_required() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .append_query_results([vec![register(true)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 59_000,
                    authorization: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("authorization is required")));
    }

    #[tokio::test]
    async fn test_close_within_tolerance_needs_no_authorization() {
        let session = open_session(7);
        let closed = closed_from(&session, 60_501);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session]])
            .append_query_results([vec![register(true)]])
            .append_query_results([vec![closed]])
            .append_exec_results([exec_ok()])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let resp = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 60_501,
                    authorization: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.session.status, CashSessionStatus::Closed);
        assert_eq!(resp.session.difference, Some(1));
        assert!(resp.discrepancy.is_none());
    }

    #[tokio::test]
    async fn test_close_over_tolerance_records_discrepancy_when_not_required() {
        let session = open_session(7);
        let closed = closed_from(&session, 60_000);
        let discrepancy = discrepancies::Model {
            id: 3,
            session_id: 10,
            expected: 60_500,
            actual: 60_000,
            difference: -500,
            supervisor_id: None,
            justification: None,
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session]])
            .append_query_results([vec![register(false)]])
            .append_query_results([vec![closed]])
            .append_query_results([vec![discrepancy]])
            .append_exec_results([exec_ok()])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let resp = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 60_000,
                    authorization: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.session.difference, Some(-500));
        let d = resp.discrepancy.expect("discrepancy recorded");
        assert_eq!(d.difference, -500);
        assert_eq!(d.supervisor_id, None);
    }

    #[tokio::test]
    async fn test_close_with_unknown_daily_key_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .append_query_results([vec![register(true)]])
            .append_query_results([vec![count_row(0)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 59_000,
                    authorization: authorization("ZZ99ZZ"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("daily key")));
    }

    #[tokio::test]
    async fn test_close_with_supervisor_lacking_permission_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .append_query_results([vec![register(true)]])
            .append_query_results([vec![count_row(1)]])
            .append_query_results([vec![supervisor()]])
            .append_query_results([vec![supervisor()]])
            .append_query_results([vec![count_row(0)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 59_000,
                    authorization: authorization("7KQ2ZD"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("not allowed")));
    }

    #[tokio::test]
    async fn test_authorized_close_records_supervisor_on_discrepancy() {
        let session = open_session(7);
        let closed = closed_from(&session, 59_000);
        let discrepancy = discrepancies::Model {
            id: 5,
            session_id: 10,
            expected: 60_500,
            actual: 59_000,
            difference: -1_500,
            supervisor_id: Some(4),
            justification: Some("Billete faltante en el conteo".to_string()),
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session]])
            .append_query_results([vec![register(true)]])
            .append_query_results([vec![count_row(1)]])
            .append_query_results([vec![supervisor()]])
            .append_query_results([vec![supervisor()]])
            .append_query_results([vec![count_row(1)]])
            .append_query_results([vec![closed]])
            .append_query_results([vec![discrepancy]])
            .append_exec_results([exec_ok()])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let resp = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 59_000,
                    authorization: authorization("7kq2zd"),
                },
            )
            .await
            .unwrap();
        assert_eq!(resp.session.status, CashSessionStatus::Closed);
        let d = resp.discrepancy.expect("discrepancy recorded");
        assert_eq!(d.supervisor_id, Some(4));
        assert_eq!(d.difference, -1_500);
    }

    #[tokio::test]
    async fn test_supplied_authorization_is_checked_within_tolerance() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .append_query_results([vec![register(false)]])
            .append_query_results([vec![count_row(0)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .close_session(
                7,
                CloseSessionRequest {
                    closing_amount: 60_500,
                    authorization: authorization("ABC123"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("daily key")));
    }

    #[tokio::test]
    async fn test_egress_cannot_exceed_cash_on_hand() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .record_movement(
                7,
                CashMovementRequest {
                    kind: CashMovementKind::Egress,
                    amount: 60_501,
                    concept: "Retiro a bóveda".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Egress exceeds")));
    }

    #[tokio::test]
    async fn test_expense_cannot_exceed_cash_on_hand() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open_session(7)]])
            .into_connection();
        let svc = CashRegisterService::new(DbPool::new(db), 1);

        let err = svc
            .record_expense(
                7,
                CashExpenseRequest {
                    description: "Compra de tóner".to_string(),
                    category: None,
                    amount: 60_501,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Expense exceeds")));
    }
}
