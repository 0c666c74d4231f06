use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, CashRegisterService, DailyKeyService};
use actix_web::{HttpRequest, HttpResponse, web};

// ---------- 收银台 ----------

#[utoipa::path(
    get,
    path = "/cash/registers",
    tag = "cash",
    params(("include_inactive" = Option<bool>, Query, description = "包含已停用的收银台")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "收银台列表", body = [CashRegisterResponse]))
)]
pub async fn list_registers(
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    query: web::Query<CashRegisterQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(cash_service.list_registers(query.include_inactive).await?))
}

#[utoipa::path(
    post,
    path = "/cash/registers",
    tag = "cash",
    request_body = CashRegisterRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "收银台已创建", body = CashRegisterResponse),
        (status = 409, description = "名称已存在")
    )
)]
pub async fn create_register(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    request: web::Json<CashRegisterRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashManage).await?;
    let register = cash_service.create_register(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(register))
}

#[utoipa::path(
    put,
    path = "/cash/registers/{id}",
    tag = "cash",
    params(("id" = i64, Path, description = "收银台ID")),
    request_body = UpdateCashRegisterRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "收银台已更新", body = CashRegisterResponse),
        (status = 409, description = "有开着的班次时不能停用")
    )
)]
pub async fn update_register(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateCashRegisterRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashManage).await?;
    let register = cash_service
        .update_register(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(register))
}

// ---------- 当前用户的班次 ----------

#[utoipa::path(
    post,
    path = "/cash/sessions/open",
    tag = "cash",
    request_body = OpenSessionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "班次已开启", body = CashSessionResponse),
        (status = 409, description = "已有开着的班次或收银台被占用")
    )
)]
pub async fn open_session(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    request: web::Json<OpenSessionRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashOperate).await?;
    let session = cash_service.open_session(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(session))
}

/// 没有开着的班次时 data 为 null
#[utoipa::path(
    get,
    path = "/cash/sessions/current",
    tag = "cash",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "当前班次", body = CashSessionResponse))
)]
pub async fn current_session(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashOperate).await?;
    Ok(ApiResponse::ok(cash_service.current_session(user_id).await?))
}

#[utoipa::path(
    post,
    path = "/cash/sessions/current/movements",
    tag = "cash",
    request_body = CashMovementRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "调整已登记", body = CashMovementResponse),
        (status = 400, description = "金额无效或出账超过现金余额"),
        (status = 409, description = "没有开着的班次")
    )
)]
pub async fn record_movement(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    request: web::Json<CashMovementRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashOperate).await?;
    let movement = cash_service.record_movement(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(movement))
}

#[utoipa::path(
    post,
    path = "/cash/sessions/current/expenses",
    tag = "cash",
    request_body = CashExpenseRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "支出已登记", body = CashExpenseResponse),
        (status = 400, description = "金额无效或超过现金余额"),
        (status = 409, description = "没有开着的班次")
    )
)]
pub async fn record_expense(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    request: web::Json<CashExpenseRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashOperate).await?;
    let expense = cash_service.record_expense(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(expense))
}

#[utoipa::path(
    post,
    path = "/cash/sessions/current/close",
    tag = "cash",
    request_body = CloseSessionRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "班次已关闭", body = CloseSessionResponse),
        (status = 400, description = "差额超出容差且授权缺失或无效"),
        (status = 409, description = "没有开着的班次")
    )
)]
pub async fn close_session(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    request: web::Json<CloseSessionRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashOperate).await?;
    let closed = cash_service.close_session(user_id, request.into_inner()).await?;
    Ok(ApiResponse::ok(closed))
}

// ---------- 审计查询 ----------

#[utoipa::path(
    get,
    path = "/cash/sessions",
    tag = "cash",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("register_id" = Option<i64>, Query, description = "收银台"),
        ("user_id" = Option<i64>, Query, description = "收银员"),
        ("status" = Option<String>, Query, description = "open / closed")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "班次列表"))
)]
pub async fn list_sessions(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    query: web::Query<CashSessionQuery>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashAudit).await?;
    Ok(ApiResponse::ok(cash_service.list_sessions(&query).await?))
}

/// 本人班次或持有 cash.audit 权限可查看
#[utoipa::path(
    get,
    path = "/cash/sessions/{id}",
    tag = "cash",
    params(("id" = i64, Path, description = "班次ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "班次详情", body = CashSessionDetailResponse),
        (status = 403, description = "无权限"),
        (status = 404, description = "班次不存在")
    )
)]
pub async fn session_detail(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    let can_audit = access.has(user_id, Permission::CashAudit).await?;
    let detail = cash_service
        .session_detail(user_id, path.into_inner(), can_audit)
        .await?;
    Ok(ApiResponse::ok(detail))
}

#[utoipa::path(
    get,
    path = "/cash/discrepancies",
    tag = "cash",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("from" = Option<String>, Query, description = "开始日期 YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "结束日期 YYYY-MM-DD")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "差额记录"))
)]
pub async fn list_discrepancies(
    access: web::Data<AccessService>,
    cash_service: web::Data<CashRegisterService>,
    req: HttpRequest,
    query: web::Query<DiscrepancyQuery>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashAudit).await?;
    Ok(ApiResponse::ok(cash_service.list_discrepancies(&query).await?))
}

// ---------- 每日授权码 ----------

#[utoipa::path(
    post,
    path = "/cash/daily-key",
    tag = "cash",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "已生成今日授权码，旧码作废", body = DailyKeyResponse),
        (status = 403, description = "无权限")
    )
)]
pub async fn issue_daily_key(
    access: web::Data<AccessService>,
    daily_key_service: web::Data<DailyKeyService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashAuthorize).await?;
    Ok(ApiResponse::created(daily_key_service.issue(user_id).await?))
}

#[utoipa::path(
    get,
    path = "/cash/daily-key",
    tag = "cash",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "今日授权码", body = DailyKeyResponse),
        (status = 404, description = "今日尚未生成")
    )
)]
pub async fn current_daily_key(
    access: web::Data<AccessService>,
    daily_key_service: web::Data<DailyKeyService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CashAuthorize).await?;
    Ok(ApiResponse::ok(daily_key_service.current().await?))
}

pub fn cash_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cash")
            .route("/registers", web::get().to(list_registers))
            .route("/registers", web::post().to(create_register))
            .route("/registers/{id}", web::put().to(update_register))
            .route("/sessions/open", web::post().to(open_session))
            // current 必须在 {id} 之前注册
            .route("/sessions/current", web::get().to(current_session))
            .route("/sessions/current/movements", web::post().to(record_movement))
            .route("/sessions/current/expenses", web::post().to(record_expense))
            .route("/sessions/current/close", web::post().to(close_session))
            .route("/sessions", web::get().to(list_sessions))
            .route("/sessions/{id}", web::get().to(session_detail))
            .route("/discrepancies", web::get().to(list_discrepancies))
            .route("/daily-key", web::post().to(issue_daily_key))
            .route("/daily-key", web::get().to(current_daily_key)),
    );
}
