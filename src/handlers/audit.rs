use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, AuditService};
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    get,
    path = "/audit-logs",
    tag = "audit",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("user_id" = Option<i64>, Query, description = "操作人"),
        ("entity" = Option<String>, Query, description = "实体类型，如 cash_session"),
        ("entity_id" = Option<i64>, Query, description = "实体ID"),
        ("from" = Option<String>, Query, description = "开始日期 YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "结束日期 YYYY-MM-DD")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "审计日志"),
        (status = 403, description = "无权限")
    )
)]
pub async fn list_audit_logs(
    access: web::Data<AccessService>,
    audit_service: web::Data<AuditService>,
    req: HttpRequest,
    query: web::Query<AuditLogQuery>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::AuditView).await?;
    Ok(ApiResponse::ok(audit_service.list(&query).await?))
}

pub fn audit_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/audit-logs", web::get().to(list_audit_logs));
}
