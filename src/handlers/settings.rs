use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, SettingsService};
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "公司信息", body = CompanySettingsResponse))
)]
pub async fn get_settings(
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(settings_service.get().await?))
}

#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    request_body = UpdateCompanySettingsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "公司信息已更新", body = CompanySettingsResponse),
        (status = 400, description = "请求参数错误"),
        (status = 403, description = "无权限")
    )
)]
pub async fn update_settings(
    access: web::Data<AccessService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
    request: web::Json<UpdateCompanySettingsRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SettingsManage).await?;
    let settings = settings_service.update(user_id, request.into_inner()).await?;
    Ok(ApiResponse::ok(settings))
}

/// 请求体为图片原始字节（image/png、image/jpeg、image/webp）
#[utoipa::path(
    put,
    path = "/settings/logo",
    tag = "settings",
    request_body(content = Vec<u8>, content_type = "application/octet-stream"),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logo 已替换", body = CompanySettingsResponse),
        (status = 400, description = "格式不支持或超过大小限制")
    )
)]
pub async fn upload_logo(
    access: web::Data<AccessService>,
    settings_service: web::Data<SettingsService>,
    req: HttpRequest,
    body: web::Bytes,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SettingsManage).await?;
    let settings = settings_service.upload_logo(user_id, &body).await?;
    Ok(ApiResponse::ok(settings))
}

pub fn settings_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/settings")
            .route("", web::get().to(get_settings))
            .route("", web::put().to(update_settings))
            .route("/logo", web::put().to(upload_logo)),
    );
}
