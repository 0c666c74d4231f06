use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, SolicitudService};
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    get,
    path = "/solicitudes",
    tag = "solicitud",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "pending / authorized / rejected / converted"),
        ("client_id" = Option<i64>, Query, description = "客户")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "申请单列表"))
)]
pub async fn list_solicitudes(
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    query: web::Query<SolicitudQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(solicitud_service.list(&query).await?))
}

#[utoipa::path(
    post,
    path = "/solicitudes",
    tag = "solicitud",
    request_body = CreateSolicitudRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "申请单已创建", body = SolicitudResponse),
        (status = 400, description = "客户无效或描述为空")
    )
)]
pub async fn create_solicitud(
    access: web::Data<AccessService>,
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    request: web::Json<CreateSolicitudRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SolicitudesCreate).await?;
    let solicitud = solicitud_service.create(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(solicitud))
}

#[utoipa::path(
    get,
    path = "/solicitudes/{id}",
    tag = "solicitud",
    params(("id" = i64, Path, description = "申请单ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "申请单详情", body = SolicitudResponse),
        (status = 404, description = "申请单不存在")
    )
)]
pub async fn get_solicitud(
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(solicitud_service.get(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/solicitudes/{id}/authorize",
    tag = "solicitud",
    params(("id" = i64, Path, description = "申请单ID")),
    request_body = ReviewSolicitudRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "已授权", body = SolicitudResponse),
        (status = 409, description = "当前状态不允许授权")
    )
)]
pub async fn authorize_solicitud(
    access: web::Data<AccessService>,
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ReviewSolicitudRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SolicitudesReview).await?;
    let solicitud = solicitud_service
        .authorize(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(solicitud))
}

#[utoipa::path(
    post,
    path = "/solicitudes/{id}/reject",
    tag = "solicitud",
    params(("id" = i64, Path, description = "申请单ID")),
    request_body = ReviewSolicitudRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "已驳回", body = SolicitudResponse),
        (status = 400, description = "缺少驳回说明"),
        (status = 409, description = "当前状态不允许驳回")
    )
)]
pub async fn reject_solicitud(
    access: web::Data<AccessService>,
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ReviewSolicitudRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SolicitudesReview).await?;
    let solicitud = solicitud_service
        .reject(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(solicitud))
}

#[utoipa::path(
    post,
    path = "/solicitudes/{id}/convert",
    tag = "solicitud",
    params(("id" = i64, Path, description = "申请单ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "已转为服务单", body = ServiceOrderResponse),
        (status = 409, description = "只有已授权的申请单可以转换")
    )
)]
pub async fn convert_solicitud(
    access: web::Data<AccessService>,
    solicitud_service: web::Data<SolicitudService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::SolicitudesReview).await?;
    let order = solicitud_service.convert(user_id, path.into_inner()).await?;
    Ok(ApiResponse::created(order))
}

pub fn solicitud_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/solicitudes")
            .route("", web::get().to(list_solicitudes))
            .route("", web::post().to(create_solicitud))
            .route("/{id}", web::get().to(get_solicitud))
            .route("/{id}/authorize", web::post().to(authorize_solicitud))
            .route("/{id}/reject", web::post().to(reject_solicitud))
            .route("/{id}/convert", web::post().to(convert_solicitud)),
    );
}
