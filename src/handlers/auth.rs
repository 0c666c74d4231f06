use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = AuthResponse),
        (status = 400, description = "请求参数错误"),
        (status = 401, description = "用户名或密码错误")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let resp = auth_service.login(request.into_inner()).await?;
    Ok(ApiResponse::ok(resp))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "刷新令牌成功", body = AuthResponse),
        (status = 401, description = "刷新令牌无效")
    )
)]
pub async fn refresh(
    auth_service: web::Data<AuthService>,
    request: web::Json<RefreshTokenRequest>,
) -> AppResult<HttpResponse> {
    let resp = auth_service.refresh(request.into_inner()).await?;
    Ok(ApiResponse::ok(resp))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "当前用户、角色与权限", body = CurrentUserResponse),
        (status = 401, description = "未授权")
    )
)]
pub async fn me(auth_service: web::Data<AuthService>, req: HttpRequest) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    Ok(ApiResponse::ok(auth_service.me(user_id).await?))
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/refresh", web::post().to(refresh))
            .route("/me", web::get().to(me)),
    );
}
