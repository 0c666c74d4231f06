use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, UserService};
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    get,
    path = "/users",
    tag = "user",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("search" = Option<String>, Query, description = "用户名 / 姓名"),
        ("role_id" = Option<i64>, Query, description = "角色"),
        ("is_active" = Option<bool>, Query, description = "是否启用")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "用户列表"),
        (status = 403, description = "无权限")
    )
)]
pub async fn list_users(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    query: web::Query<UserQuery>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::UsersManage).await?;
    Ok(ApiResponse::ok(user_service.list_users(&query).await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "user",
    params(("id" = i64, Path, description = "用户ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "用户详情", body = UserResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_user(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    let target = path.into_inner();
    if target != user_id {
        access.require(user_id, Permission::UsersManage).await?;
    }
    Ok(ApiResponse::ok(user_service.get_user(target).await?))
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "user",
    request_body = CreateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "用户已创建", body = UserResponse),
        (status = 400, description = "请求参数错误"),
        (status = 409, description = "用户名已存在")
    )
)]
pub async fn create_user(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::UsersManage).await?;
    let user = user_service.create_user(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "user",
    params(("id" = i64, Path, description = "用户ID")),
    request_body = UpdateUserRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "用户已更新", body = UserResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn update_user(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateUserRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::UsersManage).await?;
    let user = user_service
        .update_user(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(user))
}

#[utoipa::path(
    put,
    path = "/users/{id}/password",
    tag = "user",
    params(("id" = i64, Path, description = "用户ID")),
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "密码已修改"),
        (status = 400, description = "旧密码错误或新密码强度不足"),
        (status = 403, description = "无权限")
    )
)]
pub async fn change_password(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    let target = path.into_inner();
    if target != user_id {
        access.require(user_id, Permission::UsersManage).await?;
    }
    user_service
        .change_password(user_id, target, request.into_inner())
        .await?;
    Ok(ApiResponse::<()>::message("Password updated"))
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "role",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "角色列表", body = [RoleResponse]))
)]
pub async fn list_roles(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::RolesManage).await?;
    Ok(ApiResponse::ok(user_service.list_roles().await?))
}

#[utoipa::path(
    post,
    path = "/roles",
    tag = "role",
    request_body = RoleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "角色已创建", body = RoleResponse),
        (status = 400, description = "未知权限键"),
        (status = 409, description = "角色名已存在")
    )
)]
pub async fn create_role(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    request: web::Json<RoleRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::RolesManage).await?;
    let role = user_service.create_role(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(role))
}

#[utoipa::path(
    put,
    path = "/roles/{id}",
    tag = "role",
    params(("id" = i64, Path, description = "角色ID")),
    request_body = RoleRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "角色已更新", body = RoleResponse),
        (status = 404, description = "角色不存在")
    )
)]
pub async fn update_role(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<RoleRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::RolesManage).await?;
    let role = user_service
        .update_role(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(role))
}

#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "role",
    params(("id" = i64, Path, description = "角色ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "角色已删除"),
        (status = 409, description = "角色仍被用户使用")
    )
)]
pub async fn delete_role(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::RolesManage).await?;
    user_service.delete_role(user_id, path.into_inner()).await?;
    Ok(ApiResponse::<()>::message("Role deleted"))
}

#[utoipa::path(
    get,
    path = "/permissions",
    tag = "role",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "全部权限键", body = [PermissionInfo]))
)]
pub async fn list_permissions(
    access: web::Data<AccessService>,
    user_service: web::Data<UserService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::RolesManage).await?;
    Ok(ApiResponse::ok(user_service.list_permissions()))
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("", web::post().to(create_user))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}/password", web::put().to(change_password)),
    )
    .service(
        web::scope("/roles")
            .route("", web::get().to(list_roles))
            .route("", web::post().to(create_role))
            .route("/{id}", web::put().to(update_role))
            .route("/{id}", web::delete().to(delete_role)),
    )
    .route("/permissions", web::get().to(list_permissions));
}
