use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, CatalogService};
use actix_web::{HttpRequest, HttpResponse, web};

// ---------- 客户 ----------

#[utoipa::path(
    get,
    path = "/clients",
    tag = "catalog",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("search" = Option<String>, Query, description = "名称 / 税号"),
        ("is_active" = Option<bool>, Query, description = "是否启用")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "客户列表"))
)]
pub async fn list_clients(
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    query: web::Query<ClientQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(catalog.list_clients(&query).await?))
}

#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "客户ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "客户详情", body = ClientResponse),
        (status = 404, description = "客户不存在")
    )
)]
pub async fn get_client(
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(catalog.get_client(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/clients",
    tag = "catalog",
    request_body = ClientRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "客户已创建", body = ClientResponse),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn create_client(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<ClientRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    Ok(ApiResponse::created(catalog.create_client(user_id, request.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/clients/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "客户ID")),
    request_body = UpdateClientRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "客户已更新", body = ClientResponse),
        (status = 404, description = "客户不存在")
    )
)]
pub async fn update_client(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateClientRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    let client = catalog
        .update_client(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(client))
}

#[utoipa::path(
    delete,
    path = "/clients/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "客户ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "客户已删除"),
        (status = 409, description = "客户已有单据，只能停用")
    )
)]
pub async fn delete_client(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    catalog.delete_client(user_id, path.into_inner()).await?;
    Ok(ApiResponse::<()>::message("Client deleted"))
}

// ---------- 分类 ----------

#[utoipa::path(
    get,
    path = "/categories",
    tag = "catalog",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "分类列表", body = [CategoryResponse]))
)]
pub async fn list_categories(
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(catalog.list_categories().await?))
}

#[utoipa::path(
    post,
    path = "/categories",
    tag = "catalog",
    request_body = CategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "分类已创建", body = CategoryResponse),
        (status = 409, description = "分类名已存在")
    )
)]
pub async fn create_category(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<CategoryRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    Ok(ApiResponse::created(catalog.create_category(user_id, request.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "分类ID")),
    request_body = CategoryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "分类已更新", body = CategoryResponse),
        (status = 404, description = "分类不存在")
    )
)]
pub async fn update_category(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CategoryRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    let category = catalog
        .update_category(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(category))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "分类ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "分类已删除"),
        (status = 409, description = "分类下仍有商品")
    )
)]
pub async fn delete_category(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    catalog.delete_category(user_id, path.into_inner()).await?;
    Ok(ApiResponse::<()>::message("Category deleted"))
}

// ---------- 商品 ----------

#[utoipa::path(
    get,
    path = "/items",
    tag = "catalog",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("category_id" = Option<i64>, Query, description = "分类"),
        ("search" = Option<String>, Query, description = "名称 / SKU"),
        ("is_active" = Option<bool>, Query, description = "是否启用")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "商品列表"))
)]
pub async fn list_items(
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    query: web::Query<ItemQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(catalog.list_items(&query).await?))
}

#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "商品ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "商品详情", body = ItemResponse),
        (status = 404, description = "商品不存在")
    )
)]
pub async fn get_item(
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(catalog.get_item(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/items",
    tag = "catalog",
    request_body = ItemRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "商品已创建", body = ItemResponse),
        (status = 409, description = "SKU 已存在")
    )
)]
pub async fn create_item(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    request: web::Json<ItemRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    Ok(ApiResponse::created(catalog.create_item(user_id, request.into_inner()).await?))
}

#[utoipa::path(
    put,
    path = "/items/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "商品ID")),
    request_body = UpdateItemRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "商品已更新", body = ItemResponse),
        (status = 404, description = "商品不存在"),
        (status = 409, description = "SKU 已存在")
    )
)]
pub async fn update_item(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateItemRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    let item = catalog
        .update_item(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(item))
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "catalog",
    params(("id" = i64, Path, description = "商品ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "商品已删除"),
        (status = 409, description = "商品已被订单引用，只能停用")
    )
)]
pub async fn delete_item(
    access: web::Data<AccessService>,
    catalog: web::Data<CatalogService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::CatalogManage).await?;
    catalog.delete_item(user_id, path.into_inner()).await?;
    Ok(ApiResponse::<()>::message("Item deleted"))
}

pub fn catalog_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/clients")
            .route("", web::get().to(list_clients))
            .route("", web::post().to(create_client))
            .route("/{id}", web::get().to(get_client))
            .route("/{id}", web::put().to(update_client))
            .route("/{id}", web::delete().to(delete_client)),
    )
    .service(
        web::scope("/categories")
            .route("", web::get().to(list_categories))
            .route("", web::post().to(create_category))
            .route("/{id}", web::put().to(update_category))
            .route("/{id}", web::delete().to(delete_category)),
    )
    .service(
        web::scope("/items")
            .route("", web::get().to(list_items))
            .route("", web::post().to(create_item))
            .route("/{id}", web::get().to(get_item))
            .route("/{id}", web::put().to(update_item))
            .route("/{id}", web::delete().to(delete_item)),
    );
}
