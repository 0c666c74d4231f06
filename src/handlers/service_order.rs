use crate::error::AppResult;
use crate::middlewares::current_user_id;
use crate::models::*;
use crate::services::{AccessService, DeliveryService, PaymentService, ServiceOrderService};
use actix_web::{HttpRequest, HttpResponse, web};

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "pending / in_progress / completed / delivered / cancelled"),
        ("client_id" = Option<i64>, Query, description = "客户")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "服务单列表"))
)]
pub async fn list_orders(
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    query: web::Query<ServiceOrderQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(order_service.list(&query).await?))
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "order",
    request_body = CreateServiceOrderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "服务单已创建", body = ServiceOrderResponse),
        (status = 400, description = "客户或商品无效")
    )
)]
pub async fn create_order(
    access: web::Data<AccessService>,
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    request: web::Json<CreateServiceOrderRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::OrdersManage).await?;
    let order = order_service.create(user_id, request.into_inner()).await?;
    Ok(ApiResponse::created(order))
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(("id" = i64, Path, description = "服务单ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "服务单详情（含明细）", body = ServiceOrderResponse),
        (status = 404, description = "服务单不存在")
    )
)]
pub async fn get_order(
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(order_service.get(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/items",
    tag = "order",
    params(("id" = i64, Path, description = "服务单ID")),
    request_body = OrderLineRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "明细已添加", body = ServiceOrderResponse),
        (status = 409, description = "服务单已不可编辑")
    )
)]
pub async fn add_order_line(
    access: web::Data<AccessService>,
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<OrderLineRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::OrdersManage).await?;
    let order = order_service
        .add_line(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(order))
}

#[utoipa::path(
    delete,
    path = "/orders/{id}/items/{item_id}",
    tag = "order",
    params(
        ("id" = i64, Path, description = "服务单ID"),
        ("item_id" = i64, Path, description = "明细ID")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "明细已删除", body = ServiceOrderResponse),
        (status = 409, description = "服务单已不可编辑，或删除后总额低于已付金额")
    )
)]
pub async fn remove_order_line(
    access: web::Data<AccessService>,
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::OrdersManage).await?;
    let (order_id, line_id) = path.into_inner();
    let order = order_service.remove_line(user_id, order_id, line_id).await?;
    Ok(ApiResponse::ok(order))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/status",
    tag = "order",
    params(("id" = i64, Path, description = "服务单ID")),
    request_body = UpdateOrderStatusRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "状态已更新", body = ServiceOrderResponse),
        (status = 409, description = "不允许的状态变更")
    )
)]
pub async fn update_order_status(
    access: web::Data<AccessService>,
    order_service: web::Data<ServiceOrderService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<UpdateOrderStatusRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::OrdersManage).await?;
    let order = order_service
        .update_status(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::ok(order))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/payments",
    tag = "payment",
    params(("id" = i64, Path, description = "服务单ID")),
    request_body = CreatePaymentRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "收款已登记", body = PaymentResponse),
        (status = 400, description = "金额无效或超过未付余额"),
        (status = 409, description = "服务单状态不允许收款，或现金收款时没有开着的班次")
    )
)]
pub async fn create_payment(
    access: web::Data<AccessService>,
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreatePaymentRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::PaymentsCreate).await?;
    let payment = payment_service
        .record(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::created(payment))
}

#[utoipa::path(
    get,
    path = "/orders/{id}/payments",
    tag = "payment",
    params(("id" = i64, Path, description = "服务单ID")),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "收款记录", body = [PaymentResponse]))
)]
pub async fn list_payments(
    payment_service: web::Data<PaymentService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(payment_service.list_for_order(path.into_inner()).await?))
}

#[utoipa::path(
    post,
    path = "/orders/{id}/delivery",
    tag = "delivery",
    params(("id" = i64, Path, description = "服务单ID")),
    request_body = CreateDeliveryRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "已交付", body = DeliveryResponse),
        (status = 409, description = "服务单未完成或未结清")
    )
)]
pub async fn deliver_order(
    access: web::Data<AccessService>,
    delivery_service: web::Data<DeliveryService>,
    req: HttpRequest,
    path: web::Path<i64>,
    request: web::Json<CreateDeliveryRequest>,
) -> AppResult<HttpResponse> {
    let user_id = current_user_id(&req)?;
    access.require(user_id, Permission::DeliveriesCreate).await?;
    let delivery = delivery_service
        .deliver(user_id, path.into_inner(), request.into_inner())
        .await?;
    Ok(ApiResponse::created(delivery))
}

#[utoipa::path(
    get,
    path = "/deliveries",
    tag = "delivery",
    params(
        ("page" = Option<u32>, Query, description = "页码"),
        ("per_page" = Option<u32>, Query, description = "每页数量"),
        ("from" = Option<String>, Query, description = "开始日期 YYYY-MM-DD"),
        ("to" = Option<String>, Query, description = "结束日期 YYYY-MM-DD")
    ),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "交付记录"))
)]
pub async fn list_deliveries(
    delivery_service: web::Data<DeliveryService>,
    req: HttpRequest,
    query: web::Query<DeliveryQuery>,
) -> AppResult<HttpResponse> {
    current_user_id(&req)?;
    Ok(ApiResponse::ok(delivery_service.list(&query).await?))
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_orders))
            .route("", web::post().to(create_order))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/items", web::post().to(add_order_line))
            .route("/{id}/items/{item_id}", web::delete().to(remove_order_line))
            .route("/{id}/status", web::post().to(update_order_status))
            .route("/{id}/payments", web::post().to(create_payment))
            .route("/{id}/payments", web::get().to(list_payments))
            .route("/{id}/delivery", web::post().to(deliver_order)),
    )
    .route("/deliveries", web::get().to(list_deliveries));
}
