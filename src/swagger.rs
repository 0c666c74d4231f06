use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{
    CashMovementKind, CashSessionStatus, PaymentMethod, ServiceOrderStatus, SolicitudStatus,
};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login,
        handlers::auth::refresh,
        handlers::auth::me,
        handlers::user::list_users,
        handlers::user::get_user,
        handlers::user::create_user,
        handlers::user::update_user,
        handlers::user::change_password,
        handlers::user::list_roles,
        handlers::user::create_role,
        handlers::user::update_role,
        handlers::user::delete_role,
        handlers::user::list_permissions,
        handlers::settings::get_settings,
        handlers::settings::update_settings,
        handlers::settings::upload_logo,
        handlers::catalog::list_clients,
        handlers::catalog::get_client,
        handlers::catalog::create_client,
        handlers::catalog::update_client,
        handlers::catalog::delete_client,
        handlers::catalog::list_categories,
        handlers::catalog::create_category,
        handlers::catalog::update_category,
        handlers::catalog::delete_category,
        handlers::catalog::list_items,
        handlers::catalog::get_item,
        handlers::catalog::create_item,
        handlers::catalog::update_item,
        handlers::catalog::delete_item,
        handlers::solicitud::list_solicitudes,
        handlers::solicitud::create_solicitud,
        handlers::solicitud::get_solicitud,
        handlers::solicitud::authorize_solicitud,
        handlers::solicitud::reject_solicitud,
        handlers::solicitud::convert_solicitud,
        handlers::service_order::list_orders,
        handlers::service_order::create_order,
        handlers::service_order::get_order,
        handlers::service_order::add_order_line,
        handlers::service_order::remove_order_line,
        handlers::service_order::update_order_status,
        handlers::service_order::create_payment,
        handlers::service_order::list_payments,
        handlers::service_order::deliver_order,
        handlers::service_order::list_deliveries,
        handlers::cash::list_registers,
        handlers::cash::create_register,
        handlers::cash::update_register,
        handlers::cash::open_session,
        handlers::cash::current_session,
        handlers::cash::record_movement,
        handlers::cash::record_expense,
        handlers::cash::close_session,
        handlers::cash::list_sessions,
        handlers::cash::session_detail,
        handlers::cash::list_discrepancies,
        handlers::cash::issue_daily_key,
        handlers::cash::current_daily_key,
        handlers::audit::list_audit_logs,
    ),
    components(
        schemas(
            ApiError,
            PaginationInfo,
            Permission,
            PermissionInfo,
            LoginRequest,
            RefreshTokenRequest,
            AuthResponse,
            CurrentUserResponse,
            CreateUserRequest,
            UpdateUserRequest,
            ChangePasswordRequest,
            UserResponse,
            RoleRequest,
            RoleResponse,
            CompanySettingsResponse,
            UpdateCompanySettingsRequest,
            ClientRequest,
            UpdateClientRequest,
            ClientResponse,
            CategoryRequest,
            CategoryResponse,
            ItemRequest,
            UpdateItemRequest,
            ItemResponse,
            SolicitudStatus,
            CreateSolicitudRequest,
            ReviewSolicitudRequest,
            SolicitudResponse,
            ServiceOrderStatus,
            OrderLineRequest,
            CreateServiceOrderRequest,
            UpdateOrderStatusRequest,
            OrderLineResponse,
            ServiceOrderResponse,
            PaymentMethod,
            CreatePaymentRequest,
            PaymentResponse,
            CreateDeliveryRequest,
            DeliveryResponse,
            CashRegisterRequest,
            UpdateCashRegisterRequest,
            CashRegisterResponse,
            CashSessionStatus,
            OpenSessionRequest,
            CashSessionResponse,
            CashMovementKind,
            CashMovementRequest,
            CashMovementResponse,
            CashExpenseRequest,
            CashExpenseResponse,
            CloseAuthorization,
            CloseSessionRequest,
            CloseSessionResponse,
            CashDiscrepancyResponse,
            CashSessionDetailResponse,
            DailyKeyResponse,
            AuditLogResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Authentication API"),
        (name = "user", description = "User management API"),
        (name = "role", description = "Roles and permissions API"),
        (name = "settings", description = "Company settings API"),
        (name = "catalog", description = "Clients, categories and items API"),
        (name = "solicitud", description = "Service request API"),
        (name = "order", description = "Service order API"),
        (name = "payment", description = "Order payment API"),
        (name = "delivery", description = "Order delivery API"),
        (name = "cash", description = "Cash register and session API"),
        (name = "audit", description = "Audit log API"),
    ),
    info(
        title = "Ordinex Backend API",
        version = "1.0.0",
        description = "Ordinex service order and cash register REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_cash_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/cash/sessions/current/close"));
        assert!(paths.contains_key("/cash/daily-key"));
        assert!(paths.contains_key("/orders/{id}/items/{item_id}"));
        assert!(doc.components.is_some());
    }
}
