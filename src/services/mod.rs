pub mod access_service;
pub mod audit_service;
pub mod auth_service;
pub mod cash_register_service;
pub mod catalog_service;
pub mod daily_key_service;
pub mod delivery_service;
pub mod payment_service;
pub mod service_order_service;
pub mod settings_service;
pub mod solicitud_service;
pub mod user_service;

pub use access_service::AccessService;
pub use audit_service::AuditService;
pub use auth_service::AuthService;
pub use cash_register_service::CashRegisterService;
pub use catalog_service::CatalogService;
pub use daily_key_service::DailyKeyService;
pub use delivery_service::DeliveryService;
pub use payment_service::PaymentService;
pub use service_order_service::ServiceOrderService;
pub use settings_service::SettingsService;
pub use solicitud_service::SolicitudService;
pub use user_service::UserService;
