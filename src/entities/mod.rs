pub mod audit_logs;
pub mod cash_discrepancies;
pub mod cash_expenses;
pub mod cash_movements;
pub mod cash_registers;
pub mod cash_sessions;
pub mod categories;
pub mod clients;
pub mod company_settings;
pub mod daily_keys;
pub mod deliveries;
pub mod items;
pub mod payments;
pub mod role_permissions;
pub mod roles;
pub mod service_order_items;
pub mod service_orders;
pub mod solicitudes;
pub mod users;

pub use audit_logs as audit_log_entity;
pub use cash_discrepancies as cash_discrepancy_entity;
pub use cash_expenses as cash_expense_entity;
pub use cash_movements as cash_movement_entity;
pub use cash_registers as cash_register_entity;
pub use cash_sessions as cash_session_entity;
pub use categories as category_entity;
pub use clients as client_entity;
pub use company_settings as company_settings_entity;
pub use daily_keys as daily_key_entity;
pub use deliveries as delivery_entity;
pub use items as item_entity;
pub use payments as payment_entity;
pub use role_permissions as role_permission_entity;
pub use roles as role_entity;
pub use service_order_items as service_order_item_entity;
pub use service_orders as service_order_entity;
pub use solicitudes as solicitud_entity;
pub use users as user_entity;

pub use cash_movements::CashMovementKind;
pub use cash_sessions::CashSessionStatus;
pub use payments::PaymentMethod;
pub use service_orders::ServiceOrderStatus;
pub use solicitudes::SolicitudStatus;
