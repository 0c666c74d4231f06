pub mod audit;
pub mod auth;
pub mod cash;
pub mod catalog;
pub mod service_order;
pub mod settings;
pub mod solicitud;
pub mod user;

pub use audit::audit_config;
pub use auth::auth_config;
pub use cash::cash_config;
pub use catalog::catalog_config;
pub use service_order::order_config;
pub use settings::settings_config;
pub use solicitud::solicitud_config;
pub use user::user_config;
