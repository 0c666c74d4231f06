pub mod audit;
pub mod auth;
pub mod cash;
pub mod catalog;
pub mod common;
pub mod delivery;
pub mod pagination;
pub mod payment;
pub mod permission;
pub mod service_order;
pub mod settings;
pub mod solicitud;
pub mod user;

pub use audit::*;
pub use auth::*;
pub use cash::*;
pub use catalog::*;
pub use common::*;
pub use delivery::*;
pub use pagination::*;
pub use payment::*;
pub use permission::*;
pub use service_order::*;
pub use settings::*;
pub use solicitud::*;
pub use user::*;
