pub mod code_generator;
pub mod jwt;
pub mod password;
pub mod validation;

pub use code_generator::{DAILY_KEY_LEN, generate_daily_key, is_daily_key_format, normalize_daily_key};
pub use jwt::*;
pub use password::*;
pub use validation::*;
