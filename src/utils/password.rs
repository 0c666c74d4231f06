use bcrypt::{DEFAULT_COST, hash, verify};
use crate::error::{AppError, AppResult};

/// 验证密码强度；密码不得包含用户名
pub fn validate_password(password: &str, username: &str) -> AppResult<()> {
    if password.chars().count() < 8 || password.len() > 72 {
        // bcrypt 只取前 72 字节
        return Err(AppError::ValidationError(
            "Password length must be between 8 characters and 72 bytes".to_string(),
        ));
    }

    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(AppError::ValidationError(
            "Password must contain letters and digits".to_string(),
        ));
    }

    let username = username.trim().to_lowercase();
    if !username.is_empty() && password.to_lowercase().contains(&username) {
        return Err(AppError::ValidationError(
            "Password must not contain the username".to_string(),
        ));
    }

    Ok(())
}

pub fn hash_password(password: &str) -> AppResult<String> {
    hash(password, DEFAULT_COST)
        .map_err(|e| AppError::InternalError(format!("Failed to hash password: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    verify(password, hash)
        .map_err(|e| AppError::InternalError(format!("Failed to verify password: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Caja2025", "cajero1").is_ok());
        assert!(validate_password("contraseña9", "cajero1").is_ok());
        assert!(validate_password("Pass123", "cajero1").is_err()); // 太短
        assert!(validate_password("12345678", "cajero1").is_err()); // 缺少字母
        assert!(validate_password("Password", "cajero1").is_err()); // 缺少数字
        assert!(validate_password(&"a1".repeat(40), "cajero1").is_err()); // 超过 72 字节
    }

    #[test]
    fn test_password_may_not_contain_username() {
        assert!(validate_password("Cajero1-2025", "cajero1").is_err());
        assert!(validate_password("xxADMINxx9", "admin").is_err());
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hashed = hash_password("Caja2025").unwrap();
        assert!(verify_password("Caja2025", &hashed).unwrap());
        assert!(!verify_password("Caja2026", &hashed).unwrap());
    }
}
