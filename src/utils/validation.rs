use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});

// 税号：字母数字，可含连字符，10-20 位
static TAX_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9&Ññ\-]{10,20}$").expect("valid tax id regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9 ()\-]{7,20}$").expect("valid phone regex"));

static SKU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-.]{1,64}$").expect("valid sku regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9._\-]{2,31}$").expect("valid username regex"));

/// 必填文本：去掉首尾空白后长度需在 [min, max] 内，返回去空白后的值
pub fn require_text(field: &str, value: &str, min: usize, max: usize) -> AppResult<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min || len > max {
        return Err(AppError::ValidationError(format!(
            "{field} length must be between {min} and {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// 可选文本：空串视为 None
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> AppResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(AppError::ValidationError(format!(
            "{field} must be at most {max} characters"
        ))),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// 用户名：小写字母数字开头，3-32 位
pub fn validate_username(username: &str) -> AppResult<()> {
    if !USERNAME_RE.is_match(username) {
        return Err(AppError::ValidationError(
            "Username must be 3-32 lowercase letters, digits, '.', '_' or '-'".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> AppResult<()> {
    if !EMAIL_RE.is_match(email) {
        return Err(AppError::ValidationError("Invalid email address".to_string()));
    }
    Ok(())
}

pub fn validate_tax_id(tax_id: &str) -> AppResult<()> {
    if !TAX_ID_RE.is_match(tax_id) {
        return Err(AppError::ValidationError("Invalid tax id".to_string()));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> AppResult<()> {
    if !PHONE_RE.is_match(phone) {
        return Err(AppError::ValidationError("Invalid phone number".to_string()));
    }
    Ok(())
}

pub fn validate_sku(sku: &str) -> AppResult<()> {
    if !SKU_RE.is_match(sku) {
        return Err(AppError::ValidationError(
            "SKU may only contain letters, digits, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

/// 单笔金额上限（分），一千万元
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000;

fn require_amount_cap(field: &str, amount: i64) -> AppResult<()> {
    if amount > MAX_AMOUNT_CENTS {
        return Err(AppError::ValidationError(format!(
            "{field} must not exceed {MAX_AMOUNT_CENTS}"
        )));
    }
    Ok(())
}

/// 金额必须为正（分）
pub fn require_positive_amount(field: &str, amount: i64) -> AppResult<()> {
    if amount <= 0 {
        return Err(AppError::ValidationError(format!(
            "{field} must be greater than zero"
        )));
    }
    require_amount_cap(field, amount)
}

pub fn require_non_negative_amount(field: &str, amount: i64) -> AppResult<()> {
    if amount < 0 {
        return Err(AppError::ValidationError(format!(
            "{field} must not be negative"
        )));
    }
    require_amount_cap(field, amount)
}

/// 金额累加，溢出时返回校验错误
pub fn money_add(a: i64, b: i64) -> AppResult<i64> {
    a.checked_add(b)
        .ok_or_else(|| AppError::ValidationError("Amount is out of range".to_string()))
}

pub fn money_sub(a: i64, b: i64) -> AppResult<i64> {
    a.checked_sub(b)
        .ok_or_else(|| AppError::ValidationError("Amount is out of range".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims_and_bounds() {
        assert_eq!(require_text("name", "  Acme  ", 2, 10).unwrap(), "Acme");
        assert!(require_text("name", " a ", 2, 10).is_err());
        assert!(require_text("name", "abcdefghijk", 2, 10).is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text("notes", None, 5).unwrap(), None);
        assert_eq!(optional_text("notes", Some("   "), 5).unwrap(), None);
        assert_eq!(
            optional_text("notes", Some(" hi "), 5).unwrap(),
            Some("hi".to_string())
        );
        assert!(optional_text("notes", Some("too long"), 5).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("mlopez").is_ok());
        assert!(validate_username("caja.01").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("MLopez").is_err());
        assert!(validate_username("-admin").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ventas@ordinex.mx").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_tax_id() {
        assert!(validate_tax_id("XAXX010101000").is_ok());
        assert!(validate_tax_id("short").is_err());
        assert!(validate_tax_id("BAD TAX ID 123").is_err());
    }

    #[test]
    fn test_validate_phone_and_sku() {
        assert!(validate_phone("+52 (55) 1234-5678").is_ok());
        assert!(validate_phone("12ab").is_err());
        assert!(validate_sku("SRV-001.A").is_ok());
        assert!(validate_sku("has space").is_err());
    }

    #[test]
    fn test_amount_rules() {
        assert!(require_positive_amount("amount", 1).is_ok());
        assert!(require_positive_amount("amount", 0).is_err());
        assert!(require_non_negative_amount("amount", 0).is_ok());
        assert!(require_non_negative_amount("amount", -1).is_err());
        assert!(require_non_negative_amount("opening_amount", MAX_AMOUNT_CENTS).is_ok());
        assert!(require_non_negative_amount("opening_amount", i64::MAX).is_err());
        assert!(require_positive_amount("amount", MAX_AMOUNT_CENTS + 1).is_err());
    }

    #[test]
    fn test_money_arithmetic_reports_overflow() {
        assert_eq!(money_add(1_500, 250).unwrap(), 1_750);
        assert_eq!(money_sub(1_500, 2_000).unwrap(), -500);
        assert!(matches!(money_add(i64::MAX, 1), Err(AppError::ValidationError(_))));
        assert!(matches!(money_sub(i64::MIN, 1), Err(AppError::ValidationError(_))));
    }
}
