use rand::Rng;

const DAILY_KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const DAILY_KEY_LEN: usize = 6;

/// 生成 6 位大写字母数字授权码（每日密钥）
pub fn generate_daily_key() -> String {
    let mut rng = rand::thread_rng();
    (0..DAILY_KEY_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..DAILY_KEY_CHARSET.len());
            DAILY_KEY_CHARSET[idx] as char
        })
        .collect()
}

/// 规范化用户输入的授权码：去空白并转大写
pub fn normalize_daily_key(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

pub fn is_daily_key_format(code: &str) -> bool {
    code.len() == DAILY_KEY_LEN && code.bytes().all(|b| DAILY_KEY_CHARSET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_daily_key() {
        let code = generate_daily_key();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        assert!(is_daily_key_format(&code));
    }

    #[test]
    fn test_normalize_daily_key() {
        assert_eq!(normalize_daily_key("  ab12cd "), "AB12CD");
        assert!(is_daily_key_format(&normalize_daily_key("ab12cd")));
    }

    #[test]
    fn test_is_daily_key_format_rejects_bad_input() {
        assert!(!is_daily_key_format("ABC12"));
        assert!(!is_daily_key_format("ABC1234"));
        assert!(!is_daily_key_format("abc123"));
        assert!(!is_daily_key_format("AB-123"));
    }
}
