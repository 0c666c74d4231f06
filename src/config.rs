use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub cash: CashConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 允许跨域的前端地址，留空则不限制
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64,  // seconds
    pub refresh_token_expires_in: i64, // seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashConfig {
    /// 允许的对账差额（分），超过即视为差异
    #[serde(default = "default_tolerance_cents")]
    pub tolerance_cents: i64,
}

fn default_tolerance_cents() -> i64 {
    1
}

impl Default for CashConfig {
    fn default() -> Self {
        Self {
            tolerance_cents: default_tolerance_cents(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_max_logo_bytes")]
    pub max_logo_bytes: usize,
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_max_logo_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_logo_bytes: default_max_logo_bytes(),
        }
    }
}

/// 首次启动时创建的管理员账号
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_password: String,
    #[serde(default)]
    pub business_name: Option<String>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: "admin".to_string(),
            admin_password: "ChangeMe123".to_string(),
            business_name: None,
        }
    }
}

impl Config {
    pub fn from_toml() -> anyhow::Result<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str)
                    .map_err(|e| anyhow::anyhow!("Failed to parse {config_path}: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL").ok_or_else(|| {
                    anyhow::anyhow!("DATABASE_URL is not set and {config_path} was not found")
                })?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                        allowed_origins: Vec::new(),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                        refresh_token_expires_in: get_env_parse(
                            "JWT_REFRESH_EXPIRES_IN",
                            604_800i64,
                        ),
                    },
                    cash: CashConfig::default(),
                    storage: StorageConfig::default(),
                    bootstrap: BootstrapConfig::default(),
                }
            }
            Err(e) => {
                return Err(anyhow::anyhow!("Failed to read {config_path}: {e}"));
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get_env("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Some(v) = get_env("CORS_ALLOWED_ORIGINS") {
            self.server.allowed_origins = split_list(&v);
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get_env("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Some(v) = get_env("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(v) = get_env("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.access_token_expires_in = n;
        }
        if let Some(v) = get_env("JWT_REFRESH_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            self.jwt.refresh_token_expires_in = n;
        }
        if let Some(v) = get_env("CASH_TOLERANCE_CENTS")
            && let Ok(n) = v.parse()
        {
            self.cash.tolerance_cents = n;
        }
        if let Some(v) = get_env("UPLOAD_DIR") {
            self.storage.upload_dir = v;
        }
        if let Some(v) = get_env("MAX_LOGO_BYTES")
            && let Ok(n) = v.parse()
        {
            self.storage.max_logo_bytes = n;
        }
        if let Some(v) = get_env("BOOTSTRAP_ADMIN_USERNAME") {
            self.bootstrap.admin_username = v;
        }
        if let Some(v) = get_env("BOOTSTRAP_ADMIN_PASSWORD") {
            self.bootstrap.admin_password = v;
        }
        if let Some(v) = get_env("BOOTSTRAP_BUSINESS_NAME") {
            self.bootstrap.business_name = Some(v);
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.cash.tolerance_cents < 0 {
            anyhow::bail!("cash.tolerance_cents must not be negative");
        }
        if self.jwt.access_token_expires_in <= 0 || self.jwt.refresh_token_expires_in <= 0 {
            anyhow::bail!("jwt token lifetimes must be positive");
        }
        Ok(())
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_toml_uses_section_defaults() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/ordinex"
            max_connections = 5

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.cash.tolerance_cents, 1);
        assert_eq!(config.storage.upload_dir, "uploads");
        assert_eq!(config.storage.max_logo_bytes, 2 * 1024 * 1024);
        assert_eq!(config.bootstrap.admin_username, "admin");
        assert!(config.server.allowed_origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_tolerance_is_rejected() {
        let raw = r#"
            [server]
            host = "127.0.0.1"
            port = 9000

            [database]
            url = "postgres://localhost/ordinex"
            max_connections = 5

            [jwt]
            secret = "s3cret"
            access_token_expires_in = 3600
            refresh_token_expires_in = 86400

            [cash]
            tolerance_cents = -5
        "#;
        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_origin_list() {
        assert_eq!(
            split_list(" http://localhost:5173, ,https://caja.example.com "),
            vec!["http://localhost:5173", "https://caja.example.com"]
        );
        assert!(split_list("").is_empty());
    }
}
