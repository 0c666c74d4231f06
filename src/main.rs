use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter

use ordinex_backend::{
    AppError,
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::{AuthMiddleware, create_cors},
    services::*,
    swagger::swagger_config,
    utils::JwtService,
};

// 原始字节上传时在 Logo 限制之外预留的余量，超限由服务层给出 400
const PAYLOAD_MARGIN_BYTES: usize = 64 * 1024;

fn startup_error(stage: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{stage}: {e}");
    std::io::Error::other(format!("{stage}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config =
        Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    // 创建数据库连接池
    let pool = create_pool(&config.database)
        .await
        .map_err(|e| startup_error("Failed to create database connection pool", e))?;

    // 运行数据库迁移
    run_migrations(&pool)
        .await
        .map_err(|e| startup_error("Failed to run database migrations", e))?;

    // 创建JWT服务
    let jwt_service = JwtService::new(
        &config.jwt.secret,
        config.jwt.access_token_expires_in,
        config.jwt.refresh_token_expires_in,
    );

    // 创建服务
    let access_service = AccessService::new(pool.clone());
    let audit_service = AuditService::new(pool.clone());
    let auth_service = AuthService::new(pool.clone(), jwt_service.clone());
    let user_service = UserService::new(pool.clone());
    let settings_service = SettingsService::new(pool.clone(), config.storage.clone());
    let catalog_service = CatalogService::new(pool.clone());
    let solicitud_service = SolicitudService::new(pool.clone());
    let order_service = ServiceOrderService::new(pool.clone());
    let payment_service = PaymentService::new(pool.clone());
    let delivery_service = DeliveryService::new(pool.clone());
    let cash_service = CashRegisterService::new(pool.clone(), config.cash.tolerance_cents);
    let daily_key_service = DailyKeyService::new(pool.clone());

    // 空库时创建管理员
    user_service
        .ensure_bootstrap_admin(&config.bootstrap)
        .await
        .map_err(|e| startup_error("Failed to bootstrap admin account", e))?;

    let payload_limit = config.storage.max_logo_bytes + PAYLOAD_MARGIN_BYTES;
    let allowed_origins = config.server.allowed_origins.clone();

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&allowed_origins))
            .wrap(AuthMiddleware::new(jwt_service.clone()))
            .app_data(web::PayloadConfig::new(payload_limit))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                AppError::ValidationError(err.to_string()).into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                AppError::ValidationError(err.to_string()).into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _req| {
                AppError::ValidationError(err.to_string()).into()
            }))
            .app_data(web::Data::new(access_service.clone()))
            .app_data(web::Data::new(audit_service.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .app_data(web::Data::new(user_service.clone()))
            .app_data(web::Data::new(settings_service.clone()))
            .app_data(web::Data::new(catalog_service.clone()))
            .app_data(web::Data::new(solicitud_service.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(payment_service.clone()))
            .app_data(web::Data::new(delivery_service.clone()))
            .app_data(web::Data::new(cash_service.clone()))
            .app_data(web::Data::new(daily_key_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::auth_config)
                    .configure(handlers::user_config)
                    .configure(handlers::settings_config)
                    .configure(handlers::catalog_config)
                    .configure(handlers::solicitud_config)
                    .configure(handlers::order_config)
                    .configure(handlers::cash_config)
                    .configure(handlers::audit_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
