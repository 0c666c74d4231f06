use crate::error::{AppError, AppResult};
use crate::utils::JwtService;
use actix_web::http::Method;
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};

/// 通过认证的调用者，存放在请求扩展中
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

// 公开路径配置
struct PublicPaths {
    exact_paths: Vec<&'static str>,
    prefix_paths: Vec<&'static str>,
}

impl PublicPaths {
    fn new() -> Self {
        Self {
            // 完全匹配的公开路径
            exact_paths: vec![
                "/api/v1/auth/login",
                "/api/v1/auth/refresh",
                "/swagger-ui",
                "/api-docs/openapi.json",
            ],
            // 前缀匹配的公开路径
            prefix_paths: vec!["/swagger-ui/", "/api-docs/"],
        }
    }

    fn is_public_path(&self, path: &str) -> bool {
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);
        if self.exact_paths.contains(&path) {
            return true;
        }
        self.prefix_paths
            .iter()
            .any(|&prefix| path.starts_with(prefix))
    }
}

pub struct AuthMiddleware {
    jwt_service: JwtService,
}

impl AuthMiddleware {
    pub fn new(jwt_service: JwtService) -> Self {
        Self { jwt_service }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service,
            jwt_service: self.jwt_service.clone(),
            public_paths: PublicPaths::new(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
    jwt_service: JwtService,
    public_paths: PublicPaths,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // 预检请求与公开路径直接放行
        if req.method() == Method::OPTIONS || self.public_paths.is_public_path(req.path()) {
            return Box::pin(self.service.call(req));
        }

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);

        let Some(token) = token else {
            let error = AppError::AuthError("Missing access token".to_string());
            return Box::pin(async move { Err(error.into()) });
        };

        let user = self
            .jwt_service
            .verify_access_token(token)
            .and_then(|claims| {
                Ok(CurrentUser {
                    id: claims.user_id()?,
                    username: claims.username,
                })
            });

        match user {
            Ok(user) => {
                req.extensions_mut().insert(user);
                Box::pin(self.service.call(req))
            }
            Err(e) => {
                log::debug!("Rejected token on {}: {e}", req.path());
                let error = AppError::AuthError("Invalid access token".to_string());
                Box::pin(async move { Err(error.into()) })
            }
        }
    }
}

/// 获取当前用户ID；未经过认证中间件时返回 401
pub fn current_user_id(req: &HttpRequest) -> AppResult<i64> {
    req.extensions()
        .get::<CurrentUser>()
        .map(|u| u.id)
        .ok_or_else(|| AppError::AuthError("Not authenticated".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};

    #[::core::prelude::v1::test]
    fn test_public_paths() {
        let paths = PublicPaths::new();
        assert!(paths.is_public_path("/api/v1/auth/login"));
        assert!(paths.is_public_path("/api/v1/auth/refresh"));
        assert!(paths.is_public_path("/swagger-ui/"));
        assert!(paths.is_public_path("/swagger-ui/index.html"));
        assert!(paths.is_public_path("/api-docs/openapi.json"));

        assert!(!paths.is_public_path("/api/v1/auth/me"));
        assert!(!paths.is_public_path("/api/v1/cash/sessions/current"));
        assert!(!paths.is_public_path("/api/v1/auth/login-as"));
    }

    async fn whoami(req: HttpRequest) -> AppResult<HttpResponse> {
        let id = current_user_id(&req)?;
        Ok(HttpResponse::Ok().body(id.to_string()))
    }

    #[actix_web::test]
    async fn test_bearer_token_populates_current_user() {
        let jwt = JwtService::new("test-secret", 3600, 86400);
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .route("/api/v1/whoami", web::get().to(whoami)),
        )
        .await;

        let token = jwt.generate_access_token(42, "supervisor").unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "42");
    }

    #[actix_web::test]
    async fn test_refresh_token_is_not_accepted_as_access_token() {
        let jwt = JwtService::new("test-secret", 3600, 86400);
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(jwt.clone()))
                .route("/api/v1/whoami", web::get().to(whoami)),
        )
        .await;

        let token = jwt.generate_refresh_token(42, "supervisor").unwrap();
        let req = test::TestRequest::get()
            .uri("/api/v1/whoami")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let err = test::try_call_service(&app, req).await.unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
