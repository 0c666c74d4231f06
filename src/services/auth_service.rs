use crate::entities::{role_entity as roles, user_entity as users};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::access_service::{load_active_user, permissions_of_role};
use crate::services::audit_service::record_audit;
use crate::utils::{JwtService, verify_password};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::json;

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
}

impl AuthService {
    pub fn new(pool: DbPool, jwt_service: JwtService) -> Self {
        Self { pool, jwt_service }
    }

    fn issue_tokens(&self, user: users::Model) -> AppResult<AuthResponse> {
        let access_token = self.jwt_service.generate_access_token(user.id, &user.username)?;
        let refresh_token = self.jwt_service.generate_refresh_token(user.id, &user.username)?;
        Ok(AuthResponse {
            user: UserResponse::from(user),
            access_token,
            refresh_token,
            expires_in: self.jwt_service.get_access_token_expires_in(),
        })
    }

    pub async fn login(&self, req: LoginRequest) -> AppResult<AuthResponse> {
        let username = req.username.trim().to_lowercase();
        if username.is_empty() || req.password.is_empty() {
            return Err(AppError::ValidationError(
                "Username and password are required".to_string(),
            ));
        }

        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username.clone()))
            .one(self.pool.as_ref())
            .await?;

        // 用户不存在与密码错误返回同一提示
        let user = match user {
            Some(u) if verify_password(&req.password, &u.password_hash)? => u,
            _ => {
                log::warn!("Failed login for '{username}'");
                return Err(AppError::AuthError("Invalid username or password".to_string()));
            }
        };
        if !user.is_active {
            log::warn!("Login attempt by disabled user '{username}'");
            return Err(AppError::AuthError("User is disabled".to_string()));
        }

        record_audit(self.pool.as_ref(), Some(user.id), "auth.login", "user", Some(user.id), json!({})).await?;
        log::info!("User {} logged in", user.username);
        self.issue_tokens(user)
    }

    pub async fn refresh(&self, req: RefreshTokenRequest) -> AppResult<AuthResponse> {
        let claims = self.jwt_service.verify_refresh_token(&req.refresh_token)?;
        let user = load_active_user(self.pool.as_ref(), claims.user_id()?).await?;
        self.issue_tokens(user)
    }

    pub async fn me(&self, user_id: i64) -> AppResult<CurrentUserResponse> {
        let user = load_active_user(self.pool.as_ref(), user_id).await?;
        let role = roles::Entity::find_by_id(user.role_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
        let permissions = permissions_of_role(self.pool.as_ref(), role.id).await?;
        Ok(CurrentUserResponse {
            user: UserResponse::from(user),
            role: role.name,
            permissions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash_password;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn jwt() -> JwtService {
        JwtService::new("test-secret", 3600, 86400)
    }

    fn user(active: bool) -> users::Model {
        users::Model {
            id: 11,
            username: "cajero1".to_string(),
            full_name: "Cajero Uno".to_string(),
            email: None,
            password_hash: hash_password("Password123").unwrap(),
            role_id: 2,
            is_active: active,
            created_at: None,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_login_issues_access_and_refresh_tokens() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(true)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 1,
                rows_affected: 1,
            }])
            .into_connection();
        let svc = AuthService::new(DbPool::new(db), jwt());

        let resp = svc
            .login(LoginRequest {
                username: " Cajero1 ".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(resp.user.id, 11);
        assert_eq!(resp.expires_in, 3600);
        let claims = jwt().verify_access_token(&resp.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 11);
        assert!(jwt().verify_refresh_token(&resp.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn test_login_with_wrong_password_fails() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(true)]])
            .into_connection();
        let svc = AuthService::new(DbPool::new(db), jwt());
        let err = svc
            .login(LoginRequest {
                username: "cajero1".to_string(),
                password: "Wrong12345".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(msg) if msg == "Invalid username or password"));
    }

    #[tokio::test]
    async fn test_disabled_user_cannot_login() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(false)]])
            .into_connection();
        let svc = AuthService::new(DbPool::new(db), jwt());
        let err = svc
            .login(LoginRequest {
                username: "cajero1".to_string(),
                password: "Password123".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(msg) if msg == "User is disabled"));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = AuthService::new(DbPool::new(db), jwt());
        let access = jwt().generate_access_token(11, "cajero1").unwrap();
        let err = svc
            .refresh(RefreshTokenRequest { refresh_token: access })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }
}
