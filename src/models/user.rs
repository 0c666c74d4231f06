use crate::entities::{role_entity as roles, user_entity as users};
use crate::models::Permission;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    #[schema(example = "mlopez")]
    pub username: String,
    #[schema(example = "María López")]
    pub full_name: String,
    #[schema(example = "mlopez@ordinex.mx")]
    pub email: Option<String>,
    #[schema(example = "Password123")]
    pub password: String,
    pub role_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// 修改本人密码时必填；管理员重置他人密码时忽略
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub role_id: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub role_id: i64,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<users::Model> for UserResponse {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            full_name: u.full_name,
            email: u.email,
            role_id: u.role_id,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleRequest {
    #[schema(example = "cajero")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = json!(["cash.operate", "payments.create"]))]
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<Permission>,
    pub created_at: Option<DateTime<Utc>>,
}

impl RoleResponse {
    pub fn new(role: roles::Model, permissions: Vec<Permission>) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            permissions,
            created_at: role.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionInfo {
    pub key: Permission,
    pub description: String,
}
