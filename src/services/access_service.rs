use crate::entities::{role_permission_entity as role_permissions, user_entity as users};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::Permission;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

/// 权限校验：用户必须处于启用状态，且其角色持有对应权限键
#[derive(Clone)]
pub struct AccessService {
    pool: DbPool,
}

impl AccessService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn require(&self, user_id: i64, permission: Permission) -> AppResult<users::Model> {
        require_permission(self.pool.as_ref(), user_id, permission).await
    }

    pub async fn has(&self, user_id: i64, permission: Permission) -> AppResult<bool> {
        match require_permission(self.pool.as_ref(), user_id, permission).await {
            Ok(_) => Ok(true),
            Err(AppError::PermissionDenied) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

pub async fn load_active_user<C: ConnectionTrait>(conn: &C, user_id: i64) -> AppResult<users::Model> {
    let user = users::Entity::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::AuthError("User not found".to_string()))?;
    if !user.is_active {
        return Err(AppError::AuthError("User is disabled".to_string()));
    }
    Ok(user)
}

pub async fn require_permission<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    permission: Permission,
) -> AppResult<users::Model> {
    let user = load_active_user(conn, user_id).await?;
    let granted = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.eq(user.role_id))
        .filter(role_permissions::Column::Permission.eq(permission.as_str()))
        .count(conn)
        .await?;
    if granted == 0 {
        log::warn!("User {user_id} lacks permission {permission}");
        return Err(AppError::PermissionDenied);
    }
    Ok(user)
}

pub async fn permissions_of_role<C: ConnectionTrait>(conn: &C, role_id: i64) -> AppResult<Vec<Permission>> {
    let rows = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.eq(role_id))
        .all(conn)
        .await?;
    // 忽略已废弃的权限键
    Ok(rows
        .iter()
        .filter_map(|r| Permission::parse(&r.permission))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn user(is_active: bool) -> users::Model {
        users::Model {
            id: 7,
            username: "cajero".to_string(),
            full_name: "Cajero Uno".to_string(),
            email: None,
            password_hash: String::new(),
            role_id: 3,
            is_active,
            created_at: None,
            updated_at: None,
        }
    }

    fn count_row(n: i64) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn test_disabled_user_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(false)]])
            .into_connection();
        let access = AccessService::new(DbPool::new(db));
        let err = access.require(7, Permission::CashOperate).await.unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
    }

    #[tokio::test]
    async fn test_missing_permission_is_denied() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(true)]])
            .append_query_results([vec![count_row(0)]])
            .into_connection();
        let access = AccessService::new(DbPool::new(db));
        let err = access.require(7, Permission::CashAudit).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_has_maps_denial_to_false() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user(true)]])
            .append_query_results([vec![count_row(0)]])
            .append_query_results([vec![user(true)]])
            .append_query_results([vec![count_row(1)]])
            .into_connection();
        let access = AccessService::new(DbPool::new(db));
        assert!(!access.has(7, Permission::CashAudit).await.unwrap());
        assert!(access.has(7, Permission::CashOperate).await.unwrap());
    }
}
