use crate::config::BootstrapConfig;
use crate::entities::{
    role_entity as roles, role_permission_entity as role_permissions, user_entity as users,
};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::access_service::permissions_of_role;
use crate::services::audit_service::record_audit;
use crate::services::settings_service::{DEFAULT_BUSINESS_NAME, ensure_settings};
use crate::utils::{
    hash_password, optional_text, require_text, validate_email, validate_password,
    validate_username, verify_password,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde_json::json;

pub const ADMIN_ROLE_NAME: &str = "admin";

/// 解析权限键列表：未知键报错，重复键去重
pub fn parse_permissions(keys: &[String]) -> AppResult<Vec<Permission>> {
    let mut out: Vec<Permission> = Vec::with_capacity(keys.len());
    for key in keys {
        let p = Permission::parse(key.trim())
            .ok_or_else(|| AppError::ValidationError(format!("Unknown permission '{key}'")))?;
        if !out.contains(&p) {
            out.push(p);
        }
    }
    Ok(out)
}

async fn replace_role_permissions<C: ConnectionTrait>(
    conn: &C,
    role_id: i64,
    permissions: &[Permission],
) -> AppResult<()> {
    role_permissions::Entity::delete_many()
        .filter(role_permissions::Column::RoleId.eq(role_id))
        .exec(conn)
        .await?;
    if permissions.is_empty() {
        return Ok(());
    }
    let rows = permissions.iter().map(|p| role_permissions::ActiveModel {
        role_id: Set(role_id),
        permission: Set(p.as_str().to_string()),
        ..Default::default()
    });
    role_permissions::Entity::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn ensure_role<C: ConnectionTrait>(conn: &C, role_id: i64) -> AppResult<roles::Model> {
    roles::Entity::find_by_id(role_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::ValidationError(format!("Role {role_id} does not exist")))
}

#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // ---------- 用户 ----------

    pub async fn list_users(&self, query: &UserQuery) -> AppResult<PaginatedResponse<UserResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = users::Entity::find();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            base = base.filter(
                Condition::any()
                    .add(users::Column::Username.contains(search.to_lowercase()))
                    .add(users::Column::FullName.contains(search)),
            );
        }
        if let Some(role_id) = query.role_id {
            base = base.filter(users::Column::RoleId.eq(role_id));
        }
        if let Some(active) = query.is_active {
            base = base.filter(users::Column::IsActive.eq(active));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_asc(users::Column::Username)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;
        Ok(PaginatedResponse::new(
            rows.into_iter().map(UserResponse::from).collect(),
            &params,
            total,
        ))
    }

    pub async fn get_user(&self, id: i64) -> AppResult<UserResponse> {
        users::Entity::find_by_id(id)
            .one(self.pool.as_ref())
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn create_user(&self, actor_id: i64, req: CreateUserRequest) -> AppResult<UserResponse> {
        let username = req.username.trim().to_lowercase();
        validate_username(&username)?;
        let full_name = require_text("full_name", &req.full_name, 2, 255)?;
        let email = optional_text("email", req.email.as_deref(), 255)?.map(|e| e.to_lowercase());
        if let Some(e) = &email {
            validate_email(e)?;
        }
        validate_password(&req.password, &username)?;
        let password_hash = hash_password(&req.password)?;

        let txn = self.pool.begin().await?;
        ensure_role(&txn, req.role_id).await?;
        let taken = users::Entity::find()
            .filter(users::Column::Username.eq(username.clone()))
            .count(&txn)
            .await?;
        if taken > 0 {
            return Err(AppError::Conflict(format!("Username '{username}' is already taken")));
        }

        let now = Utc::now();
        let user = users::ActiveModel {
            username: Set(username),
            full_name: Set(full_name),
            email: Set(email),
            password_hash: Set(password_hash),
            role_id: Set(req.role_id),
            is_active: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        record_audit(
            &txn,
            Some(actor_id),
            "user.create",
            "user",
            Some(user.id),
            json!({ "username": user.username, "role_id": user.role_id }),
        )
        .await?;
        txn.commit().await?;

        log::info!("User {} created by {actor_id}", user.username);
        Ok(UserResponse::from(user))
    }

    pub async fn update_user(
        &self,
        actor_id: i64,
        id: i64,
        req: UpdateUserRequest,
    ) -> AppResult<UserResponse> {
        if id == actor_id && req.is_active == Some(false) {
            return Err(AppError::ValidationError(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;
        let user = users::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let mut am = user.into_active_model();
        if let Some(name) = &req.full_name {
            am.full_name = Set(require_text("full_name", name, 2, 255)?);
        }
        if req.email.is_some() {
            let email = optional_text("email", req.email.as_deref(), 255)?.map(|e| e.to_lowercase());
            if let Some(e) = &email {
                validate_email(e)?;
            }
            am.email = Set(email);
        }
        if let Some(role_id) = req.role_id {
            ensure_role(&txn, role_id).await?;
            am.role_id = Set(role_id);
        }
        if let Some(active) = req.is_active {
            am.is_active = Set(active);
        }
        am.updated_at = Set(Some(Utc::now()));
        let user = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(actor_id),
            "user.update",
            "user",
            Some(id),
            json!({ "role_id": user.role_id, "is_active": user.is_active }),
        )
        .await?;
        txn.commit().await?;
        Ok(UserResponse::from(user))
    }

    /// 修改密码：本人需校验旧密码，管理员重置他人密码时跳过（由调用方判定权限）
    pub async fn change_password(
        &self,
        actor_id: i64,
        target_id: i64,
        req: ChangePasswordRequest,
    ) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let user = users::Entity::find_by_id(target_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        validate_password(&req.new_password, &user.username)?;

        if actor_id == target_id {
            let current = req.current_password.as_deref().ok_or_else(|| {
                AppError::ValidationError("current_password is required".to_string())
            })?;
            if !verify_password(current, &user.password_hash)? {
                return Err(AppError::ValidationError(
                    "Current password is incorrect".to_string(),
                ));
            }
        }

        let mut am = user.into_active_model();
        am.password_hash = Set(hash_password(&req.new_password)?);
        am.updated_at = Set(Some(Utc::now()));
        am.update(&txn).await?;

        record_audit(
            &txn,
            Some(actor_id),
            "user.password",
            "user",
            Some(target_id),
            json!({ "self_service": actor_id == target_id }),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    // ---------- 角色 ----------

    pub async fn list_roles(&self) -> AppResult<Vec<RoleResponse>> {
        let rows = roles::Entity::find()
            .order_by_asc(roles::Column::Name)
            .all(self.pool.as_ref())
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for role in rows {
            let perms = permissions_of_role(self.pool.as_ref(), role.id).await?;
            out.push(RoleResponse::new(role, perms));
        }
        Ok(out)
    }

    pub async fn create_role(&self, actor_id: i64, req: RoleRequest) -> AppResult<RoleResponse> {
        let name = require_text("name", &req.name, 2, 64)?.to_lowercase();
        let description = optional_text("description", req.description.as_deref(), 255)?;
        let permissions = parse_permissions(&req.permissions)?;

        let txn = self.pool.begin().await?;
        let dup = roles::Entity::find()
            .filter(roles::Column::Name.eq(name.clone()))
            .count(&txn)
            .await?;
        if dup > 0 {
            return Err(AppError::Conflict(format!("Role '{name}' already exists")));
        }

        let now = Utc::now();
        let role = roles::ActiveModel {
            name: Set(name),
            description: Set(description),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        replace_role_permissions(&txn, role.id, &permissions).await?;

        record_audit(
            &txn,
            Some(actor_id),
            "role.create",
            "role",
            Some(role.id),
            json!({ "name": role.name, "permissions": permissions }),
        )
        .await?;
        txn.commit().await?;
        Ok(RoleResponse::new(role, permissions))
    }

    pub async fn update_role(&self, actor_id: i64, id: i64, req: RoleRequest) -> AppResult<RoleResponse> {
        let name = require_text("name", &req.name, 2, 64)?.to_lowercase();
        let description = optional_text("description", req.description.as_deref(), 255)?;
        let permissions = parse_permissions(&req.permissions)?;

        let txn = self.pool.begin().await?;
        let role = roles::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
        let dup = roles::Entity::find()
            .filter(roles::Column::Name.eq(name.clone()))
            .filter(roles::Column::Id.ne(id))
            .count(&txn)
            .await?;
        if dup > 0 {
            return Err(AppError::Conflict(format!("Role '{name}' already exists")));
        }

        let mut am = role.into_active_model();
        am.name = Set(name);
        am.description = Set(description);
        am.updated_at = Set(Some(Utc::now()));
        let role = am.update(&txn).await?;
        replace_role_permissions(&txn, id, &permissions).await?;

        record_audit(
            &txn,
            Some(actor_id),
            "role.update",
            "role",
            Some(id),
            json!({ "name": role.name, "permissions": permissions }),
        )
        .await?;
        txn.commit().await?;
        Ok(RoleResponse::new(role, permissions))
    }

    pub async fn delete_role(&self, actor_id: i64, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let role = roles::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Role not found".to_string()))?;
        let in_use = users::Entity::find()
            .filter(users::Column::RoleId.eq(id))
            .count(&txn)
            .await?;
        if in_use > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a role assigned to users".to_string(),
            ));
        }

        let name = role.name.clone();
        // role_permissions 随外键级联删除
        role.delete(&txn).await?;
        record_audit(&txn, Some(actor_id), "role.delete", "role", Some(id), json!({ "name": name })).await?;
        txn.commit().await?;
        Ok(())
    }

    pub fn list_permissions(&self) -> Vec<PermissionInfo> {
        Permission::ALL
            .iter()
            .map(|p| PermissionInfo {
                key: *p,
                description: p.description().to_string(),
            })
            .collect()
    }

    // ---------- 初始化 ----------

    /// 首次启动（无任何用户）时创建持有全部权限的 admin 角色与管理员账号。
    /// 返回是否执行了初始化。
    pub async fn ensure_bootstrap_admin(&self, cfg: &BootstrapConfig) -> AppResult<bool> {
        let txn = self.pool.begin().await?;
        let existing = users::Entity::find().count(&txn).await?;
        if existing > 0 {
            return Ok(false);
        }

        let username = cfg.admin_username.trim().to_lowercase();
        validate_username(&username)?;
        validate_password(&cfg.admin_password, &username)?;

        let now = Utc::now();
        let role = match roles::Entity::find()
            .filter(roles::Column::Name.eq(ADMIN_ROLE_NAME))
            .one(&txn)
            .await?
        {
            Some(r) => r,
            None => {
                roles::ActiveModel {
                    name: Set(ADMIN_ROLE_NAME.to_string()),
                    description: Set(Some("Full access".to_string())),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };
        replace_role_permissions(&txn, role.id, &Permission::ALL).await?;

        let admin = users::ActiveModel {
            username: Set(username),
            full_name: Set("Administrator".to_string()),
            email: Set(None),
            password_hash: Set(hash_password(&cfg.admin_password)?),
            role_id: Set(role.id),
            is_active: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let business_name = cfg.business_name.as_deref().unwrap_or(DEFAULT_BUSINESS_NAME);
        ensure_settings(&txn, business_name).await?;

        record_audit(
            &txn,
            None,
            "system.bootstrap",
            "user",
            Some(admin.id),
            json!({ "username": admin.username, "role": ADMIN_ROLE_NAME }),
        )
        .await?;
        txn.commit().await?;

        log::warn!(
            "Bootstrap admin '{}' created; change its password after first login",
            admin.username
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;

    fn count_row(n: i64) -> BTreeMap<String, Value> {
        BTreeMap::from([("num_items".to_string(), Value::BigInt(Some(n)))])
    }

    #[test]
    fn test_parse_permissions_dedups_and_rejects_unknown() {
        let keys = vec![
            "cash.operate".to_string(),
            " payments.create ".to_string(),
            "cash.operate".to_string(),
        ];
        assert_eq!(
            parse_permissions(&keys).unwrap(),
            vec![Permission::CashOperate, Permission::PaymentsCreate]
        );
        assert!(parse_permissions(&["cash.teleport".to_string()]).is_err());
    }

    #[test]
    fn test_list_permissions_covers_every_key() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = UserService::new(DbPool::new(db));
        let list = svc.list_permissions();
        assert_eq!(list.len(), Permission::ALL.len());
        assert!(list.iter().all(|p| !p.description.is_empty()));
    }

    #[tokio::test]
    async fn test_bootstrap_is_skipped_when_users_exist() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![count_row(2)]])
            .into_connection();
        let svc = UserService::new(DbPool::new(db));
        assert!(!svc.ensure_bootstrap_admin(&BootstrapConfig::default()).await.unwrap());
    }

    #[tokio::test]
    async fn test_cannot_deactivate_self() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = UserService::new(DbPool::new(db));
        let err = svc
            .update_user(
                3,
                3,
                UpdateUserRequest {
                    full_name: None,
                    email: None,
                    role_id: None,
                    is_active: Some(false),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_delete_role_in_use_is_conflict() {
        let role = roles::Model {
            id: 2,
            name: "cajero".to_string(),
            description: None,
            created_at: None,
            updated_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![role]])
            .append_query_results([vec![count_row(1)]])
            .into_connection();
        let svc = UserService::new(DbPool::new(db));
        let err = svc.delete_role(1, 2).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
