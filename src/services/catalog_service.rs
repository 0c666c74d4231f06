//! 目录：客户、分类、商品/服务项

use crate::entities::{
    category_entity as categories, client_entity as clients, item_entity as items,
    service_order_entity as orders, service_order_item_entity as order_items,
    solicitud_entity as solicitudes,
};
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::utils::{
    optional_text, require_non_negative_amount, require_text, validate_email, validate_phone,
    validate_sku, validate_tax_id,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde_json::json;

/// 客户联系信息校验，税号统一大写
fn clean_tax_id(value: Option<&str>) -> AppResult<Option<String>> {
    let v = optional_text("tax_id", value, 20)?.map(|s| s.to_uppercase());
    if let Some(t) = &v {
        validate_tax_id(t)?;
    }
    Ok(v)
}

fn clean_email(value: Option<&str>) -> AppResult<Option<String>> {
    let v = optional_text("email", value, 255)?.map(|s| s.to_lowercase());
    if let Some(e) = &v {
        validate_email(e)?;
    }
    Ok(v)
}

fn clean_phone(value: Option<&str>) -> AppResult<Option<String>> {
    let v = optional_text("phone", value, 20)?;
    if let Some(p) = &v {
        validate_phone(p)?;
    }
    Ok(v)
}

async fn ensure_category<C: ConnectionTrait>(conn: &C, category_id: i64) -> AppResult<()> {
    categories::Entity::find_by_id(category_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::ValidationError(format!("Category {category_id} does not exist")))?;
    Ok(())
}

async fn ensure_unique_sku<C: ConnectionTrait>(conn: &C, sku: &str, except: Option<i64>) -> AppResult<()> {
    let mut q = items::Entity::find().filter(items::Column::Sku.eq(sku));
    if let Some(id) = except {
        q = q.filter(items::Column::Id.ne(id));
    }
    if q.count(conn).await? > 0 {
        return Err(AppError::Conflict(format!("SKU '{sku}' is already in use")));
    }
    Ok(())
}

async fn ensure_unique_category<C: ConnectionTrait>(conn: &C, name: &str, except: Option<i64>) -> AppResult<()> {
    let mut q = categories::Entity::find().filter(categories::Column::Name.eq(name));
    if let Some(id) = except {
        q = q.filter(categories::Column::Id.ne(id));
    }
    if q.count(conn).await? > 0 {
        return Err(AppError::Conflict(format!("Category '{name}' already exists")));
    }
    Ok(())
}

#[derive(Clone)]
pub struct CatalogService {
    pool: DbPool,
}

impl CatalogService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    // ---------- 客户 ----------

    pub async fn list_clients(&self, query: &ClientQuery) -> AppResult<PaginatedResponse<ClientResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = clients::Entity::find();
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            base = base.filter(
                Condition::any()
                    .add(clients::Column::Name.contains(search))
                    .add(clients::Column::TaxId.contains(search.to_uppercase())),
            );
        }
        if let Some(active) = query.is_active {
            base = base.filter(clients::Column::IsActive.eq(active));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_asc(clients::Column::Name)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;
        Ok(PaginatedResponse::new(
            rows.into_iter().map(ClientResponse::from).collect(),
            &params,
            total,
        ))
    }

    pub async fn get_client(&self, id: i64) -> AppResult<ClientResponse> {
        clients::Entity::find_by_id(id)
            .one(self.pool.as_ref())
            .await?
            .map(ClientResponse::from)
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
    }

    pub async fn create_client(&self, user_id: i64, req: ClientRequest) -> AppResult<ClientResponse> {
        let name = require_text("name", &req.name, 2, 255)?;
        let tax_id = clean_tax_id(req.tax_id.as_deref())?;
        let email = clean_email(req.email.as_deref())?;
        let phone = clean_phone(req.phone.as_deref())?;
        let address = optional_text("address", req.address.as_deref(), 500)?;

        let txn = self.pool.begin().await?;
        let now = Utc::now();
        let client = clients::ActiveModel {
            name: Set(name),
            tax_id: Set(tax_id),
            email: Set(email),
            phone: Set(phone),
            address: Set(address),
            is_active: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        record_audit(&txn, Some(user_id), "client.create", "client", Some(client.id), json!({ "name": client.name }))
            .await?;
        txn.commit().await?;

        Ok(ClientResponse::from(client))
    }

    pub async fn update_client(
        &self,
        user_id: i64,
        id: i64,
        req: UpdateClientRequest,
    ) -> AppResult<ClientResponse> {
        let txn = self.pool.begin().await?;
        let client = clients::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

        let mut am = client.into_active_model();
        if let Some(name) = &req.name {
            am.name = Set(require_text("name", name, 2, 255)?);
        }
        if req.tax_id.is_some() {
            am.tax_id = Set(clean_tax_id(req.tax_id.as_deref())?);
        }
        if req.email.is_some() {
            am.email = Set(clean_email(req.email.as_deref())?);
        }
        if req.phone.is_some() {
            am.phone = Set(clean_phone(req.phone.as_deref())?);
        }
        if req.address.is_some() {
            am.address = Set(optional_text("address", req.address.as_deref(), 500)?);
        }
        if let Some(active) = req.is_active {
            am.is_active = Set(active);
        }
        am.updated_at = Set(Some(Utc::now()));
        let client = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "client.update",
            "client",
            Some(id),
            json!({ "name": client.name, "is_active": client.is_active }),
        )
        .await?;
        txn.commit().await?;
        Ok(ClientResponse::from(client))
    }

    /// 有单据引用的客户只能停用，不能删除
    pub async fn delete_client(&self, user_id: i64, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let client = clients::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))?;

        let refs = orders::Entity::find()
            .filter(orders::Column::ClientId.eq(id))
            .count(&txn)
            .await?
            + solicitudes::Entity::find()
                .filter(solicitudes::Column::ClientId.eq(id))
                .count(&txn)
                .await?;
        if refs > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a client with documents; deactivate it instead".to_string(),
            ));
        }

        let name = client.name.clone();
        client.delete(&txn).await?;
        record_audit(&txn, Some(user_id), "client.delete", "client", Some(id), json!({ "name": name })).await?;
        txn.commit().await?;
        Ok(())
    }

    // ---------- 分类 ----------

    pub async fn list_categories(&self) -> AppResult<Vec<CategoryResponse>> {
        let rows = categories::Entity::find()
            .order_by_asc(categories::Column::Name)
            .all(self.pool.as_ref())
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for c in rows {
            let count = items::Entity::find()
                .filter(items::Column::CategoryId.eq(c.id))
                .count(self.pool.as_ref())
                .await?;
            out.push(CategoryResponse::new(c, count));
        }
        Ok(out)
    }

    pub async fn create_category(&self, user_id: i64, req: CategoryRequest) -> AppResult<CategoryResponse> {
        let name = require_text("name", &req.name, 2, 128)?;
        let description = optional_text("description", req.description.as_deref(), 500)?;

        let txn = self.pool.begin().await?;
        ensure_unique_category(&txn, &name, None).await?;
        let now = Utc::now();
        let category = categories::ActiveModel {
            name: Set(name),
            description: Set(description),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        record_audit(
            &txn,
            Some(user_id),
            "category.create",
            "category",
            Some(category.id),
            json!({ "name": category.name }),
        )
        .await?;
        txn.commit().await?;
        Ok(CategoryResponse::new(category, 0))
    }

    pub async fn update_category(
        &self,
        user_id: i64,
        id: i64,
        req: CategoryRequest,
    ) -> AppResult<CategoryResponse> {
        let name = require_text("name", &req.name, 2, 128)?;
        let description = optional_text("description", req.description.as_deref(), 500)?;

        let txn = self.pool.begin().await?;
        let category = categories::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        ensure_unique_category(&txn, &name, Some(id)).await?;

        let mut am = category.into_active_model();
        am.name = Set(name);
        am.description = Set(description);
        am.updated_at = Set(Some(Utc::now()));
        let category = am.update(&txn).await?;
        let count = items::Entity::find()
            .filter(items::Column::CategoryId.eq(id))
            .count(&txn)
            .await?;

        record_audit(&txn, Some(user_id), "category.update", "category", Some(id), json!({ "name": category.name }))
            .await?;
        txn.commit().await?;
        Ok(CategoryResponse::new(category, count))
    }

    pub async fn delete_category(&self, user_id: i64, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let category = categories::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))?;
        let count = items::Entity::find()
            .filter(items::Column::CategoryId.eq(id))
            .count(&txn)
            .await?;
        if count > 0 {
            return Err(AppError::Conflict("Cannot delete category with items".to_string()));
        }

        let name = category.name.clone();
        category.delete(&txn).await?;
        record_audit(&txn, Some(user_id), "category.delete", "category", Some(id), json!({ "name": name })).await?;
        txn.commit().await?;
        Ok(())
    }

    // ---------- 商品 ----------

    pub async fn list_items(&self, query: &ItemQuery) -> AppResult<PaginatedResponse<ItemResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);
        let mut base = items::Entity::find();
        if let Some(category_id) = query.category_id {
            base = base.filter(items::Column::CategoryId.eq(category_id));
        }
        if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            base = base.filter(
                Condition::any()
                    .add(items::Column::Name.contains(search))
                    .add(items::Column::Sku.contains(search)),
            );
        }
        if let Some(active) = query.is_active {
            base = base.filter(items::Column::IsActive.eq(active));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_asc(items::Column::Name)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;
        Ok(PaginatedResponse::new(
            rows.into_iter().map(ItemResponse::from).collect(),
            &params,
            total,
        ))
    }

    pub async fn get_item(&self, id: i64) -> AppResult<ItemResponse> {
        items::Entity::find_by_id(id)
            .one(self.pool.as_ref())
            .await?
            .map(ItemResponse::from)
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))
    }

    pub async fn create_item(&self, user_id: i64, req: ItemRequest) -> AppResult<ItemResponse> {
        let sku = req.sku.trim().to_uppercase();
        validate_sku(&sku)?;
        let name = require_text("name", &req.name, 2, 255)?;
        let description = optional_text("description", req.description.as_deref(), 1000)?;
        require_non_negative_amount("unit_price", req.unit_price)?;

        let txn = self.pool.begin().await?;
        ensure_category(&txn, req.category_id).await?;
        ensure_unique_sku(&txn, &sku, None).await?;

        let now = Utc::now();
        let item = items::ActiveModel {
            category_id: Set(req.category_id),
            sku: Set(sku),
            name: Set(name),
            description: Set(description),
            unit_price: Set(req.unit_price),
            is_active: Set(true),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        record_audit(
            &txn,
            Some(user_id),
            "item.create",
            "item",
            Some(item.id),
            json!({ "sku": item.sku, "unit_price": item.unit_price }),
        )
        .await?;
        txn.commit().await?;
        Ok(ItemResponse::from(item))
    }

    pub async fn update_item(&self, user_id: i64, id: i64, req: UpdateItemRequest) -> AppResult<ItemResponse> {
        let txn = self.pool.begin().await?;
        let item = items::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        let mut am = item.into_active_model();
        if let Some(category_id) = req.category_id {
            ensure_category(&txn, category_id).await?;
            am.category_id = Set(category_id);
        }
        if let Some(sku) = &req.sku {
            let sku = sku.trim().to_uppercase();
            validate_sku(&sku)?;
            ensure_unique_sku(&txn, &sku, Some(id)).await?;
            am.sku = Set(sku);
        }
        if let Some(name) = &req.name {
            am.name = Set(require_text("name", name, 2, 255)?);
        }
        if req.description.is_some() {
            am.description = Set(optional_text("description", req.description.as_deref(), 1000)?);
        }
        if let Some(price) = req.unit_price {
            require_non_negative_amount("unit_price", price)?;
            am.unit_price = Set(price);
        }
        if let Some(active) = req.is_active {
            am.is_active = Set(active);
        }
        am.updated_at = Set(Some(Utc::now()));
        let item = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "item.update",
            "item",
            Some(id),
            json!({ "sku": item.sku, "unit_price": item.unit_price, "is_active": item.is_active }),
        )
        .await?;
        txn.commit().await?;
        Ok(ItemResponse::from(item))
    }

    pub async fn delete_item(&self, user_id: i64, id: i64) -> AppResult<()> {
        let txn = self.pool.begin().await?;
        let item = items::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;
        let used = order_items::Entity::find()
            .filter(order_items::Column::ItemId.eq(id))
            .count(&txn)
            .await?;
        if used > 0 {
            return Err(AppError::Conflict(
                "Cannot delete an item used in service orders; deactivate it instead".to_string(),
            ));
        }

        let sku = item.sku.clone();
        item.delete(&txn).await?;
        record_audit(&txn, Some(user_id), "item.delete", "item", Some(id), json!({ "sku": sku })).await?;
        txn.commit().await?;
        Ok(())
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
    fn test_contact_fields_are_normalized() {
        assert_eq!(clean_tax_id(Some(" abc1234567x ")).unwrap().as_deref(), Some("ABC1234567X"));
        assert_eq!(clean_email(Some("Ventas@Example.COM")).unwrap().as_deref(), Some("ventas@example.com"));
        assert_eq!(clean_phone(Some("")).unwrap(), None);
        assert!(clean_email(Some("not-an-email")).is_err());
    }

    #[tokio::test]
    async fn test_cannot_delete_category_with_items() {
        let category = categories::Model {
            id: 4,
            name: "Refacciones".to_string(),
            description: None,
            created_at: None,
            updated_at: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![category]])
            .append_query_results([vec![count_row(3)]])
            .into_connection();
        let svc = CatalogService::new(DbPool::new(db));

        let err = svc.delete_category(1, 4).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "Cannot delete category with items"));
    }

    #[tokio::test]
    async fn test_create_item_rejects_bad_sku_before_db() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let svc = CatalogService::new(DbPool::new(db));
        let err = svc
            .create_item(
                1,
                ItemRequest {
                    category_id: 1,
                    sku: "bad sku!".to_string(),
                    name: "Revisión".to_string(),
                    description: None,
                    unit_price: 100,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
