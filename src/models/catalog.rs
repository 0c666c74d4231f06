use crate::entities::{category_entity as categories, client_entity as clients, item_entity as items};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------- 客户 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientRequest {
    #[schema(example = "Talleres del Norte")]
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// 按名称 / 税号模糊搜索
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    pub id: i64,
    pub name: String,
    pub tax_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<clients::Model> for ClientResponse {
    fn from(c: clients::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            tax_id: c.tax_id,
            email: c.email,
            phone: c.phone,
            address: c.address,
            is_active: c.is_active,
            created_at: c.created_at,
        }
    }
}

// ---------- 分类 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryRequest {
    #[schema(example = "Mantenimiento")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub item_count: u64,
}

impl CategoryResponse {
    pub fn new(c: categories::Model, item_count: u64) -> Self {
        Self {
            id: c.id,
            name: c.name,
            description: c.description,
            item_count,
        }
    }
}

// ---------- 商品 / 服务项 ----------

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemRequest {
    pub category_id: i64,
    #[schema(example = "SRV-001")]
    pub sku: String,
    #[schema(example = "Cambio de aceite")]
    pub name: String,
    pub description: Option<String>,
    /// 单价(分)
    pub unit_price: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub category_id: Option<i64>,
    pub sku: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemResponse {
    pub id: i64,
    pub category_id: i64,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub unit_price: i64,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<items::Model> for ItemResponse {
    fn from(i: items::Model) -> Self {
        Self {
            id: i.id,
            category_id: i.category_id,
            sku: i.sku,
            name: i.name,
            description: i.description,
            unit_price: i.unit_price,
            is_active: i.is_active,
            created_at: i.created_at,
        }
    }
}
