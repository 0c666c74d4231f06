use crate::config::StorageConfig;
use crate::entities::company_settings_entity as settings;
use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::services::audit_service::record_audit;
use crate::utils::{optional_text, require_text, validate_email, validate_phone, validate_tax_id};
use chrono::Utc;
use image::ImageFormat;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, EntityTrait, IntoActiveModel,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use std::path::{Path, PathBuf};

pub const DEFAULT_BUSINESS_NAME: &str = "Ordinex";

/// 识别并试解码 logo，只接受 png / jpeg / webp，返回扩展名
pub fn inspect_logo(bytes: &[u8]) -> AppResult<&'static str> {
    let format = image::guess_format(bytes).map_err(|_| {
        AppError::ValidationError("Logo must be a PNG, JPEG or WebP image".to_string())
    })?;
    let ext = match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpg",
        ImageFormat::WebP => "webp",
        _ => {
            return Err(AppError::ValidationError(
                "Logo must be a PNG, JPEG or WebP image".to_string(),
            ));
        }
    };
    if let Err(e) = image::load_from_memory_with_format(bytes, format) {
        return Err(AppError::ValidationError(format!("Invalid image file ({ext}): {e}")));
    }
    Ok(ext)
}

/// 以内容 md5 命名，相同图片重复上传得到同一文件名
pub fn logo_file_name(bytes: &[u8], ext: &str) -> String {
    format!("logo-{:x}.{ext}", md5::compute(bytes))
}

/// 公司信息只有一行；不存在时按默认名称创建
pub async fn ensure_settings<C: ConnectionTrait>(conn: &C, business_name: &str) -> AppResult<settings::Model> {
    if let Some(row) = settings::Entity::find()
        .order_by_asc(settings::Column::Id)
        .one(conn)
        .await?
    {
        return Ok(row);
    }
    log::info!("Creating default company settings");
    Ok(settings::ActiveModel {
        business_name: Set(business_name.to_string()),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(conn)
    .await?)
}

#[derive(Clone)]
pub struct SettingsService {
    pool: DbPool,
    storage: StorageConfig,
}

impl SettingsService {
    pub fn new(pool: DbPool, storage: StorageConfig) -> Self {
        Self { pool, storage }
    }

    pub async fn get(&self) -> AppResult<CompanySettingsResponse> {
        let row = ensure_settings(self.pool.as_ref(), DEFAULT_BUSINESS_NAME).await?;
        Ok(CompanySettingsResponse::from(row))
    }

    pub async fn update(
        &self,
        user_id: i64,
        req: UpdateCompanySettingsRequest,
    ) -> AppResult<CompanySettingsResponse> {
        let txn = self.pool.begin().await?;
        let row = ensure_settings(&txn, DEFAULT_BUSINESS_NAME).await?;

        let mut am = row.into_active_model();
        if let Some(name) = &req.business_name {
            am.business_name = Set(require_text("business_name", name, 2, 255)?);
        }
        if req.tax_id.is_some() {
            let tax_id = optional_text("tax_id", req.tax_id.as_deref(), 20)?.map(|s| s.to_uppercase());
            if let Some(t) = &tax_id {
                validate_tax_id(t)?;
            }
            am.tax_id = Set(tax_id);
        }
        if req.email.is_some() {
            let email = optional_text("email", req.email.as_deref(), 255)?;
            if let Some(e) = &email {
                validate_email(e)?;
            }
            am.email = Set(email);
        }
        if req.phone.is_some() {
            let phone = optional_text("phone", req.phone.as_deref(), 20)?;
            if let Some(p) = &phone {
                validate_phone(p)?;
            }
            am.phone = Set(phone);
        }
        if req.address.is_some() {
            am.address = Set(optional_text("address", req.address.as_deref(), 500)?);
        }
        am.updated_at = Set(Some(Utc::now()));
        let row = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "settings.update",
            "company_settings",
            Some(row.id),
            json!({ "business_name": row.business_name }),
        )
        .await?;
        txn.commit().await?;

        Ok(CompanySettingsResponse::from(row))
    }

    /// 保存 logo 原始字节，替换旧文件
    pub async fn upload_logo(&self, user_id: i64, bytes: &[u8]) -> AppResult<CompanySettingsResponse> {
        if bytes.is_empty() {
            return Err(AppError::ValidationError("Logo file is empty".to_string()));
        }
        if bytes.len() > self.storage.max_logo_bytes {
            return Err(AppError::ValidationError(format!(
                "Logo must not exceed {} bytes",
                self.storage.max_logo_bytes
            )));
        }
        let ext = inspect_logo(bytes)?;

        let dir = PathBuf::from(&self.storage.upload_dir);
        tokio::fs::create_dir_all(&dir).await?;
        let file_name = logo_file_name(bytes, ext);
        tokio::fs::write(dir.join(&file_name), bytes).await?;

        let txn = self.pool.begin().await?;
        let row = ensure_settings(&txn, DEFAULT_BUSINESS_NAME).await?;
        let previous = row.logo_path.clone();

        let mut am = row.into_active_model();
        am.logo_path = Set(Some(file_name.clone()));
        am.updated_at = Set(Some(Utc::now()));
        let row = am.update(&txn).await?;

        record_audit(
            &txn,
            Some(user_id),
            "settings.logo",
            "company_settings",
            Some(row.id),
            json!({ "logo_path": file_name, "bytes": bytes.len() }),
        )
        .await?;
        txn.commit().await?;

        if let Some(old) = previous.filter(|p| *p != file_name) {
            remove_old_logo(&dir, &old).await;
        }

        log::info!("Company logo replaced by user {user_id} ({file_name})");
        Ok(CompanySettingsResponse::from(row))
    }
}

async fn remove_old_logo(dir: &Path, name: &str) {
    // 只删除上传目录下的文件名，忽略带路径的旧值
    if name.contains('/') || name.contains('\\') {
        return;
    }
    if let Err(e) = tokio::fs::remove_file(dir.join(name)).await {
        log::warn!("Failed to remove previous logo {name}: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::new_rgb8(2, 2)
            .write_to(&mut std::io::Cursor::new(&mut buf), format)
            .unwrap();
        buf
    }

    #[test]
    fn test_inspect_logo_accepts_decodable_images() {
        assert_eq!(inspect_logo(&encoded(ImageFormat::Png)).unwrap(), "png");
        assert_eq!(inspect_logo(&encoded(ImageFormat::Jpeg)).unwrap(), "jpg");
    }

    #[test]
    fn test_inspect_logo_rejects_other_formats() {
        assert!(inspect_logo(b"GIF89a\x01\x00\x01\x00").is_err());
        assert!(inspect_logo(b"").is_err());
        assert!(inspect_logo(b"plain text").is_err());
    }

    #[test]
    fn test_png_header_with_garbage_body_is_rejected() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(b"definitely not chunk data");
        let err = inspect_logo(&bytes).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("Invalid image")));
    }

    #[test]
    fn test_logo_file_name_uses_md5() {
        let name = logo_file_name(b"hello", "png");
        assert_eq!(name, "logo-5d41402abc4b2a76b9719d911017c592.png");
    }

    #[tokio::test]
    async fn test_upload_rejects_oversized_logo() {
        let db = sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Postgres).into_connection();
        let svc = SettingsService::new(
            DbPool::new(db),
            StorageConfig {
                upload_dir: "uploads".to_string(),
                max_logo_bytes: 4,
            },
        );
        let err = svc.upload_logo(1, &[0xFF, 0xD8, 0xFF, 0xE0, 0x00]).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg.contains("4 bytes")));
    }
}
