use crate::entities::company_settings_entity as settings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CompanySettingsResponse {
    pub business_name: String,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub logo_path: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<settings::Model> for CompanySettingsResponse {
    fn from(m: settings::Model) -> Self {
        Self {
            business_name: m.business_name,
            tax_id: m.tax_id,
            address: m.address,
            phone: m.phone,
            email: m.email,
            logo_path: m.logo_path,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateCompanySettingsRequest {
    #[schema(example = "Servicios Ordinex S.A. de C.V.")]
    pub business_name: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}
