use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn ok(data: T) -> HttpResponse {
        HttpResponse::Ok().json(Self::success(data))
    }

    pub fn created(data: T) -> HttpResponse {
        HttpResponse::Created().json(Self::success(data))
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> HttpResponse {
        HttpResponse::Ok().json(ApiResponse::<()> {
            success: true,
            data: None,
            message: Some(message.into()),
            error: None,
        })
    }
}

/// 按 YYYY-MM-DD 解析日期过滤参数
pub fn parse_date_filter(
    field: &str,
    value: Option<&str>,
) -> crate::error::AppResult<Option<chrono::NaiveDate>> {
    match value {
        None => Ok(None),
        Some(s) => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                crate::error::AppError::ValidationError(format!(
                    "{field} must be formatted as YYYY-MM-DD"
                ))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_omits_empty_fields() {
        let body = serde_json::to_value(ApiResponse::success(5)).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "data": 5}));
    }

    #[test]
    fn test_parse_date_filter() {
        assert_eq!(parse_date_filter("from", None).unwrap(), None);
        assert_eq!(
            parse_date_filter("from", Some("2025-09-01")).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2025, 9, 1)
        );
        assert!(parse_date_filter("from", Some("01/09/2025")).is_err());
    }
}
