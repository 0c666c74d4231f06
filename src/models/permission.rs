use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 权限键。角色持有一组权限键，接口按键校验。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Permission {
    #[serde(rename = "users.manage")]
    UsersManage,
    #[serde(rename = "roles.manage")]
    RolesManage,
    #[serde(rename = "settings.manage")]
    SettingsManage,
    #[serde(rename = "catalog.manage")]
    CatalogManage,
    #[serde(rename = "solicitudes.create")]
    SolicitudesCreate,
    #[serde(rename = "solicitudes.review")]
    SolicitudesReview,
    #[serde(rename = "orders.manage")]
    OrdersManage,
    #[serde(rename = "payments.create")]
    PaymentsCreate,
    #[serde(rename = "deliveries.create")]
    DeliveriesCreate,
    #[serde(rename = "cash.operate")]
    CashOperate,
    #[serde(rename = "cash.manage")]
    CashManage,
    #[serde(rename = "cash.authorize")]
    CashAuthorize,
    #[serde(rename = "cash.audit")]
    CashAudit,
    #[serde(rename = "audit.view")]
    AuditView,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::UsersManage,
        Permission::RolesManage,
        Permission::SettingsManage,
        Permission::CatalogManage,
        Permission::SolicitudesCreate,
        Permission::SolicitudesReview,
        Permission::OrdersManage,
        Permission::PaymentsCreate,
        Permission::DeliveriesCreate,
        Permission::CashOperate,
        Permission::CashManage,
        Permission::CashAuthorize,
        Permission::CashAudit,
        Permission::AuditView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UsersManage => "users.manage",
            Permission::RolesManage => "roles.manage",
            Permission::SettingsManage => "settings.manage",
            Permission::CatalogManage => "catalog.manage",
            Permission::SolicitudesCreate => "solicitudes.create",
            Permission::SolicitudesReview => "solicitudes.review",
            Permission::OrdersManage => "orders.manage",
            Permission::PaymentsCreate => "payments.create",
            Permission::DeliveriesCreate => "deliveries.create",
            Permission::CashOperate => "cash.operate",
            Permission::CashManage => "cash.manage",
            Permission::CashAuthorize => "cash.authorize",
            Permission::CashAudit => "cash.audit",
            Permission::AuditView => "audit.view",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Permission::UsersManage => "Create, edit and deactivate users",
            Permission::RolesManage => "Manage roles and their permissions",
            Permission::SettingsManage => "Edit company settings and logo",
            Permission::CatalogManage => "Manage clients, categories and items",
            Permission::SolicitudesCreate => "Register service requests",
            Permission::SolicitudesReview => "Authorize, reject and convert service requests",
            Permission::OrdersManage => "Create and update service orders",
            Permission::PaymentsCreate => "Record payments on service orders",
            Permission::DeliveriesCreate => "Deliver completed service orders",
            Permission::CashOperate => "Open, operate and close an own cash session",
            Permission::CashManage => "Manage cash register definitions",
            Permission::CashAuthorize => "Issue the daily key and authorize discrepancies",
            Permission::CashAudit => "Review any cash session and discrepancy",
            Permission::AuditView => "Read the audit log",
        }
    }

    pub fn parse(key: &str) -> Option<Permission> {
        Self::ALL.iter().copied().find(|p| p.as_str() == key)
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_key() {
        for p in Permission::ALL {
            assert_eq!(Permission::parse(p.as_str()), Some(p));
        }
        assert_eq!(Permission::parse("cash.fly"), None);
    }

    #[test]
    fn test_serde_uses_dotted_keys() {
        let json = serde_json::to_string(&Permission::CashAuthorize).unwrap();
        assert_eq!(json, "\"cash.authorize\"");
    }
}
