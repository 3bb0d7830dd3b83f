use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Directory entry for one tenant. Read-only from the service's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: i32,
    pub tenant_code: String,
    pub tenant_name: String,
    /// 0 = live, 1 = retired
    pub del_flg: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_active(&self) -> bool {
        self.del_flg == 0
    }
}
