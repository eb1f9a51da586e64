// src/models/setting.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'admin_settings' key/value table (provider API keys).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AdminSetting {
    pub key: String,
    pub value: Option<String>,
    pub updated_by: Option<Uuid>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl AdminSetting {
    /// Copy of the setting safe to show in the admin console.
    pub fn masked(&self) -> Self {
        // At most a quarter of the value, capped at four chars, stays visible.
        let value = self.value.as_deref().map(|v| {
            let len = v.chars().count();
            let shown = (len / 4).min(4);
            format!("****{}", v.chars().skip(len - shown).collect::<String>())
        });

        Self {
            key: self.key.clone(),
            value,
            updated_by: self.updated_by,
            updated_at: self.updated_at,
        }
    }
}

/// DTO for storing a setting value.
#[derive(Debug, Deserialize, Validate)]
pub struct PutSettingRequest {
    #[validate(length(min = 1, max = 1000))]
    pub value: String,
}
