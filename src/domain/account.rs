//! Account - Administrator Records and Auth Payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id_string;

/// An administrator account
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of a successful login or registration
#[derive(Clone, Debug, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub admin: Admin,
}

/// Login credentials
#[derive(Clone, Debug, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Create/update payload shared by technician and admin accounts
///
/// The password may be omitted on update to keep the current one.
#[derive(Clone, Debug, Serialize)]
pub struct AccountForm {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AccountForm {
    pub fn new(name: impl Into<String>, email: impl Into<String>, password: Option<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.filter(|p| !p.is_empty()),
        }
    }
}
