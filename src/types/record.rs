//! Directory user records as the remote service accepts them.

use serde::{Deserialize, Serialize};

/// Sign-in identity attached to a user (e.g. an email address).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectIdentity {
    pub sign_in_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    pub issuer_assigned_id: String,
}

impl ObjectIdentity {
    pub fn email(address: impl Into<String>) -> Self {
        Self {
            sign_in_type: "emailAddress".to_string(),
            issuer: None,
            issuer_assigned_id: address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordProfile {
    pub password: String,
    pub force_change_password_next_sign_in: bool,
}

/// One user to create or update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Object id assigned by the service; required for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identities: Vec<ObjectIdentity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_profile: Option<PasswordProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_policies: Option<String>,
    /// Plain password carried by import files; moved into `password_profile`.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
}

impl UserRecord {
    /// Fill in what a local account needs before the tenant accepts it:
    /// identities issued by `tenant`, a non-expiring password profile.
    pub fn set_local_account_profile(&mut self, tenant: &str) {
        if !tenant.is_empty() {
            for identity in &mut self.identities {
                identity.issuer = Some(tenant.to_string());
            }
        }
        if let Some(password) = self.password.take() {
            self.password_profile = Some(PasswordProfile {
                password,
                force_change_password_next_sign_in: false,
            });
        }
        self.password_policies = Some("DisablePasswordExpiration".to_string());
    }

    /// The first sign-in name, used to identify a record in logs and reports.
    pub fn sign_in_name(&self) -> Option<&str> {
        self.identities
            .first()
            .map(|i| i.issuer_assigned_id.as_str())
    }

    /// The subset of properties sent by an update.
    pub fn update_patch(&self) -> serde_json::Value {
        serde_json::json!({
            "givenName": self.given_name,
            "surname": self.surname,
            "displayName": self.display_name,
            "city": self.city,
            "companyName": self.company_name,
        })
    }
}

/// Import file layout: `{"users": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsersFile {
    #[serde(default)]
    pub users: Vec<UserRecord>,
}

impl UsersFile {
    pub fn parse(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::configuration_with_context(
                format!("cannot read users file: {}", e),
                crate::error::ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("users_file"),
            )
        })?;
        Self::parse(&content)
    }
}
