use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============ Data API Models ============

/// Role stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Barber,
    Client,
    /// Any role this tool does not know about. Never written back.
    #[serde(other)]
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "ADMIN",
            Role::Barber => "BARBER",
            Role::Client => "CLIENT",
            Role::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Primary per-account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth user.
    pub id: Uuid,
    pub name: Option<String>,
    pub role: Role,
    pub identification: Option<String>,
    #[serde(default)]
    pub is_blocked: bool,
}

/// Staff sub-record joined to a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barber {
    pub profile_id: Uuid,
    pub identification: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

/// Body for inserting a profile.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub identification: String,
    pub is_blocked: bool,
}

/// Partial update for a profile; unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_blocked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identification: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.is_blocked.is_none() && self.identification.is_none()
    }
}

/// One row returned by the identification resolver function.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResolvedEmail {
    pub email: String,
}

/// Profile together with the optional staff record that shares it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountRecord {
    pub profile: Profile,
    pub barber: Option<Barber>,
}

// ============ Auth API Models ============

/// User as returned by the auth admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Page wrapper for `GET /auth/v1/admin/users`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUserPage {
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

/// Admin update for an auth user; unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,
}

/// Result of a password sign-in.
#[derive(Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("user", &self.user)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_deserializes_unknown_role() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "6f1c5a4e-9d0b-4b7a-8f55-0d7b1c2e3a4f",
            "name": "Recepção",
            "role": "RECEPTIONIST",
            "identification": "12",
            "is_blocked": true
        }))
        .unwrap();

        assert_eq!(profile.role, Role::Unknown);
        assert!(profile.is_blocked);
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        let patch = ProfilePatch {
            role: Some(Role::Admin),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"role": "ADMIN"}));
        assert!(ProfilePatch::default().is_empty());
    }

    #[test]
    fn test_auth_user_tolerates_missing_fields() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "6f1c5a4e-9d0b-4b7a-8f55-0d7b1c2e3a4f",
            "email": "admin@chronos.barber",
            "email_confirmed_at": null,
            "created_at": "2024-03-01T12:00:00Z",
            "last_sign_in_at": null
        }))
        .unwrap();

        assert_eq!(user.email.as_deref(), Some("admin@chronos.barber"));
        assert!(user.user_metadata.is_null());
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session: Session = serde_json::from_value(json!({
            "access_token": "secret-access",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "secret-refresh",
            "user": {
                "id": "6f1c5a4e-9d0b-4b7a-8f55-0d7b1c2e3a4f",
                "email": "admin@chronos.barber",
                "email_confirmed_at": null,
                "created_at": null,
                "last_sign_in_at": null
            }
        }))
        .unwrap();

        let printed = format!("{:?}", session);
        assert!(!printed.contains("secret-access"));
        assert!(!printed.contains("secret-refresh"));
    }
}
