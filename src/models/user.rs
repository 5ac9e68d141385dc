//! Identity, profile and current-user models.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Display name used when neither the profile nor the identity carries one.
pub const DEFAULT_DISPLAY_NAME: &str = "Utilizador";

/// Provider metadata attached to an identity by the auth service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    /// Full name (set by OAuth providers such as Google)
    #[serde(default)]
    pub full_name: Option<String>,
    /// Name supplied at sign-up
    #[serde(default)]
    pub name: Option<String>,
}

/// Signed-in principal as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque user id (also the profile id)
    pub id: String,
    /// Email address (absent for some providers)
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "user_metadata")]
    pub metadata: UserMetadata,
    /// When the identity was created (ISO 8601)
    #[serde(default)]
    pub created_at: String,
}

impl Identity {
    /// Best-effort display name: provider full name, sign-up name,
    /// local part of the email, then a generic placeholder.
    pub fn display_name(&self) -> String {
        let from_metadata = self
            .metadata
            .full_name
            .as_deref()
            .or(self.metadata.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty());

        if let Some(name) = from_metadata {
            return name.to_string();
        }

        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME)
            .to_string()
    }

    pub fn email_or_empty(&self) -> String {
        self.email.clone().unwrap_or_default()
    }
}

/// Live auth session held by the auth client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (unix seconds)
    pub expires_at: i64,
    pub user: Identity,
}

/// Application role. Elevation to admin happens outside this service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Application profile row in the `profiles` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same as the identity id
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: String,
}

/// Insert payload for a new profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewProfile {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: Role,
}

impl NewProfile {
    /// Profile derived from identity fields alone.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email_or_empty(),
            name: identity.display_name(),
            phone: None,
            role: Role::User,
        }
    }
}

/// Where the current user's profile fields came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum UserSource {
    /// An existing profile row
    Profile,
    /// A profile created during this hydration
    Provisioned,
    /// Identity fields only (profile lookup or creation failed)
    Identity,
}

/// In-memory merge of identity and profile used for gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CurrentUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub source: UserSource,
}

impl CurrentUser {
    /// Merge a stored profile with the identity it belongs to.
    pub fn from_profile(identity: &Identity, profile: &Profile) -> Self {
        let email = identity
            .email
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| profile.email.clone());

        let created_at = if profile.created_at.is_empty() {
            identity.created_at.clone()
        } else {
            profile.created_at.clone()
        };

        Self {
            id: identity.id.clone(),
            email,
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            role: profile.role,
            created_at,
            source: UserSource::Profile,
        }
    }

    /// Build from a profile inserted during hydration.
    pub fn provisioned(identity: &Identity, profile: &NewProfile) -> Self {
        Self {
            id: identity.id.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            role: profile.role,
            created_at: identity.created_at.clone(),
            source: UserSource::Provisioned,
        }
    }

    /// Identity-only fallback with the default role.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            id: identity.id.clone(),
            email: identity.email_or_empty(),
            name: identity.display_name(),
            phone: None,
            role: Role::User,
            created_at: identity.created_at.clone(),
            source: UserSource::Identity,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: Option<&str>, full_name: Option<&str>, name: Option<&str>) -> Identity {
        Identity {
            id: "u-1".to_string(),
            email: email.map(String::from),
            metadata: UserMetadata {
                full_name: full_name.map(String::from),
                name: name.map(String::from),
            },
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        let id = identity(Some("ana@example.com"), Some("Ana Silva"), Some("Ana"));
        assert_eq!(id.display_name(), "Ana Silva");
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let id = identity(Some("joao.p@example.com"), None, Some("  "));
        assert_eq!(id.display_name(), "joao.p");
    }

    #[test]
    fn test_display_name_placeholder_without_email() {
        let id = identity(None, None, None);
        assert_eq!(id.display_name(), DEFAULT_DISPLAY_NAME);
    }

    #[test]
    fn test_profile_merge_uses_identity_email() {
        let id = identity(Some("new@example.com"), None, None);
        let profile = Profile {
            id: "u-1".to_string(),
            email: "old@example.com".to_string(),
            name: "Maria".to_string(),
            phone: Some("+351912345678".to_string()),
            role: Role::Admin,
            created_at: "2024-06-01T00:00:00Z".to_string(),
        };

        let user = CurrentUser::from_profile(&id, &profile);
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.name, "Maria");
        assert!(user.is_admin());
        assert_eq!(user.created_at, "2024-06-01T00:00:00Z");
        assert_eq!(user.source, UserSource::Profile);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
    }
}
