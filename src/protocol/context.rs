//! Session snapshot shapes.
//!
//! [`Context`] is the mini-app's view of host-side state. It is delivered by
//! the `init` handshake and later patched by `context:updated` events via
//! [`Context::merged`], which builds a new snapshot instead of mutating the
//! one readers may still hold.

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Constants
// ============================================================================

/// Language assumed when the host has not told us one.
pub const DEFAULT_LANGUAGE: &str = "ru";

// ============================================================================
// Context
// ============================================================================

/// Snapshot of host-side session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Current user.
    pub user: User,
    /// School data, passed through untyped.
    #[serde(default)]
    pub school: Map<String, Value>,
    /// Host theme.
    pub theme: Theme,
    /// Platform the host runs on.
    #[serde(default)]
    pub platform: Platform,
    /// Layout and language settings.
    pub config: AppConfig,
}

impl Context {
    /// Returns a new snapshot with every field present in `update` replaced.
    ///
    /// The merge is shallow: a present `user` replaces the whole user,
    /// absent fields keep their current value.
    #[must_use]
    pub fn merged(&self, update: &ContextUpdate) -> Self {
        Self {
            user: update.user.clone().unwrap_or_else(|| self.user.clone()),
            school: update.school.clone().unwrap_or_else(|| self.school.clone()),
            theme: update.theme.clone().unwrap_or_else(|| self.theme.clone()),
            platform: update.platform.unwrap_or(self.platform),
            config: update.config.clone().unwrap_or_else(|| self.config.clone()),
        }
    }

    /// Returns `true` if a real user is signed in on the host.
    #[inline]
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.user.id > 0
    }

    /// Returns the UI language, falling back to [`DEFAULT_LANGUAGE`].
    #[inline]
    #[must_use]
    pub fn language(&self) -> &str {
        if self.config.language.is_empty() {
            DEFAULT_LANGUAGE
        } else {
            &self.config.language
        }
    }
}

// ============================================================================
// ContextUpdate
// ============================================================================

/// Partial context carried by `context:updated`.
///
/// Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextUpdate {
    /// Replacement user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Replacement school data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school: Option<Map<String, Value>>,
    /// Replacement theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// Replacement platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    /// Replacement config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<AppConfig>,
}

impl ContextUpdate {
    /// Decodes every known key of `payload` on its own.
    ///
    /// A key whose value does not fit its type is left out of the update
    /// and reported next to its error; the other keys still apply.
    /// Unknown keys are ignored.
    #[must_use]
    pub fn from_fields(
        payload: &Map<String, Value>,
    ) -> (Self, Vec<(&'static str, serde_json::Error)>) {
        let mut rejected = Vec::new();
        let update = Self {
            user: field(payload, "user", &mut rejected),
            school: field(payload, "school", &mut rejected),
            theme: field(payload, "theme", &mut rejected),
            platform: field(payload, "platform", &mut rejected),
            config: field(payload, "config", &mut rejected),
        };
        (update, rejected)
    }

    /// Returns `true` if the update changes nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.school.is_none()
            && self.theme.is_none()
            && self.platform.is_none()
            && self.config.is_none()
    }
}

/// Decodes `payload[key]`, recording a failure in `rejected`.
fn field<T: DeserializeOwned>(
    payload: &Map<String, Value>,
    key: &'static str,
    rejected: &mut Vec<(&'static str, serde_json::Error)>,
) -> Option<T> {
    let value = payload.get(key)?;
    match T::deserialize(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            rejected.push((key, e));
            None
        }
    }
}

// ============================================================================
// User
// ============================================================================

/// Host user profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID; `0` for guests.
    pub id: i64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<Avatar>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Role name as the host reports it.
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Avatar image set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub id: i64,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub maximum: Option<String>,
}

// ============================================================================
// Theme
// ============================================================================

/// Host theme.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Color scheme.
    pub scheme: ColorScheme,
}

/// Light or dark color scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
    /// Any scheme this crate does not know yet.
    #[serde(other)]
    Other,
}

impl ColorScheme {
    /// Returns `true` for the dark scheme.
    #[inline]
    #[must_use]
    pub const fn is_dark(&self) -> bool {
        matches!(self, Self::Dark)
    }
}

// ============================================================================
// Platform
// ============================================================================

/// Platform the host application runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Web,
    Ios,
    Android,
    /// Any platform tag this crate does not know yet.
    #[serde(other)]
    Other,
}

// ============================================================================
// AppConfig
// ============================================================================

/// Layout and language settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub is_desktop: bool,
    #[serde(default)]
    pub is_mobile: bool,
    #[serde(default)]
    pub language: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn sample() -> Context {
        serde_json::from_value(json!({
            "user": {"id": 42, "uuid": "u-42", "firstName": "Ada", "lastName": null,
                     "avatar": null, "email": null, "phone": null, "role": "student",
                     "language": "en"},
            "school": {"id": 7, "name": "Exode"},
            "theme": {"scheme": "light"},
            "platform": "web",
            "config": {"isDesktop": true, "isMobile": false, "language": "en"}
        }))
        .expect("valid context")
    }

    #[test]
    fn test_context_deserializes_camel_case() {
        let context = sample();
        assert_eq!(context.user.first_name.as_deref(), Some("Ada"));
        assert!(context.config.is_desktop);
        assert_eq!(context.school.get("id"), Some(&json!(7)));
    }

    #[test]
    fn test_merge_replaces_only_present_fields() {
        let context = sample();
        let update: ContextUpdate =
            serde_json::from_value(json!({"theme": {"scheme": "dark"}})).expect("valid update");

        let merged = context.merged(&update);
        assert!(merged.theme.scheme.is_dark());
        assert_eq!(merged.user, context.user);
        assert_eq!(merged.school, context.school);
        assert!(!context.theme.scheme.is_dark());
    }

    #[test]
    fn test_merge_is_shallow() {
        let context = sample();
        let update: ContextUpdate =
            serde_json::from_value(json!({"user": {"id": 0, "role": "guest"}})).expect("update");

        let merged = context.merged(&update);
        assert_eq!(merged.user.id, 0);
        assert!(merged.user.first_name.is_none());
        assert!(!merged.is_logged_in());
    }

    #[test]
    fn test_update_ignores_unknown_keys() {
        let update: ContextUpdate =
            serde_json::from_value(json!({"somethingNew": 1})).expect("update");
        assert!(update.is_empty());
    }

    #[test]
    fn test_from_fields_keeps_valid_siblings() {
        let payload = json!({
            "theme": {"scheme": "dark"},
            "config": {"isDesktop": "yes"},
            "somethingNew": true
        });
        let (update, rejected) =
            ContextUpdate::from_fields(payload.as_object().expect("object"));

        assert_eq!(update.theme.map(|t| t.scheme), Some(ColorScheme::Dark));
        assert!(update.config.is_none());
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "config");
    }

    #[test]
    fn test_unknown_color_scheme() {
        let theme: Theme = serde_json::from_value(json!({"scheme": "system"})).expect("theme");
        assert_eq!(theme.scheme, ColorScheme::Other);
        assert!(!theme.scheme.is_dark());
    }

    #[test]
    fn test_unknown_platform() {
        let platform: Platform = serde_json::from_value(json!("smart-tv")).expect("platform");
        assert_eq!(platform, Platform::Other);
    }

    #[test]
    fn test_language_fallback() {
        let mut context = sample();
        assert_eq!(context.language(), "en");
        context.config.language.clear();
        assert_eq!(context.language(), DEFAULT_LANGUAGE);
    }
}
