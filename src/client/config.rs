//! Mini-app configuration and builder.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//!
//! let app = MiniApp::builder()
//!     .app_id("quiz")
//!     .target_origin("https://exode.ru")
//!     .timeout(Duration::from_secs(5))
//!     .build(frame)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::protocol::WILDCARD_ORIGIN;
use crate::transport::Frame;

use super::core::MiniApp;

// ============================================================================
// Constants
// ============================================================================

/// Default time to wait for any correlated result.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// MiniAppConfig
// ============================================================================

/// Validated session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiniAppConfig {
    /// Identifier the host knows this mini-app by.
    pub app_id: String,
    /// Host origin, or `"*"` to accept and post to any origin.
    pub target_origin: String,
    /// Default wait for correlated results.
    pub timeout: Duration,
}

impl MiniAppConfig {
    /// Creates a configuration with the default origin and timeout.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            target_origin: WILDCARD_ORIGIN.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        validate_app_id(&self.app_id)?;
        validate_origin(&self.target_origin)?;
        validate_timeout(self.timeout)
    }
}

// ============================================================================
// MiniAppBuilder
// ============================================================================

/// Builder for a [`MiniApp`] session.
///
/// Use [`MiniApp::builder()`] to create one.
#[derive(Debug, Default, Clone)]
pub struct MiniAppBuilder {
    /// Application identifier.
    app_id: Option<String>,
    /// Host origin.
    target_origin: Option<String>,
    /// Result timeout.
    timeout: Option<Duration>,
}

impl MiniAppBuilder {
    /// Creates an empty builder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application identifier sent in the handshake.
    #[inline]
    #[must_use]
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Restricts messaging to one host origin.
    ///
    /// # Arguments
    ///
    /// * `origin` - Serialized origin such as `"https://exode.ru"`, or `"*"`
    #[inline]
    #[must_use]
    pub fn target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = Some(origin.into());
        self
    }

    /// Sets the default wait for correlated results.
    #[inline]
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates the settings into a [`MiniAppConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the app ID is missing or blank
    /// - [`Error::Config`] if the origin is not `"*"` or a bare origin
    /// - [`Error::Config`] if the timeout is zero
    pub fn config(self) -> Result<MiniAppConfig> {
        let app_id = self.app_id.ok_or_else(|| {
            Error::config(
                "App ID is required. Use .app_id() to set it.\n\
                 Example: MiniApp::builder().app_id(\"quiz\")",
            )
        })?;

        let config = MiniAppConfig {
            app_id,
            target_origin: self
                .target_origin
                .unwrap_or_else(|| WILDCARD_ORIGIN.to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
        };
        config.validate()?;
        Ok(config)
    }

    /// Builds the session for `frame`.
    ///
    /// The session starts uninitialized; call [`MiniApp::init`] next.
    ///
    /// # Errors
    ///
    /// Any error of [`config`](Self::config).
    pub fn build(self, frame: Arc<dyn Frame>) -> Result<MiniApp> {
        let config = self.config()?;
        Ok(MiniApp::new(config, frame))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Rejects blank identifiers.
fn validate_app_id(app_id: &str) -> Result<()> {
    if app_id.trim().is_empty() {
        return Err(Error::config("App ID must not be empty"));
    }
    Ok(())
}

/// Accepts `"*"` or a serialized tuple origin (`scheme://host[:port]`).
fn validate_origin(origin: &str) -> Result<()> {
    if origin == WILDCARD_ORIGIN {
        return Ok(());
    }

    let url = Url::parse(origin)
        .map_err(|e| Error::config(format!("Invalid target origin \"{origin}\": {e}")))?;

    let serialized = url.origin().ascii_serialization();
    if serialized != origin {
        return Err(Error::config(format!(
            "Target origin \"{origin}\" is not a bare origin.\n\
             Use scheme://host[:port] without path or trailing slash, e.g. \"{serialized}\"",
        )));
    }

    Ok(())
}

/// Rejects a zero timeout.
fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout.is_zero() {
        return Err(Error::config("Timeout must be greater than zero"));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::transport::TopLevel;

    #[test]
    fn test_defaults() {
        let config = MiniAppBuilder::new().app_id("quiz").config().expect("config");

        assert_eq!(config.app_id, "quiz");
        assert_eq!(config.target_origin, "*");
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config, MiniAppConfig::new("quiz"));
    }

    #[test]
    fn test_missing_app_id() {
        let err = MiniAppBuilder::new().config().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_blank_app_id() {
        let err = MiniAppBuilder::new().app_id("  ").config().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_accepts_bare_origins() {
        for origin in ["https://exode.ru", "http://localhost:3000", "*"] {
            let config = MiniAppBuilder::new()
                .app_id("quiz")
                .target_origin(origin)
                .config();
            assert!(config.is_ok(), "{origin} should be accepted");
        }
    }

    #[test]
    fn test_rejects_non_origins() {
        for origin in [
            "exode.ru",
            "https://exode.ru/",
            "https://exode.ru/app",
            "https://exode.ru:443",
            "",
        ] {
            let err = MiniAppBuilder::new()
                .app_id("quiz")
                .target_origin(origin)
                .config()
                .unwrap_err();
            assert!(matches!(err, Error::Config { .. }), "{origin} should be rejected");
        }
    }

    #[test]
    fn test_zero_timeout() {
        let err = MiniAppBuilder::new()
            .app_id("quiz")
            .timeout(Duration::ZERO)
            .config()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_starts_uninitialized() {
        let app = MiniAppBuilder::new()
            .app_id("quiz")
            .build(Arc::new(TopLevel))
            .expect("build");

        assert_eq!(app.state(), crate::client::State::Uninitialized);
        assert_eq!(app.config().app_id, "quiz");
    }
}
