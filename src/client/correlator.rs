//! Command correlation.
//!
//! [`Correlator`] turns a command into a `command:<name>` request on the
//! bridge and decodes the matching result. Every call gets a fresh request
//! ID, its own result listener and its own timeout, so concurrent commands
//! of the same name never resolve each other.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::bridge::Bridge;
use crate::error::{Error, Result};
use crate::protocol::{Command, command_type};

// ============================================================================
// Correlator
// ============================================================================

/// Sends commands over a bridge and awaits their results.
#[derive(Debug, Clone)]
pub struct Correlator {
    /// Bridge the commands travel over.
    bridge: Bridge,
    /// Wait applied when the caller gives none.
    default_timeout: Duration,
}

impl Correlator {
    /// Creates a correlator over `bridge`.
    #[inline]
    #[must_use]
    pub fn new(bridge: Bridge, default_timeout: Duration) -> Self {
        Self {
            bridge,
            default_timeout,
        }
    }

    /// Returns the default result timeout.
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Invokes a command by name with the default timeout.
    ///
    /// # Errors
    ///
    /// See [`invoke_with_timeout`](Self::invoke_with_timeout).
    pub async fn invoke(&self, command: &str, payload: Option<Value>) -> Result<Option<Value>> {
        self.invoke_with_timeout(command, payload, self.default_timeout)
            .await
    }

    /// Invokes a command by name and returns the raw result payload.
    ///
    /// # Arguments
    ///
    /// * `command` - Command name without the `command:` prefix
    /// * `payload` - Command arguments
    /// * `timeout` - Wait for this call only
    ///
    /// # Errors
    ///
    /// - [`Error::Destroyed`] if the bridge is torn down before or during the call
    /// - [`Error::RequestTimeout`] if the host does not answer in time
    /// - [`Error::Transport`] if the message cannot be posted
    pub async fn invoke_with_timeout(
        &self,
        command: &str,
        payload: Option<Value>,
        timeout: Duration,
    ) -> Result<Option<Value>> {
        if self.bridge.is_destroyed() {
            return Err(Error::Destroyed);
        }

        let message_type = command_type(command);
        let result = self
            .bridge
            .send_request(&message_type, payload, timeout)
            .await;

        if let Err(e) = &result {
            debug!(command, error = %e, "Command failed");
        }
        result
    }

    /// Invokes a typed command with the default timeout.
    ///
    /// # Errors
    ///
    /// - Any error of [`invoke_with_timeout`](Self::invoke_with_timeout)
    /// - [`Error::Json`] if the arguments or result do not fit their types
    pub async fn call<C: Command>(&self, command: &C) -> Result<C::Output> {
        let payload = command.payload()?;
        let result = self.invoke(C::NAME, payload).await?;
        decode(result)
    }
}

/// Decodes a result payload, treating an absent payload as `null`.
pub(crate) fn decode<T: DeserializeOwned>(payload: Option<Value>) -> Result<T> {
    Ok(serde_json::from_value(payload.unwrap_or(Value::Null))?)
}

// ============================================================================
// Tests
// ============================================================================
