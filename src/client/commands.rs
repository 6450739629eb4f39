//! Host command wrappers.
//!
//! Each method is a fixed-arity shorthand for [`MiniApp::invoke`] with the
//! matching command type.
//!
//! | Method | Wire type |
//! |--------|-----------|
//! | `navigate` | `command:navigate` |
//! | `navigate_back` | `command:navigate:back` |
//! | `show_snackbar` | `command:showSnackbar` |
//! | `set_tabbar_visible` | `command:setTabbarVisible` |
//! | `set_header_visible` | `command:setHeaderVisible` |
//! | `close` | `command:close` |
//!
//! # Errors
//!
//! Every method fails like [`MiniApp::invoke`].

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::error::Result;
use crate::protocol::{
    Close, Navigate, NavigateBack, SetHeaderVisible, SetTabbarVisible, ShowSnackbar,
};

use super::core::MiniApp;

// ============================================================================
// MiniApp - Navigation
// ============================================================================

impl MiniApp {
    /// Asks the host to navigate to `path`.
    pub async fn navigate(
        &self,
        path: impl Into<String>,
        params: Option<BTreeMap<String, String>>,
    ) -> Result<()> {
        let command = Navigate {
            path: path.into(),
            params,
        };
        self.invoke(&command).await?;
        Ok(())
    }

    /// Asks the host to go back.
    pub async fn navigate_back(&self) -> Result<()> {
        self.invoke(&NavigateBack).await?;
        Ok(())
    }
}

// ============================================================================
// MiniApp - UI
// ============================================================================

impl MiniApp {
    /// Shows a snackbar in the host UI.
    pub async fn show_snackbar(&self, snackbar: ShowSnackbar) -> Result<()> {
        self.invoke(&snackbar).await?;
        Ok(())
    }

    /// Shows or hides the host tab bar.
    pub async fn set_tabbar_visible(&self, visible: bool) -> Result<()> {
        self.invoke(&SetTabbarVisible { visible }).await?;
        Ok(())
    }

    /// Shows or hides the host header.
    pub async fn set_header_visible(&self, visible: bool) -> Result<()> {
        self.invoke(&SetHeaderVisible { visible }).await?;
        Ok(())
    }

    /// Asks the host to close the mini-app.
    pub async fn close(&self) -> Result<()> {
        self.invoke(&Close).await?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio_test::assert_ok;

    use crate::bridge::Bridge;
    use crate::client::MiniApp;
    use crate::protocol::{Envelope, INIT_TYPE, SnackbarKind, ShowSnackbar, Source};
    use crate::transport::MemoryChannel;

    const HOST_ORIGIN: &str = "https://exode.ru";
    const APP_ORIGIN: &str = "https://quiz.exode.ru";

    /// Ready mini-app whose host answers everything and records commands.
    async fn ready() -> (MiniApp, Bridge, Arc<Mutex<Vec<Envelope>>>) {
        let channel = MemoryChannel::new(HOST_ORIGIN, APP_ORIGIN);
        let host = Bridge::new(Arc::new(channel.host()), Source::Host, APP_ORIGIN);
        let commands = Arc::new(Mutex::new(Vec::new()));

        let responder = host.clone();
        host.on(
            INIT_TYPE,
            Arc::new(move |envelope: &Envelope| {
                let context = json!({
                    "user": {"id": 1, "role": "student"},
                    "theme": {"scheme": "light"},
                    "platform": "ios",
                    "config": {"isDesktop": false, "isMobile": true, "language": "ru"}
                });
                responder
                    .reply(envelope, Some(json!({"context": context})))
                    .expect("reply");
            }),
        );

        for name in [
            "navigate",
            "navigate:back",
            "showSnackbar",
            "setTabbarVisible",
            "setHeaderVisible",
            "close",
        ] {
            let responder = host.clone();
            let sink = Arc::clone(&commands);
            host.on(
                format!("command:{name}"),
                Arc::new(move |envelope: &Envelope| {
                    sink.lock().push(envelope.clone());
                    responder
                        .reply(envelope, Some(json!({"ok": true})))
                        .expect("reply");
                }),
            );
        }

        let app = MiniApp::builder()
            .app_id("quiz")
            .target_origin(HOST_ORIGIN)
            .timeout(Duration::from_secs(1))
            .build(Arc::new(channel.app()))
            .expect("build");
        assert_ok!(app.init().await);

        (app, host, commands)
    }

    fn sent(commands: &Mutex<Vec<Envelope>>) -> Vec<(String, Option<Value>)> {
        commands
            .lock()
            .iter()
            .map(|e| (e.message_type.clone(), e.payload.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_navigation_commands() {
        let (app, _host, commands) = ready().await;

        let params = [("id".to_string(), "7".to_string())].into_iter().collect();
        assert_ok!(app.navigate("/lessons", Some(params)).await);
        assert_ok!(app.navigate_back().await);

        assert_eq!(
            sent(&commands),
            vec![
                (
                    "command:navigate".to_string(),
                    Some(json!({"path": "/lessons", "params": {"id": "7"}}))
                ),
                ("command:navigate:back".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_ui_commands() {
        let (app, _host, commands) = ready().await;

        assert_ok!(
            app.show_snackbar(ShowSnackbar::new("Saved").with_kind(SnackbarKind::Success))
                .await
        );
        assert_ok!(app.set_tabbar_visible(false).await);
        assert_ok!(app.set_header_visible(true).await);
        assert_ok!(app.close().await);

        assert_eq!(
            sent(&commands),
            vec![
                (
                    "command:showSnackbar".to_string(),
                    Some(json!({"message": "Saved", "type": "success"}))
                ),
                (
                    "command:setTabbarVisible".to_string(),
                    Some(json!({"visible": false}))
                ),
                (
                    "command:setHeaderVisible".to_string(),
                    Some(json!({"visible": true}))
                ),
                ("command:close".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_commands_resolve_independently() {
        let (app, _host, commands) = ready().await;

        let (a, b, c) = tokio::join!(
            app.set_tabbar_visible(true),
            app.set_tabbar_visible(false),
            app.close()
        );
        assert_ok!(a);
        assert_ok!(b);
        assert_ok!(c);

        let commands = commands.lock();
        assert_eq!(commands.len(), 3);
        assert_ne!(commands[0].request_id, commands[1].request_id);
    }
}
