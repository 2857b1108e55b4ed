//! Notification handler traits and implementations

use serde_json::Value;
use tracing::debug;

/// Side channel for server notifications seen while waiting for responses.
///
/// Called synchronously from the wait loop, so implementations should return
/// quickly.
pub trait SyncNotificationHandler: Send + Sync {
    /// Handle a notification
    fn handle(&self, method: &str, params: Option<&Value>);
}

/// Default notification handler that logs notifications
pub struct LoggingNotificationHandler;

impl SyncNotificationHandler for LoggingNotificationHandler {
    fn handle(&self, method: &str, params: Option<&Value>) {
        debug!("MCP notification: {} {:?}", method, params);
    }
}

impl<F> SyncNotificationHandler for F
where
    F: Fn(&str, Option<&Value>) + Send + Sync,
{
    fn handle(&self, method: &str, params: Option<&Value>) {
        self(method, params)
    }
}
