//! One-shot notices carried to the next rendered page.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

const FLASH_SESSION_KEY: &str = "flash";

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message shown once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }
}

/// Queue a message for the next render. Failures are logged, not raised.
pub async fn push_flash(session: &Session, flash: Flash) {
    let mut queued: Vec<Flash> = session
        .get(FLASH_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default();
    queued.push(flash);

    if let Err(e) = session.insert(FLASH_SESSION_KEY, queued).await {
        warn!(error = %e, "failed to store flash message");
    }
}

/// Take all queued messages, leaving none behind.
pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(FLASH_SESSION_KEY).await {
        Ok(flashes) => flashes.unwrap_or_default(),
        Err(e) => {
            warn!(error = %e, "failed to read flash messages");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn flashes_are_consumed_once() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);

        push_flash(&session, Flash::success("saved")).await;
        push_flash(&session, Flash::error("but also broken")).await;

        let taken = take_flashes(&session).await;
        assert_eq!(taken.len(), 2);
        assert_eq!(taken[0].level, FlashLevel::Success);
        assert_eq!(taken[1].message, "but also broken");

        assert!(take_flashes(&session).await.is_empty());
    }

    #[test]
    fn level_serializes_lowercase() {
        let json = serde_json::to_string(&Flash::error("x")).unwrap();
        assert_eq!(json, r#"{"level":"error","message":"x"}"#);
    }
}
