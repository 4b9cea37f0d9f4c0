//! Session management backed by PostgreSQL.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use tower_sessions::cookie::SameSite;
use tower_sessions::cookie::time::{Duration, OffsetDateTime};
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store::{self, SessionStore};
use tower_sessions::{Expiry, SessionManagerLayer};
use tracing::{debug, warn};

use crate::config::Config;

/// Session key for the authenticated user's ID.
pub const SESSION_USER_ID: &str = "user_id";

/// Name of the session cookie.
pub const SESSION_COOKIE_NAME: &str = "quire_session";

/// Session lifetime (24 hours).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 24;

/// How often expired sessions are purged.
pub const CLEANUP_INTERVAL: StdDuration = StdDuration::from_secs(60 * 60);

/// Session store keeping records in the `sessions` table.
///
/// Session ids are the random cookie tokens; the primary key guarantees
/// they are unique. Expired rows are never returned.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Remove all expired sessions, returning how many were deleted.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expiry_date <= $1")
            .bind(OffsetDateTime::now_utc().unix_timestamp())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Purge expired sessions every [`CLEANUP_INTERVAL`] in the background.
    pub fn spawn_cleanup(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                match self.delete_expired().await {
                    Ok(0) => {}
                    Ok(count) => debug!(count, "expired sessions removed"),
                    Err(e) => warn!(error = %e, "failed to remove expired sessions"),
                }
            }
        })
    }

    async fn insert(&self, record: &Record) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sessions (id, data, expiry_date) VALUES ($1, $2, $3) ON CONFLICT (id) DO NOTHING",
        )
        .bind(record.id.to_string())
        .bind(Json(&record.data))
        .bind(record.expiry_date.unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn backend(e: impl std::fmt::Display) -> session_store::Error {
    session_store::Error::Backend(e.to_string())
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        // A colliding id gets a fresh one instead of overwriting a live session.
        while !self.insert(record).await.map_err(backend)? {
            record.id = Id::default();
        }
        Ok(())
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, data, expiry_date) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET data = EXCLUDED.data, expiry_date = EXCLUDED.expiry_date
            "#,
        )
        .bind(record.id.to_string())
        .bind(Json(&record.data))
        .bind(record.expiry_date.unix_timestamp())
        .execute(&self.pool)
        .await
        .map_err(backend)?;
        Ok(())
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        let row: Option<(Json<HashMap<String, Value>>, i64)> = sqlx::query_as(
            "SELECT data, expiry_date FROM sessions WHERE id = $1 AND expiry_date > $2",
        )
        .bind(session_id.to_string())
        .bind(OffsetDateTime::now_utc().unix_timestamp())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some((Json(data), expiry)) = row else {
            return Ok(None);
        };
        let expiry_date = OffsetDateTime::from_unix_timestamp(expiry)
            .map_err(|e| session_store::Error::Decode(e.to_string()))?;

        Ok(Some(Record {
            id: *session_id,
            data,
            expiry_date,
        }))
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

/// Parse a SameSite policy name; unknown values mean `Lax`.
pub fn same_site(value: &str) -> SameSite {
    match value.to_ascii_lowercase().as_str() {
        "strict" => SameSite::Strict,
        "none" => SameSite::None,
        _ => SameSite::Lax,
    }
}

/// Build the session layer for any store.
///
/// The inactivity expiry only applies to anonymous sessions; logging in
/// pins an absolute expiry.
pub fn session_layer<S: SessionStore + Clone>(store: S, config: &Config) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_path("/")
        .with_secure(config.secure_cookies)
        .with_http_only(true)
        .with_same_site(same_site(&config.cookie_same_site))
        .with_expiry(Expiry::OnInactivity(Duration::hours(
            DEFAULT_SESSION_EXPIRY_HOURS,
        )))
}

/// Absolute expiry for a session created by logging in now.
pub fn login_expiry() -> Expiry {
    Expiry::AtDateTime(OffsetDateTime::now_utc() + Duration::hours(DEFAULT_SESSION_EXPIRY_HOURS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_site_parsing() {
        assert_eq!(same_site("Strict"), SameSite::Strict);
        assert_eq!(same_site("none"), SameSite::None);
        assert_eq!(same_site("lax"), SameSite::Lax);
        assert_eq!(same_site("bogus"), SameSite::Lax);
    }

    #[test]
    fn login_expiry_is_absolute() {
        let Expiry::AtDateTime(at) = login_expiry() else {
            panic!("expected an absolute expiry");
        };
        let remaining = at - OffsetDateTime::now_utc();
        assert!(remaining > Duration::hours(23));
        assert!(remaining <= Duration::hours(24));
    }
}
