//! CSRF token generation and verification.
//!
//! Tokens are kept in the session, are single-use and expire after an
//! hour. The bookkeeping is split into pure functions over the stored list
//! so it can be tested without a session.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tower_sessions::Session;

use crate::error::AppError;

/// Session key for storing CSRF tokens.
const CSRF_SESSION_KEY: &str = "csrf_tokens";

/// Maximum number of tokens to store per session.
const MAX_TOKENS: usize = 10;

/// Token validity period in seconds (1 hour).
const TOKEN_VALIDITY_SECS: i64 = 3600;

/// Form field carrying the token.
pub const CSRF_FIELD: &str = "csrf_token";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IssuedToken {
    token: String,
    issued_at: i64,
}

fn new_token(now: i64) -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let mut hasher = Sha256::new();
    hasher.update(random_bytes);
    hasher.update(now.to_le_bytes());
    hex::encode(hasher.finalize())
}

fn is_fresh(token: &IssuedToken, now: i64) -> bool {
    now - token.issued_at <= TOKEN_VALIDITY_SECS
}

/// Add a token, dropping expired ones and keeping at most [`MAX_TOKENS`].
fn issue(tokens: &mut Vec<IssuedToken>, now: i64) -> String {
    let token = new_token(now);
    tokens.retain(|t| is_fresh(t, now));
    tokens.push(IssuedToken {
        token: token.clone(),
        issued_at: now,
    });
    if tokens.len() > MAX_TOKENS {
        tokens.drain(..tokens.len() - MAX_TOKENS);
    }
    token
}

/// Remove `submitted` from the list; true when it was present and fresh.
fn consume(tokens: &mut Vec<IssuedToken>, submitted: &str, now: i64) -> bool {
    let found = tokens
        .iter()
        .position(|t| t.token == submitted && is_fresh(t, now));
    tokens.retain(|t| is_fresh(t, now));
    match found {
        Some(_) => {
            tokens.retain(|t| t.token != submitted);
            true
        }
        None => false,
    }
}

async fn load(session: &Session) -> Vec<IssuedToken> {
    session
        .get(CSRF_SESSION_KEY)
        .await
        .unwrap_or(None)
        .unwrap_or_default()
}

/// Generate a CSRF token and store it in the session.
pub async fn generate_csrf_token(session: &Session) -> Result<String, AppError> {
    let mut tokens = load(session).await;
    let token = issue(&mut tokens, chrono::Utc::now().timestamp());

    session
        .insert(CSRF_SESSION_KEY, tokens)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to store CSRF token: {e}")))?;

    Ok(token)
}

/// Verify and consume a CSRF token.
pub async fn verify_csrf_token(session: &Session, submitted: &str) -> Result<bool, AppError> {
    if submitted.is_empty() {
        return Ok(false);
    }

    let mut tokens = load(session).await;
    if tokens.is_empty() {
        return Ok(false);
    }

    let valid = consume(&mut tokens, submitted, chrono::Utc::now().timestamp());
    session
        .insert(CSRF_SESSION_KEY, tokens)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to update CSRF tokens: {e}")))?;

    Ok(valid)
}

/// Reject the request unless `submitted` is a valid token.
pub async fn require_csrf(session: &Session, submitted: &str) -> Result<(), AppError> {
    if verify_csrf_token(session, submitted).await? {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "invalid or expired form token, please reload the page".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_hex_sha256() {
        let mut tokens = Vec::new();
        let token = issue(&mut tokens, 1_000);
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tokens_are_single_use() {
        let mut tokens = Vec::new();
        let token = issue(&mut tokens, 1_000);
        assert!(consume(&mut tokens, &token, 1_001));
        assert!(!consume(&mut tokens, &token, 1_002));
    }

    #[test]
    fn tokens_expire() {
        let mut tokens = Vec::new();
        let token = issue(&mut tokens, 1_000);
        assert!(!consume(&mut tokens, &token, 1_000 + TOKEN_VALIDITY_SECS + 1));
        assert!(tokens.is_empty());
    }

    #[test]
    fn unknown_token_keeps_others() {
        let mut tokens = Vec::new();
        let token = issue(&mut tokens, 1_000);
        assert!(!consume(&mut tokens, "bogus", 1_001));
        assert!(consume(&mut tokens, &token, 1_002));
    }

    #[test]
    fn list_is_capped() {
        let mut tokens = Vec::new();
        let first = issue(&mut tokens, 1_000);
        for _ in 0..MAX_TOKENS {
            issue(&mut tokens, 1_000);
        }
        assert_eq!(tokens.len(), MAX_TOKENS);
        assert!(!consume(&mut tokens, &first, 1_001));
    }
}
