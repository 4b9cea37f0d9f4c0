//! User model and CRUD operations.

use anyhow::{Context, Result};
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "id, first_name, last_name, email, password_hash, created_at, updated_at";

/// User record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new user.
#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

/// Input for updating a user.
///
/// An empty or missing password leaves the current one in place.
#[derive(Debug, Deserialize)]
pub struct UpdateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Option<String>,
}

impl User {
    /// Display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Find a user by ID.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("failed to fetch user by id")?;

        Ok(user)
    }

    /// Find a user by email, ignoring case.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE lower(email) = lower($1)"
        ))
        .bind(email.trim())
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by email")?;

        Ok(user)
    }

    /// Create a new user with a freshly hashed password.
    pub async fn create(pool: &PgPool, input: CreateUser) -> Result<Self> {
        let id = Uuid::now_v7();
        let password_hash = hash_password(&input.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.email.trim())
        .bind(&password_hash)
        .fetch_one(pool)
        .await
        .context("failed to create user")?;

        Ok(user)
    }

    /// Update a user.
    pub async fn update(pool: &PgPool, id: Uuid, input: UpdateUser) -> Result<Option<Self>> {
        let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET first_name = $1, last_name = $2, email = $3,
                password_hash = COALESCE($4, password_hash), updated_at = now()
            WHERE id = $5
            RETURNING {COLUMNS}
            "#
        ))
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(input.email.trim())
        .bind(password_hash)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to update user")?;

        Ok(user)
    }

    /// List all users ordered by name.
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Self>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users ORDER BY last_name, first_name"
        ))
        .fetch_all(pool)
        .await
        .context("failed to list users")?;

        Ok(users)
    }

    /// Count all users.
    pub async fn count(pool: &PgPool) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .context("failed to count users")?;

        Ok(count.0)
    }

    /// Count users with this email, optionally ignoring one user.
    pub async fn count_by_email(pool: &PgPool, email: &str, except: Option<Uuid>) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE lower(email) = lower($1) AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(email.trim())
        .bind(except)
        .fetch_one(pool)
        .await
        .context("failed to count users by email")?;

        Ok(count.0)
    }

    /// Delete a user.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await
            .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    /// Verify a password against this user's hash.
    pub fn verify_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return false;
        }

        let Ok(parsed_hash) = PasswordHash::new(&self.password_hash) else {
            return false;
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user_with_hash(password_hash: String) -> User {
        User {
            id: Uuid::now_v7(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            password_hash,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("Secr3t!pass").unwrap();
        assert!(hash.starts_with("$argon2"));

        let user = user_with_hash(hash);
        assert!(user.verify_password("Secr3t!pass"));
        assert!(!user.verify_password("wrong"));
    }

    #[test]
    fn empty_or_garbage_hash_never_verifies() {
        assert!(!user_with_hash(String::new()).verify_password(""));
        assert!(!user_with_hash("not-a-hash".into()).verify_password("not-a-hash"));
    }

    #[test]
    fn hash_is_not_serialized() {
        let user = user_with_hash("$argon2id$secret".into());
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
