/**
 * SQL User Store
 *
 * PostgreSQL implementation of the `UserStore` contract over the shared
 * database resource. Reads go through the replica pool when one is
 * configured; writes always hit the primary.
 *
 * Expected schema:
 *
 * ```sql
 * CREATE TABLE users (
 *     id UUID PRIMARY KEY,
 *     email TEXT NOT NULL UNIQUE,
 *     full_name TEXT NOT NULL,
 *     password_hash TEXT,
 *     is_active BOOLEAN NOT NULL DEFAULT TRUE,
 *     roles JSONB NOT NULL DEFAULT '[]',
 *     signup_info JSONB NOT NULL DEFAULT '{}',
 *     created TIMESTAMPTZ NOT NULL,
 *     modified TIMESTAMPTZ NOT NULL
 * );
 * ```
 */

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServiceError;

use super::store::{CreateUserOutcome, NewUser, UserRecord, UserStore};

const USER_COLUMNS: &str =
    "id, email, full_name, password_hash, is_active, roles, signup_info, created, modified";

/// Database row shape for the users table.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    full_name: String,
    #[allow(dead_code)]
    password_hash: Option<String>,
    is_active: bool,
    roles: Json<Vec<String>>,
    signup_info: Json<Map<String, Value>>,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        UserRecord {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            is_active: row.is_active,
            roles: row.roles.0,
            signup_info: row.signup_info.0,
            created: row.created,
            modified: row.modified,
        }
    }
}

/// `UserStore` over the shared PostgreSQL resource.
pub struct SqlUserStore {
    database: Arc<Database>,
}

impl SqlUserStore {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    async fn write_pool(&self) -> Result<PgPool, ServiceError> {
        self.database.pool().await.ok_or(ServiceError::NotConnected)
    }

    async fn read_pool(&self) -> Result<PgPool, ServiceError> {
        self.database
            .read_pool()
            .await
            .ok_or(ServiceError::NotConnected)
    }
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn get_user(&self, email: &str) -> Result<Option<UserRecord>, ServiceError> {
        let pool = self.read_pool().await?;
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&pool)
        .await?;
        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&self, user: NewUser) -> Result<CreateUserOutcome, ServiceError> {
        let pool = self.write_pool().await?;
        let password_hash = match &user.password {
            Some(plaintext) => Some(hash_password(plaintext)?),
            None => None,
        };
        let now = Utc::now();

        let inserted = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (id, email, full_name, password_hash, is_active, roles, signup_info, created, modified)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&password_hash)
        .bind(Json(&user.roles))
        .bind(Json(&user.signup_info))
        .bind(now)
        .fetch_one(&pool)
        .await;

        match inserted {
            Ok(row) => Ok(CreateUserOutcome::Created(row.into())),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                let mut errors = Map::new();
                errors.insert("email".to_string(), json!(["value_error.duplicate"]));
                Ok(CreateUserOutcome::Rejected(errors))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_user(&self, email: &str) -> Result<bool, ServiceError> {
        let pool = self.write_pool().await?;
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_password(&self, email: &str, plaintext: &str) -> Result<(), ServiceError> {
        let pool = self.write_pool().await?;
        let password_hash = hash_password(plaintext)?;
        sqlx::query("UPDATE users SET password_hash = $1, modified = $2 WHERE email = $3")
            .bind(&password_hash)
            .bind(Utc::now())
            .bind(email)
            .execute(&pool)
            .await?;
        Ok(())
    }

    async fn check_password(&self, email: &str, plaintext: &str) -> Result<bool, ServiceError> {
        let pool = self.read_pool().await?;
        let hash: Option<Option<String>> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE email = $1")
                .bind(email)
                .fetch_optional(&pool)
                .await?;
        let Some(Some(hash)) = hash else {
            return Ok(false);
        };
        match bcrypt::verify(plaintext, &hash) {
            Ok(matches) => Ok(matches),
            Err(e) => {
                tracing::error!(error = %e, "stored password hash failed verification");
                Ok(false)
            }
        }
    }

    async fn verify_user(&self, email: &str) -> Result<(), ServiceError> {
        let pool = self.write_pool().await?;
        sqlx::query(
            r#"
            UPDATE users
            SET signup_info = jsonb_set(signup_info, '{verified}', 'true'), modified = $1
            WHERE email = $2
            "#,
        )
        .bind(Utc::now())
        .bind(email)
        .execute(&pool)
        .await?;
        Ok(())
    }
}

fn hash_password(plaintext: &str) -> Result<String, ServiceError> {
    bcrypt::hash(plaintext, bcrypt::DEFAULT_COST).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        ServiceError::validation("password", "Password could not be processed")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_round_trip() {
        let hash = hash_password("hunter2").unwrap();
        assert_ne!(hash, "hunter2");
        assert!(bcrypt::verify("hunter2", &hash).unwrap());
        assert!(!bcrypt::verify("wrong", &hash).unwrap());
    }

    #[tokio::test]
    async fn test_store_requires_connection() {
        let store = SqlUserStore::new(Arc::new(Database::new(
            "postgres://localhost/app",
            None,
            None,
        )));
        let result = store.get_user("shola@example.com").await;
        assert!(matches!(result, Err(ServiceError::NotConnected)));
    }
}
