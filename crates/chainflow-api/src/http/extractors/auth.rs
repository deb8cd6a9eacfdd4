//! API key authentication extractor.
//!
//! Accepts the key from `Authorization: Bearer <key>` or `X-API-Key: <key>`.
//! Keys are SHA-256 hashed and compared against the `api_keys` table.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chainflow_infra::sqlite::pool::DatabasePool;
use sha2::{Digest, Sha256};
use sqlx::Row;
use uuid::Uuid;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated request marker. Extracting this validates the API key.
pub struct Authenticated;

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(parts)?;
        let key_hash = hash_api_key(&api_key);

        let row = sqlx::query("SELECT id FROM api_keys WHERE key_hash = ?")
            .bind(&key_hash)
            .fetch_optional(&state.db_pool.reader)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        let Some(row) = row else {
            return Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header."
                    .to_string(),
            ));
        };

        // Best effort; a failed timestamp update never fails the request.
        let id: String = row.get("id");
        if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(&id)
            .execute(&state.db_pool.writer)
            .await
        {
            tracing::debug!(error = %e, "failed to touch api key");
        }

        Ok(Authenticated)
    }
}

fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header encoding".to_string()))?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-API-Key header encoding".to_string()))?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
    ))
}

/// SHA-256 of an API key, lowercase hex.
pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

/// Create the first API key if none exists.
///
/// Returns the plaintext key only when one was just generated; it is never
/// recoverable afterwards.
pub async fn ensure_api_key(pool: &DatabasePool) -> anyhow::Result<Option<String>> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM api_keys LIMIT 1")
        .fetch_optional(&pool.reader)
        .await?;
    if existing.is_some() {
        return Ok(None);
    }

    let key = create_api_key(pool, "default").await?;
    Ok(Some(key))
}

/// Generate a key named `name`, store its hash, and return the plaintext.
pub async fn create_api_key(pool: &DatabasePool, name: &str) -> anyhow::Result<String> {
    let plaintext = format!("cf_{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());

    sqlx::query("INSERT INTO api_keys (id, key_hash, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(Uuid::now_v7().to_string())
        .bind(hash_api_key(&plaintext))
        .bind(name)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&pool.writer)
        .await?;

    tracing::info!(name, "created api key");
    Ok(plaintext)
}
