//! Signed sign-in assertions
//!
//! A third-party sign-in is handed to the dashboard as a small JSON object
//! carrying a `timestamp` (Unix epoch ms) and a `hash`. The hash is the
//! SHA-256 of the canonical JSON of the object, with `hash` set to 64
//! zeros, followed by the shared secret as a decimal string. Only a party
//! holding the secret can produce an assertion the dashboard accepts.
//!
//! The shared secret lives in the `settings` table and is generated on
//! first use.

use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;

/// Settings key holding the shared secret
pub const SHARED_SECRET_KEY: &str = "assertion_shared_secret";

/// Oldest accepted assertion
pub const MAX_ASSERTION_AGE_MS: i64 = 5 * 60 * 1000;

/// Clock drift tolerated for assertions stamped in the future
pub const MAX_CLOCK_SKEW_MS: i64 = 1000;

const DUMMY_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum AssertionError {
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp { timestamp: i64, now: i64, reason: String },

    #[error("Invalid hash")]
    InvalidHash,

    #[error("Shared secret unavailable: {0}")]
    Secret(String),
}

/// Load the shared secret, generating and storing one if absent
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, AssertionError> {
    let stored: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_optional(db)
        .await
        .map_err(|e| AssertionError::Secret(e.to_string()))?;

    match stored {
        Some(value) => value
            .parse::<i64>()
            .map_err(|e| AssertionError::Secret(format!("Invalid i64: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Store a fresh non-zero random secret
///
/// `INSERT OR IGNORE` keeps the first secret when two callers race; the
/// stored value is read back and returned.
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, AssertionError> {
    let candidate: i64 = {
        let mut rng = rand::thread_rng();
        loop {
            let value = rng.gen::<i64>();
            if value != 0 {
                break value;
            }
        }
    };

    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(SHARED_SECRET_KEY)
        .bind(candidate.to_string())
        .execute(db)
        .await
        .map_err(|e| AssertionError::Secret(e.to_string()))?;

    let stored: String = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(SHARED_SECRET_KEY)
        .fetch_one(db)
        .await
        .map_err(|e| AssertionError::Secret(e.to_string()))?;

    stored
        .parse::<i64>()
        .map_err(|e| AssertionError::Secret(format!("Invalid i64: {}", e)))
}

/// Check an assertion timestamp against `now` (both epoch ms)
pub fn validate_timestamp(timestamp: i64, now: i64) -> Result<(), AssertionError> {
    let age = now - timestamp;

    if age > MAX_ASSERTION_AGE_MS {
        return Err(AssertionError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms old (max {}ms)", age, MAX_ASSERTION_AGE_MS),
        });
    }
    if age < -MAX_CLOCK_SKEW_MS {
        return Err(AssertionError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms in the future (max {}ms)", -age, MAX_CLOCK_SKEW_MS),
        });
    }

    Ok(())
}

/// Canonical JSON: object keys sorted, no whitespace
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let items: Vec<String> = pairs
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), to_canonical_json(v)))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// SHA-256 over the canonical JSON (with a zeroed `hash`) plus the secret
pub fn calculate_hash(value: &Value, shared_secret: i64) -> String {
    let mut value = value.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(DUMMY_HASH.to_string()));
    }

    let mut hasher = Sha256::new();
    hasher.update(to_canonical_json(&value).as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn validate_hash(provided: &str, value: &Value, shared_secret: i64) -> Result<(), AssertionError> {
    if provided != calculate_hash(value, shared_secret) {
        return Err(AssertionError::InvalidHash);
    }
    Ok(())
}
