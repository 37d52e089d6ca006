//! Account directory
//!
//! Authenticates users and yields a stable account id plus email. Password
//! accounts are keyed by lower-cased email; federated accounts by the
//! provider's subject id. A federated assertion is only trusted when it is
//! fresh and carries a hash made with the shared assertion secret.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use rdd_common::auth::{self, AssertionError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

const PASSWORD_PROVIDER: &str = "password";
const MIN_PASSWORD_LEN: usize = 6;

/// Account directory errors
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email address is already in use")]
    EmailInUse,

    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Provider assertion rejected: {0}")]
    Provider(String),

    #[error("Provider assertion not verified: {0}")]
    Assertion(#[from] AssertionError),

    #[error("Directory error: {0}")]
    Directory(#[from] sqlx::Error),
}

/// Email and password as entered on the sign-in form
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Identity asserted by a third-party sign-in popup
///
/// `timestamp` is Unix epoch ms; `hash` signs the other four fields with
/// the shared assertion secret (see [`rdd_common::auth`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FederatedAssertion {
    pub provider: String,
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
    pub timestamp: i64,
    pub hash: String,
}

impl FederatedAssertion {
    /// Build an assertion stamped now and signed with `shared_secret`
    pub fn signed(
        provider: impl Into<String>,
        subject: impl Into<String>,
        email: Option<String>,
        shared_secret: i64,
    ) -> Self {
        let mut assertion = Self {
            provider: provider.into(),
            subject: subject.into(),
            email,
            timestamp: Utc::now().timestamp_millis(),
            hash: String::new(),
        };
        assertion.hash = auth::calculate_hash(&assertion.signed_fields(), shared_secret);
        assertion
    }

    /// The object the hash covers; an absent email is `null`
    fn signed_fields(&self) -> Value {
        serde_json::json!({
            "provider": self.provider,
            "subject": self.subject,
            "email": self.email,
            "timestamp": self.timestamp,
            "hash": self.hash,
        })
    }

    fn verify(&self, shared_secret: i64) -> Result<(), AssertionError> {
        auth::validate_timestamp(self.timestamp, Utc::now().timestamp_millis())?;
        auth::validate_hash(&self.hash, &self.signed_fields(), shared_secret)
    }
}

/// Account as known to the directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    pub uid: String,
    pub email: Option<String>,
}

/// Remote account/directory service
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn sign_in_with_password(&self, credentials: &Credentials)
        -> Result<AccountProfile, AccountError>;

    async fn sign_in_with_provider(
        &self,
        assertion: &FederatedAssertion,
    ) -> Result<AccountProfile, AccountError>;

    async fn register(&self, credentials: &Credentials) -> Result<AccountProfile, AccountError>;

    async fn sign_out(&self, uid: &str) -> Result<(), AccountError>;
}

/// Account directory stored in the local `users` table
#[derive(Clone)]
pub struct SqliteAccountDirectory {
    db: SqlitePool,
}

impl SqliteAccountDirectory {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

fn normalize_email(email: &str) -> Result<String, AccountError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(AccountError::InvalidEmail),
    }
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Salted SHA-256 of a password, as 64 hex characters
fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl AccountService for SqliteAccountDirectory {
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AccountProfile, AccountError> {
        let email = normalize_email(&credentials.email)
            .map_err(|_| AccountError::InvalidCredentials)?;

        let row: Option<(String, Option<String>, String, String)> = sqlx::query_as(
            "SELECT uid, email, password_hash, password_salt FROM users WHERE provider = ? AND subject = ?",
        )
        .bind(PASSWORD_PROVIDER)
        .bind(&email)
        .fetch_optional(&self.db)
        .await?;

        let (uid, stored_email, password_hash, password_salt) =
            row.ok_or(AccountError::InvalidCredentials)?;

        if hash_password(&credentials.password, &password_salt) != password_hash {
            debug!(uid = %uid, "Password mismatch");
            return Err(AccountError::InvalidCredentials);
        }

        info!(uid = %uid, "Password sign-in");
        Ok(AccountProfile {
            uid,
            email: stored_email,
        })
    }

    async fn sign_in_with_provider(
        &self,
        assertion: &FederatedAssertion,
    ) -> Result<AccountProfile, AccountError> {
        let shared_secret = auth::load_shared_secret(&self.db).await?;
        if let Err(e) = assertion.verify(shared_secret) {
            warn!(provider = %assertion.provider, error = %e, "Rejected provider assertion");
            return Err(e.into());
        }

        let provider = assertion.provider.trim();
        let subject = assertion.subject.trim();
        if provider.is_empty() || provider == PASSWORD_PROVIDER {
            return Err(AccountError::Provider(format!("unsupported provider {:?}", provider)));
        }
        if subject.is_empty() {
            return Err(AccountError::Provider("missing subject".to_string()));
        }
        let email = assertion
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let existing: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT uid, email FROM users WHERE provider = ? AND subject = ?")
                .bind(provider)
                .bind(subject)
                .fetch_optional(&self.db)
                .await?;

        let (uid, email) = match existing {
            Some((uid, stored_email)) => {
                if email.is_some() && email != stored_email {
                    sqlx::query("UPDATE users SET email = ? WHERE uid = ?")
                        .bind(&email)
                        .bind(&uid)
                        .execute(&self.db)
                        .await?;
                }
                (uid, email.or(stored_email))
            }
            None => {
                let uid = Uuid::new_v4().to_string();
                sqlx::query("INSERT INTO users (uid, provider, subject, email) VALUES (?, ?, ?, ?)")
                    .bind(&uid)
                    .bind(provider)
                    .bind(subject)
                    .bind(&email)
                    .execute(&self.db)
                    .await?;
                info!(uid = %uid, provider = %provider, "Created federated account");
                (uid, email)
            }
        };

        info!(uid = %uid, provider = %provider, "Provider sign-in");
        Ok(AccountProfile { uid, email })
    }

    async fn register(&self, credentials: &Credentials) -> Result<AccountProfile, AccountError> {
        let email = normalize_email(&credentials.email)?;
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AccountError::WeakPassword);
        }

        let uid = Uuid::new_v4().to_string();
        let salt = generate_salt();
        let password_hash = hash_password(&credentials.password, &salt);

        let inserted = sqlx::query(
            "INSERT INTO users (uid, provider, subject, email, password_hash, password_salt) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&uid)
        .bind(PASSWORD_PROVIDER)
        .bind(&email)
        .bind(&email)
        .bind(&password_hash)
        .bind(&salt)
        .execute(&self.db)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AccountError::EmailInUse)
            }
            Err(e) => return Err(e.into()),
        }

        info!(uid = %uid, "Registered account");
        Ok(AccountProfile {
            uid,
            email: Some(email),
        })
    }

    async fn sign_out(&self, uid: &str) -> Result<(), AccountError> {
        // Directory sessions are not tracked server-side
        debug!(uid = %uid, "Sign-out");
        Ok(())
    }
}
