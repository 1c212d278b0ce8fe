// Operator account domain model
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct User {
    pub username: String,
    /// Base64 HMAC of `password:salt`.
    pub password_hash: String,
    /// Base64 of 32 random bytes.
    pub salt: String,
    pub full_name: String,
    pub role: String,
    pub last_login: Option<DateTime<Utc>>,
}
