//! One-way password hashing. The stored value is a bcrypt hash; the
//! plaintext never reaches the database or the logs.

use crate::error::AppResult;

pub fn hash(plaintext: &str, cost: u32) -> AppResult<String> {
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Constant-time via bcrypt. A malformed stored hash never matches.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}
