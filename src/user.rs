use serde::{Deserialize, Serialize};

use crate::auth::PasswordHash;

/// A user as persisted in the users file, keyed by username.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug)]
pub struct User {
    pub username: String,
    pub email: String,
    pub pwhash: PasswordHash,
}

impl User {
    pub fn from_record(username: &str, record: UserRecord) -> Self {
        Self {
            username: username.into(),
            email: record.email,
            pwhash: PasswordHash::from_stored(record.password_hash),
        }
    }
}
