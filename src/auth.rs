use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use argon2::password_hash::{self, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use cookie::{Cookie, SameSite};
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::time::Timestamp;

pub const AUTH_COOKIE: &str = "auth_token";
pub const SESSION_SECS: i64 = 3600;

// fixed salt for spending a hash's worth of work on unknown users
const DUMMY_SALT: &str = "d2ViZ2lzZHVtbXlzYWx0";

/// An argon2 password hash in PHC string form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(password: &str) -> Result<Self, ()> {
        let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes()).map_err(|e| {
            error!("couldn't encode salt: {e}");
        })?;

        Self::with_salt(password, &salt)
    }

    fn with_salt(password: &str, salt: &SaltString) -> Result<Self, ()> {
        Argon2::default()
            .hash_password(password.as_bytes(), salt)
            .map(|hash| Self(hash.to_string()))
            .map_err(|e| {
                error!("couldn't hash password: {e}");
            })
    }

    pub fn from_stored(stored: String) -> Self {
        Self(stored)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, password: &str) -> bool {
        let parsed = match password_hash::PasswordHash::new(&self.0) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("malformed stored password hash: {e}");
                return false;
            }
        };

        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }

    /// Costs about as much as [`verify`](Self::verify), never succeeds.
    pub fn verify_nobody(password: &str) -> bool {
        if let Ok(salt) = SaltString::from_b64(DUMMY_SALT) {
            let _ = Self::with_salt(password, &salt);
        }
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::try_parse(s).map(Self).map_err(|_| ())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.0.hyphenated())
    }
}

struct Session {
    username: String,
    expires: Timestamp,
}

/// Logged-in sessions, keyed by the id handed out in the auth cookie.
#[derive(Default)]
pub struct Sessions(Mutex<HashMap<SessionId, Session>>);

impl Sessions {
    pub async fn create(&self, username: &str, now: Timestamp) -> SessionId {
        let mut sessions = self.0.lock().await;

        let before = sessions.len();
        sessions.retain(|_, session| session.expires > now);
        if sessions.len() != before {
            debug!("purged {} expired sessions", before - sessions.len());
        }

        let id = SessionId::new();
        sessions.insert(
            id,
            Session {
                username: username.into(),
                expires: now.plus_secs(SESSION_SECS),
            },
        );

        info!("{username}: new session, expires {}", now.plus_secs(SESSION_SECS));
        id
    }

    pub async fn lookup(&self, id: &SessionId, now: Timestamp) -> Option<String> {
        let mut sessions = self.0.lock().await;

        let session = sessions.get(id)?;
        if session.expires > now {
            return Some(session.username.clone());
        }

        info!("{}: session expired at {}", session.username, session.expires);
        sessions.remove(id);
        None
    }

    pub async fn remove(&self, id: &SessionId) -> Option<String> {
        self.0
            .lock()
            .await
            .remove(id)
            .map(|session| session.username)
    }
}

pub fn session_cookie(id: &SessionId, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(::time::Duration::seconds(SESSION_SECS))
        .build()
}

pub fn removal_cookie(secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((AUTH_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build();

    cookie.make_removal();
    cookie
}
