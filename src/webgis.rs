use std::{result, str::FromStr};

use log::{debug, error, info, warn};
use warp::http;

use crate::auth::{PasswordHash, SessionId, Sessions};
use crate::backend::{Backend, CreateError, FindError};
use crate::form::{FormError, LoginForm, RegisterForm};
use crate::time::Timestamp;
use crate::wms::MapConfig;

pub struct WebGis {
    backend: Backend,
    sessions: Sessions,
    map: MapConfig,
    secure: bool,
}

#[derive(Copy, Clone, Debug)]
pub enum Error {
    Internal,
    Form(FormError),
}

pub type Result<T> = result::Result<T, Error>;

impl From<FormError> for Error {
    fn from(e: FormError) -> Self {
        Self::Form(e)
    }
}

impl From<Error> for http::StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Error::Form(FormError::InvalidCredentials) => http::StatusCode::UNAUTHORIZED,
            Error::Form(FormError::UserExists) => http::StatusCode::CONFLICT,
            Error::Form(_) => http::StatusCode::BAD_REQUEST,
        }
    }
}

impl warp::reject::Reject for Error {}

impl WebGis {
    pub fn new(backend: Backend, map: MapConfig, secure: bool) -> Self {
        Self {
            backend,
            sessions: Sessions::default(),
            map,
            secure,
        }
    }

    pub fn map_config(&self) -> &MapConfig {
        &self.map
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<()> {
        let reg = form.validate().map_err(|e| {
            debug!("registration rejected: {e}");
            e
        })?;
        let username = reg.username;

        let pwhash = PasswordHash::new(reg.password).map_err(|()| Error::Internal)?;

        self.backend
            .create_user(username, reg.email, &pwhash)
            .await
            .map_err(|e| match e {
                CreateError::Exists => {
                    info!("rejecting registration of existing user {username}");
                    Error::Form(FormError::UserExists)
                }
                CreateError::Internal => {
                    error!("couldn't register user {username}");
                    Error::Internal
                }
            })?;

        info!("{username} registered");
        Ok(())
    }

    pub async fn login(&self, form: &LoginForm) -> Result<SessionId> {
        let creds = form.validate()?;
        let username = creds.username;

        let user = match self.backend.find_user(username).await {
            Ok(user) => user,
            Err(FindError::NotFound) => {
                PasswordHash::verify_nobody(creds.password);
                warn!("rejecting non-existant user {username}");
                return Err(Error::Form(FormError::InvalidCredentials));
            }
            Err(FindError::Internal) => {
                error!("couldn't authenticate user {username}");
                return Err(Error::Internal);
            }
        };

        if !user.pwhash.verify(creds.password) {
            warn!("wrong password for user {username}");
            return Err(Error::Form(FormError::InvalidCredentials));
        }

        let now = now()?;
        let session_id = self.sessions.create(&user.username, now).await;

        info!("{username} <{}> login", user.email);
        Ok(session_id)
    }

    /// The username behind an auth cookie, if it names a live session.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Option<String>> {
        let Some(token) = token else {
            return Ok(None);
        };

        let Ok(session_id) = SessionId::from_str(token) else {
            debug!("ignoring malformed session token");
            return Ok(None);
        };

        let now = now()?;
        let username = self.sessions.lookup(&session_id, now).await;
        if username.is_none() {
            debug!("no session found for {session_id}");
        }

        Ok(username)
    }

    pub async fn logout(&self, token: Option<&str>) {
        let session_id = match token.map(SessionId::from_str) {
            Some(Ok(id)) => id,
            _ => return,
        };

        match self.sessions.remove(&session_id).await {
            Some(username) => info!("{username} logout"),
            None => debug!("logout for unknown session {session_id}"),
        }
    }
}

fn now() -> Result<Timestamp> {
    Timestamp::now().map_err(|()| Error::Internal)
}
