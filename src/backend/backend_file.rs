use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info, warn};
use tokio::fs;
use tokio::sync::Mutex;

use super::{CreateError, FindError};
use crate::auth::PasswordHash;
use crate::user::{User, UserRecord};

type Users = BTreeMap<String, UserRecord>;

/// Users, persisted wholesale as a single JSON object keyed by username.
pub struct Backend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Backend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Backend {
    async fn read_all(&self) -> Result<Users, FindError> {
        let path = &self.path;

        let contents = match fs::read(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Users::new()),
            Err(e) => {
                error!("read {path:?}: {e:?}");
                return Err(FindError::Internal);
            }
        };

        if contents.iter().all(u8::is_ascii_whitespace) {
            return Ok(Users::new());
        }

        serde_json::from_slice(&contents).map_err(|e| {
            error!("couldn't parse users in {path:?}: {e}");
            FindError::Internal
        })
    }

    async fn write_all(&self, users: &Users) -> Result<(), std::io::Error> {
        let json = serde_json::to_vec_pretty(users)?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");

        let written = match fs::write(&tmp, json).await {
            Ok(()) => fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };

        if written.is_err() {
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != ErrorKind::NotFound {
                    warn!("couldn't remove {tmp:?}: {e:?}");
                }
            }
        }

        written
    }
}

impl Backend {
    pub async fn find_user(&self, username: &str) -> Result<User, FindError> {
        let mut users = self.read_all().await?;

        users
            .remove(username)
            .map(|record| User::from_record(username, record))
            .ok_or(FindError::NotFound)
    }

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        pwhash: &PasswordHash,
    ) -> Result<(), CreateError> {
        let _guard = self.write_lock.lock().await;

        let mut users = self.read_all().await.map_err(|e| {
            error!("couldn't load users to add \"{username}\": {e:?}");
            CreateError::Internal
        })?;

        if users.contains_key(username) {
            return Err(CreateError::Exists);
        }

        users.insert(
            username.into(),
            UserRecord {
                email: email.into(),
                password_hash: pwhash.as_str().into(),
            },
        );

        self.write_all(&users).await.map_err(|e| {
            error!("write {:?}: {e:?}", self.path);
            CreateError::Internal
        })?;

        info!("created user \"{username}\", {} users total", users.len());
        Ok(())
    }
}
