use std::fmt;

use serde::Deserialize;

const USERNAME_MAX: usize = 64;
const PASSWORD_MIN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormError {
    MissingField(&'static str),
    BadUsername,
    BadEmail,
    ShortPassword,
    PasswordMismatch,
    UserExists,
    InvalidCredentials,
}

impl fmt::Display for FormError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(fmt, "Please fill in the {field} field."),
            Self::BadUsername => write!(
                fmt,
                "Usernames are at most {USERNAME_MAX} characters of letters, digits, '_', '-' or '.'."
            ),
            Self::BadEmail => write!(fmt, "Please enter a valid email address."),
            Self::ShortPassword => write!(
                fmt,
                "Passwords must be at least {PASSWORD_MIN} characters long."
            ),
            Self::PasswordMismatch => write!(fmt, "Passwords do not match."),
            Self::UserExists => write!(fmt, "That username is already taken."),
            Self::InvalidCredentials => write!(fmt, "Invalid username or password."),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

pub struct Login<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

pub struct Registration<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, FormError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FormError::MissingField(field)),
    }
}

// passwords are taken verbatim, only checked for presence
fn required_password<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, FormError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FormError::MissingField(field)),
    }
}

fn valid_username(username: &str) -> bool {
    username.chars().count() <= USERNAME_MAX
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl LoginForm {
    pub fn validate(&self) -> Result<Login<'_>, FormError> {
        Ok(Login {
            username: required(&self.username, "username")?,
            password: required_password(&self.password, "password")?,
        })
    }
}

impl RegisterForm {
    pub fn validate(&self) -> Result<Registration<'_>, FormError> {
        let username = required(&self.username, "username")?;
        let email = required(&self.email, "email")?;
        let password = required_password(&self.password, "password")?;
        let confirm = required_password(&self.confirm_password, "confirm password")?;

        if !valid_username(username) {
            return Err(FormError::BadUsername);
        }
        if !valid_email(email) {
            return Err(FormError::BadEmail);
        }
        if password.chars().count() < PASSWORD_MIN {
            return Err(FormError::ShortPassword);
        }
        if password != confirm {
            return Err(FormError::PasswordMismatch);
        }

        Ok(Registration {
            username,
            email,
            password,
        })
    }
}
