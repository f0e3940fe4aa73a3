use askama::Template;
use warp::http::StatusCode;

use crate::wms::MapConfig;

const OL_VERSION: &str = "v9.2.4";

pub enum Notice<'a> {
    Error(&'a str),
    Info(&'a str),
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginPage<'a> {
    error: Option<&'a str>,
    info: Option<&'a str>,
    username: &'a str,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterPage<'a> {
    error: Option<&'a str>,
    username: &'a str,
    email: &'a str,
}

#[derive(Template)]
#[template(path = "map.html")]
struct MapPage<'a> {
    ol_version: &'a str,
    layer: &'a str,
    username: &'a str,
    config_json: String,
}

#[derive(Template)]
#[template(path = "status.html")]
struct StatusPage {
    code: u16,
    reason: &'static str,
}

pub fn login(notice: Option<Notice<'_>>, username: &str) -> askama::Result<String> {
    let (error, info) = match notice {
        Some(Notice::Error(msg)) => (Some(msg), None),
        Some(Notice::Info(msg)) => (None, Some(msg)),
        None => (None, None),
    };

    LoginPage {
        error,
        info,
        username,
    }
    .render()
}

pub fn register(error: Option<&str>, username: &str, email: &str) -> askama::Result<String> {
    RegisterPage {
        error,
        username,
        email,
    }
    .render()
}

pub fn map(username: &str, config: &MapConfig) -> askama::Result<String> {
    MapPage {
        ol_version: OL_VERSION,
        layer: &config.layer,
        username,
        config_json: config.to_script_json(),
    }
    .render()
}

pub fn status(code: StatusCode) -> askama::Result<String> {
    StatusPage {
        code: code.as_u16(),
        reason: code.canonical_reason().unwrap_or("Error"),
    }
    .render()
}
