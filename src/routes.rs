use std::convert::Infallible;
use std::sync::Arc;

use cookie::Cookie;
use log::{error, trace};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use warp::http::{header, StatusCode, Uri};
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

use crate::auth::{self, AUTH_COOKIE};
use crate::form::{LoginForm, RegisterForm};
use crate::templates::{self, Notice};
use crate::webgis::{Error, WebGis};

const FORM_LIMIT: u64 = 16 * 1024;

#[derive(Debug, Default, Deserialize)]
struct LoginQuery {
    registered: Option<String>,
}

pub fn routes(
    webgis: Arc<WebGis>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let with_webgis = warp::any().map(move || Arc::clone(&webgis));
    let auth_cookie = warp::cookie::optional::<String>(AUTH_COOKIE);

    let index = warp::path::end()
        .and(warp::get())
        .and(with_webgis.clone())
        .and(auth_cookie.clone())
        .and_then(index);

    let login = {
        let page = warp::path!("login")
            .and(warp::get())
            .and(warp::query::<LoginQuery>())
            .and_then(login_page);

        let submit = warp::path!("login")
            .and(warp::post())
            .and(with_webgis.clone())
            .and(form_body())
            .and_then(login_submit);

        page.or(submit)
    };

    let register = {
        let page = warp::path!("register")
            .and(warp::get())
            .and_then(register_page);

        let submit = warp::path!("register")
            .and(warp::post())
            .and(with_webgis.clone())
            .and(form_body())
            .and_then(register_submit);

        page.or(submit)
    };

    let map = warp::path!("map")
        .and(warp::get())
        .and(with_webgis.clone())
        .and(auth_cookie.clone())
        .and_then(map_page);

    let logout = warp::path!("logout")
        .and(warp::get())
        .and(with_webgis)
        .and(auth_cookie)
        .and_then(logout);

    index
        .or(login)
        .or(register)
        .or(map)
        .or(logout)
        .recover(handle_rejection)
        .with(warp::log("webgis"))
}

fn form_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

fn redirect(to: &'static str) -> Response {
    warp::redirect::see_other(Uri::from_static(to)).into_response()
}

fn with_cookie(reply: impl Reply, cookie: Cookie<'_>) -> Response {
    warp::reply::with_header(reply, header::SET_COOKIE, cookie.to_string()).into_response()
}

fn html_status(html: String, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::html(html), status).into_response()
}

fn render(page: askama::Result<String>, status: StatusCode) -> Result<Response, Rejection> {
    match page {
        Ok(html) => Ok(html_status(html, status)),
        Err(e) => {
            error!("couldn't render page: {e}");
            Err(warp::reject::custom(Error::Internal))
        }
    }
}

async fn index(webgis: Arc<WebGis>, token: Option<String>) -> Result<Response, Rejection> {
    let user = webgis.authenticate(token.as_deref()).await?;

    Ok(match user {
        Some(_) => redirect("/map"),
        None => redirect("/login"),
    })
}

async fn login_page(query: LoginQuery) -> Result<Response, Rejection> {
    let notice = query
        .registered
        .map(|_| Notice::Info("Registration successful, please log in."));

    render(templates::login(notice, ""), StatusCode::OK)
}

async fn login_submit(webgis: Arc<WebGis>, form: LoginForm) -> Result<Response, Rejection> {
    match webgis.login(&form).await {
        Ok(session_id) => {
            let cookie = auth::session_cookie(&session_id, webgis.secure());
            Ok(with_cookie(redirect("/map"), cookie))
        }
        // every failed login is a 401, whatever the form got wrong
        Err(Error::Form(e)) => {
            let username = form.username.as_deref().unwrap_or("").trim();
            let page = templates::login(Some(Notice::Error(&e.to_string())), username);
            render(page, StatusCode::UNAUTHORIZED)
        }
        Err(e) => Err(e.into()),
    }
}

async fn register_page() -> Result<Response, Rejection> {
    render(templates::register(None, "", ""), StatusCode::OK)
}

async fn register_submit(webgis: Arc<WebGis>, form: RegisterForm) -> Result<Response, Rejection> {
    match webgis.register(&form).await {
        Ok(()) => Ok(redirect("/login?registered=1")),
        Err(Error::Form(e)) => {
            let field = |f: &Option<String>| f.as_deref().unwrap_or("").trim().to_string();
            let page = templates::register(
                Some(&e.to_string()),
                &field(&form.username),
                &field(&form.email),
            );
            render(page, Error::Form(e).into())
        }
        Err(e) => Err(e.into()),
    }
}

async fn map_page(webgis: Arc<WebGis>, token: Option<String>) -> Result<Response, Rejection> {
    match webgis.authenticate(token.as_deref()).await? {
        Some(username) => {
            trace!("{username} viewing map");
            render(templates::map(&username, webgis.map_config()), StatusCode::OK)
        }
        None => Ok(redirect("/login")),
    }
}

async fn logout(webgis: Arc<WebGis>, token: Option<String>) -> Result<Response, Rejection> {
    webgis.logout(token.as_deref()).await;

    let cookie = auth::removal_cookie(webgis.secure());
    Ok(with_cookie(redirect("/login"), cookie))
}

async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    let code = if err.is_not_found() {
        StatusCode::NOT_FOUND
    } else if let Some(e) = err.find::<Error>() {
        (*e).into()
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else if err.find::<warp::body::BodyDeserializeError>().is_some()
        || err.find::<warp::reject::InvalidQuery>().is_some()
        || err.find::<warp::reject::LengthRequired>().is_some()
    {
        StatusCode::BAD_REQUEST
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        StatusCode::METHOD_NOT_ALLOWED
    } else {
        error!("unhandled rejection: {err:?}");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let html = templates::status(code).unwrap_or_else(|e| {
        error!("couldn't render status page: {e}");
        code.to_string()
    });

    Ok(html_status(html, code))
}

#[cfg(test)]
mod test {
    use super::*;

    use warp::hyper::body::Bytes;

    use crate::webgis;

    type Res = warp::http::Response<Bytes>;

    fn app(
        dir: &tempfile::TempDir,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
        routes(Arc::new(webgis::test::create_webgis(dir)))
    }

    fn location(res: &Res) -> &str {
        res.headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    fn set_cookie(res: &Res) -> Option<Cookie<'static>> {
        let value = res.headers().get(header::SET_COOKIE)?.to_str().ok()?;
        Cookie::parse(value.to_string()).ok()
    }

    fn body(res: &Res) -> String {
        String::from_utf8_lossy(res.body()).into_owned()
    }

    async fn post_form(
        filter: &(impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + 'static),
        path: &str,
        form: &str,
    ) -> Res {
        warp::test::request()
            .method("POST")
            .path(path)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(form.to_string())
            .reply(filter)
            .await
    }

    async fn get(
        filter: &(impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + 'static),
        path: &str,
        cookie: Option<&str>,
    ) -> Res {
        let mut req = warp::test::request().method("GET").path(path);
        if let Some(token) = cookie {
            req = req.header("cookie", format!("{AUTH_COOKIE}={token}"));
        }
        req.reply(filter).await
    }

    const ALICE: &str =
        "username=alice&email=alice%40example.com&password=secret1&confirm_password=secret1";

    #[tokio::test]
    async fn pages_render() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        for path in ["/login", "/register"] {
            let res = get(&app, path, None).await;
            assert_eq!(res.status(), StatusCode::OK, "{path}");
            assert!(body(&res).contains("<form"), "{path}");
        }

        let res = get(&app, "/login?registered=1", None).await;
        assert!(body(&res).contains("Registration successful"));
    }

    #[tokio::test]
    async fn register_redirects_to_login() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let res = post_form(&app, "/register", ALICE).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login?registered=1");
    }

    #[tokio::test]
    async fn duplicate_username_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/register", ALICE).await;

        assert_eq!(res.status(), StatusCode::CONFLICT);
        let body = body(&res);
        assert!(body.contains("That username is already taken."));
        assert!(body.contains(r#"value="alice""#));
    }

    #[tokio::test]
    async fn confirmation_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let res = post_form(
            &app,
            "/register",
            "username=bob&email=bob%40x.org&password=secret1&confirm_password=secret9",
        )
        .await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body(&res).contains("Passwords do not match."));

        let res = post_form(&app, "/login", "username=bob&password=secret1").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_field_rerenders_form() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let res = post_form(&app, "/register", "username=bob").await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body(&res).contains("Please fill in the email field."));
    }

    #[tokio::test]
    async fn login_sets_cookie_and_redirects_to_map() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/login", "username=alice&password=secret1").await;

        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/map");

        let cookie = set_cookie(&res).expect("auth cookie");
        assert_eq!(cookie.name(), AUTH_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.max_age(), Some(::time::Duration::seconds(3600)));

        let res = get(&app, "/map", Some(cookie.value())).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body(&res);
        assert!(body.contains("alice"));
        assert!(body.contains("topp:states"));
    }

    #[tokio::test]
    async fn bad_credentials_rerender_login() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/login", "username=alice&password=wrong11").await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie(&res).is_none());
        assert!(body(&res).contains("Invalid username or password."));
    }

    #[tokio::test]
    async fn login_missing_field_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/login", "username=alice").await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookie(&res).is_none());
        let body = body(&res);
        assert!(body.contains("Please fill in the password field."));
        assert!(body.contains(r#"value="alice""#));
    }

    #[tokio::test]
    async fn map_requires_valid_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let cookies = [
            None,
            Some("authenticated"),
            Some("0c8b6d51-5b0c-4cf2-9a7e-3c1f1f7d2e10"),
        ];

        for cookie in cookies {
            let res = get(&app, "/map", cookie).await;
            assert_eq!(res.status(), StatusCode::SEE_OTHER, "{cookie:?}");
            assert_eq!(location(&res), "/login");
        }
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/login", "username=alice&password=secret1").await;
        let token = set_cookie(&res).unwrap().value().to_string();

        let res = get(&app, "/logout", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");

        let cleared = set_cookie(&res).unwrap();
        assert_eq!(cleared.name(), AUTH_COOKIE);
        assert_eq!(cleared.value(), "");
        assert_eq!(cleared.max_age(), Some(::time::Duration::ZERO));

        // the old token is dead even if the browser kept it
        let res = get(&app, "/map", Some(&token)).await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&res), "/login");
    }

    #[tokio::test]
    async fn index_redirects_by_session() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let res = get(&app, "/", None).await;
        assert_eq!(location(&res), "/login");

        post_form(&app, "/register", ALICE).await;
        let res = post_form(&app, "/login", "username=alice&password=secret1").await;
        let token = set_cookie(&res).unwrap().value().to_string();

        let res = get(&app, "/", Some(&token)).await;
        assert_eq!(location(&res), "/map");
    }

    #[tokio::test]
    async fn unknown_routes_and_store_faults() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(&dir);

        let res = get(&app, "/nope", None).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        std::fs::write(dir.path().join("users.json"), "garbage").unwrap();
        let res = post_form(&app, "/login", "username=alice&password=secret1").await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
