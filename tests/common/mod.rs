#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use sqlx::PgPool;
use tower::ServiceExt;

use worship_backend::AppState;
use worship_backend::config::{CommentRejectPolicy, Config};
use worship_backend::router::create_router;
use worship_backend::routes::user::SESSION_COOKIE;

/// Test configuration: cheap hashing and no rate limiting, so neither
/// Redis nor slow bcrypt rounds are needed.
pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        redis_url: "redis://127.0.0.1:6379".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        session_expiration_secs: 3600,
        bcrypt_cost: 4,
        cookie_secure: false,
        rate_limit_window_secs: 60,
        rate_limit_requests: 0,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        board_page_size: 10,
        comment_reject_policy: CommentRejectPolicy::Silent,
    }
}

pub fn build_app_with(pool: PgPool, config: Config) -> Router {
    let redis = redis::Client::open(config.redis_url.clone()).expect("valid redis url");
    create_router(AppState {
        pool,
        config,
        redis: Arc::new(redis),
    })
}

/// Router with the same middleware stack as production.
pub fn build_test_app(pool: PgPool) -> Router {
    build_app_with(pool, test_config())
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub cookie: String,
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
) -> Response {
    let body = serde_urlencoded::to_string(fields).unwrap();
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(builder.body(Body::from(body)).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect must carry a Location header")
        .to_str()
        .unwrap()
}

/// `name=value` of the session cookie set by the response, if any.
pub fn session_cookie(response: &Response) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&prefix) && pair.len() > prefix.len())
        .map(str::to_string)
}

pub const PASSWORD: &str = "grace-and-peace-7";

/// Register through the HTTP form and return the logged-in user.
pub async fn signup(app: &Router, pool: &PgPool, username: &str, real_name: &str) -> TestUser {
    let response = post_form(
        app,
        "/register",
        None,
        &[
            ("username", username),
            ("real_name", real_name),
            ("password1", PASSWORD),
            ("password2", PASSWORD),
        ],
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "registration should redirect");
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response).expect("registration must start a session");

    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap();

    TestUser {
        id,
        username: username.to_string(),
        cookie,
    }
}

/// Create a record through the HTTP form and return its id.
pub async fn create_record(
    app: &Router,
    pool: &PgPool,
    user: &TestUser,
    date: &str,
    worship_type: &str,
    title: &str,
    shared: bool,
) -> i64 {
    let mut fields = vec![
        ("date", date),
        ("worship_type", worship_type),
        ("title", title),
        ("content", "말씀 묵상"),
    ];
    if shared {
        fields.push(("is_shared", "on"));
    }
    let response = post_form(app, "/record/new", Some(&user.cookie), &fields).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER, "record creation should redirect");
    assert_eq!(location(&response), "/");

    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM worship_records WHERE user_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn count(pool: &PgPool, sql: &str, id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}
