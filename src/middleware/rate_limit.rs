use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::AsyncCommands;

use crate::{
    config::Config,
    utils::{error_codes, error_to_api_response},
};

const RATE_LIMIT_KEY_PREFIX: &str = "worship:rate_limit:";

/// Fixed-window request counter per client IP, kept in Redis.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Arc<redis::Client>,
    config: Arc<Config>,
}

/// Client address: proxy headers first, then the socket peer.
fn client_ip(req: &Request<Body>) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    req.headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .or_else(|| {
            req.headers()
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
        })
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

/// The `count`-th request of a window is rejected once it passes `limit`.
fn exceeds_limit(count: i64, limit: u32) -> bool {
    count > i64::from(limit)
}

fn too_many_requests(window_secs: u64) -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        error_to_api_response::<()>(
            error_codes::RATE_LIMIT,
            format!("요청이 너무 많습니다. {}초 후에 다시 시도해 주세요", window_secs),
        ),
    )
        .into_response()
}

impl RateLimiter {
    pub fn new(redis: Arc<redis::Client>, config: Config) -> Self {
        Self {
            redis,
            config: Arc::new(config),
        }
    }

    /// Count one request for `ip`, returning the count within the window.
    async fn hit(&self, ip: &str) -> Result<i64, redis::RedisError> {
        let key = format!("{}{}", RATE_LIMIT_KEY_PREFIX, ip);
        let mut conn = self.redis.get_multiplexed_async_connection().await?;

        let count: i64 = conn.incr(&key, 1).await?;
        if count == 1 {
            let _: () = conn
                .expire(&key, self.config.rate_limit_window().as_secs() as i64)
                .await?;
        }
        Ok(count)
    }

    pub async fn check_rate_limit(self: Arc<Self>, req: Request<Body>, next: Next) -> Response {
        let ip = client_ip(&req);

        let count = match self.hit(&ip).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, %ip, "Rate limiter unavailable");
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    error_to_api_response::<()>(
                        error_codes::INTERNAL_ERROR,
                        "내부 서버 오류".to_string(),
                    ),
                )
                    .into_response();
            }
        };

        if exceeds_limit(count, self.config.rate_limit_requests) {
            tracing::warn!(%ip, count, "Rate limit exceeded");
            return too_many_requests(self.config.rate_limit_window().as_secs());
        }

        next.run(req).await
    }
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    limiter.check_rate_limit(req, next).await
}
