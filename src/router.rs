use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes::{api, board, record, user},
};

// Reachable without a session
fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(user::login_form).post(user::login))
        .route("/register", get(user::register_form).post(user::register))
        .route("/health", get(api::health))
}

// Everything else requires a live session
fn protected_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/logout", post(user::logout))
        // own records
        .route("/", get(record::home))
        .route("/record/new", get(record::new_form).post(record::create))
        .route("/record/{id}/edit", get(record::edit_form).post(record::edit))
        .route("/record/{id}/delete", post(record::delete))
        // board
        .route("/board", get(board::board_list))
        .route("/board/{id}", get(board::board_detail))
        .route("/board/{id}/comment", post(board::comment_create))
        .route("/board/{id}/like", post(board::like_toggle))
        // tree export
        .route("/api/tree-data", get(api::tree_data))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
}

/// Full application router with logging, and rate limiting when enabled.
pub fn create_router(state: AppState) -> Router {
    let router = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http());

    let router = if state.config.rate_limit_enabled() {
        let limiter = Arc::new(RateLimiter::new(state.redis.clone(), state.config.clone()));
        router.layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        router
    };

    router.with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, utils::test_config};

    // Nothing listens on port 1, so any Redis round trip fails.
    fn state_with(config: Config) -> AppState {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/worship_unused")
            .unwrap();
        let redis = redis::Client::open("redis://127.0.0.1:1").unwrap();
        AppState {
            pool,
            config,
            redis: Arc::new(redis),
        }
    }

    async fn login_form_status(config: Config) -> StatusCode {
        let app = create_router(state_with(config));
        let request = Request::builder().uri("/login").body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn zero_limit_leaves_redis_out_of_the_path() {
        let config = Config {
            rate_limit_requests: 0,
            ..test_config()
        };
        for _ in 0..3 {
            assert_eq!(login_form_status(config.clone()).await, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn positive_limit_consults_redis() {
        let config = Config {
            rate_limit_requests: 5,
            ..test_config()
        };
        assert_eq!(
            login_form_status(config).await,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
