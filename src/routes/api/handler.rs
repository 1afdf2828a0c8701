use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{AppState, error::AppResult, routes::record::WorshipRecord, routes::user::CurrentUser};

use super::model::{HealthStatus, TreeData};

#[axum::debug_handler]
pub async fn tree_data(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<TreeData>> {
    let fruits = WorshipRecord::tree_data(&state.pool, user.id).await?;
    Ok(Json(TreeData { fruits }))
}

#[axum::debug_handler]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_healthy = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            false
        }
    };

    let status = if db_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthStatus {
            status: if db_healthy { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            db_healthy,
        }),
    )
}
