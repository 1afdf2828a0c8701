use axum::{
    Extension, Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};

use crate::{
    AppState,
    config::CommentRejectPolicy,
    error::{AppError, AppResult},
    routes::user::CurrentUser,
    utils::success_to_api_response,
};

use super::model::{Board, BoardQuery, Comment, CommentForm, Like, PageRequest};

fn detail_path(record_id: i64) -> String {
    format!("/board/{}", record_id)
}

#[axum::debug_handler]
pub async fn board_list(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> AppResult<impl IntoResponse> {
    let page = PageRequest::new(query.page, state.config.board_page_size);
    let board = Board::list_shared(&state.pool, page).await?;
    Ok(success_to_api_response(board))
}

#[axum::debug_handler]
pub async fn board_detail(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let detail = Board::detail(&state.pool, record_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(success_to_api_response(detail))
}

#[axum::debug_handler]
pub async fn comment_create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Redirect> {
    // visibility is checked before the content, also for the record's owner
    if Board::find_shared(&state.pool, record_id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let content = match form.validate() {
        Ok(content) => content,
        Err(errors) => match state.config.comment_reject_policy {
            CommentRejectPolicy::Silent => {
                tracing::debug!(record_id, user_id = user.id, "Dropped invalid comment");
                return Ok(Redirect::to(&detail_path(record_id)));
            }
            CommentRejectPolicy::Report => return Err(errors.into()),
        },
    };

    Comment::create(&state.pool, record_id, user.id, &content)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Redirect::to(&detail_path(record_id)))
}

#[axum::debug_handler]
pub async fn like_toggle(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
) -> AppResult<Redirect> {
    Like::toggle(&state.pool, record_id, user.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Redirect::to(&detail_path(record_id)))
}
