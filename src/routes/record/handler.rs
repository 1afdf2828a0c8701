use axum::{
    Extension, Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect},
};

use crate::{
    AppState,
    error::{AppError, AppResult},
    routes::user::CurrentUser,
    utils::success_to_api_response,
};

use super::model::{RecordForm, RecordFormView, RecordList, RecordView, WorshipRecord};

#[axum::debug_handler]
pub async fn home(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let records = WorshipRecord::list_own(&state.pool, user.id).await?;
    Ok(success_to_api_response(RecordList {
        records: records.into_iter().map(RecordView::from).collect(),
    }))
}

#[axum::debug_handler]
pub async fn new_form() -> impl IntoResponse {
    success_to_api_response(RecordFormView::blank())
}

#[axum::debug_handler]
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Form(form): Form<RecordForm>,
) -> AppResult<Redirect> {
    let input = form.validate()?;
    WorshipRecord::create(&state.pool, user.id, &input).await?;
    Ok(Redirect::to("/"))
}

#[axum::debug_handler]
pub async fn edit_form(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let record = WorshipRecord::find_owned(&state.pool, user.id, record_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(success_to_api_response(RecordFormView::for_record(record)))
}

#[axum::debug_handler]
pub async fn edit(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
    Form(form): Form<RecordForm>,
) -> AppResult<Redirect> {
    // ownership first: someone else's id is a 404 even with an invalid form
    if WorshipRecord::find_owned(&state.pool, user.id, record_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound);
    }

    let input = form.validate()?;
    WorshipRecord::update_owned(&state.pool, user.id, record_id, &input)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Redirect::to("/"))
}

#[axum::debug_handler]
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(record_id): Path<i64>,
) -> AppResult<Redirect> {
    if !WorshipRecord::delete_owned(&state.pool, user.id, record_id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/"))
}
