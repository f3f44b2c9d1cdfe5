//! Thread endpoints: `/api/threads/{board}`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use domains::DomainError;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{present, required_id, same_board, Flag, Params, Payload};
use crate::metrics::PostKind;
use crate::state::AppState;
use crate::views::{Ack, ThreadDeletionView, ThreadListingView, ThreadView};

#[derive(Debug, Deserialize)]
pub struct ListThreadsQuery {
    pub limit: Option<usize>,
    pub reply_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateThreadForm {
    pub board: Option<String>,
    pub text: Option<String>,
    pub delete_password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateThreadForm {
    pub board: Option<String>,
    pub thread_id: Option<String>,
    pub text: Option<String>,
    pub reported: Option<Flag>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteThreadForm {
    pub board: Option<String>,
    pub thread_id: Option<String>,
}

/// GET /api/threads/{board}
async fn list_threads(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Params(query): Params<ListThreadsQuery>,
) -> Result<Json<Vec<ThreadListingView>>, ApiError> {
    let threads = state
        .services
        .threads
        .list_recent_threads(&board, query.limit, query.reply_limit)
        .await?;
    Ok(Json(threads.into_iter().map(ThreadListingView::from).collect()))
}

/// POST /api/threads/{board}
async fn create_thread(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<CreateThreadForm>,
) -> Result<(StatusCode, Json<ThreadView>), ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread = state
        .services
        .threads
        .create_thread(
            &board,
            form.text.as_deref().unwrap_or_default(),
            form.delete_password.as_deref().unwrap_or_default(),
        )
        .await?;

    state.metrics.post_created(PostKind::Thread);
    Ok((StatusCode::CREATED, Json(ThreadView::from(thread))))
}

/// PUT /api/threads/{board}
///
/// With `text` the thread is bumped and the text appended. Without it the
/// thread is reported. `reported=true` alongside `text` does both.
async fn update_thread(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<UpdateThreadForm>,
) -> Result<Response, ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread_id = required_id("thread_id", form.thread_id.as_deref())?;
    let text = present(form.text);
    let report = match (&text, &form.reported) {
        (_, Some(flag)) => flag.is_set(),
        (None, None) => true,
        (Some(_), None) => false,
    };
    let threads = &state.services.threads;

    match text {
        Some(text) => {
            let thread = if report {
                threads.bump_and_report(&board, thread_id, &text).await?
            } else {
                threads
                    .bump_and_append_text(&board, thread_id, Some(&text), None)
                    .await?
            };
            Ok(Json(ThreadView::from(thread)).into_response())
        }
        None if report => {
            threads.report_thread(&board, thread_id).await?;
            Ok(Json(Ack::REPORTED).into_response())
        }
        None => Err(DomainError::validation("nothing to update: send text or reported=true").into()),
    }
}

/// DELETE /api/threads/{board}
async fn delete_thread(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<DeleteThreadForm>,
) -> Result<Json<ThreadDeletionView>, ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread_id = required_id("thread_id", form.thread_id.as_deref())?;
    let deletion = state.services.threads.delete_thread(&board, thread_id).await?;
    Ok(Json(ThreadDeletionView::new(thread_id, deletion)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/threads/{board}",
        get(list_threads)
            .post(create_thread)
            .put(update_thread)
            .delete(delete_thread),
    )
}
