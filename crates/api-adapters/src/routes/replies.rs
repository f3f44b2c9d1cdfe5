//! Reply endpoints: `/api/replies/{board}`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{required_id, same_board, Params, Payload};
use crate::metrics::PostKind;
use crate::state::AppState;
use crate::views::{Ack, PostedReplyView, ReplyView};

#[derive(Debug, Deserialize)]
pub struct ListRepliesQuery {
    pub thread_id: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReplyForm {
    pub board: Option<String>,
    pub thread_id: Option<String>,
    pub text: Option<String>,
    pub delete_password: Option<String>,
}

/// Addresses one reply; used by report and delete.
#[derive(Debug, Deserialize)]
pub struct ReplyTargetForm {
    pub board: Option<String>,
    pub thread_id: Option<String>,
    pub reply_id: Option<String>,
}

/// GET /api/replies/{board}?thread_id=
async fn list_replies(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Params(query): Params<ListRepliesQuery>,
) -> Result<Json<Vec<ReplyView>>, ApiError> {
    let thread_id = required_id("thread_id", query.thread_id.as_deref())?;
    let replies = state
        .services
        .replies
        .list_recent_replies(&board, thread_id, query.limit)
        .await?;
    Ok(Json(replies.into_iter().map(ReplyView::from).collect()))
}

/// POST /api/replies/{board}
///
/// Inserts the reply, bumps its thread and reads back the front page.
async fn create_reply(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<CreateReplyForm>,
) -> Result<(StatusCode, Json<PostedReplyView>), ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread_id = required_id("thread_id", form.thread_id.as_deref())?;
    let posted = state
        .services
        .posting
        .post_reply(
            &board,
            thread_id,
            form.text.as_deref().unwrap_or_default(),
            form.delete_password.as_deref().unwrap_or_default(),
        )
        .await?;

    state.metrics.post_created(PostKind::Reply);
    Ok((StatusCode::CREATED, Json(PostedReplyView::from(posted))))
}

/// PUT /api/replies/{board}
async fn report_reply(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<ReplyTargetForm>,
) -> Result<Json<Ack>, ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread_id = required_id("thread_id", form.thread_id.as_deref())?;
    let reply_id = required_id("reply_id", form.reply_id.as_deref())?;
    state
        .services
        .replies
        .report_reply(&board, thread_id, reply_id)
        .await?;
    Ok(Json(Ack::REPORTED))
}

/// DELETE /api/replies/{board}
async fn delete_reply(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
    Payload(form): Payload<ReplyTargetForm>,
) -> Result<Json<Ack>, ApiError> {
    same_board(&board, form.board.as_deref())?;
    let thread_id = required_id("thread_id", form.thread_id.as_deref())?;
    let reply_id = required_id("reply_id", form.reply_id.as_deref())?;
    state
        .services
        .replies
        .soft_delete_reply(&board, thread_id, reply_id)
        .await?;
    Ok(Json(Ack::DELETED))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/replies/{board}",
        get(list_replies)
            .post(create_reply)
            .put(report_reply)
            .delete(delete_reply),
    )
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{app, send_json};
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[tokio::test]
    async fn posted_reply_bumps_and_attaches() {
        let app = app();
        let (_, thread) = send_json(&app, "POST", "/api/threads/general", "text=hello&delete_password=p1").await;
        let thread_id = thread["id"].as_str().unwrap();

        let (status, posted) = send_json(
            &app,
            "POST",
            "/api/replies/general",
            &format!("thread_id={thread_id}&text=hi+there&delete_password=p2"),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(posted["reply"]["text"], "hi there");
        assert_eq!(posted["thread"]["replies"][0], posted["reply"]["id"]);
        assert_eq!(posted["front_page"][0]["id"], thread["id"]);
        assert!(posted["reply"].get("delete_password").is_none());

        let (_, replies) = send_json(
            &app,
            "GET",
            &format!("/api/replies/general?thread_id={thread_id}"),
            "",
        )
        .await;
        assert_eq!(replies.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reply_to_missing_thread_is_not_found() {
        let app = app();
        let (status, body) = send_json(
            &app,
            "POST",
            "/api/replies/general",
            &format!("thread_id={}&text=hi", Uuid::now_v7()),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn soft_delete_keeps_the_reply() {
        let app = app();
        let (_, thread) = send_json(&app, "POST", "/api/threads/general", "text=hello").await;
        let thread_id = thread["id"].as_str().unwrap();
        let (_, posted) = send_json(
            &app,
            "POST",
            "/api/replies/general",
            &format!("thread_id={thread_id}&text=oops"),
        )
        .await;
        let reply_id = posted["reply"]["id"].as_str().unwrap();

        let (status, ack) = send_json(
            &app,
            "DELETE",
            "/api/replies/general",
            &format!("thread_id={thread_id}&reply_id={reply_id}"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["result"], "deleted");

        let (_, replies) = send_json(
            &app,
            "GET",
            &format!("/api/replies/general?thread_id={thread_id}"),
            "",
        )
        .await;
        assert_eq!(replies[0]["id"], reply_id);
        assert_eq!(replies[0]["text"], "[deleted]");
    }

    #[tokio::test]
    async fn listing_requires_a_thread_id() {
        let app = app();
        let (status, _) = send_json(&app, "GET", "/api/replies/general", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
