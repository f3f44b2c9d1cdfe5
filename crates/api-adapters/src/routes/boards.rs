//! Board endpoints: `/api/boards/{board}`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use domains::{BoardCreation, BoardInfo, BoardName};

use crate::error::ApiError;
use crate::state::AppState;
use crate::views::{BoardCreationView, BoardDeletionView};

/// GET /api/boards/{board}
async fn get_board(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
) -> Result<Json<BoardInfo>, ApiError> {
    Ok(Json(state.services.boards.get_board(&board).await?))
}

/// POST /api/boards/{board}
async fn create_board(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
) -> Result<(StatusCode, Json<BoardCreationView>), ApiError> {
    let name = BoardName::parse(&board)?;
    let outcome = state.services.boards.create_board(&board).await?;
    let status = match outcome {
        BoardCreation::Created => StatusCode::CREATED,
        BoardCreation::AlreadyExists | BoardCreation::NotRequired => StatusCode::OK,
    };
    Ok((status, Json(BoardCreationView { board: name, outcome })))
}

/// DELETE /api/boards/{board}
async fn delete_board(
    State(state): State<Arc<AppState>>,
    Path(board): Path<String>,
) -> Result<Json<BoardDeletionView>, ApiError> {
    let name = BoardName::parse(&board)?;
    let deletion = state.services.boards.delete_board(&board).await?;
    Ok(Json(BoardDeletionView::new(name, deletion)))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api/boards/{board}",
        get(get_board).post(create_board).delete(delete_board),
    )
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{app, send_json};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn shared_boards_appear_with_their_first_thread() {
        let app = app();
        let (status, _) = send_json(&app, "GET", "/api/boards/general", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, created) = send_json(&app, "POST", "/api/boards/general", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["outcome"], "not_required");

        send_json(&app, "POST", "/api/threads/general", "text=hello").await;
        let (status, info) = send_json(&app, "GET", "/api/boards/general", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(info["thread_count"], 1);
        assert_eq!(info["layout"], "shared_table");

        let (status, deleted) = send_json(&app, "DELETE", "/api/boards/general", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["threads_deleted"], 1);
    }

    #[tokio::test]
    async fn invalid_board_names_are_rejected() {
        let app = app();
        let (status, body) = send_json(&app, "GET", "/api/boards/no%20spaces", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
    }
}
