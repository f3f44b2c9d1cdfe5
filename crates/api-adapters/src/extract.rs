//! Custom Axum extractors and request field helpers

use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::request::Parts;
use axum::{Form, Json};
use domains::DomainError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Request body accepted either as JSON or as a urlencoded form, chosen by
/// the `Content-Type` header.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
            Ok(Self(value))
        }
    }
}

/// Query string parameters with rejections mapped to [`ApiError`].
pub struct Params<T>(pub T);

impl<S, T> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::Malformed(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// A boolean that may arrive as JSON `true` or as the form string `"true"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(value) => value.trim().eq_ignore_ascii_case("true"),
        }
    }
}

/// Parses a required identifier field.
pub fn required_id(field: &'static str, raw: Option<&str>) -> Result<Uuid, DomainError> {
    let raw = raw
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| DomainError::validation(format!("{field} is required")))?;
    Uuid::parse_str(raw).map_err(|_| DomainError::validation(format!("{field} is not a valid id")))
}

/// A board named in the body must agree with the board in the path.
pub fn same_board(path_board: &str, body_board: Option<&str>) -> Result<(), DomainError> {
    match body_board.map(str::trim) {
        Some(board) if !board.is_empty() && board != path_board.trim() => Err(DomainError::validation(
            format!("board '{board}' does not match the board in the path"),
        )),
        _ => Ok(()),
    }
}

/// Treats an empty form field like a missing one.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
