use axum::{
    body::Bytes,
    extract::{Extension, Query},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::{fmt::Display, sync::Arc};
use tracing::*;

use lobby::{Conflict, LobbyError, NotFound};

use super::AppState;

pub(crate) type ErrorResponse = (StatusCode, Json<JsonValue>);

pub(crate) fn error_response(status: StatusCode, message: impl Display) -> ErrorResponse {
    (status, Json(json!({ "error": message.to_string() })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CreateRequest {
    username: String,
    code: String,
    title: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct JoinRequest {
    username: String,
    code: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UrlResponse {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct KeysQuery {
    file: String,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ErrorResponse> {
    serde_json::from_slice(body).map_err(|e| {
        info!("bad-request: {}", e);
        error_response(StatusCode::BAD_REQUEST, "malformed request body")
    })
}

fn required(fields: &[(&'static str, &str)]) -> Result<(), ErrorResponse> {
    match fields.iter().find(|(_, value)| value.is_empty()) {
        Some((name, _)) => Err(error_response(
            StatusCode::BAD_REQUEST,
            LobbyError::Validation(*name),
        )),
        None => Ok(()),
    }
}

/// Where the client should open its socket, built from the request's own host.
fn ws_url(headers: &HeaderMap, code: &str, username: &str) -> Result<String, ErrorResponse> {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let scheme = match headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
    {
        Some("https") => "wss",
        _ => "ws",
    };

    let query = serde_urlencoded::to_string([("game", code), ("user", username)])
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(format!("{}://{}/ws?{}", scheme, host, query))
}

async fn reserve_username(state: &AppState, username: &str) -> Result<(), ErrorResponse> {
    if state.registry.add_username(username).await {
        Ok(())
    } else {
        info!(%username, "username:taken");
        Err(error_response(StatusCode::CONFLICT, Conflict::Username))
    }
}

pub(crate) async fn create_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ErrorResponse> {
    let request: CreateRequest = parse_body(&body)?;

    required(&[
        ("username", request.username.as_str()),
        ("code", request.code.as_str()),
        ("title", request.title.as_str()),
    ])?;

    reserve_username(&state, &request.username).await?;

    if let Err(e) = state.registry.create(&request.code, &request.title).await {
        state.registry.remove_username(&request.username).await;

        let status = match e {
            LobbyError::Anyhow(_) => {
                warn!("create: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        };

        return Err(error_response(status, e));
    }

    info!(code = %request.code, username = %request.username, "created");

    Ok(Json(UrlResponse {
        url: ws_url(&headers, &request.code, &request.username)?,
    }))
}

pub(crate) async fn join_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ErrorResponse> {
    let request: JoinRequest = parse_body(&body)?;

    required(&[
        ("username", request.username.as_str()),
        ("code", request.code.as_str()),
    ])?;

    reserve_username(&state, &request.username).await?;

    if !state
        .registry
        .can_join(&request.code, &request.username)
        .await
    {
        state.registry.remove_username(&request.username).await;

        return Err(match state.registry.get(&request.code).await {
            None => error_response(StatusCode::BAD_REQUEST, NotFound::Code),
            Some(_) => error_response(StatusCode::CONFLICT, Conflict::Player),
        });
    }

    info!(code = %request.code, username = %request.username, "joining");

    Ok(Json(UrlResponse {
        url: ws_url(&headers, &request.code, &request.username)?,
    }))
}

pub(crate) async fn files_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let catalog = state.catalog.clone();
    let files = tokio::task::spawn_blocking(move || catalog.files())
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(files))
}

pub(crate) async fn keys_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<KeysQuery>,
) -> Result<impl IntoResponse, ErrorResponse> {
    let catalog = state.catalog.clone();
    let titles = tokio::task::spawn_blocking(move || catalog.titles(&query.file))
        .await
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    Ok(Json(titles))
}

pub(crate) async fn health_handler() -> impl IntoResponse {
    Json(json!({}))
}
